#[tokio::main]
async fn main() {
    if let Err(e) = turno_backend::client::run().await {
        log::error!(target: "turno.client", "Fatal: {}", e);
        eprintln!("turno-client: {}", e);
        std::process::exit(1);
    }
}
