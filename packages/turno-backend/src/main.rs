#[tokio::main]
async fn main() {
    if let Err(e) = turno_backend::run().await {
        log::error!(target: "turno.backend", "Fatal: {}", e);
        eprintln!("turno-backend: {}", e);
        std::process::exit(1);
    }
}
