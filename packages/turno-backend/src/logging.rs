use log::SetLoggerError;

/// Install the process logger. `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init()
}
