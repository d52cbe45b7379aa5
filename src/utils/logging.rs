use env_logger::{Builder, Env};

/// Initialise the global logger once. `RUST_LOG` wins over the configured
/// level; noisy driver targets are kept at `warn`.
pub fn init_logging(level: &str) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_module("oracle", log::LevelFilter::Warn);
    }
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}
