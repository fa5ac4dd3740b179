use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when RUST_LOG is not set
const DEFAULT_DIRECTIVE: &str = "clue_extract=info";

/// Install the global subscriber; logs go to stderr so CSV can go to stdout
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
