pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use shared::error::{AppError, Result};

/// Initialize tracing output for host binaries and examples.
///
/// Library consumers that install their own subscriber should skip this.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrosync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
