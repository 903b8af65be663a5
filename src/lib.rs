pub mod capabilities;
pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding this crate.
///
/// Honors `RUST_LOG` when set, otherwise falls back to the crate default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("voxreport v{}", config::APP_VERSION);
}
