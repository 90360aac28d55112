// logging.rs

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a stderr subscriber when `CINDER_LOG` holds a filter directive.
///
/// `CINDER_LOG_STYLE=full` adds timestamps; the default compact style omits
/// them. Calling this more than once, or after another subscriber was
/// installed, does nothing.
pub fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_env("CINDER_LOG") else {
        return;
    };
    let full = std::env::var("CINDER_LOG_STYLE").is_ok_and(|style| style == "full");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let installed = if full {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    if installed.is_ok() {
        tracing::debug!("tracing initialized");
    }
}
