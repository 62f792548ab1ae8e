use crate::Result;

/// Initialize tracing for the bridge process.
///
/// Default: info for our crates, warn for everything else.
/// Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,hbb=info,hbb_core=info,hbb_telegram=info,hbb_whatsapp=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    // `try_init` so tests and embedders that already installed a subscriber don't panic.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init();

    Ok(())
}
