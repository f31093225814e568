use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. `RUST_LOG` overrides the default
/// `info` filter; `verbose` lowers it to `debug` for this crate.
pub fn init_tracing(verbose: bool) {
    let _ = INIT.get_or_init(|| {
        let default_filter = if verbose {
            "info,saml_idp=debug"
        } else {
            "info"
        };
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(env_filter)
            .try_init();
    });
}
