use log::LevelFilter;

/// Log target shared by every module of the harness.
pub const TARGET: &str = "gaia-e2e";

/// Installs the `env_logger` backend. `RUST_LOG` still takes precedence for other targets.
/// Safe to call from several tests in the same binary.
pub fn setup_logging() {
    let _ = env_logger::builder()
        .filter_module("gaia_e2e", LevelFilter::Info)
        .filter(Some(TARGET), LevelFilter::Info)
        .parse_default_env()
        .format_module_path(false)
        .is_test(true)
        .try_init();
}
