use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber::fmt` layer, falling back to `info` if
/// `RUST_LOG` is unset or invalid. Logs go to stderr so stdout stays free
/// for the NDJSON progress-event stream.
pub fn init_tracing() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Common CLI flags shared by the daemon entry point, analogous to
/// `codex-common`'s `CliConfigOverrides`.
#[derive(Debug, Clone, clap::Parser)]
pub struct CommonCliArgs {
    /// Path to the language table (YAML). Defaults to `languages.yaml`.
    #[arg(long, default_value = "languages.yaml")]
    pub languages: std::path::PathBuf,

    /// Number of sandboxes to keep warm in the pool.
    #[arg(long, default_value_t = 4)]
    pub pool_size: usize,
}
