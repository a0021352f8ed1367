use tracing_subscriber::EnvFilter;

/// `RUST_LOG` があればそれを優先し、なければ自クレートのみ info（--verbose で debug）
pub fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,dataset_bob={level},dataset_bob_common={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}
