use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up stderr logging. `MARKLOG_LOG` overrides the level chosen by
/// `--verbose`, using `EnvFilter` directive syntax.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        "marking_log=debug"
    } else {
        "marking_log=warn"
    };
    let filter = EnvFilter::try_from_env("MARKLOG_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}
