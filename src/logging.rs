use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Initialises tracing. `JEEP_TRACKER_LOG` overrides the verbosity-based default.
pub fn init(verbosity: u8) -> crate::Result {
    let default_directives = match verbosity {
        0 => "jeep_tracker=info,tower_http=info",
        1 => "jeep_tracker=debug,tower_http=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("JEEP_TRACKER_LOG").or_else(|_| EnvFilter::try_new(default_directives))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity > 0)
        .try_init()
        .map_err(|error| anyhow!("failed to initialise logging: {}", error))?;
    Ok(())
}
