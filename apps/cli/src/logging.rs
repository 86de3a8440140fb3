//! Logging initialization
//!
//! Logs go to stderr so rendered XML on stdout stays clean. `RUST_LOG`
//! overrides the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub fn init_logging(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "xmlview={level},xmlview_model={level},xmlview_planner={level},\
             xmlview_engine={level},xmlview_format={level},warn"
        ))
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    if config.json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}
