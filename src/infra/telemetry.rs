use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "garfapi_refresh_total",
            Unit::Count,
            "Total number of cache refresh attempts (timer ticks plus moderation triggers)."
        );
        describe_counter!(
            "garfapi_refresh_failure_total",
            Unit::Count,
            "Total number of refresh attempts that kept the previous snapshot."
        );
        describe_counter!(
            "garfapi_garfs_served_total",
            Unit::Count,
            "Total number of random garf responses served."
        );
        describe_counter!(
            "garfapi_reviews_total",
            Unit::Count,
            "Total number of moderation decisions, labeled by action."
        );
        describe_counter!(
            "garfapi_uploads_total",
            Unit::Count,
            "Total number of accepted upload submissions."
        );
    });
}
