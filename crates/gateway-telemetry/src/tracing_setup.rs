//! Tracing subscriber setup.
//!
//! Installs a `tracing-subscriber` registry with:
//! - an `EnvFilter` (`RUST_LOG` wins over the configured level)
//! - a text or JSON fmt layer
//! - an optional OpenTelemetry layer

use gateway_config::LoggingSettings;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    trace::{Config, RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing::info;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Attach the OpenTelemetry layer
    pub otel_enabled: bool,
    /// Service name
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (dev, staging, prod)
    pub environment: String,
    /// Sampling rate (0.0 - 1.0)
    pub sampling_rate: f64,
    /// Default filter directive
    pub log_level: String,
    /// Emit JSON lines
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            otel_enabled: false,
            service_name: "ingress-gateway".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            sampling_rate: 1.0,
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Configuration described by the `logging` section.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            otel_enabled: settings.otel_enabled,
            service_name: settings.service_name.clone(),
            environment: settings.environment.clone(),
            log_level: settings.level.clone(),
            json: settings.json,
            ..Default::default()
        }
        .with_sampling_rate(settings.sampling_rate)
    }

    /// Set the environment
    #[must_use]
    pub fn with_environment(mut self, env: impl Into<String>) -> Self {
        self.environment = env.into();
        self
    }

    /// Set the sampling rate
    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Switch between JSON and text output
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Enable or disable the OpenTelemetry layer
    #[must_use]
    pub fn with_otel(mut self, enabled: bool) -> Self {
        self.otel_enabled = enabled;
        self
    }

    fn sampler(&self) -> Sampler {
        if self.sampling_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sampling_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sampling_rate)
        }
    }
}

/// Initialize tracing with the given configuration
///
/// Returns the tracer provider when the OpenTelemetry layer is attached so the
/// caller can flush it on shutdown.
///
/// # Errors
/// Returns error if the filter directive is invalid or a global subscriber is
/// already installed
pub fn init_tracing(config: &TracingConfig) -> Result<Option<TracerProvider>, TracingError> {
    let filter = build_filter(&config.log_level)?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let provider = config.otel_enabled.then(|| {
        let resource = Resource::new(vec![
            opentelemetry::KeyValue::new("service.name", config.service_name.clone()),
            opentelemetry::KeyValue::new("service.version", config.service_version.clone()),
            opentelemetry::KeyValue::new("deployment.environment", config.environment.clone()),
        ]);

        let tracer_config = Config::default()
            .with_sampler(config.sampler())
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource);

        TracerProvider::builder().with_config(tracer_config).build()
    });

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .with(otel_layer)
        .try_init()
        .map_err(|e| TracingError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        environment = %config.environment,
        json = config.json,
        otel = config.otel_enabled,
        "Tracing initialized"
    );

    Ok(provider)
}

fn build_filter(level: &str) -> Result<EnvFilter, TracingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| TracingError::Filter(format!("'{level}': {e}")))
}

/// Shutdown tracing and flush remaining spans
pub fn shutdown_tracing(provider: Option<TracerProvider>) {
    if let Some(provider) = provider {
        for result in provider.force_flush() {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to flush spans");
            }
        }
        drop(provider);
        info!("Tracing shutdown complete");
    }
}

/// Tracing initialization error
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    /// Failed to initialize tracing
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
    /// The log level is not a valid filter directive
    #[error("Invalid log filter {0}")]
    Filter(String),
}

/// Create the span that wraps one inbound request
#[macro_export]
macro_rules! ingress_span {
    ($request_id:expr, $method:expr, $path:expr) => {
        tracing::info_span!(
            "ingress",
            request_id = %$request_id,
            method = %$method,
            path = %$path,
            otel.kind = "server"
        )
    };
}
