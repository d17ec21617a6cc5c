use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider, Temporality},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use std::env;
use std::time::Duration;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// OTLP transport, picked from `OTEL_EXPORTER_OTLP_PROTOCOL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OtlpProtocol {
    Http,
    Grpc,
}

impl OtlpProtocol {
    /// `None` unless one of the `OTEL_EXPORTER_OTLP_*` variables is set.
    fn from_env() -> Option<Self> {
        let configured = ["ENDPOINT", "HEADERS", "PROTOCOL"]
            .iter()
            .any(|suffix| env::var(format!("OTEL_EXPORTER_OTLP_{suffix}")).is_ok());
        if !configured {
            return None;
        }
        let protocol = match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => OtlpProtocol::Grpc,
            _ => OtlpProtocol::Http,
        };
        Some(protocol)
    }
}

/// Log and trace setup for the process.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`), so command output on
/// stdout stays machine-readable. When OTLP is configured through the standard
/// `OTEL_EXPORTER_OTLP_*` variables, spans and metrics are exported as well. Exporters
/// are flushed when the value is dropped.
pub struct Telemetry {
    name: &'static str,
    version: &'static str,
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            tracer_provider: None,
            meter_provider: None,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    fn resource(&self) -> Resource {
        let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".into());
        Resource::builder()
            .with_service_name(self.name)
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, self.version),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    fn build_tracer_provider(
        &self,
        protocol: OtlpProtocol,
    ) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder();
        let exporter = match protocol {
            OtlpProtocol::Http => exporter.with_http().build()?,
            OtlpProtocol::Grpc => exporter.with_tonic().build()?,
        };
        Ok(SdkTracerProvider::builder()
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(self.resource())
            .with_batch_exporter(exporter)
            .build())
    }

    fn build_meter_provider(
        &self,
        protocol: OtlpProtocol,
    ) -> Result<SdkMeterProvider, opentelemetry_otlp::ExporterBuildError> {
        let exporter = opentelemetry_otlp::MetricExporter::builder();
        let exporter = match protocol {
            OtlpProtocol::Http => exporter
                .with_http()
                .with_temporality(Temporality::default())
                .build()?,
            OtlpProtocol::Grpc => exporter
                .with_tonic()
                .with_temporality(Temporality::default())
                .build()?,
        };
        let reader = PeriodicReader::builder(exporter)
            .with_interval(Duration::from_secs(30))
            .build();
        let provider = MeterProviderBuilder::default()
            .with_resource(self.resource())
            .with_reader(reader)
            .build();
        global::set_meter_provider(provider.clone());
        Ok(provider)
    }

    /// Installs the global subscriber. Falls back to plain logging when the OTLP
    /// exporters cannot be built.
    pub fn register(mut self) -> Self {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        let exporters = OtlpProtocol::from_env().map(|protocol| {
            self.build_tracer_provider(protocol)
                .and_then(|tracer| Ok((protocol, tracer, self.build_meter_provider(protocol)?)))
        });
        match exporters {
            Some(Ok((protocol, tracer_provider, meter_provider))) => {
                let tracer = tracer_provider.tracer(self.name);
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt)
                    .with(MetricsLayer::new(meter_provider.clone()))
                    .with(OpenTelemetryLayer::new(tracer))
                    .init();
                tracing::info!(?protocol, "OpenTelemetry export enabled");
                self.tracer_provider = Some(tracer_provider);
                self.meter_provider = Some(meter_provider);
            }
            Some(Err(error)) => {
                tracing_subscriber::registry().with(filter).with(fmt).init();
                tracing::warn!(%error, "Failed to build OTLP exporters, logging locally only");
            }
            None => {
                tracing_subscriber::registry().with(filter).with(fmt).init();
            }
        }
        self
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(error) = provider.shutdown() {
                eprintln!("Failed to flush traces: {error:?}");
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(error) = provider.shutdown() {
                eprintln!("Failed to flush metrics: {error:?}");
            }
        }
    }
}
