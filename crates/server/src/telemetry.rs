//! OTLP export of traces and logs, enabled by the `telemetry` feature flag.

use axum::{body::Body, http::Request, response::Response};
use opentelemetry::{
    global,
    trace::{SpanKind, TraceContextExt, Tracer},
    Context, KeyValue,
};
use opentelemetry_otlp::tonic_types::{metadata::MetadataMap, transport::ClientTlsConfig};
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use std::{
    future::Future,
    pin::Pin,
    sync::OnceLock,
    task::{Context as TaskContext, Poll},
};
use tower::{Layer, Service};

use crate::auth::jwt::Claims;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

static LOGGER_PROVIDER: OnceLock<opentelemetry_sdk::logs::SdkLoggerProvider> = OnceLock::new();

/// Where and how to reach the collector.
struct Collector {
    endpoint: String,
    metadata: Option<MetadataMap>,
}

impl Collector {
    fn from_env() -> Result<Option<Self>, String> {
        let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
            return Ok(None);
        };
        let metadata = match std::env::var("OTEL_EXPORTER_OTLP_TOKEN") {
            Ok(token) if !token.is_empty() => {
                let mut metadata = MetadataMap::new();
                let value = format!("Bearer {token}")
                    .parse()
                    .map_err(|_| "OTEL_EXPORTER_OTLP_TOKEN is not a valid header value".to_string())?;
                metadata.insert("authorization", value);
                Some(metadata)
            }
            _ => None,
        };
        Ok(Some(Self { endpoint, metadata }))
    }

    fn tls(&self) -> Option<ClientTlsConfig> {
        self.endpoint
            .starts_with("https://")
            .then(|| ClientTlsConfig::new().with_native_roots())
    }
}

/// Apply endpoint, TLS and auth metadata to a tonic exporter builder.
macro_rules! configure {
    ($builder:expr, $collector:expr) => {{
        let mut builder = $builder.with_tonic().with_endpoint(&$collector.endpoint);
        if let Some(tls) = $collector.tls() {
            builder = builder.with_tls_config(tls);
        }
        if let Some(metadata) = $collector.metadata.clone() {
            builder = builder.with_metadata(metadata);
        }
        builder
    }};
}

/// Install the global tracer provider and bridge the `log` crate to OTLP.
///
/// Runs inside the Tokio runtime because tonic spawns its connection task
/// on first export. Without `OTEL_EXPORTER_OTLP_ENDPOINT` nothing is set up.
/// `OTEL_SERVICE_NAME` (default `comunigov`) and `DEPLOY_ENV` (default
/// `development`) tag every span.
pub fn init_telemetry() -> Result<(), String> {
    let Some(collector) = Collector::from_env()? else {
        tracing::warn!("OTEL_EXPORTER_OTLP_ENDPOINT not set, telemetry stays local");
        return Ok(());
    };

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "comunigov".into()))
        .with_attribute(KeyValue::new("service.version", APP_VERSION))
        .with_attribute(KeyValue::new(
            "deployment.environment",
            std::env::var("DEPLOY_ENV").unwrap_or_else(|_| "development".into()),
        ))
        .build();

    let span_exporter = configure!(opentelemetry_otlp::SpanExporter::builder(), collector)
        .build()
        .map_err(|e| format!("OTLP span exporter: {e}"))?;
    global::set_tracer_provider(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build(),
    );

    let log_exporter = configure!(opentelemetry_otlp::LogExporter::builder(), collector)
        .build()
        .map_err(|e| format!("OTLP log exporter: {e}"))?;
    let logger_provider = LOGGER_PROVIDER.get_or_init(|| {
        opentelemetry_sdk::logs::SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build()
    });
    let bridge = opentelemetry_appender_log::OpenTelemetryLogBridge::new(logger_provider);
    match log::set_boxed_logger(Box::new(bridge)) {
        Ok(()) => log::set_max_level(log::LevelFilter::Info),
        Err(_) => tracing::warn!("A `log` logger is already installed, OTLP log bridge skipped"),
    }

    tracing::info!(version = APP_VERSION, endpoint = %collector.endpoint, "Telemetry initialized");
    Ok(())
}

/// Kind of client behind a request. `X-Client-Platform` wins over the
/// User-Agent guess.
fn client_platform(user_agent: Option<&str>, explicit: Option<&str>) -> &'static str {
    if let Some(platform) = explicit {
        return match platform {
            "web" => "web",
            "mobile" => "mobile",
            "integration" => "integration",
            _ => "unknown",
        };
    }
    match user_agent {
        None | Some("") => "unknown",
        Some(ua) if ["Android", "iPhone", "iPad", "Mobile"].iter().any(|m| ua.contains(m)) => "mobile",
        Some(ua) if ua.starts_with("Mozilla/") => "web",
        Some(_) => "integration",
    }
}

/// Collapse numeric and UUID path segments so spans group by route:
/// `/api/tasks/42/status` becomes `/api/tasks/{id}/status`.
fn route_template(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let is_id = !segment.is_empty()
                && (segment.bytes().all(|b| b.is_ascii_digit())
                    || uuid::Uuid::parse_str(segment).is_ok());
            if is_id {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn request_attributes(req: &Request<Body>, route: &str) -> Vec<KeyValue> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    let mut attributes = vec![
        KeyValue::new("http.method", req.method().to_string()),
        KeyValue::new("http.target", req.uri().path().to_string()),
        KeyValue::new("http.route", route.to_string()),
        KeyValue::new("client.platform", client_platform(header("user-agent"), header("x-client-platform"))),
        KeyValue::new("http.request_id", header("x-request-id").unwrap_or_default().to_string()),
    ];
    match req.extensions().get::<Claims>() {
        Some(claims) => attributes.extend([
            KeyValue::new("user.id", claims.sub),
            KeyValue::new("user.role", claims.role.clone()),
            KeyValue::new("user.entity_id", claims.entity_id.unwrap_or_default()),
        ]),
        None => attributes.push(KeyValue::new("user.anonymous", true)),
    }
    attributes
}

/// One server span per HTTP request, closed with the response status.
#[derive(Clone)]
pub struct OtelTraceLayer;

impl<S> Layer<S> for OtelTraceLayer {
    type Service = OtelTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OtelTraceService { inner }
    }
}

#[derive(Clone)]
pub struct OtelTraceService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for OtelTraceService<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let tracer = global::tracer("comunigov");
        let route = route_template(req.uri().path());
        let span = tracer
            .span_builder(format!("{} {}", req.method(), route))
            .with_kind(SpanKind::Server)
            .with_attributes(request_attributes(&req, &route))
            .start(&tracer);

        let cx = Context::current_with_span(span);
        let future = {
            let _guard = cx.clone().attach();
            self.inner.call(req)
        };

        Box::pin(async move {
            let response = future.await?;
            let span = cx.span();
            let status = response.status();
            span.set_attribute(KeyValue::new("http.status_code", i64::from(status.as_u16())));
            if status.is_server_error() {
                span.set_status(opentelemetry::trace::Status::error(status.to_string()));
            }
            Ok(response)
        })
    }
}
