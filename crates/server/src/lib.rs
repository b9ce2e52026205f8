//! HTTP surface of the order subsystem.
//!
//! Exposes checkout, role-scoped order listing and retrieval, status
//! transitions, and cancellation as JSON endpoints, plus health and
//! prometheus metrics. Actor identity arrives from the upstream auth
//! gateway as `X-User-Id` / `X-User-Role` headers; session resolution is
//! not this service's job.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use model::{Actor, OrderStatus, PaymentMethod, TransitionError};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use serde::{Deserialize, Serialize};
use service::{OrderService, ServiceError};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Server represents the HTTP server for the order API.
pub struct Server {
    service: Arc<dyn OrderService>,
    port: u16,
    shutdown_timeout: Duration,
    metrics: Arc<Metrics>,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )
        .expect("Failed to create errors_total metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total
            .with_label_values(&[source, endpoint])
            .inc();
    }
}

/// Application state shared between request handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<dyn OrderService>,
    metrics: Arc<Metrics>,
}

/// JSON envelope for every response body.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn ok_response<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(Envelope {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

/// ApiError — a service error ready to leave the process.
///
/// Maps the service taxonomy onto HTTP statuses; the body never carries
/// storage internals beyond the message string.
struct ApiError(ServiceError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::InvalidAddress
            | ServiceError::EmptyCart
            | ServiceError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Transition(TransitionError::Forbidden) => StatusCode::FORBIDDEN,
            ServiceError::Transition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::CheckoutFailed(_)
            | ServiceError::Db(_)
            | ServiceError::Pool(_)
            | ServiceError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }
        (
            status,
            Json(Envelope::<()> {
                success: false,
                message: self.0.to_string(),
                data: None,
            }),
        )
            .into_response()
    }
}

/// Resolves the acting user from the gateway-injected identity headers.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(Envelope::<()> {
                success: false,
                message: "Missing or invalid identity headers".to_string(),
                data: None,
            }),
        )
            .into_response()
    };

    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(unauthorized)?;
    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(unauthorized)?;

    Ok(Actor::new(id, role))
}

#[derive(Debug, Deserialize)]
struct CreateOrdersRequest {
    address_id: i64,
    payment_method: PaymentMethod,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    status: Option<OrderStatus>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: OrderStatus,
    delivery_boy_id: Option<i64>,
}

impl Server {
    /// Creates a new Server instance. `shutdown_timeout` bounds how long
    /// in-flight requests may drain after a shutdown signal.
    pub fn new(port: u16, service: Arc<dyn OrderService>, shutdown_timeout: Duration) -> Self {
        info!("Initializing HTTP server on port {}", port);
        Self {
            service,
            port,
            shutdown_timeout,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        let draining = Arc::new(Notify::new());
        let drain_started = draining.clone();
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_started.notify_one();
        });

        tokio::select! {
            result = serve => {
                result.context("Server error")?;
                info!("HTTP server shut down gracefully");
            }
            _ = async {
                draining.notified().await;
                tokio::time::sleep(self.shutdown_timeout).await;
            } => {
                warn!(
                    "Graceful shutdown did not finish within {:?}, dropping remaining connections",
                    self.shutdown_timeout
                );
            }
        }

        Ok(())
    }

    fn create_router(&self) -> Router {
        let metrics = self.metrics.clone();

        Router::new()
            .route("/orders", post(Self::handle_create_orders).get(Self::handle_list_orders))
            .route("/orders/{id}", get(Self::handle_get_order))
            .route("/orders/{id}/status", post(Self::handle_update_status))
            .route("/orders/{id}/cancel", post(Self::handle_cancel_order))
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .layer(axum::middleware::from_fn_with_state(
                metrics.clone(),
                Self::metrics_middleware,
            ))
            .with_state(AppState {
                service: self.service.clone(),
                metrics,
            })
    }

    /// Middleware for collecting metrics on HTTP requests.
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let start = std::time::Instant::now();

        let response = next.run(req).await;

        let status = response.status().as_u16();
        metrics.record_request(&method, &path, status, start.elapsed());
        if status >= 400 {
            metrics.record_error("http", &path);
        }

        response
    }

    async fn handle_create_orders(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(body): Json<CreateOrdersRequest>,
    ) -> Response {
        let actor = match actor_from_headers(&headers) {
            Ok(actor) => actor,
            Err(resp) => return resp,
        };
        info!(customer_id = actor.id, "checkout requested");

        match state
            .service
            .create_orders(actor.id, body.address_id, body.payment_method, body.notes)
            .await
        {
            Ok(orders) => ok_response(StatusCode::CREATED, "Orders created", orders),
            Err(err) => ApiError::from(err).into_response(),
        }
    }

    async fn handle_list_orders(
        State(state): State<AppState>,
        headers: HeaderMap,
        Query(query): Query<ListOrdersQuery>,
    ) -> Response {
        let actor = match actor_from_headers(&headers) {
            Ok(actor) => actor,
            Err(resp) => return resp,
        };

        match state
            .service
            .list_orders(actor, query.status, query.limit, query.offset)
            .await
        {
            Ok(orders) => ok_response(StatusCode::OK, "Orders", orders),
            Err(err) => ApiError::from(err).into_response(),
        }
    }

    async fn handle_get_order(
        State(state): State<AppState>,
        headers: HeaderMap,
        Path(order_id): Path<i64>,
    ) -> Response {
        let actor = match actor_from_headers(&headers) {
            Ok(actor) => actor,
            Err(resp) => return resp,
        };

        match state.service.get_order(actor, order_id).await {
            Ok(order) => ok_response(StatusCode::OK, "Order", order),
            Err(err) => {
                if matches!(err, ServiceError::NotFound) {
                    warn!(order_id, "order not visible to actor");
                }
                ApiError::from(err).into_response()
            }
        }
    }

    async fn handle_update_status(
        State(state): State<AppState>,
        headers: HeaderMap,
        Path(order_id): Path<i64>,
        Json(body): Json<UpdateStatusRequest>,
    ) -> Response {
        let actor = match actor_from_headers(&headers) {
            Ok(actor) => actor,
            Err(resp) => return resp,
        };

        match state
            .service
            .update_status(actor, order_id, body.status, body.delivery_boy_id)
            .await
        {
            Ok(order) => ok_response(StatusCode::OK, "Status updated", order),
            Err(err) => ApiError::from(err).into_response(),
        }
    }

    async fn handle_cancel_order(
        State(state): State<AppState>,
        headers: HeaderMap,
        Path(order_id): Path<i64>,
    ) -> Response {
        let actor = match actor_from_headers(&headers) {
            Ok(actor) => actor,
            Err(resp) => return resp,
        };

        match state.service.cancel_order(actor, order_id).await {
            Ok(order) => ok_response(StatusCode::OK, "Order cancelled", order),
            Err(err) => ApiError::from(err).into_response(),
        }
    }

    async fn handle_health() -> &'static str {
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
            }
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
