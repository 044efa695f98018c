//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wire the user-service orchestrator, order store and order workflow
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Serve on a listener until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::{ClientError, HttpUserClient};
use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::request::{request_id, track_metrics};
use crate::orders::{InMemoryOrderStore, OrderService};
use crate::resilience::{
    CallOrchestrator, CircuitBreaker, EventBus, PlaceholderUserFallback, ResilienceEvent,
};

/// Breaker and metric label of the user-service dependency.
pub const USER_SERVICE: &str = "user-service";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub breaker: Arc<CircuitBreaker>,
}

/// HTTP server for the order service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    events: EventBus,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ClientError> {
        let events = EventBus::default();

        let client = HttpUserClient::new(&config.user_service)?;
        let fallback = PlaceholderUserFallback::from_config(&config.fallback);
        let users = Arc::new(CallOrchestrator::from_config(
            USER_SERVICE,
            client,
            fallback,
            &config,
            events.clone(),
        ));
        let breaker = users.breaker().clone();

        let orders = Arc::new(OrderService::new(users, Arc::new(InMemoryOrderStore::new())));
        let state = AppState { orders, breaker };

        let router = Self::build_router(Duration::from_secs(config.timeouts.request_secs), state);
        Ok(Self {
            router,
            config,
            events,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(request_timeout: Duration, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/orders",
                post(handlers::create_order).get(handlers::list_orders),
            )
            .route("/api/orders/{id}", get(handlers::get_order))
            .route("/api/orders/user/{user_id}", get(handlers::get_user_details))
            .route("/api/orders/circuit-breaker/status", get(handlers::breaker_status))
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            user_service = %self.config.user_service.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Resilience events of every dependency this server calls.
    pub fn subscribe(&self) -> broadcast::Receiver<ResilienceEvent> {
        self.events.subscribe()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{UserId, UserRecord};
    use crate::config::CircuitBreakerConfig;
    use crate::orders::service::LookupFuture;
    use crate::orders::UserLookup;
    use crate::resilience::{CallError, RemoteResult};
    use axum::http::{header, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    /// Answers OK for even ids and DEGRADED for odd ones.
    struct ParityLookup;

    impl UserLookup for ParityLookup {
        fn lookup(&self, id: UserId) -> LookupFuture<'_> {
            let result = if id % 2 == 0 {
                RemoteResult::ok(
                    UserRecord {
                        id,
                        name: "Alice".into(),
                        email: Some("alice@example.com".into()),
                    },
                    1,
                )
            } else {
                RemoteResult::degraded(
                    UserRecord {
                        id,
                        name: "Unknown User (Service Unavailable)".into(),
                        email: None,
                    },
                    CallError::CircuitOpen,
                )
            };
            Box::pin(async move { result })
        }
    }

    fn app() -> Router {
        let state = AppState {
            orders: Arc::new(OrderService::new(
                Arc::new(ParityLookup),
                Arc::new(InMemoryOrderStore::new()),
            )),
            breaker: Arc::new(CircuitBreaker::new(
                USER_SERVICE,
                CircuitBreakerConfig::default(),
                EventBus::default(),
            )),
        };
        HttpServer::build_router(Duration::from_secs(5), state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_order(user_id: UserId) -> Request<Body> {
        let body = serde_json::json!({
            "user_id": user_id,
            "product": "monitor",
            "quantity": 2,
            "price": 199.99,
        });
        Request::post("/api/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
    }

    #[tokio::test]
    async fn test_create_validated_order() {
        let (status, body) = send(app(), post_order(2)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_validated"], true);
        assert_eq!(body["order"]["id"], 1);
        assert_eq!(body["order"]["validation"], "validated");
    }

    #[tokio::test]
    async fn test_create_degraded_order() {
        let (status, body) = send(app(), post_order(3)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["user_validated"], false);
        assert_eq!(body["order"]["validation"], "degraded");
        assert!(body["warning"].as_str().unwrap().contains("degraded"));
    }

    #[tokio::test]
    async fn test_invalid_order_rejected() {
        let request = Request::post("/api/orders")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"user_id":2,"product":"","quantity":1,"price":1.0}"#,
            ))
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "product must not be empty");
    }

    #[tokio::test]
    async fn test_get_and_list_orders() {
        let app = app();
        send(app.clone(), post_order(2)).await;
        send(app.clone(), post_order(4)).await;

        let (status, body) =
            send(app.clone(), Request::get("/api/orders/2").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], 4);

        let (status, _) =
            send(app.clone(), Request::get("/api/orders/99").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(app, Request::get("/api/orders").body(Body::empty()).unwrap()).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_user_details() {
        let app = app();
        let (status, body) = send(
            app.clone(),
            Request::get("/api/orders/user/8").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Alice");

        let (status, body) =
            send(app, Request::get("/api/orders/user/7").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["user"]["id"], 7);
        assert!(body["warning"].is_string());
    }

    #[tokio::test]
    async fn test_breaker_status() {
        let (status, body) = send(
            app(),
            Request::get("/api/orders/circuit-breaker/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], USER_SERVICE);
        assert_eq!(body["state"], "CLOSED");
        assert_eq!(body["window_size"], 10);
    }

    #[tokio::test]
    async fn test_request_id_generated_and_propagated() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));

        let response = app()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "given-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "given-id");
    }
}
