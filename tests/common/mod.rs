//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use order_service::config::ServiceConfig;
use order_service::{HttpServer, Shutdown};

/// Handle to a mock user service.
pub struct MockUserService {
    pub addr: SocketAddr,
    hits: Arc<AtomicU32>,
}

impl MockUserService {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far.
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock user service on an ephemeral port.
///
/// `respond` gets the request path and returns status and body.
pub async fn start_user_service<F, Fut>(respond: F) -> MockUserService
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let respond = Arc::new(respond);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let respond = respond.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]);
                        let path = head
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();
                        counter.fetch_add(1, Ordering::SeqCst);

                        let (status, body) = respond(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUserService { addr, hits }
}

/// A user service that answers every lookup with a real user.
pub async fn healthy_user_service() -> MockUserService {
    start_user_service(|path| async move {
        let id: u64 = path.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap_or(0);
        (
            200,
            format!(r#"{{"id":{id},"name":"Alice","email":"alice@example.com"}}"#),
        )
    })
    .await
}

/// A user service that fails every lookup with a 500.
pub async fn failing_user_service() -> MockUserService {
    start_user_service(|_| async { (500, r#"{"error":"boom"}"#.to_string()) }).await
}

/// A user service that never answers within any sane timeout.
pub async fn hanging_user_service() -> MockUserService {
    start_user_service(|_| async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        (200, String::new())
    })
    .await
}

/// Configuration tuned for fast tests against `user_service_url`.
pub fn test_config(user_service_url: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.user_service.base_url = user_service_url.to_string();
    config.user_service.connect_timeout_ms = 200;

    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;

    config.timeouts.attempt_ms = 200;
    config.timeouts.total_budget_ms = 1000;

    config.circuit_breaker.window_size = 10;
    config.circuit_breaker.minimum_calls = 5;
    config.circuit_breaker.open_duration_ms = 60_000;
    config
}

/// A running order service.
pub struct RunningService {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl RunningService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_order_service(config: ServiceConfig) -> RunningService {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    RunningService {
        addr,
        shutdown,
        handle,
    }
}

pub fn order_body(user_id: u64) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id,
        "product": "headphones",
        "quantity": 1,
        "price": 89.9,
    })
}
