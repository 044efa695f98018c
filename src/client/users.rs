//! HTTP client for the user service.
//!
//! # Responsibilities
//! - Resolve `GET {base_url}/api/users/{id}`
//! - Map non-2xx statuses, transport failures and bad bodies to `DependencyError`
//!
//! No timeout is applied here beyond connection setup; the executor races each
//! call against its own deadline.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::UserServiceConfig;
use crate::resilience::{Dependency, DependencyError};

pub type UserId = u64;

/// User as returned by the user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid user service URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpUserClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUserClient {
    pub fn new(config: &UserServiceConfig) -> Result<Self, ClientError> {
        let mut base_url =
            Url::parse(&config.base_url).map_err(|source| ClientError::InvalidBaseUrl {
                url: config.base_url.clone(),
                source,
            })?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(concat!("order-service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn user_url(&self, id: UserId) -> Result<Url, DependencyError> {
        self.base_url
            .join(&format!("api/users/{id}"))
            .map_err(|e| DependencyError::Transport(format!("cannot build user URL: {e}")))
    }

    pub async fn get_user(&self, id: UserId) -> Result<UserRecord, DependencyError> {
        let url = self.user_url(id)?;
        tracing::info!(user_id = id, url = %url, "Calling user service");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DependencyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::Status(status.as_u16()));
        }

        response
            .json::<UserRecord>()
            .await
            .map_err(|e| DependencyError::Decode(e.to_string()))
    }
}

impl Dependency for HttpUserClient {
    type Id = UserId;
    type Output = UserRecord;

    fn call(&self, id: &UserId) -> impl Future<Output = Result<UserRecord, DependencyError>> + Send {
        let id = *id;
        async move { self.get_user(id).await }
    }
}
