// AWS SSO portal access: raw API seam, SDK client and retrying gateway
mod client;
mod gateway;

#[cfg(test)]
pub(crate) mod testing;

pub use client::AwsSsoApi;
pub use gateway::{BackoffSchedule, Gateway, DEFAULT_REQUEST_TIMEOUT};

use crate::error::ErrorKind;
use crate::models::Credential;
use async_trait::async_trait;
use thiserror::Error;

/// One account entry from ListAccounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
}

impl AccountSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPage {
    pub accounts: Vec<AccountSummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePage {
    pub roles: Vec<String>,
    pub next_token: Option<String>,
}

/// Failure of a single upstream call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("too many requests: {0}")]
    TooManyRequests(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::TooManyRequests(_) => ErrorKind::Throttling,
            ApiError::Unauthorized(_) => ErrorKind::Authentication,
            ApiError::Timeout(_) | ApiError::Other(_) => ErrorKind::Remote,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The three SSO portal operations the harvester needs, one request each
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SsoApi: Send + Sync {
    async fn list_accounts(
        &self,
        access_token: &str,
        next_token: Option<String>,
    ) -> ApiResult<AccountPage>;

    async fn list_account_roles(
        &self,
        access_token: &str,
        account_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<RolePage>;

    async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> ApiResult<Credential>;
}
