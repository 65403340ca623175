use super::{AccountPage, ApiError, ApiResult, RolePage, SsoApi};
use crate::error::{OverrideError, Result};
use crate::models::Credential;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-retry sleeps applied to throttled calls
///
/// The longest wait comes first so the upstream token bucket can refill before
/// the remaining attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Sleep before retry number `retry` (zero based), `None` once exhausted
    pub fn delay(&self, retry: usize) -> Option<Duration> {
        self.delays.get(retry).copied()
    }

    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(10),
            Duration::from_secs(5),
            Duration::from_secs(1),
        ])
    }
}

/// Throttle-aware wrapper over an [`SsoApi`]
///
/// Every call is bounded by `request_timeout`. Throttled calls are retried on
/// the backoff schedule, unauthorized calls fail as authentication errors, and
/// everything else surfaces immediately. No attempt starts once `cancel` has
/// fired, and a pending backoff sleep is cut short by it.
pub struct Gateway<A> {
    api: A,
    backoff: BackoffSchedule,
    request_timeout: Duration,
}

impl<A: SsoApi> Gateway<A> {
    pub fn new(api: A, backoff: BackoffSchedule, request_timeout: Duration) -> Self {
        Self {
            api,
            backoff,
            request_timeout,
        }
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn list_accounts(
        &self,
        access_token: &str,
        next_token: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AccountPage> {
        self.call("ListAccounts", cancel, || {
            self.api.list_accounts(access_token, next_token.clone())
        })
        .await
    }

    pub async fn list_account_roles(
        &self,
        access_token: &str,
        account_id: &str,
        next_token: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<RolePage> {
        self.call("ListAccountRoles", cancel, || {
            self.api
                .list_account_roles(access_token, account_id, next_token.clone())
        })
        .await
    }

    pub async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Credential> {
        let creds = self
            .call("GetRoleCredentials", cancel, || {
                self.api
                    .get_role_credentials(access_token, account_id, role_name)
            })
            .await?;

        if !creds.is_complete() {
            return Err(OverrideError::Remote {
                operation: "GetRoleCredentials",
                message: format!("incomplete credentials for {}/{}", account_id, role_name),
            });
        }
        Ok(creds)
    }

    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        mut request: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut retry = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(OverrideError::Cancelled);
            }

            let outcome = tokio::time::timeout(self.request_timeout, request())
                .await
                .unwrap_or(Err(ApiError::Timeout(self.request_timeout)));

            match outcome {
                Ok(value) => return Ok(value),
                Err(ApiError::TooManyRequests(message)) => {
                    let Some(delay) = self.backoff.delay(retry) else {
                        return Err(OverrideError::RetriesExhausted {
                            operation,
                            attempts: retry + 1,
                            message,
                        });
                    };
                    retry += 1;
                    warn!(
                        "Backing off {} for {:?} (retry {} of {})",
                        operation,
                        delay,
                        retry,
                        self.backoff.max_retries()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(OverrideError::Cancelled),
                    }
                }
                Err(ApiError::Unauthorized(message)) => {
                    debug!("{} unauthorized: {}", operation, message);
                    return Err(OverrideError::AuthenticationFailed(format!(
                        "{} rejected the SSO token: {}",
                        operation, message
                    )));
                }
                Err(err) => {
                    debug!("{} failed ({:?}): {}", operation, err.kind(), err);
                    return Err(OverrideError::Remote {
                        operation,
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}
