use super::{AccountPage, AccountSummary, ApiError, ApiResult, RolePage, SsoApi};
use crate::models::Credential;
use async_trait::async_trait;
use aws_sdk_sso::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sso::Client as SsoClient;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use aws_types::region::Region;
use chrono::{TimeZone, Utc};
use std::time::Duration;

/// SSO portal client backed by the AWS SDK
///
/// SDK retries are disabled; [`super::Gateway`] is the only retry layer.
pub struct AwsSsoApi {
    client: SsoClient,
}

impl AwsSsoApi {
    pub async fn new(region: &str, request_timeout: Duration) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(request_timeout)
                    .build(),
            )
            .load()
            .await;

        Self {
            client: SsoClient::new(&config),
        }
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let Some(service_err) = err.as_service_error() {
        let message = service_err.message().unwrap_or_default().to_string();
        match service_err.code() {
            Some("TooManyRequestsException") => return ApiError::TooManyRequests(message),
            Some("UnauthorizedException") => return ApiError::Unauthorized(message),
            _ => {}
        }
    }
    ApiError::Other(DisplayErrorContext(&err).to_string())
}

fn required(field: &str, value: Option<&str>) -> ApiResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::Other(format!("No {} in response", field))),
    }
}

#[async_trait]
impl SsoApi for AwsSsoApi {
    async fn list_accounts(
        &self,
        access_token: &str,
        next_token: Option<String>,
    ) -> ApiResult<AccountPage> {
        let response = self
            .client
            .list_accounts()
            .access_token(access_token)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(classify)?;

        let mut accounts = Vec::new();
        for account in response.account_list() {
            let id = required("accountId", account.account_id())?;
            let name = account.account_name().unwrap_or(id.as_str()).to_string();
            accounts.push(AccountSummary { id, name });
        }

        Ok(AccountPage {
            accounts,
            next_token: response.next_token().map(|s| s.to_string()),
        })
    }

    async fn list_account_roles(
        &self,
        access_token: &str,
        account_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<RolePage> {
        let response = self
            .client
            .list_account_roles()
            .access_token(access_token)
            .account_id(account_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(classify)?;

        let roles = response
            .role_list()
            .iter()
            .filter_map(|role| role.role_name())
            .map(|name| name.to_string())
            .collect();

        Ok(RolePage {
            roles,
            next_token: response.next_token().map(|s| s.to_string()),
        })
    }

    async fn get_role_credentials(
        &self,
        access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> ApiResult<Credential> {
        let response = self
            .client
            .get_role_credentials()
            .access_token(access_token)
            .account_id(account_id)
            .role_name(role_name)
            .send()
            .await
            .map_err(classify)?;

        let role_creds = response
            .role_credentials()
            .ok_or_else(|| ApiError::Other("No role_credentials in response".to_string()))?;

        Ok(Credential {
            access_key_id: required("access_key_id", role_creds.access_key_id())?,
            secret_access_key: required("secret_access_key", role_creds.secret_access_key())?,
            session_token: required("session_token", role_creds.session_token())?,
            expiration: Utc.timestamp_millis_opt(role_creds.expiration()).single(),
        })
    }
}
