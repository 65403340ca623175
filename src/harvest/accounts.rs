use crate::error::Result;
use crate::models::Account;
use crate::sso::{Gateway, SsoApi};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Walk every ListAccounts page, in order, into a deduplicated account list
///
/// Pages are fetched one after another. Duplicate ids keep their first
/// occurrence. Any failure, unauthorized included, aborts the enumeration.
pub async fn enumerate_accounts<A: SsoApi>(
    gateway: &Gateway<A>,
    access_token: &str,
    cancel: &CancellationToken,
) -> Result<Vec<Account>> {
    debug!("Getting AWS accounts");

    let mut accounts = Vec::new();
    let mut seen = HashSet::new();
    let mut next_token: Option<String> = None;
    let mut page = 0;

    loop {
        let response = gateway
            .list_accounts(access_token, next_token.take(), cancel)
            .await?;
        page += 1;
        debug!(
            "ListAccounts page {} returned {} accounts",
            page,
            response.accounts.len()
        );

        for summary in response.accounts {
            if !seen.insert(summary.id.clone()) {
                debug!("Dropping duplicate account {}", summary.id);
                continue;
            }
            debug!("Building account state for {} {}", summary.name, summary.id);
            accounts.push(Account::new(summary.id, summary.name));
        }

        next_token = response.next_token.filter(|token| !token.is_empty());
        if next_token.is_none() {
            break;
        }
    }

    info!("Found {} accounts across {} pages", accounts.len(), page);
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, OverrideError};
    use crate::sso::{AccountPage, AccountSummary, BackoffSchedule, MockSsoApi};
    use mockall::predicate::eq;
    use std::time::Duration;

    fn gateway(api: MockSsoApi) -> Gateway<MockSsoApi> {
        Gateway::new(api, BackoffSchedule::default(), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_follows_next_token_and_dedupes() {
        let mut api = MockSsoApi::new();
        api.expect_list_accounts()
            .with(eq("token"), eq(None::<String>))
            .times(1)
            .returning(|_, _| {
                Ok(AccountPage {
                    accounts: vec![
                        AccountSummary::new("100000000001", "a"),
                        AccountSummary::new("100000000002", "b"),
                    ],
                    next_token: Some("t".to_string()),
                })
            });
        api.expect_list_accounts()
            .with(eq("token"), eq(Some("t".to_string())))
            .times(1)
            .returning(|_, _| {
                Ok(AccountPage {
                    accounts: vec![
                        AccountSummary::new("100000000002", "b-again"),
                        AccountSummary::new("100000000003", "c"),
                    ],
                    next_token: None,
                })
            });

        let accounts = enumerate_accounts(&gateway(api), "token", &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<_> = accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["100000000001", "100000000002", "100000000003"]);
        assert_eq!(accounts[1].name, "b");
        assert!(accounts.iter().all(|a| a.roles.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_estate_is_not_an_error() {
        let mut api = MockSsoApi::new();
        api.expect_list_accounts()
            .times(1)
            .returning(|_, _| Ok(AccountPage::default()));

        let accounts = enumerate_accounts(&gateway(api), "token", &CancellationToken::new())
            .await
            .unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_empty_next_token_ends_pagination() {
        let mut api = MockSsoApi::new();
        api.expect_list_accounts().times(1).returning(|_, _| {
            Ok(AccountPage {
                accounts: vec![AccountSummary::new("100000000001", "a")],
                next_token: Some(String::new()),
            })
        });

        let accounts = enumerate_accounts(&gateway(api), "token", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_aborts() {
        let mut api = MockSsoApi::new();
        api.expect_list_accounts()
            .times(1)
            .returning(|_, _| Err(crate::sso::ApiError::Unauthorized("expired".to_string())));

        let err = enumerate_accounts(&gateway(api), "token", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OverrideError::AuthenticationFailed(_)));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
