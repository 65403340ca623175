// Scripted in-memory SSO portal used by the pipeline tests
use super::{AccountPage, AccountSummary, ApiError, ApiResult, RolePage, SsoApi};
use crate::models::Credential;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct ScriptedSso {
    account_pages: Vec<Vec<AccountSummary>>,
    role_pages: HashMap<String, Vec<Vec<String>>>,
    unauthorized: bool,
    failing_accounts: HashSet<String>,
    failing_credentials: HashSet<(String, String)>,
    credential_throttles: AtomicUsize,
    role_throttles: AtomicUsize,
    credential_latency: Option<Duration>,
    hang_role_listing: bool,

    pub list_accounts_calls: AtomicUsize,
    pub list_roles_calls: Mutex<Vec<String>>,
    pub credential_calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSso {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page of accounts; each account gets the given roles on a single page
    pub fn page(mut self, accounts: &[(&str, &str)], roles: &[&str]) -> Self {
        let mut page = Vec::new();
        for (id, name) in accounts {
            page.push(AccountSummary::new(*id, *name));
            self.role_pages.insert(
                id.to_string(),
                vec![roles.iter().map(|r| r.to_string()).collect()],
            );
        }
        self.account_pages.push(page);
        self
    }

    /// Replace an account's roles with several pages
    pub fn role_pages(mut self, account_id: &str, pages: &[&[&str]]) -> Self {
        self.role_pages.insert(
            account_id.to_string(),
            pages
                .iter()
                .map(|page| page.iter().map(|r| r.to_string()).collect())
                .collect(),
        );
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn failing_account(mut self, account_id: &str) -> Self {
        self.failing_accounts.insert(account_id.to_string());
        self
    }

    /// GetRoleCredentials for this account/role pair fails with a server error
    pub fn failing_credentials(mut self, account_id: &str, role_name: &str) -> Self {
        self.failing_credentials
            .insert((account_id.to_string(), role_name.to_string()));
        self
    }

    pub fn throttle_credentials(self, times: usize) -> Self {
        self.credential_throttles.store(times, Ordering::SeqCst);
        self
    }

    pub fn throttle_roles(self, times: usize) -> Self {
        self.role_throttles.store(times, Ordering::SeqCst);
        self
    }

    pub fn credential_latency(mut self, latency: Duration) -> Self {
        self.credential_latency = Some(latency);
        self
    }

    pub fn hang_role_listing(mut self) -> Self {
        self.hang_role_listing = true;
        self
    }

    pub fn role_calls(&self) -> usize {
        self.list_roles_calls.lock().unwrap().len()
    }

    pub fn credential_call_log(&self) -> Vec<(String, String)> {
        self.credential_calls.lock().unwrap().clone()
    }

    pub fn credential_for(account_id: &str, role_name: &str) -> Credential {
        Credential {
            access_key_id: format!("AKIA-{}", account_id),
            secret_access_key: format!("secret-{}-{}", account_id, role_name),
            session_token: format!("session-{}-{}", account_id, role_name),
            expiration: None,
        }
    }

    fn take_throttle(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn page_index(next_token: Option<String>) -> usize {
    next_token
        .and_then(|token| token.strip_prefix("page-").map(str::to_string))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn next_page_token(index: usize, pages: usize) -> Option<String> {
    (index + 1 < pages).then(|| format!("page-{}", index + 1))
}

#[async_trait]
impl SsoApi for ScriptedSso {
    async fn list_accounts(
        &self,
        _access_token: &str,
        next_token: Option<String>,
    ) -> ApiResult<AccountPage> {
        self.list_accounts_calls.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized {
            return Err(ApiError::Unauthorized("session expired".to_string()));
        }

        let index = page_index(next_token);
        Ok(AccountPage {
            accounts: self.account_pages.get(index).cloned().unwrap_or_default(),
            next_token: next_page_token(index, self.account_pages.len()),
        })
    }

    async fn list_account_roles(
        &self,
        _access_token: &str,
        account_id: &str,
        next_token: Option<String>,
    ) -> ApiResult<RolePage> {
        self.list_roles_calls
            .lock()
            .unwrap()
            .push(account_id.to_string());

        if self.hang_role_listing {
            std::future::pending::<()>().await;
        }
        if Self::take_throttle(&self.role_throttles) {
            return Err(ApiError::TooManyRequests("rate exceeded".to_string()));
        }
        if self.failing_accounts.contains(account_id) {
            return Err(ApiError::Other("HTTP 500".to_string()));
        }

        let pages = self.role_pages.get(account_id).cloned().unwrap_or_default();
        let index = page_index(next_token);
        Ok(RolePage {
            roles: pages.get(index).cloned().unwrap_or_default(),
            next_token: next_page_token(index, pages.len()),
        })
    }

    async fn get_role_credentials(
        &self,
        _access_token: &str,
        account_id: &str,
        role_name: &str,
    ) -> ApiResult<Credential> {
        self.credential_calls
            .lock()
            .unwrap()
            .push((account_id.to_string(), role_name.to_string()));

        if let Some(latency) = self.credential_latency {
            tokio::time::sleep(latency).await;
        }
        if Self::take_throttle(&self.credential_throttles) {
            return Err(ApiError::TooManyRequests("rate exceeded".to_string()));
        }
        let pair = (account_id.to_string(), role_name.to_string());
        if self.failing_credentials.contains(&pair) {
            return Err(ApiError::Other("HTTP 500".to_string()));
        }

        Ok(Self::credential_for(account_id, role_name))
    }
}
