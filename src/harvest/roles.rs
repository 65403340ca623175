use super::{FailurePolicy, HarvestOptions};
use crate::error::{ErrorKind, OverrideError, Result};
use crate::models::{Account, HarvestMode, Role, RoleFilter, SkippedAccount, Snapshot};
use crate::sso::{Gateway, SsoApi};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A qualifying role waiting for a worker
#[derive(Debug)]
struct PendingRole {
    account_index: usize,
    account_id: String,
    account_name: String,
    role_name: String,
}

type RoleQueue = Arc<Mutex<UnboundedReceiver<PendingRole>>>;

#[derive(Debug, Default)]
struct WorkerReport {
    resolved: Vec<(usize, Role)>,
    skipped: Vec<(usize, SkippedAccount)>,
}

/// Shared context handed to every producer and worker task
struct Shared<A> {
    gateway: Arc<Gateway<A>>,
    access_token: Arc<str>,
    policy: FailurePolicy,
    stop: CancellationToken,
}

impl<A> Clone for Shared<A> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            access_token: Arc::clone(&self.access_token),
            policy: self.policy,
            stop: self.stop.clone(),
        }
    }
}

impl<A> Shared<A> {
    /// Decide whether `err` only costs the current account, or stops the run
    fn absorb(&self, err: OverrideError) -> Result<String> {
        let skippable = self.policy == FailurePolicy::Skip && err.kind() == ErrorKind::Remote;
        if skippable {
            Ok(err.to_string())
        } else {
            self.stop.cancel();
            Err(err)
        }
    }
}

/// Populate each account's roles
///
/// Producers list and filter roles, one task per account, launched in chunks of
/// `options.chunks` with each chunk joined before the next starts. Every chunk
/// feeds one queue drained by `options.workers` workers. The queue closes once
/// the last producer is joined; workers exit on the closed, empty queue or when
/// `stop` fires. Workers hand back what they resolved and this function is the
/// only writer of the accounts. A fatal error cancels `stop` for everyone.
pub(super) async fn harvest_roles<A: SsoApi + 'static>(
    gateway: Arc<Gateway<A>>,
    access_token: Arc<str>,
    mut accounts: Vec<Account>,
    options: &HarvestOptions,
    stop: CancellationToken,
) -> Result<Snapshot> {
    let shared = Shared {
        gateway,
        access_token,
        policy: options.on_account_error,
        stop,
    };

    let (tx, rx) = mpsc::unbounded_channel::<PendingRole>();
    let queue: RoleQueue = Arc::new(Mutex::new(rx));

    let mut workers = JoinSet::new();
    for worker_id in 0..options.workers {
        debug!("Starting worker {}", worker_id);
        workers.spawn(run_worker(
            worker_id,
            shared.clone(),
            Arc::clone(&queue),
            options.mode,
        ));
    }

    let mut failure: Option<OverrideError> = None;
    let mut skipped: Vec<(usize, SkippedAccount)> = Vec::new();

    let targets: Vec<(usize, String, String)> = accounts
        .iter()
        .enumerate()
        .map(|(index, account)| (index, account.id.clone(), account.name.clone()))
        .collect();

    for (chunk_index, chunk) in targets.chunks(options.chunks).enumerate() {
        if shared.stop.is_cancelled() {
            debug!("Stop requested, not launching remaining producers");
            break;
        }
        debug!(
            "Launching role producers for chunk {} ({} accounts)",
            chunk_index + 1,
            chunk.len()
        );

        let mut producers = JoinSet::new();
        for (index, id, name) in chunk {
            producers.spawn(produce_roles(
                shared.clone(),
                options.role_filter.clone(),
                *index,
                id.clone(),
                name.clone(),
                tx.clone(),
            ));
        }

        while let Some(joined) = producers.join_next().await {
            match flatten(joined, &shared) {
                Ok(Some(skip)) => skipped.push(skip),
                Ok(None) => {}
                Err(err) => record(&mut failure, err),
            }
        }
    }

    // Last sender: dropping it closes the queue for the workers
    drop(tx);

    while let Some(joined) = workers.join_next().await {
        match flatten(joined, &shared) {
            Ok(report) => {
                for (index, role) in report.resolved {
                    accounts[index].roles.push(role);
                }
                skipped.extend(report.skipped);
            }
            Err(err) => record(&mut failure, err),
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }
    if shared.stop.is_cancelled() {
        return Err(OverrideError::Cancelled);
    }

    let snapshot = Snapshot {
        accounts,
        skipped: merge_skipped(skipped),
        region: None,
    };
    info!(
        "Harvested {} roles across {} accounts",
        snapshot.role_count(),
        snapshot.accounts.len()
    );
    Ok(snapshot)
}

/// Keep the root cause: the first failure that is not a knock-on cancellation
fn record(failure: &mut Option<OverrideError>, err: OverrideError) {
    let replace = match failure {
        None => true,
        Some(OverrideError::Cancelled) => !matches!(err, OverrideError::Cancelled),
        Some(_) => false,
    };
    if replace {
        *failure = Some(err);
    }
}

/// One entry per account in account order, reasons joined with `; `
fn merge_skipped(mut skipped: Vec<(usize, SkippedAccount)>) -> Vec<SkippedAccount> {
    skipped.sort_by(|(a, left), (b, right)| a.cmp(b).then_with(|| left.reason.cmp(&right.reason)));

    let mut merged: Vec<(usize, SkippedAccount)> = Vec::new();
    for (index, skip) in skipped {
        match merged.last_mut() {
            Some((last, entry)) if *last == index => {
                entry.reason.push_str("; ");
                entry.reason.push_str(&skip.reason);
            }
            _ => merged.push((index, skip)),
        }
    }
    merged.into_iter().map(|(_, skip)| skip).collect()
}

fn flatten<T, A>(
    joined: std::result::Result<Result<T>, JoinError>,
    shared: &Shared<A>,
) -> Result<T> {
    match joined {
        Ok(result) => result,
        Err(join_err) => {
            shared.stop.cancel();
            Err(OverrideError::TaskFailed(join_err.to_string()))
        }
    }
}

/// List every role page for one account and queue the ones passing the filter
///
/// All pages are collected before anything is queued, so an account skipped
/// part-way through pagination contributes no roles.
async fn produce_roles<A: SsoApi>(
    shared: Shared<A>,
    filter: RoleFilter,
    account_index: usize,
    account_id: String,
    account_name: String,
    queue: UnboundedSender<PendingRole>,
) -> Result<Option<(usize, SkippedAccount)>> {
    let mut role_names = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = match shared
            .gateway
            .list_account_roles(
                &shared.access_token,
                &account_id,
                next_token.take(),
                &shared.stop,
            )
            .await
        {
            Ok(page) => page,
            Err(err) => {
                let reason = shared.absorb(err)?;
                warn!("Skipping roles for account {}: {}", account_id, reason);
                return Ok(Some((
                    account_index,
                    SkippedAccount { account_id, reason },
                )));
            }
        };

        role_names.extend(page.roles);
        next_token = page.next_token.filter(|token| !token.is_empty());
        if next_token.is_none() {
            break;
        }
    }

    let total = role_names.len();
    let mut queued = 0;
    for role_name in role_names.into_iter().filter(|name| filter.matches(name)) {
        let pending = PendingRole {
            account_index,
            account_id: account_id.clone(),
            account_name: account_name.clone(),
            role_name,
        };
        // Receiver lives in the shared queue until every worker has exited
        if queue.send(pending).is_err() {
            return Err(OverrideError::Cancelled);
        }
        queued += 1;
    }

    debug!(
        "Account {} ({}): queued {} of {} roles",
        account_name, account_id, queued, total
    );
    Ok(None)
}

async fn next_pending(queue: &RoleQueue) -> Option<PendingRole> {
    queue.lock().await.recv().await
}

/// Drain the queue, fetching credentials when asked, until it closes or the run stops
async fn run_worker<A: SsoApi>(
    worker_id: usize,
    shared: Shared<A>,
    queue: RoleQueue,
    mode: HarvestMode,
) -> Result<WorkerReport> {
    let mut report = WorkerReport::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.stop.cancelled() => None,
            pending = next_pending(&queue) => pending,
        };
        let Some(pending) = next else {
            break;
        };

        debug!(
            "[worker-{}] pulling {}-{}",
            worker_id, pending.account_name, pending.role_name
        );

        let credentials = match mode {
            HarvestMode::EnumerateOnly => None,
            HarvestMode::FetchCredentials => {
                match shared
                    .gateway
                    .get_role_credentials(
                        &shared.access_token,
                        &pending.account_id,
                        &pending.role_name,
                        &shared.stop,
                    )
                    .await
                {
                    Ok(creds) => Some(creds),
                    Err(err) => {
                        let reason = format!("{}: {}", pending.role_name, shared.absorb(err)?);
                        warn!(
                            "Dropping role {} in account {}: {}",
                            pending.role_name, pending.account_id, reason
                        );
                        report.skipped.push((
                            pending.account_index,
                            SkippedAccount {
                                account_id: pending.account_id,
                                reason,
                            },
                        ));
                        continue;
                    }
                }
            }
        };

        report.resolved.push((
            pending.account_index,
            Role {
                credentials,
                ..Role::new(pending.account_id, pending.role_name)
            },
        ));
    }

    debug!("[worker-{}] done, resolved {} roles", worker_id, report.resolved.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip(account_id: &str, reason: &str) -> SkippedAccount {
        SkippedAccount {
            account_id: account_id.to_string(),
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_merge_skipped_keeps_one_entry_per_account() {
        let merged = merge_skipped(vec![
            (2, skip("300000000003", "ReadOnly: HTTP 500")),
            (0, skip("100000000001", "list failed")),
            (2, skip("300000000003", "Contributor: HTTP 503")),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].account_id, "100000000001");
        assert_eq!(merged[0].reason, "list failed");
        assert_eq!(merged[1].account_id, "300000000003");
        assert_eq!(merged[1].reason, "Contributor: HTTP 503; ReadOnly: HTTP 500");
    }

    #[test]
    fn test_root_cause_survives_knock_on_cancellation() {
        let mut failure = None;
        record(&mut failure, OverrideError::Cancelled);
        record(&mut failure, OverrideError::AuthenticationFailed("expired".to_string()));
        record(&mut failure, OverrideError::Cancelled);
        assert!(matches!(failure, Some(OverrideError::AuthenticationFailed(_))));
    }
}
