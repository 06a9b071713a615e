//! Reconciliation helpers
//!
//! Every "bring a resource into a target state" operation goes through
//! [`ensure`] or [`poll_until`]: describe, create when absent, then
//! re-describe on a fixed interval until a predicate holds or the
//! [`WaitPolicy`] is exhausted. Nothing here re-issues a mutating call.

use crate::error::{DeployError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Bounds for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    /// Sleep between two attempts
    pub interval: Duration,
    /// Optional wall-clock bound on the whole wait
    pub deadline: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
            deadline: None,
        }
    }
}

impl WaitPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Outcome of [`ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured<T> {
    pub value: T,
    /// Whether a create call was issued
    pub created: bool,
}

/// Call `probe` until it yields a value
///
/// The probe runs at most `max_attempts` times with `interval` between two
/// attempts. A probe error ends the wait immediately. Exhausting the attempts
/// or the deadline is a [`DeployError::ResourceTimeout`] naming `resource`.
pub async fn poll_until<T, F, Fut>(policy: &WaitPolicy, resource: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let attempts = AtomicU32::new(0);

    let polling = async {
        while attempts.load(Ordering::Relaxed) < policy.max_attempts {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(resource, attempt, max_attempts = policy.max_attempts, "Polling");

            if let Some(value) = probe().await? {
                return Ok(value);
            }

            if attempt < policy.max_attempts {
                sleep(policy.interval).await;
            }
        }
        Err(timeout(resource, attempts.load(Ordering::Relaxed)))
    };

    match policy.deadline {
        Some(deadline) => match tokio::time::timeout(deadline, polling).await {
            Ok(result) => result,
            Err(_) => Err(timeout(resource, attempts.load(Ordering::Relaxed))),
        },
        None => polling.await,
    }
}

/// Describe, create if absent, then poll until `ready`
///
/// A resource that already satisfies `ready` is returned without any create
/// call. A resource that exists but is not ready yet is waited for, not
/// re-created.
pub async fn ensure<T, D, DFut, C, CFut, R>(
    policy: &WaitPolicy,
    resource: &str,
    mut describe: D,
    create: C,
    ready: R,
) -> Result<Ensured<T>>
where
    D: FnMut() -> DFut,
    DFut: Future<Output = Result<Option<T>>>,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<()>>,
    R: Fn(&T) -> bool,
{
    let created = match describe().await? {
        Some(current) if ready(&current) => {
            debug!(resource, "Already in target state");
            return Ok(Ensured {
                value: current,
                created: false,
            });
        }
        Some(_) => {
            debug!(resource, "Exists, waiting for target state");
            false
        }
        None => {
            info!(resource, "Creating");
            create().await?;
            true
        }
    };

    let ready = &ready;
    let value = poll_until(policy, resource, move || {
        let pending = describe();
        async move { Ok(pending.await?.filter(|v| ready(v))) }
    })
    .await?;

    Ok(Ensured { value, created })
}

fn timeout(resource: &str, attempts: u32) -> DeployError {
    DeployError::ResourceTimeout {
        resource: resource.to_string(),
        attempts,
    }
}
