//! Countdown deletion for threads under auto-delete parent channels.
//!
//! No prompt and no cancellation: notice, wait, write the `AUTO_DELETE`
//! entry, unlock, settle, delete. Failures are logged and never retried.

use super::{AUTO_DELETE_COUNTDOWN, Moderator, SETTLE_INTERVAL};
use crate::audit::{AuditLogger, LockAction, LockEventRecord};
use crate::error::GatewayError;
use crate::gateway::{Gateway, GuildInfo, OutgoingMessage, ThreadId, ThreadInfo};
use crate::metrics;
use crate::telemetry::{ActionTimer, spans};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};

const AUTO_DELETE_DETAIL: &str = "Auto-deleted from special channel";

impl Moderator {
    /// Start the countdown for an already locked thread.
    pub(super) fn schedule_auto_delete(
        &self,
        thread: ThreadInfo,
        guild: GuildInfo,
        moderator: String,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let audit = Arc::clone(&self.audit);
        let span = spans::auto_delete(thread.id, &guild.name);
        tokio::spawn(run_countdown(gateway, audit, thread, guild, moderator).instrument(span))
    }
}

async fn run_countdown(
    gateway: Arc<dyn Gateway>,
    audit: Arc<AuditLogger>,
    thread: ThreadInfo,
    guild: GuildInfo,
    moderator: String,
) {
    let notice = OutgoingMessage::text(format!(
        "This thread has been locked and will be deleted in {} seconds",
        AUTO_DELETE_COUNTDOWN.as_secs()
    ));
    if let Err(e) = gateway.send_message(thread.id, notice).await {
        warn!(thread = %thread.name, error = %e, "Failed to post auto-delete notice");
    }

    tokio::time::sleep(AUTO_DELETE_COUNTDOWN).await;
    let _timer = ActionTimer::new("auto_delete");

    audit.record(
        LockEventRecord::new(LockAction::AutoDelete, &thread.name, &moderator, &guild.name)
            .with_detail(AUTO_DELETE_DETAIL),
    );

    match unlock_then_delete(gateway.as_ref(), thread.id).await {
        Ok(()) => info!(thread = %thread.name, guild = %guild.name, "Thread auto-deleted"),
        Err(e) => {
            metrics::record_gateway_error("auto_delete", e.kind());
            match e {
                GatewayError::NotFound => {
                    warn!(thread = %thread.name, "Thread was already deleted");
                }
                GatewayError::Forbidden => {
                    error!(thread = %thread.name, "No permission to auto-delete thread");
                }
                GatewayError::Other(reason) => {
                    error!(thread = %thread.name, error = %reason, "Error auto-deleting thread");
                }
            }
        }
    }
}

async fn unlock_then_delete(gateway: &dyn Gateway, thread: ThreadId) -> Result<(), GatewayError> {
    gateway.unlock_thread(thread).await?;
    tokio::time::sleep(SETTLE_INTERVAL).await;
    gateway.delete_thread(thread).await
}

#[cfg(test)]
mod tests {
    use crate::error::GatewayError;
    use crate::gateway::memory::{Call, FailPoint};
    use crate::moderation::testing::*;
    use crate::moderation::{LockOutcome, SETTLE_INTERVAL};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_unlock_settles_before_delete() {
        let f = fixture(thread(AUTO_PARENT));
        let LockOutcome::AutoDeleteScheduled(handle) = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(AUTO_PARENT), "lock"))
            .await
        else {
            panic!("expected auto-delete");
        };

        tokio::time::sleep(Duration::from_secs(5) + SETTLE_INTERVAL / 2).await;
        assert_eq!(f.gateway.calls().last(), Some(&Call::Unlock(THREAD)));
        assert_eq!(f.audit_lines().len(), 2);

        handle.await.unwrap();
        assert_eq!(f.gateway.calls().last(), Some(&Call::Delete(THREAD)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_thread_is_not_an_error() {
        let f = fixture(thread(AUTO_PARENT));
        let LockOutcome::AutoDeleteScheduled(handle) = f
            .moderator
            .handle_message(&lock_message(admin_actor(), thread(AUTO_PARENT), "lock"))
            .await
        else {
            panic!("expected auto-delete");
        };

        f.gateway.remove_thread(THREAD);
        handle.await.unwrap();

        // Unlock hit NotFound, so delete was never attempted.
        assert_eq!(f.gateway.count(|c| matches!(c, Call::Delete(_))), 0);
        assert!(f.audit_lines()[1].contains("[AUTO_DELETE]"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_delete_is_not_retried() {
        let f = fixture(thread(AUTO_PARENT));
        f.gateway.fail_on(FailPoint::Delete, GatewayError::Forbidden);
        let LockOutcome::AutoDeleteScheduled(handle) = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(AUTO_PARENT), "lock"))
            .await
        else {
            panic!("expected auto-delete");
        };

        handle.await.unwrap();
        assert_eq!(f.gateway.count(|c| matches!(c, Call::Delete(_))), 1);
        assert!(f.gateway.thread(THREAD).is_some());
    }
}
