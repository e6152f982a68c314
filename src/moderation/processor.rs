//! Lock request processing.
//!
//! Validates a trigger message, locks the thread, writes the `LOCK` entry and
//! hands off to either the auto-delete countdown or a confirmation prompt.

use super::Moderator;
use crate::audit::{LockAction, LockEventRecord};
use crate::error::{GatewayError, ModerationError};
use crate::gateway::{MessageCreated, ThreadInfo, ThreadOp};
use crate::metrics;
use crate::telemetry::{ActionTimer, spans};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};

/// How a lock request ended.
#[derive(Debug)]
pub enum LockOutcome {
    /// Not a trigger, not in a thread, or posted by a bot.
    Ignored,
    /// The author may not lock threads here.
    Denied,
    /// The thread was already locked; nothing was done.
    AlreadyLocked,
    /// The lock step failed; the thread is as the gateway last reported it.
    Failed(ModerationError),
    /// Locked; the handle belongs to the spawned auto-delete countdown.
    AutoDeleteScheduled(JoinHandle<()>),
    /// Locked; a Delete/Keep prompt is waiting for the moderator.
    ConfirmationOpened,
    /// Locked, but the prompt could not be posted. The thread stays locked.
    PromptFailed(GatewayError),
}

impl Moderator {
    /// Entry point for every message posted in a guild.
    pub async fn handle_message(&self, event: &MessageCreated) -> LockOutcome {
        if event.author.bot || !self.is_trigger(&event.content) {
            return LockOutcome::Ignored;
        }
        let Some(thread) = &event.thread else {
            return LockOutcome::Ignored;
        };

        let span = spans::lock_workflow(thread.id, &event.author.name);
        self.handle_lock_request(event, thread).instrument(span).await
    }

    /// Run the lock step for `thread` on behalf of the event's author.
    pub async fn handle_lock_request(
        &self,
        event: &MessageCreated,
        thread: &ThreadInfo,
    ) -> LockOutcome {
        let _timer = ActionTimer::new("lock");
        let author = &event.author;

        if !self.resolver.can_lock(author, event.guild.id) {
            metrics::record_denial("lock");
            self.notify_transient(event.channel_id, ModerationError::Denied.user_notice())
                .await;
            return LockOutcome::Denied;
        }

        if thread.locked {
            metrics::record_denial("already_locked");
            self.notify_transient(
                event.channel_id,
                ModerationError::AlreadyInState("locked").user_notice(),
            )
            .await;
            return LockOutcome::AlreadyLocked;
        }

        if let Err(e) = self.gateway.lock_thread(thread.id).await {
            let err = ModerationError::from_gateway(ThreadOp::Lock, e);
            return self.lock_failed(event, thread, err).await;
        }

        self.audit.record(LockEventRecord::new(
            LockAction::Lock,
            &thread.name,
            &author.name,
            &event.guild.name,
        ));

        let mut locked = thread.clone();
        locked.locked = true;

        let auto_delete = thread
            .parent_id
            .is_some_and(|parent| self.guild_config.is_auto_delete_channel(parent));

        let outcome = if auto_delete {
            LockOutcome::AutoDeleteScheduled(self.schedule_auto_delete(
                locked,
                event.guild.clone(),
                author.name.clone(),
            ))
        } else {
            match self
                .open_confirmation(locked, event.guild.clone(), author)
                .await
            {
                Ok(()) => LockOutcome::ConfirmationOpened,
                Err(e) => {
                    error!(thread = %thread.name, error = %e, "Failed to post confirmation prompt");
                    if !matches!(e, GatewayError::Forbidden) {
                        let err = ModerationError::from_gateway(ThreadOp::Lock, e.clone());
                        self.notify_transient(event.channel_id, err.user_notice()).await;
                    }
                    LockOutcome::PromptFailed(e)
                }
            }
        };

        info!(
            thread = %thread.name,
            moderator = %author.name,
            guild = %event.guild.name,
            auto_delete,
            "Thread locked"
        );
        outcome
    }

    async fn lock_failed(
        &self,
        event: &MessageCreated,
        thread: &ThreadInfo,
        err: ModerationError,
    ) -> LockOutcome {
        metrics::record_gateway_error("lock", err.error_code());
        match &err {
            ModerationError::GatewayNotFound(_) => {
                warn!(thread = %thread.name, "Thread vanished before it could be locked");
            }
            ModerationError::GatewayForbidden(_) => {
                warn!(thread = %thread.name, guild = %event.guild.name, "No permission to lock thread");
                self.notify_transient(event.channel_id, err.user_notice()).await;
            }
            _ => {
                error!(thread = %thread.name, error = %err, "Error locking thread");
                self.notify_transient(event.channel_id, err.user_notice()).await;
            }
        }
        LockOutcome::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{Call, FailPoint};
    use crate::moderation::NOTICE_LIFETIME;
    use crate::moderation::testing::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_authorized_lock_opens_confirmation() {
        let f = fixture(thread(PARENT));
        let outcome = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(PARENT), "lock"))
            .await;

        assert!(matches!(outcome, LockOutcome::ConfirmationOpened));
        assert!(f.gateway.thread(THREAD).unwrap().locked);

        let lines = f.audit_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[LOCK] Thread 'help wanted' by alice in Test Guild"));

        let prompt = f.gateway.sent_messages().pop().unwrap();
        assert_eq!(prompt.content.as_deref(), Some("This thread has been locked"));
        assert_eq!(prompt.prompt_for, Some(THREAD));

        let session = f.moderator.sessions().get(THREAD).unwrap();
        assert_eq!(session.owner_id, 1);
    }

    #[tokio::test]
    async fn test_trigger_matching() {
        let f = fixture(thread(PARENT));
        assert!(f.moderator.is_trigger("  LNA "));
        assert!(f.moderator.is_trigger("Lock"));
        assert!(!f.moderator.is_trigger("lock this please"));

        let outcome = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(PARENT), "unlock"))
            .await;
        assert!(matches!(outcome, LockOutcome::Ignored));

        let mut bot = moderator_actor();
        bot.bot = true;
        let outcome = f
            .moderator
            .handle_message(&lock_message(bot, thread(PARENT), "lock"))
            .await;
        assert!(matches!(outcome, LockOutcome::Ignored));

        let mut outside = lock_message(moderator_actor(), thread(PARENT), "lock");
        outside.thread = None;
        assert!(matches!(
            f.moderator.handle_message(&outside).await,
            LockOutcome::Ignored
        ));
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_lock_is_denied() {
        let f = fixture(thread(PARENT));
        let outcome = f
            .moderator
            .handle_message(&lock_message(member_actor(), thread(PARENT), "lock"))
            .await;

        assert!(matches!(outcome, LockOutcome::Denied));
        assert!(!f.gateway.thread(THREAD).unwrap().locked);
        assert!(f.audit_lines().is_empty());
        assert_eq!(f.gateway.count(|c| matches!(c, Call::Lock(_))), 0);

        let notice = f.gateway.sent_messages().pop().unwrap();
        assert_eq!(
            notice.content.as_deref(),
            Some("❌ You don't have permission to lock threads.")
        );
        assert_eq!(notice.delete_after, Some(NOTICE_LIFETIME));
    }

    #[tokio::test]
    async fn test_lock_on_locked_thread_is_noop() {
        let mut locked = thread(PARENT);
        locked.locked = true;
        let f = fixture(locked.clone());

        for _ in 0..2 {
            let outcome = f
                .moderator
                .handle_message(&lock_message(moderator_actor(), locked.clone(), "lock"))
                .await;
            assert!(matches!(outcome, LockOutcome::AlreadyLocked));
        }

        assert!(f.audit_lines().is_empty());
        assert_eq!(f.gateway.count(|c| matches!(c, Call::Lock(_))), 0);
        assert!(f.moderator.sessions().is_empty());
        assert_eq!(
            f.gateway.sent_texts(),
            vec!["🔒 This thread is already locked."; 2]
        );
    }

    #[tokio::test]
    async fn test_forbidden_lock_leaves_thread_unlocked() {
        let f = fixture(thread(PARENT));
        f.gateway.fail_on(FailPoint::Lock, GatewayError::Forbidden);

        let outcome = f
            .moderator
            .handle_message(&lock_message(admin_actor(), thread(PARENT), "lock"))
            .await;

        assert!(matches!(
            outcome,
            LockOutcome::Failed(ModerationError::GatewayForbidden(ThreadOp::Lock))
        ));
        assert!(!f.gateway.thread(THREAD).unwrap().locked);
        assert!(f.audit_lines().is_empty());
        assert!(f.moderator.sessions().is_empty());
        assert_eq!(
            f.gateway.sent_texts(),
            vec!["❌ I don't have permission to lock this thread."]
        );
    }

    #[tokio::test]
    async fn test_unexpected_lock_failure_reports_generically() {
        let f = fixture(thread(PARENT));
        f.gateway
            .fail_on(FailPoint::Lock, GatewayError::Other("timeout".into()));

        let outcome = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(PARENT), "lock"))
            .await;

        assert!(matches!(
            outcome,
            LockOutcome::Failed(ModerationError::Unexpected { .. })
        ));
        assert_eq!(
            f.gateway.sent_texts(),
            vec!["❌ An error occurred while locking the thread."]
        );
    }

    #[tokio::test]
    async fn test_prompt_failure_keeps_lock_entry() {
        let f = fixture(thread(PARENT));
        f.gateway.fail_on(FailPoint::Send, GatewayError::Forbidden);

        let outcome = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(PARENT), "lock"))
            .await;

        assert!(matches!(outcome, LockOutcome::PromptFailed(GatewayError::Forbidden)));
        assert!(f.gateway.thread(THREAD).unwrap().locked);
        assert_eq!(f.audit_lines().len(), 1);
        assert!(f.moderator.sessions().is_empty());
        // No send permission in the thread, so nothing more is attempted.
        assert_eq!(f.gateway.sent_texts(), vec!["This thread has been locked"]);
    }

    #[tokio::test]
    async fn test_unexpected_prompt_failure_reports_generically() {
        let f = fixture(thread(PARENT));
        f.gateway
            .fail_on(FailPoint::Send, GatewayError::Other("503".into()));

        let outcome = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(PARENT), "lock"))
            .await;

        assert!(matches!(outcome, LockOutcome::PromptFailed(GatewayError::Other(_))));
        assert!(f.gateway.thread(THREAD).unwrap().locked);
        assert_eq!(f.audit_lines().len(), 1);

        let notice = f.gateway.sent_messages().pop().unwrap();
        assert_eq!(
            notice.content.as_deref(),
            Some("❌ An error occurred while locking the thread.")
        );
        assert_eq!(notice.delete_after, Some(NOTICE_LIFETIME));
        assert_eq!(f.gateway.sent_messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_delete_channel_bypasses_prompt() {
        let f = fixture(thread(AUTO_PARENT));
        let outcome = f
            .moderator
            .handle_message(&lock_message(moderator_actor(), thread(AUTO_PARENT), "lna"))
            .await;

        let LockOutcome::AutoDeleteScheduled(handle) = outcome else {
            panic!("expected auto-delete, got {outcome:?}");
        };
        assert!(f.moderator.sessions().is_empty());

        // Countdown still running: thread locked, only the LOCK entry.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(f.gateway.thread(THREAD).unwrap().locked);
        assert_eq!(f.audit_lines().len(), 1);

        handle.await.unwrap();

        assert!(f.gateway.thread(THREAD).is_none());
        let lines = f.audit_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[LOCK]"));
        assert!(lines[1].ends_with(
            "[AUTO_DELETE] Thread 'help wanted' by alice in Test Guild - Auto-deleted from special channel"
        ));
        assert_eq!(
            f.gateway.sent_texts(),
            vec!["This thread has been locked and will be deleted in 5 seconds"]
        );
        assert!(f.gateway.sent_messages().iter().all(|m| m.prompt_for.is_none()));
    }
}
