//! Delete/Keep confirmation sessions.
//!
//! A session is opened after a regular lock and lives until exactly one of
//! Delete, Keep or the idle timeout resolves it. The state mutex makes that
//! transition a single compare-and-set; the cancellation token stops the
//! timeout task once a button has won.

use super::{CONFIRMATION_TIMEOUT, Moderator, SETTLE_INTERVAL};
use crate::audit::{LockAction, LockEventRecord};
use crate::error::{GatewayError, ModerationError};
use crate::gateway::{
    ActorSnapshot, ButtonKind, ButtonPressed, Gateway, GuildInfo, InteractionRef, MessageHandle,
    OutgoingMessage, ThreadId, ThreadInfo, ThreadOp, UserId,
};
use crate::metrics;
use crate::telemetry::{ActionTimer, spans};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// How an owner resolved a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Deleted,
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Resolved(Resolution),
    TimedOut,
}

/// One pending Delete/Keep prompt.
pub struct ConfirmationSession {
    pub thread: ThreadInfo,
    pub guild: GuildInfo,
    pub owner_id: UserId,
    pub owner_name: String,
    pub prompt: MessageHandle,
    pub deadline: Instant,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl ConfirmationSession {
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Leave `Active`. Only the first caller gets `true`.
    fn finish(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Active {
            return false;
        }
        *state = next;
        true
    }
}

/// Active sessions keyed by thread.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<ThreadId, Arc<ConfirmationSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, thread: ThreadId) -> Option<Arc<ConfirmationSession>> {
        self.sessions.get(&thread).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Register `session`, closing and returning any session it replaces.
    fn insert(&self, session: Arc<ConfirmationSession>) -> Option<Arc<ConfirmationSession>> {
        metrics::session_opened();
        let previous = self.sessions.insert(session.thread.id, session)?;
        previous.cancel.cancel();
        previous.finish(SessionState::TimedOut);
        metrics::session_closed();
        warn!(thread = previous.thread.id, "Replaced a confirmation session still pending");
        Some(previous)
    }

    /// Drop `session` if it is still the registered one for its thread.
    fn remove(&self, session: &Arc<ConfirmationSession>) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.thread.id, |_, current| Arc::ptr_eq(current, session))
            .is_some();
        if removed {
            metrics::session_closed();
        }
        removed
    }
}

/// What a button press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonOutcome {
    /// No active session for that thread, or it already closed.
    NoSession,
    /// The presser may not resolve this prompt.
    Denied,
    /// Another press or the timeout got there first.
    AlreadyResolved,
    Kept,
    Deleted,
    DeleteFailed(ModerationError),
}

fn delete_error(err: GatewayError) -> ModerationError {
    ModerationError::from_gateway(ThreadOp::Delete, err)
}

impl Moderator {
    /// Post the prompt on a freshly locked thread and start its timeout.
    pub(super) async fn open_confirmation(
        &self,
        thread: ThreadInfo,
        guild: GuildInfo,
        owner: &ActorSnapshot,
    ) -> Result<(), GatewayError> {
        let message = OutgoingMessage::text("This thread has been locked").with_prompt(thread.id);
        let prompt = self.gateway.send_message(thread.id, message).await?;

        let session = Arc::new(ConfirmationSession {
            thread,
            guild,
            owner_id: owner.id,
            owner_name: owner.name.clone(),
            prompt,
            deadline: Instant::now() + CONFIRMATION_TIMEOUT,
            state: Mutex::new(SessionState::Active),
            cancel: CancellationToken::new(),
        });
        let previous = self.sessions.insert(Arc::clone(&session));
        self.spawn_timeout(session);
        if let Some(previous) = previous {
            self.disable_session_prompt(&previous).await;
        }
        Ok(())
    }

    fn spawn_timeout(&self, session: Arc<ConfirmationSession>) {
        let gateway = Arc::clone(&self.gateway);
        let sessions = Arc::clone(&self.sessions);
        let span = spans::confirmation(session.thread.id, session.owner_id);

        tokio::spawn(
            async move {
                tokio::select! {
                    _ = session.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(session.deadline) => {
                        expire(gateway.as_ref(), &sessions, &session).await;
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Resolve the prompt for `event.thread_id` with the pressed button.
    ///
    /// Presses on a prompt other than the session's current one are stale.
    pub async fn handle_button(&self, event: &ButtonPressed) -> ButtonOutcome {
        let session = self
            .sessions
            .get(event.thread_id)
            .filter(|s| s.prompt.message_id == event.prompt_message_id);
        let Some(session) = session else {
            self.ephemeral(&event.interaction, "❌ This prompt is no longer active.")
                .await;
            return ButtonOutcome::NoSession;
        };

        let span = spans::confirmation(session.thread.id, session.owner_id);
        self.resolve_session(event, session).instrument(span).await
    }

    async fn resolve_session(
        &self,
        event: &ButtonPressed,
        session: Arc<ConfirmationSession>,
    ) -> ButtonOutcome {
        if !self.resolver.can_delete(&event.actor, session.owner_id) {
            metrics::record_denial("confirmation");
            self.ephemeral(
                &event.interaction,
                "❌ Only the moderator who locked this thread can use these buttons.",
            )
            .await;
            return ButtonOutcome::Denied;
        }

        let resolution = match event.button {
            ButtonKind::Delete => Resolution::Deleted,
            ButtonKind::Keep => Resolution::Kept,
        };
        if !session.finish(SessionState::Resolved(resolution)) {
            self.ephemeral(&event.interaction, "❌ This prompt has already been resolved.")
                .await;
            return ButtonOutcome::AlreadyResolved;
        }
        session.cancel.cancel();
        self.sessions.remove(&session);

        match resolution {
            Resolution::Kept => {
                self.ephemeral(
                    &event.interaction,
                    &format!("📌 Thread '{}' will be kept locked.", session.thread.name),
                )
                .await;
                self.disable_session_prompt(&session).await;
                info!(thread = %session.thread.name, moderator = %event.actor.name, "Thread kept locked");
                ButtonOutcome::Kept
            }
            Resolution::Deleted => {
                self.ephemeral(
                    &event.interaction,
                    &format!("🗑️ Deleting thread '{}'...", session.thread.name),
                )
                .await;
                self.disable_session_prompt(&session).await;

                match self.delete_confirmed(&session, &event.actor).await {
                    Ok(()) => ButtonOutcome::Deleted,
                    Err(err) => {
                        metrics::record_gateway_error("delete", err.error_code());
                        match &err {
                            ModerationError::GatewayNotFound(_) => {
                                warn!(thread = %session.thread.name, "Thread already gone");
                            }
                            ModerationError::GatewayForbidden(_) => {
                                warn!(thread = %session.thread.name, "No permission to delete thread");
                            }
                            _ => {
                                error!(thread = %session.thread.name, error = %err, "Error deleting thread");
                            }
                        }
                        self.ephemeral(&event.interaction, &err.user_notice()).await;
                        ButtonOutcome::DeleteFailed(err)
                    }
                }
            }
        }
    }

    /// Unlock if needed, write the `DELETE` entry, then delete.
    async fn delete_confirmed(
        &self,
        session: &ConfirmationSession,
        actor: &ActorSnapshot,
    ) -> Result<(), ModerationError> {
        let _timer = ActionTimer::new("delete");

        let current = self
            .gateway
            .fetch_thread(session.thread.id)
            .await
            .map_err(delete_error)?;
        if current.locked {
            self.gateway
                .unlock_thread(current.id)
                .await
                .map_err(delete_error)?;
            tokio::time::sleep(SETTLE_INTERVAL).await;
        }

        self.audit.record(LockEventRecord::new(
            LockAction::Delete,
            &current.name,
            &actor.name,
            &session.guild.name,
        ));
        self.gateway
            .delete_thread(current.id)
            .await
            .map_err(delete_error)?;

        info!(thread = %current.name, moderator = %actor.name, "Thread deleted");
        Ok(())
    }

    async fn disable_session_prompt(&self, session: &ConfirmationSession) {
        if let Err(e) = self.gateway.disable_prompt(&session.prompt).await {
            debug!(thread = session.thread.id, error = %e, "Could not disable prompt");
        }
    }

    async fn ephemeral(&self, interaction: &InteractionRef, text: &str) {
        if let Err(e) = self.gateway.send_ephemeral(interaction, text).await {
            warn!(interaction = interaction.id, error = %e, "Failed to send private reply");
        }
    }
}

/// Timeout path. Loses silently to a button press that already finished it.
async fn expire(gateway: &dyn Gateway, sessions: &SessionRegistry, session: &Arc<ConfirmationSession>) {
    if !session.finish(SessionState::TimedOut) {
        return;
    }
    sessions.remove(session);
    // The prompt may be gone along with its thread.
    if let Err(e) = gateway.disable_prompt(&session.prompt).await {
        debug!(thread = session.thread.id, error = %e, "Could not disable timed out prompt");
    }
    debug!(thread = session.thread.id, owner = %session.owner_name, "Confirmation prompt timed out");
}
