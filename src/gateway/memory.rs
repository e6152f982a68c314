//! In-memory recording gateway for tests.
//!
//! Keeps a table of threads, records every call in order, and can be told to
//! fail a given operation with a chosen [`GatewayError`].

use super::{
    ChannelId, Gateway, GatewayError, InteractionRef, MessageHandle, OutgoingMessage, ThreadId,
    ThreadInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Fetch,
    Lock,
    Unlock,
    Delete,
    Send,
    DisablePrompt,
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(ThreadId),
    Lock(ThreadId),
    Unlock(ThreadId),
    Delete(ThreadId),
    Send(ChannelId, OutgoingMessage),
    DisablePrompt(MessageHandle),
    Ephemeral(u64, String),
}

#[derive(Default)]
pub struct MemoryGateway {
    threads: Mutex<HashMap<ThreadId, ThreadInfo>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<FailPoint, GatewayError>>,
    next_message_id: AtomicU64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(self, thread: ThreadInfo) -> Self {
        self.threads.lock().insert(thread.id, thread);
        self
    }

    /// Make every subsequent call of `point` fail with `err`.
    pub fn fail_on(&self, point: FailPoint, err: GatewayError) {
        self.failures.lock().insert(point, err);
    }

    pub fn thread(&self, id: ThreadId) -> Option<ThreadInfo> {
        self.threads.lock().get(&id).cloned()
    }

    /// Simulate a moderator deleting the thread by hand.
    pub fn remove_thread(&self, id: ThreadId) {
        self.threads.lock().remove(&id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Send(_, msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent_messages()
            .into_iter()
            .filter_map(|msg| msg.content)
            .collect()
    }

    pub fn ephemerals(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Ephemeral(_, text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Count calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn check(&self, point: FailPoint) -> Result<(), GatewayError> {
        match self.failures.lock().get(&point) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn set_locked(&self, id: ThreadId, locked: bool) -> Result<(), GatewayError> {
        let mut threads = self.threads.lock();
        let thread = threads.get_mut(&id).ok_or(GatewayError::NotFound)?;
        thread.locked = locked;
        Ok(())
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn fetch_thread(&self, thread: ThreadId) -> Result<ThreadInfo, GatewayError> {
        self.record(Call::Fetch(thread));
        self.check(FailPoint::Fetch)?;
        self.thread(thread).ok_or(GatewayError::NotFound)
    }

    async fn lock_thread(&self, thread: ThreadId) -> Result<(), GatewayError> {
        self.record(Call::Lock(thread));
        self.check(FailPoint::Lock)?;
        self.set_locked(thread, true)
    }

    async fn unlock_thread(&self, thread: ThreadId) -> Result<(), GatewayError> {
        self.record(Call::Unlock(thread));
        self.check(FailPoint::Unlock)?;
        self.set_locked(thread, false)
    }

    async fn delete_thread(&self, thread: ThreadId) -> Result<(), GatewayError> {
        self.record(Call::Delete(thread));
        self.check(FailPoint::Delete)?;
        let mut threads = self.threads.lock();
        match threads.get(&thread) {
            None => Err(GatewayError::NotFound),
            Some(t) if t.locked => Err(GatewayError::Forbidden),
            Some(_) => {
                threads.remove(&thread);
                Ok(())
            }
        }
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageHandle, GatewayError> {
        self.record(Call::Send(channel, message));
        self.check(FailPoint::Send)?;
        Ok(MessageHandle {
            channel_id: channel,
            message_id: self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }

    async fn disable_prompt(&self, prompt: &MessageHandle) -> Result<(), GatewayError> {
        self.record(Call::DisablePrompt(*prompt));
        self.check(FailPoint::DisablePrompt)
    }

    async fn send_ephemeral(
        &self,
        interaction: &InteractionRef,
        text: &str,
    ) -> Result<(), GatewayError> {
        self.record(Call::Ephemeral(interaction.id, text.to_string()));
        Ok(())
    }
}
