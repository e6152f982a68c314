//! Unified error handling for threadlock.
//!
//! This module provides the error hierarchy for the moderation core, with
//! gateway error classification, user-visible notices, and metric labeling.

use crate::gateway::ThreadOp;
use thiserror::Error;

// ============================================================================
// Gateway Errors (platform calls)
// ============================================================================

/// Failure of a single chat-platform call.
///
/// The adapter classifies every platform failure into one of these three
/// buckets; the moderation core only ever branches on the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The bot lacks the platform permission for the requested mutation.
    #[error("missing platform permission")]
    Forbidden,

    /// The target thread or message no longer exists.
    #[error("target not found")]
    NotFound,

    #[error("gateway error: {0}")]
    Other(String),
}

impl GatewayError {
    /// Get a static label for metrics.
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Other(_) => "other",
        }
    }
}

// ============================================================================
// Moderation Errors (workflow outcomes)
// ============================================================================

/// Errors that terminate a moderation workflow step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    /// Actor lacks the required capability or role.
    #[error("permission denied")]
    Denied,

    /// Lock-when-locked or unlock-when-unlocked.
    #[error("thread is already {0}")]
    AlreadyInState(&'static str),

    /// Bot lacks the platform permission for the step.
    #[error("forbidden to {} thread", .0.verb())]
    GatewayForbidden(ThreadOp),

    /// Target vanished, usually a race with a manual deletion.
    #[error("thread vanished during {}", .0.verb())]
    GatewayNotFound(ThreadOp),

    #[error("unexpected failure while {} thread: {reason}", .op.gerund())]
    Unexpected { op: ThreadOp, reason: String },
}

impl ModerationError {
    /// Classify a gateway failure that happened during `op`.
    pub fn from_gateway(op: ThreadOp, err: GatewayError) -> Self {
        match err {
            GatewayError::Forbidden => Self::GatewayForbidden(op),
            GatewayError::NotFound => Self::GatewayNotFound(op),
            GatewayError::Other(reason) => Self::Unexpected { op, reason },
        }
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Denied => "denied",
            Self::AlreadyInState(_) => "already_in_state",
            Self::GatewayForbidden(_) => "gateway_forbidden",
            Self::GatewayNotFound(_) => "gateway_not_found",
            Self::Unexpected { .. } => "unexpected",
        }
    }

    /// Whether the workflow should be considered successful anyway.
    ///
    /// A thread that vanished underneath us has reached the state the
    /// moderator wanted.
    #[inline]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::GatewayNotFound(_))
    }

    /// Text shown to the requesting user.
    pub fn user_notice(&self) -> String {
        match self {
            Self::Denied => "❌ You don't have permission to lock threads.".to_string(),
            Self::AlreadyInState("locked") => "🔒 This thread is already locked.".to_string(),
            Self::AlreadyInState(_) => "🔓 This thread is not locked.".to_string(),
            Self::GatewayForbidden(op) => {
                format!("❌ I don't have permission to {} this thread.", op.verb())
            }
            Self::GatewayNotFound(_) => "❌ Thread not found.".to_string(),
            Self::Unexpected { op, .. } => {
                format!("❌ An error occurred while {} the thread.", op.gerund())
            }
        }
    }
}
