use crate::guard::GuardDecision;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `DashClaw`.
///
/// Only the final submission, an enforce-mode guard block and approval
/// resolution reach callers through this type. Guard, recommendation and
/// telemetry failures along the way are logged and absorbed where they occur.
#[derive(Debug, Error)]
pub enum ClawError {
    // ── Transport ───────────────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Guard ───────────────────────────────────────────────────────────
    #[error("guard blocked action: {}. Reasons: {}", .0.decision, .0.reason_summary())]
    GuardBlocked(Box<GuardDecision>),

    // ── Approval ────────────────────────────────────────────────────────
    #[error("approval denied for action {action_id}: {reason}")]
    ApprovalDenied { action_id: String, reason: String },

    #[error("timed out after {}s waiting for approval of action {action_id}", .waited.as_secs())]
    Timeout { action_id: String, waited: Duration },

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl ClawError {
    /// HTTP-like status associated with the failure, when one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status(),
            Self::GuardBlocked(_) | Self::ApprovalDenied { .. } => Some(403),
            Self::Timeout { .. } | Self::Config(_) => None,
        }
    }

    /// The guard decision carried by a [`ClawError::GuardBlocked`] failure.
    pub fn guard_decision(&self) -> Option<&GuardDecision> {
        match self {
            Self::GuardBlocked(decision) => Some(decision),
            _ => None,
        }
    }
}

// ─── Transport errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed with status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("request failed: {0}")]
    Network(String),

    #[error("response decode failed: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Status { details, .. } => details.as_ref(),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be one of: {expected}; got {value:?}")]
    InvalidMode {
        field: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("decision must be either 'allow' or 'deny'; got {0:?}")]
    InvalidDecision(String),

    #[error("invalid base_url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to load config: {0}")]
    Load(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Signing errors ──────────────────────────────────────────────────────────

/// Never surfaced by submission: a signer that fails yields an unsigned payload.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("signing key is not valid PEM: {0}")]
    Pem(String),

    #[error("signing key is not a usable RSA private key: {0}")]
    KeyRejected(String),

    #[error("unsupported signing key format (expected PKCS#8 or PKCS#1 RSA)")]
    UnsupportedKey,

    #[error("payload could not be canonicalized: {0}")]
    Canonicalize(#[from] serde_json::Error),

    #[error("RSA signing failed")]
    Sign,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ClawError>;
