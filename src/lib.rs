#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

//! Client-side governance for autonomous agent actions.
//!
//! [`DashClaw`] routes each action through recommendation adaptation, a
//! policy guard, optional RSA signing and human approval before it reaches
//! the DashClaw service.

pub mod action;
pub mod approval;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod heartbeat;
mod observer;
pub mod recommend;
pub mod signing;
pub mod transport;

pub use action::{ActionDefinition, ActionOutcome, ActionResponse, ActionStatus};
pub use client::{DashClaw, TokenUsage, TokenUsageReporter, TrackedAction};
pub use config::{ClientConfig, EnforcementMode, HitlMode};
pub use error::{ClawError, ConfigError, Result, SigningError, TransportError};
pub use guard::{Decision, GuardDecision};
pub use observer::Observer;
pub use signing::PayloadSigner;
