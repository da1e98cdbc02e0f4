mod modes;
pub mod schema;

pub use modes::{EnforcementMode, HitlMode};
pub use schema::{
    ApprovalConfig, ClientConfig, DEFAULT_CONFIDENCE_MIN, HeartbeatConfig, default_config_path,
    normalize_confidence_min,
};
