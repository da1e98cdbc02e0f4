use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// How strictly a pre-flight check is applied: shared by `guard_mode` and
/// `auto_recommend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    #[default]
    Off,
    Warn,
    Enforce,
}

impl EnforcementMode {
    const EXPECTED: &'static str = "off, warn, enforce";

    pub fn parse(field: &'static str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "enforce" => Ok(Self::Enforce),
            _ => Err(ConfigError::InvalidMode {
                field,
                expected: Self::EXPECTED,
                value: value.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Enforce => "enforce",
        }
    }

    pub fn is_off(self) -> bool {
        self == Self::Off
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// File values go through the same parser as environment overrides.
impl<'de> Deserialize<'de> for EnforcementMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse("mode", &raw).map_err(serde::de::Error::custom)
    }
}

/// Human-in-the-loop handling for actions the server parks in
/// `pending_approval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HitlMode {
    /// Return the pending response immediately.
    #[default]
    Off,
    /// Block the submitting caller until an operator resolves the action.
    Wait,
}

impl HitlMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "wait" => Ok(Self::Wait),
            _ => Err(ConfigError::InvalidMode {
                field: "hitl_mode",
                expected: "off, wait",
                value: value.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for HitlMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
