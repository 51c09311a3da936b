//! Construction-time configuration for a [`crate::Pot`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How savages are admitted to the pot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Whoever wakes first after a refill gets the next serving.
    #[default]
    Unordered,
    /// Strict round robin over savage ids, tracked by a turn ticket.
    TurnOrdered,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unordered => "unordered",
            Self::TurnOrdered => "turn-ordered",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unordered" => Ok(Self::Unordered),
            "turn-ordered" | "turn_ordered" | "round-robin" => Ok(Self::TurnOrdered),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Pot configuration.
///
/// Defaults mirror the classic dinner: a pot of 5 servings and 8 savages
/// sharing it without any ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotConfig {
    /// Servings the pot holds when full.
    pub capacity: usize,
    /// Number of savages seated at the pot.
    pub consumers: usize,
    pub policy: Policy,
    /// Total servings after which a turn-ordered pot closes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_limit: Option<u64>,
}

impl Default for PotConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            consumers: 8,
            policy: Policy::Unordered,
            service_limit: None,
        }
    }
}

impl PotConfig {
    pub fn new(capacity: usize, consumers: usize) -> Self {
        Self {
            capacity,
            consumers,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_service_limit(mut self, limit: u64) -> Self {
        self.service_limit = Some(limit);
        self
    }

    /// Reject configurations that could never run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        match (self.service_limit, self.policy) {
            (Some(0), _) => Err(ConfigError::ZeroServiceLimit),
            (Some(_), Policy::Unordered) => Err(ConfigError::LimitWithoutTurns),
            _ => Ok(()),
        }
    }
}
