//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::Verbosity;

/// Parameters of the recall model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Reference half-life of a freshly learned key, in hours.
    pub default_half_life_hours: f64,
    /// Both Beta shape parameters of a freshly learned key.
    pub default_shape: f64,
    /// Re-fit the posterior at its own half-life when the shapes drift apart.
    pub rebalance: bool,
    /// Smallest elapsed time fed into an update, in hours.
    pub min_update_elapsed_hours: f64,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            default_half_life_hours: 0.5,
            default_shape: 3.0,
            rebalance: true,
            min_update_elapsed_hours: 1.0 / 3600.0,
        }
    }
}

/// Session-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the observer broadcast channel.
    pub event_capacity: usize,
    /// Minimum verbosity of emitted study events.
    pub verbosity: Verbosity,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            verbosity: Verbosity::Normal,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recall: RecallConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    /// Create a builder with default values.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the recall math cannot work with.
    pub fn validate(&self) -> Result<()> {
        let recall = &self.recall;
        if !(recall.default_half_life_hours.is_finite() && recall.default_half_life_hours > 0.0) {
            return Err(Error::Config(format!(
                "default_half_life_hours must be positive, got {}",
                recall.default_half_life_hours
            )));
        }
        if !(recall.default_shape.is_finite() && recall.default_shape > 0.0) {
            return Err(Error::Config(format!(
                "default_shape must be positive, got {}",
                recall.default_shape
            )));
        }
        if !(recall.min_update_elapsed_hours.is_finite() && recall.min_update_elapsed_hours >= 0.0)
        {
            return Err(Error::Config(format!(
                "min_update_elapsed_hours must be non-negative, got {}",
                recall.min_update_elapsed_hours
            )));
        }
        if self.session.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the half-life of freshly learned keys.
    pub fn default_half_life_hours(mut self, hours: f64) -> Self {
        self.config.recall.default_half_life_hours = hours;
        self
    }

    /// Set the prior shape of freshly learned keys.
    pub fn default_shape(mut self, shape: f64) -> Self {
        self.config.recall.default_shape = shape;
        self
    }

    /// Enable or disable posterior rebalancing.
    pub fn rebalance(mut self, rebalance: bool) -> Self {
        self.config.recall.rebalance = rebalance;
        self
    }

    pub fn min_update_elapsed_hours(mut self, hours: f64) -> Self {
        self.config.recall.min_update_elapsed_hours = hours;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.session.event_capacity = capacity;
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.config.session.verbosity = verbosity;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
