//! Render configuration: context-wide defaults plus per-rule overrides.

use serde::{Deserialize, Serialize};
use symir_ir::{RelBinding, RuleRenderConfig, VarMode};

use crate::error::RenderError;
use crate::probability::ProbabilityConfig;

pub const DEFAULT_VAR_PREFIX: &str = "V_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub var_mode: VarMode,
    /// Used by [`VarMode::Prefix`].
    pub var_prefix: String,
    pub rel_binding: RelBinding,
    pub probability: ProbabilityConfig,
    /// Explanatory `%` comments above probabilistic clauses.
    pub comments: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            var_mode: VarMode::default(),
            var_prefix: DEFAULT_VAR_PREFIX.to_string(),
            rel_binding: RelBinding::default(),
            probability: ProbabilityConfig::default(),
            comments: true,
        }
    }
}

impl RenderConfig {
    pub fn from_json(text: &str) -> Result<Self, RenderError> {
        let config: Self = serde_json::from_str(text).map_err(|e| RenderError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        self.probability.validate()
    }

    /// This config with a rule's overrides applied on top.
    pub fn merged(&self, overrides: &RuleRenderConfig) -> Self {
        Self {
            var_mode: overrides.var_mode.unwrap_or(self.var_mode),
            var_prefix: overrides
                .var_prefix
                .clone()
                .unwrap_or_else(|| self.var_prefix.clone()),
            rel_binding: overrides.rel_binding.unwrap_or(self.rel_binding),
            probability: self.probability,
            comments: self.comments,
        }
    }
}
