//! Default-probability policy for facts and clauses that omit one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingProbPolicy {
    #[default]
    InjectDefault,
    WarnAndDefault,
    Error,
}

/// Where a rendered probability came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbSource {
    Declared,
    Default,
}

impl fmt::Display for ProbSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbSource::Declared => "declared",
            ProbSource::Default => "default",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbabilityConfig {
    pub default_fact_prob: f64,
    pub default_rule_prob: f64,
    pub missing_prob_policy: MissingProbPolicy,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            default_fact_prob: 1.0,
            default_rule_prob: 1.0,
            missing_prob_policy: MissingProbPolicy::InjectDefault,
        }
    }
}

impl ProbabilityConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        for (context, value) in [
            ("default_fact_prob", self.default_fact_prob),
            ("default_rule_prob", self.default_rule_prob),
        ] {
            check_range(value, || context.to_string())?;
        }
        Ok(())
    }

    pub fn resolve_rule(&self, prob: Option<f64>, context: impl Fn() -> String) -> Result<(f64, ProbSource), RenderError> {
        self.resolve(prob, self.default_rule_prob, context)
    }

    pub fn resolve_fact(&self, prob: Option<f64>, context: impl Fn() -> String) -> Result<(f64, ProbSource), RenderError> {
        self.resolve(prob, self.default_fact_prob, context)
    }

    fn resolve(
        &self,
        prob: Option<f64>,
        default: f64,
        context: impl Fn() -> String,
    ) -> Result<(f64, ProbSource), RenderError> {
        if let Some(p) = prob {
            check_range(p, &context)?;
            return Ok((p, ProbSource::Declared));
        }
        match self.missing_prob_policy {
            MissingProbPolicy::InjectDefault => Ok((default, ProbSource::Default)),
            MissingProbPolicy::WarnAndDefault => {
                warn!(context = %context(), default, "missing probability; using default");
                Ok((default, ProbSource::Default))
            }
            MissingProbPolicy::Error => Err(RenderError::MissingProbability { context: context() }),
        }
    }
}

fn check_range(value: f64, context: impl Fn() -> String) -> Result<(), RenderError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RenderError::ProbabilityOutOfRange {
            context: context(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> String {
        "rule r condition 0".to_string()
    }

    #[test]
    fn declared_probability_wins() {
        let cfg = ProbabilityConfig::default();
        assert_eq!(cfg.resolve_rule(Some(0.3), ctx).unwrap(), (0.3, ProbSource::Declared));
        assert!(cfg.resolve_rule(Some(1.3), ctx).is_err());
    }

    #[test]
    fn policies_for_missing_probability() {
        let mut cfg = ProbabilityConfig {
            default_rule_prob: 0.7,
            ..ProbabilityConfig::default()
        };
        assert_eq!(cfg.resolve_rule(None, ctx).unwrap(), (0.7, ProbSource::Default));
        assert_eq!(cfg.resolve_fact(None, ctx).unwrap(), (1.0, ProbSource::Default));

        cfg.missing_prob_policy = MissingProbPolicy::WarnAndDefault;
        assert_eq!(cfg.resolve_rule(None, ctx).unwrap().0, 0.7);

        cfg.missing_prob_policy = MissingProbPolicy::Error;
        match cfg.resolve_rule(None, ctx) {
            Err(RenderError::MissingProbability { context }) => assert_eq!(context, "rule r condition 0"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn config_json_uses_snake_case_policy() {
        let cfg: ProbabilityConfig =
            serde_json::from_str(r#"{"default_fact_prob":0.5,"missing_prob_policy":"warn_and_default"}"#).unwrap();
        assert_eq!(cfg.default_fact_prob, 0.5);
        assert_eq!(cfg.default_rule_prob, 1.0);
        assert_eq!(cfg.missing_prob_policy, MissingProbPolicy::WarnAndDefault);
        assert!(ProbabilityConfig { default_rule_prob: 2.0, ..cfg }.validate().is_err());
    }
}
