//! Rule IR: literals, conditions (one clause each), rules and queries.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchemaError;
use crate::expr::{check_terms, Expr, Ref, Term};
use crate::registry::SchemaSource;
use crate::schema::{PredicatePayload, PredicateSchema};

// ============================================================================
// Per-rule render overrides
// ============================================================================

/// How variable names are turned into dialect identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarMode {
    /// Reject names that are not already valid.
    Error,
    #[default]
    Sanitize,
    Prefix,
    Capitalize,
}

/// How a relation head's `Sub` / `Obj` arguments get bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelBinding {
    /// Derive `Sub = sub(Keys..)` bindings from flattened endpoint key variables.
    #[default]
    Auto,
    /// Render the body as written.
    Explicit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleRenderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_mode: Option<VarMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_binding: Option<RelBinding>,
}

impl RuleRenderConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// Literals and conditions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Literal {
    Ref(Ref),
    Expr { expr: Expr },
}

impl From<Ref> for Literal {
    fn from(r: Ref) -> Self {
        Literal::Ref(r)
    }
}

impl From<Expr> for Literal {
    fn from(expr: Expr) -> Self {
        Literal::Expr { expr }
    }
}

/// One clause of a rule: a conjunction of literals with an optional probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cond {
    pub literals: Vec<Literal>,
    #[serde(default)]
    pub prob: Option<f64>,
}

impl Cond {
    pub fn new(literals: Vec<Literal>) -> Self {
        Self { literals, prob: None }
    }

    pub fn with_prob(literals: Vec<Literal>, prob: f64) -> Result<Self, SchemaError> {
        let cond = Self {
            literals,
            prob: Some(prob),
        };
        cond.check_prob()?;
        Ok(cond)
    }

    pub fn check_prob(&self) -> Result<(), SchemaError> {
        match self.prob {
            Some(p) if !(0.0..=1.0).contains(&p) => Err(SchemaError::ProbabilityOutOfRange {
                context: "condition probability".to_string(),
                value: p,
            }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A head predicate and its clauses; each condition independently derives the head.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub head: PredicateSchema,
    pub conditions: Vec<Cond>,
    pub render: RuleRenderConfig,
}

impl Rule {
    pub fn new(head: PredicateSchema, conditions: Vec<Cond>) -> Self {
        Self {
            head,
            conditions,
            render: RuleRenderConfig::default(),
        }
    }

    pub fn with_render(mut self, render: RuleRenderConfig) -> Self {
        self.render = render;
        self
    }

    pub fn to_payload(&self) -> RulePayload {
        RulePayload {
            head: self.head.to_payload(),
            conditions: self.conditions.clone(),
            render_configs: self.render.clone(),
        }
    }

    /// Rebuild a rule; relation heads resolve their endpoints through `source`.
    pub fn from_payload(payload: &RulePayload, source: &dyn SchemaSource) -> Result<Self, SchemaError> {
        let lookup = |id: &str| source.get(id).ok().cloned();
        let head = PredicateSchema::from_payload(&payload.head, &lookup)?;
        for cond in &payload.conditions {
            cond.check_prob()?;
        }
        debug!(head = head.name(), conditions = payload.conditions.len(), "rule loaded");
        Ok(Self {
            head,
            conditions: payload.conditions.clone(),
            render: payload.render_configs.clone(),
        })
    }

    pub fn from_json(text: &str, source: &dyn SchemaSource) -> Result<Self, SchemaError> {
        let payload: RulePayload = serde_json::from_str(text)?;
        Self::from_payload(&payload, source)
    }
}

/// Head schema fields merged with the ordered conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePayload {
    #[serde(flatten)]
    pub head: PredicatePayload,
    #[serde(default)]
    pub conditions: Vec<Cond>,
    #[serde(default, skip_serializing_if = "RuleRenderConfig::is_empty")]
    pub render_configs: RuleRenderConfig,
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Schema(PredicateSchema),
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub target: QueryTarget,
    pub terms: Vec<Term>,
}

impl Query {
    /// Query a known schema; arity and constant types are checked.
    pub fn for_schema(schema: &PredicateSchema, terms: Vec<Term>) -> Result<Self, SchemaError> {
        check_terms(schema, &terms)?;
        Ok(Self {
            target: QueryTarget::Schema(schema.clone()),
            terms,
        })
    }

    /// Query by id; resolved (and checked) at render time.
    pub fn for_id(schema_id: impl Into<String>, terms: Vec<Term>) -> Result<Self, SchemaError> {
        let schema_id = schema_id.into();
        if schema_id.trim().is_empty() {
            return Err(SchemaError::InvalidQuery);
        }
        Ok(Self {
            target: QueryTarget::Id(schema_id),
            terms,
        })
    }

    pub fn schema_id(&self) -> &str {
        match &self.target {
            QueryTarget::Schema(s) => s.schema_id(),
            QueryTarget::Id(id) => id,
        }
    }
}
