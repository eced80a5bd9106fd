//! Validation and rendering errors.
//!
//! The two kinds are disjoint: the validator only raises [`ValidationError`],
//! renderers only raise [`RenderError`]. [`PipelineError`] wraps both for the
//! combined entry point without losing which one fired.

use symir_ir::SchemaError;
use thiserror::Error;

/// Semantic violations found by [`crate::RuleValidator`].
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rule `{rule}` condition {condition} literal {literal}: predicate {schema_id} is outside the view")]
    OutOfScope {
        rule: String,
        condition: usize,
        literal: usize,
        schema_id: String,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: head predicate refers to itself")]
    DirectRecursion {
        rule: String,
        condition: usize,
        literal: usize,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: `{predicate}` expects {expected} terms, got {found}")]
    ArityMismatch {
        rule: String,
        condition: usize,
        literal: usize,
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: `{predicate}` argument {position} expects {expected}, got {found}")]
    TypeMismatch {
        rule: String,
        condition: usize,
        literal: usize,
        predicate: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: empty variable name")]
    EmptyVariable {
        rule: String,
        condition: usize,
        literal: usize,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: negated reference nested inside an expression")]
    NestedNegatedRef {
        rule: String,
        condition: usize,
        literal: usize,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: `not` wraps a predicate reference")]
    NotAroundRef {
        rule: String,
        condition: usize,
        literal: usize,
    },

    #[error("rule `{rule}` condition {condition} literal {literal}: `{op}` is not allowed (aggregates and cut are rejected)")]
    DisallowedConstruct {
        rule: String,
        condition: usize,
        literal: usize,
        op: String,
    },

    #[error("rule `{rule}` condition {condition}: probability {value} is outside [0.0, 1.0]")]
    ProbabilityOutOfRange {
        rule: String,
        condition: usize,
        value: f64,
    },
}

/// Failures raised while lowering IR to dialect text.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("dialect `{dialect}` is declared but has no renderer")]
    UnsupportedDialect { dialect: String },

    #[error("unknown dialect `{0}`")]
    UnknownDialect(String),

    #[error("renderer for dialect `{0}` is already registered")]
    DuplicateDialect(String),

    #[error("predicate {0} is neither in the schema source nor a library predicate")]
    UnknownPredicate(String),

    #[error("variable `{name}` is not a valid identifier under var_mode `{mode}`")]
    InvalidVariable { name: String, mode: &'static str },

    #[error("variables `{first}` and `{second}` both render as `{rendered}` under var_mode `{mode}`")]
    VariableCollision {
        first: String,
        second: String,
        rendered: String,
        mode: &'static str,
    },

    #[error("relation rule `{predicate}`: prop `{prop}` renders as reserved head variable `{rendered}`")]
    ReservedHeadVariable {
        predicate: String,
        prop: String,
        rendered: String,
    },

    #[error("float constant {value} has no finite rendering")]
    NonFiniteConstant { value: f64 },

    #[error("negated reference to `{predicate}` cannot be rendered inside an expression")]
    NegatedRefInExpr { predicate: String },

    #[error("relation rule `{predicate}` condition {condition}: {endpoint} is not bound (missing {missing:?})")]
    UnboundEndpoint {
        predicate: String,
        condition: usize,
        endpoint: &'static str,
        missing: Vec<String>,
    },

    #[error("relation `{predicate}`: expected {expected} terms, got {found}")]
    RelationShape {
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("library mapping `{template}` for `{op}`: {reason}")]
    BadMapping {
        op: String,
        template: String,
        reason: String,
    },

    #[error("missing probability for {context}")]
    MissingProbability { context: String },

    #[error("{context}: probability {value} is outside [0.0, 1.0]")]
    ProbabilityOutOfRange { context: String, value: f64 },

    #[error("invalid render config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Structural problems with library specs and runtime handlers.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library spec `{name}`: {reason}")]
    InvalidSpec { name: String, reason: String },

    #[error("`{name}` is an aggregate or cut operator and cannot be registered")]
    DisallowedName { name: String },

    #[error("library spec {name}/{arity} ({kind}) is already registered")]
    DuplicateSpec { name: String, arity: usize, kind: &'static str },

    #[error("no library spec {name}/{arity} ({kind}) to attach a handler to")]
    MissingSpec { name: String, arity: usize, kind: &'static str },

    #[error("handler for {name}/{arity} ({kind}) on `{dialect}` is already registered")]
    DuplicateHandler {
        name: String,
        arity: usize,
        kind: &'static str,
        dialect: String,
    },
}

/// Either half of a validate-then-render run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}
