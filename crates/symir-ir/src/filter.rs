//! Predicate filter AST for selecting schemas into a view.
//!
//! JSON form is externally tagged:
//! `{"and": [{"match": {"name": "person"}}, {"not": {"match": {"kind": "rel"}}}]}`.

use serde::{Deserialize, Serialize};

use crate::schema::{ArgRole, PredicateKind, PredicateSchema};
use crate::value::datatypes_match;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateFilter {
    Match(PredMatch),
    And(Vec<PredicateFilter>),
    Or(Vec<PredicateFilter>),
    Not(Box<PredicateFilter>),
}

/// Field matcher. Unset fields match anything; `datatype`, `role` and
/// `namespace` must hold for every argument of the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ArgRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PredicateKind>,
}

impl PredMatch {
    pub fn matches(&self, schema: &PredicateSchema) -> bool {
        if self.name.as_deref().is_some_and(|n| n != schema.name()) {
            return false;
        }
        if self.arity.is_some_and(|a| a != schema.arity()) {
            return false;
        }
        if self.kind.is_some_and(|k| k != schema.kind()) {
            return false;
        }
        let sig = schema.signature();
        if let Some(dt) = &self.datatype {
            if !sig.iter().all(|a| datatypes_match(&a.datatype, dt)) {
                return false;
            }
        }
        if let Some(role) = self.role {
            if !sig.iter().all(|a| a.role == Some(role)) {
                return false;
            }
        }
        if let Some(ns) = &self.namespace {
            if !sig.iter().all(|a| a.namespace.as_deref() == Some(ns.as_str())) {
                return false;
            }
        }
        true
    }
}

impl PredicateFilter {
    pub fn name(name: impl Into<String>) -> Self {
        PredicateFilter::Match(PredMatch {
            name: Some(name.into()),
            ..PredMatch::default()
        })
    }

    pub fn kind(kind: PredicateKind) -> Self {
        PredicateFilter::Match(PredMatch {
            kind: Some(kind),
            ..PredMatch::default()
        })
    }

    pub fn and(self, other: PredicateFilter) -> Self {
        match self {
            PredicateFilter::And(mut items) => {
                items.push(other);
                PredicateFilter::And(items)
            }
            first => PredicateFilter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: PredicateFilter) -> Self {
        match self {
            PredicateFilter::Or(mut items) => {
                items.push(other);
                PredicateFilter::Or(items)
            }
            first => PredicateFilter::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        PredicateFilter::Not(Box::new(self))
    }

    pub fn matches(&self, schema: &PredicateSchema) -> bool {
        match self {
            PredicateFilter::Match(m) => m.matches(schema),
            PredicateFilter::And(items) => items.iter().all(|f| f.matches(schema)),
            PredicateFilter::Or(items) => items.iter().any(|f| f.matches(schema)),
            PredicateFilter::Not(inner) => !inner.matches(schema),
        }
    }
}

pub fn apply_filter<'a, I>(schemas: I, filter: &PredicateFilter) -> Vec<&'a PredicateSchema>
where
    I: IntoIterator<Item = &'a PredicateSchema>,
{
    schemas.into_iter().filter(|s| filter.matches(s)).collect()
}
