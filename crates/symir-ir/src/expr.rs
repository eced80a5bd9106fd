//! Dialect-neutral terms and expressions.
//!
//! JSON uses an internal `kind` tag:
//! `{"kind":"call","op":"ge","args":[{"kind":"var","name":"Age"},{"kind":"const","value":18}]}`.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::instance::Instance;
use crate::schema::PredicateSchema;
use crate::value::{datatypes_match, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

/// Argument of a predicate reference: a variable or a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    Var(Var),
    Const(Const),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(Var {
            name: name.into(),
            datatype: None,
        })
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Term::Const(Const {
            value: value.into(),
            datatype: None,
        })
    }

    pub fn typed_constant(value: impl Into<Value>, datatype: impl Into<String>) -> Self {
        Term::Const(Const {
            value: value.into(),
            datatype: Some(datatype.into()),
        })
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(v) => Some(&v.name),
            Term::Const(_) => None,
        }
    }
}

impl From<Term> for Expr {
    fn from(term: Term) -> Self {
        match term {
            Term::Var(v) => Expr::Var(v),
            Term::Const(c) => Expr::Const(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Var(Var),
    Const(Const),
    Call {
        op: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Unify {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        #[serde(rename = "else")]
        otherwise: Box<Expr>,
    },
    Not {
        expr: Box<Expr>,
    },
    /// A predicate reference embedded in an expression. Must not be negated
    /// and must not sit under `Not`; the validator enforces both.
    Ref(Ref),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Term::var(name).into()
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Term::constant(value).into()
    }

    pub fn call(op: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call { op: op.into(), args }
    }

    pub fn unify(lhs: Expr, rhs: Expr) -> Self {
        Expr::Unify {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn if_then_else(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Not { expr: Box::new(expr) }
    }

    /// Variable names in left-to-right order, first occurrence only.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        let push = |name: &'a str, out: &mut Vec<&'a str>| {
            if !out.contains(&name) {
                out.push(name);
            }
        };
        match self {
            Expr::Var(v) => push(&v.name, out),
            Expr::Const(_) => {}
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_vars(out)),
            Expr::Unify { lhs, rhs } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Expr::If { cond, then, otherwise } => {
                cond.collect_vars(out);
                then.collect_vars(out);
                otherwise.collect_vars(out);
            }
            Expr::Not { expr } => expr.collect_vars(out),
            Expr::Ref(r) => {
                for name in r.terms.iter().filter_map(Term::as_var) {
                    push(name, out);
                }
            }
        }
    }
}

// ============================================================================
// Predicate references
// ============================================================================

/// Reference to a predicate by schema id, with one term per signature slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    #[serde(rename = "predicate_id", alias = "schema_id")]
    pub schema: String,
    #[serde(default)]
    pub terms: Vec<Term>,
    #[serde(default)]
    pub negated: bool,
}

impl Ref {
    /// Build against a concrete schema; arity and constant types are checked here.
    pub fn new(schema: &PredicateSchema, terms: Vec<Term>) -> Result<Self, SchemaError> {
        check_terms(schema, &terms)?;
        Ok(Self::unchecked(schema.schema_id(), terms))
    }

    /// Reference by id only, e.g. to a library predicate. Checked by the validator.
    pub fn unchecked(schema_id: impl Into<String>, terms: Vec<Term>) -> Self {
        Self {
            schema: schema_id.into(),
            terms,
            negated: false,
        }
    }

    /// Expand a record into an all-constant reference.
    pub fn from_instance(record: &Instance, schema: &PredicateSchema) -> Result<Self, SchemaError> {
        let values = record.to_terms(schema)?;
        let terms = values
            .into_iter()
            .zip(schema.signature())
            .map(|(value, arg)| Term::typed_constant(value, arg.datatype.clone()))
            .collect();
        Self::new(schema, terms)
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn check_against(&self, schema: &PredicateSchema) -> Result<(), SchemaError> {
        check_terms(schema, &self.terms)
    }
}

/// Arity, variable names and constant datatypes against a signature.
pub fn check_terms(schema: &PredicateSchema, terms: &[Term]) -> Result<(), SchemaError> {
    if terms.len() != schema.arity() {
        return Err(SchemaError::ArityMismatch {
            predicate: schema.name().to_string(),
            expected: schema.arity(),
            found: terms.len(),
        });
    }
    for (position, (term, arg)) in terms.iter().zip(schema.signature()).enumerate() {
        match term {
            Term::Var(v) if v.name.trim().is_empty() => {
                return Err(SchemaError::InvalidTerm(format!(
                    "empty variable name at argument {position} of `{}`",
                    schema.name()
                )));
            }
            Term::Var(_) => {}
            Term::Const(c) => {
                if let Some(dt) = &c.datatype {
                    if !datatypes_match(dt, &arg.datatype) {
                        return Err(SchemaError::DatatypeMismatch {
                            predicate: schema.name().to_string(),
                            position,
                            expected: arg.datatype.clone(),
                            found: dt.clone(),
                        });
                    }
                }
                if !c.value.fits(&arg.datatype) {
                    return Err(SchemaError::ValueTypeMismatch {
                        predicate: schema.name().to_string(),
                        field: arg.name.clone(),
                        datatype: arg.datatype.clone(),
                        value: c.value.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
