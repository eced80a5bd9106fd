//! Dialect-independent rule checks against a restricted view.
//!
//! One pass over each condition's literals, failing on the first violation:
//! a reference to the head itself, a reference outside the view (and not a
//! library predicate), an arity or constant-type mismatch, a negated reference
//! nested in an expression, `not` around a reference, or an aggregate / cut
//! operator. Cross-literal variable typing is not checked.

use symir_ir::value::datatypes_match;
use symir_ir::{Expr, Literal, Ref, Rule, SchemaSource, SchemaView, Term};
use tracing::debug;

use crate::error::ValidationError;
use crate::library::{is_disallowed, Library};

/// Where a literal sits, for error reports.
#[derive(Debug, Clone, Copy)]
struct At<'r> {
    rule: &'r str,
    condition: usize,
    literal: usize,
}

/// Datatype expectations of whatever a `Ref` points at.
struct Target<'s> {
    predicate: &'s str,
    datatypes: Vec<Option<&'s str>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RuleValidator<'a> {
    view: &'a SchemaView,
    library: Option<&'a Library>,
}

impl<'a> RuleValidator<'a> {
    pub fn new(view: &'a SchemaView) -> Self {
        Self { view, library: None }
    }

    pub fn with_library(mut self, library: Option<&'a Library>) -> Self {
        self.library = library;
        self
    }

    pub fn validate(&self, rule: &Rule) -> Result<(), ValidationError> {
        let head_id = rule.head.schema_id();
        for (condition, cond) in rule.conditions.iter().enumerate() {
            if let Some(value) = cond.prob.filter(|p| !(0.0..=1.0).contains(p)) {
                return Err(ValidationError::ProbabilityOutOfRange {
                    rule: rule.head.name().to_string(),
                    condition,
                    value,
                });
            }
            for (literal, lit) in cond.literals.iter().enumerate() {
                let at = At {
                    rule: rule.head.name(),
                    condition,
                    literal,
                };
                match lit {
                    Literal::Ref(r) => self.check_ref(r, head_id, at)?,
                    Literal::Expr { expr } => self.check_expr(expr, head_id, at, false)?,
                }
            }
        }
        debug!(rule = rule.head.name(), conditions = rule.conditions.len(), "rule validated");
        Ok(())
    }

    fn check_expr(&self, expr: &Expr, head_id: &str, at: At<'_>, under_not: bool) -> Result<(), ValidationError> {
        match expr {
            Expr::Var(v) => check_var(&v.name, at),
            Expr::Const(_) => Ok(()),
            Expr::Ref(r) => {
                if r.negated {
                    return Err(ValidationError::NestedNegatedRef {
                        rule: at.rule.to_string(),
                        condition: at.condition,
                        literal: at.literal,
                    });
                }
                if under_not {
                    return Err(ValidationError::NotAroundRef {
                        rule: at.rule.to_string(),
                        condition: at.condition,
                        literal: at.literal,
                    });
                }
                self.check_ref(r, head_id, at)
            }
            Expr::Call { op, args } => {
                if is_disallowed(op) {
                    return Err(ValidationError::DisallowedConstruct {
                        rule: at.rule.to_string(),
                        condition: at.condition,
                        literal: at.literal,
                        op: op.clone(),
                    });
                }
                args.iter()
                    .try_for_each(|arg| self.check_expr(arg, head_id, at, under_not))
            }
            Expr::Unify { lhs, rhs } => {
                self.check_expr(lhs, head_id, at, under_not)?;
                self.check_expr(rhs, head_id, at, under_not)
            }
            Expr::If { cond, then, otherwise } => {
                self.check_expr(cond, head_id, at, under_not)?;
                self.check_expr(then, head_id, at, under_not)?;
                self.check_expr(otherwise, head_id, at, under_not)
            }
            Expr::Not { expr } => self.check_expr(expr, head_id, at, true),
        }
    }

    fn check_ref(&self, r: &Ref, head_id: &str, at: At<'_>) -> Result<(), ValidationError> {
        if r.schema == head_id {
            return Err(ValidationError::DirectRecursion {
                rule: at.rule.to_string(),
                condition: at.condition,
                literal: at.literal,
            });
        }
        let target = self.target(&r.schema, at)?;
        if r.terms.len() != target.datatypes.len() {
            return Err(ValidationError::ArityMismatch {
                rule: at.rule.to_string(),
                condition: at.condition,
                literal: at.literal,
                predicate: target.predicate.to_string(),
                expected: target.datatypes.len(),
                found: r.terms.len(),
            });
        }
        for (position, (term, expected)) in r.terms.iter().zip(&target.datatypes).enumerate() {
            match term {
                Term::Var(v) => check_var(&v.name, at)?,
                Term::Const(c) => {
                    let Some(expected) = expected else { continue };
                    let mismatch = |found: &str| ValidationError::TypeMismatch {
                        rule: at.rule.to_string(),
                        condition: at.condition,
                        literal: at.literal,
                        predicate: target.predicate.to_string(),
                        position,
                        expected: expected.to_string(),
                        found: found.to_string(),
                    };
                    if let Some(dt) = &c.datatype {
                        if !datatypes_match(dt, expected) {
                            return Err(mismatch(dt));
                        }
                    }
                    if !c.value.fits(expected) {
                        return Err(mismatch(c.value.datatype()));
                    }
                }
            }
        }
        Ok(())
    }

    fn target(&self, schema_id: &str, at: At<'_>) -> Result<Target<'a>, ValidationError> {
        if self.view.allows(schema_id) {
            if let Ok(schema) = self.view.get(schema_id) {
                return Ok(Target {
                    predicate: schema.name(),
                    datatypes: schema.signature().iter().map(|a| Some(a.datatype.as_str())).collect(),
                });
            }
        }
        if let Some(spec) = self.library.and_then(|lib| lib.predicate_by_id(schema_id)) {
            let datatypes = match &spec.signature {
                Some(sig) => sig.iter().map(|d| Some(d.as_str())).collect(),
                None => vec![None; spec.arity],
            };
            return Ok(Target {
                predicate: &spec.name,
                datatypes,
            });
        }
        Err(ValidationError::OutOfScope {
            rule: at.rule.to_string(),
            condition: at.condition,
            literal: at.literal,
            schema_id: schema_id.to_string(),
        })
    }
}

fn check_var(name: &str, at: At<'_>) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyVariable {
            rule: at.rule.to_string(),
            condition: at.condition,
            literal: at.literal,
        });
    }
    Ok(())
}
