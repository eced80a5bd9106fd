//! Lowering shared by the Prolog-family dialects: atoms, terms, expressions,
//! clause heads and bodies.

use std::collections::BTreeSet;

use symir_ir::schema::RelSchema;
use symir_ir::{
    Cond, Expr, Instance, Literal, PredicateSchema, Query, QueryTarget, Ref, RelBinding, Rule, Term, Value,
};

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::library::{apply_template, Handler, LibraryKind};
use crate::naming::VarNamer;

use super::RenderContext;

/// Head variables of a relation rule, before naming policy.
pub(crate) const SUB_VAR: &str = "Sub";
pub(crate) const OBJ_VAR: &str = "Obj";

/// How `if` expressions are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IfStyle {
    /// `((C, T) ; (\+ (C), E))`, for dialects without `->`.
    Disjunction,
    /// `(C -> T ; E)`.
    Arrow,
}

/// What a predicate id resolved to.
enum Resolved<'s> {
    Schema(&'s PredicateSchema),
    Library { name: String, handler: Option<&'s Handler> },
}

pub(crate) struct ClauseWriter<'c, 'a> {
    ctx: &'c RenderContext<'a>,
    dialect: &'c str,
    config: RenderConfig,
    namer: VarNamer,
    if_style: IfStyle,
}

impl<'c, 'a> ClauseWriter<'c, 'a> {
    pub(crate) fn new(ctx: &'c RenderContext<'a>, dialect: &'c str, if_style: IfStyle) -> Self {
        Self::with_config(ctx, dialect, if_style, ctx.config.clone())
    }

    /// Writer with the rule's own overrides applied.
    pub(crate) fn for_rule(ctx: &'c RenderContext<'a>, dialect: &'c str, if_style: IfStyle, rule: &Rule) -> Self {
        Self::with_config(ctx, dialect, if_style, ctx.config.merged(&rule.render))
    }

    fn with_config(ctx: &'c RenderContext<'a>, dialect: &'c str, if_style: IfStyle, config: RenderConfig) -> Self {
        let namer = VarNamer::new(config.var_mode, config.var_prefix.clone());
        Self {
            ctx,
            dialect,
            config,
            namer,
            if_style,
        }
    }

    pub(crate) fn config(&self) -> &RenderConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Heads and bodies
    // ------------------------------------------------------------------------

    /// Entity heads use the signature names; relation heads are
    /// `name(Sub, Obj, Props..)`.
    pub(crate) fn head(&self, schema: &PredicateSchema) -> Result<String, RenderError> {
        if let PredicateSchema::Rel(rel) = schema {
            let reserved = [self.namer.render(SUB_VAR)?, self.namer.render(OBJ_VAR)?];
            for prop in rel.props() {
                let rendered = self.namer.render(&prop.name)?;
                if reserved.contains(&rendered) {
                    return Err(RenderError::ReservedHeadVariable {
                        predicate: rel.name().to_string(),
                        prop: prop.name.clone(),
                        rendered,
                    });
                }
            }
        }
        let names = head_names(schema);
        self.namer.render_all(names.iter().copied())?;
        let vars = names
            .into_iter()
            .map(|n| self.namer.render(n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(compound(schema.name(), &vars))
    }

    /// Head and body variables of one clause must stay distinct after naming.
    pub(crate) fn body(&self, rule: &Rule, condition: usize, cond: &Cond) -> Result<String, RenderError> {
        self.namer
            .render_all(head_names(&rule.head).into_iter().chain(source_variables(cond)))?;
        let mut parts = cond
            .literals
            .iter()
            .map(|lit| self.literal(lit))
            .collect::<Result<Vec<_>, _>>()?;
        if let (PredicateSchema::Rel(rel), RelBinding::Auto) = (&rule.head, self.config.rel_binding) {
            parts.extend(self.endpoint_bindings(rel, condition, cond)?);
        }
        if parts.is_empty() {
            return Ok("true".to_string());
        }
        Ok(parts.join(", "))
    }

    /// `Sub = sub_name(Sub_Key..)` / `Obj = ...` for each endpoint the body
    /// binds only through its flattened key variables.
    fn endpoint_bindings(&self, rel: &RelSchema, condition: usize, cond: &Cond) -> Result<Vec<String>, RenderError> {
        let bound = self.body_variables(cond)?;
        let sides = [
            (SUB_VAR, "sub", rel.sub().name(), rel.sub_key_fields()),
            (OBJ_VAR, "obj", rel.obj().name(), rel.obj_key_fields()),
        ];
        let mut bindings = Vec::new();
        for (label, endpoint, endpoint_name, keys) in sides {
            let var = self.namer.render(label)?;
            if bound.contains(&var) {
                continue;
            }
            let key_vars = keys
                .iter()
                .map(|k| self.namer.render(&format!("{label}_{k}")))
                .collect::<Result<Vec<_>, _>>()?;
            let missing: Vec<String> = key_vars.iter().filter(|v| !bound.contains(*v)).cloned().collect();
            if !missing.is_empty() {
                return Err(RenderError::UnboundEndpoint {
                    predicate: rel.name().to_string(),
                    condition,
                    endpoint,
                    missing,
                });
            }
            bindings.push(format!("{var} = {}", compound(endpoint_name, &key_vars)));
        }
        Ok(bindings)
    }

    fn body_variables(&self, cond: &Cond) -> Result<BTreeSet<String>, RenderError> {
        source_variables(cond).map(|v| self.namer.render(v)).collect()
    }

    fn literal(&self, lit: &Literal) -> Result<String, RenderError> {
        match lit {
            Literal::Ref(r) => {
                let atom = self.ref_atom(r)?;
                Ok(if r.negated { format!("\\+ {atom}") } else { atom })
            }
            Literal::Expr { expr } => self.expr(expr),
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr(&self, expr: &Expr) -> Result<String, RenderError> {
        match expr {
            Expr::Var(v) => self.namer.render(&v.name),
            Expr::Const(c) => constant(&c.value),
            Expr::Ref(r) if r.negated => Err(RenderError::NegatedRefInExpr {
                predicate: r.schema.clone(),
            }),
            Expr::Ref(r) => self.ref_atom(r),
            Expr::Unify { lhs, rhs } => Ok(format!("{} = {}", self.expr(lhs)?, self.expr(rhs)?)),
            Expr::Call { op, args } => self.call(op, args),
            Expr::If { cond, then, otherwise } => {
                let (c, t, e) = (self.expr(cond)?, self.expr(then)?, self.expr(otherwise)?);
                Ok(match self.if_style {
                    IfStyle::Disjunction => format!("(({c}, {t}) ; (\\+ ({c}), {e}))"),
                    IfStyle::Arrow => format!("({c} -> {t} ; {e})"),
                })
            }
            Expr::Not { expr } => Ok(format!("\\+ ({})", self.expr(expr)?)),
        }
    }

    fn call(&self, op: &str, args: &[Expr]) -> Result<String, RenderError> {
        let infix = if args.len() == 2 { infix_symbol(op) } else { None };
        let rendered = args
            .iter()
            .map(|arg| {
                let text = self.expr(arg)?;
                Ok(if infix.is_some() && is_infix_call(arg) {
                    format!("({text})")
                } else {
                    text
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;
        if let Some(symbol) = infix {
            return Ok(format!("{} {symbol} {}", rendered[0], rendered[1]));
        }
        if let Some(handler) = self
            .ctx
            .runtime
            .and_then(|rt| rt.get(op, args.len(), LibraryKind::Expr, self.dialect))
        {
            return Ok(handler(rendered.as_slice()));
        }
        if let Some(template) = self
            .ctx
            .library
            .and_then(|lib| lib.mapping(op, args.len(), LibraryKind::Expr, self.dialect))
        {
            return apply_template(op, template, &rendered);
        }
        Ok(compound(op, &rendered))
    }

    fn term(&self, term: &Term) -> Result<String, RenderError> {
        match term {
            Term::Var(v) => self.namer.render(&v.name),
            Term::Const(c) => constant(&c.value),
        }
    }

    // ------------------------------------------------------------------------
    // Atoms
    // ------------------------------------------------------------------------

    fn resolve(&self, schema_id: &str) -> Result<Resolved<'a>, RenderError> {
        if let Ok(schema) = self.ctx.schemas.get(schema_id) {
            return Ok(Resolved::Schema(schema));
        }
        let spec = self
            .ctx
            .library
            .and_then(|lib| lib.predicate_by_id(schema_id))
            .ok_or_else(|| RenderError::UnknownPredicate(schema_id.to_string()))?;
        let handler = self
            .ctx
            .runtime
            .and_then(|rt| rt.get(&spec.name, spec.arity, LibraryKind::Predicate, self.dialect));
        let name = self
            .ctx
            .library
            .and_then(|lib| lib.mapping(&spec.name, spec.arity, LibraryKind::Predicate, self.dialect))
            .unwrap_or(&spec.name)
            .to_string();
        Ok(Resolved::Library { name, handler })
    }

    fn atom(&self, resolved: Resolved<'_>, terms: Vec<String>) -> Result<String, RenderError> {
        match resolved {
            Resolved::Schema(PredicateSchema::Fact(fact)) => Ok(compound(fact.name(), &terms)),
            Resolved::Schema(PredicateSchema::Rel(rel)) => rel_atom(rel, &terms),
            Resolved::Library {
                handler: Some(handler), ..
            } => Ok(handler(terms.as_slice())),
            Resolved::Library { name, handler: None } => Ok(compound(&name, &terms)),
        }
    }

    fn ref_atom(&self, r: &Ref) -> Result<String, RenderError> {
        let resolved = self.resolve(&r.schema)?;
        let terms = r.terms.iter().map(|t| self.term(t)).collect::<Result<Vec<_>, _>>()?;
        self.atom(resolved, terms)
    }

    pub(crate) fn fact_atom(&self, record: &Instance) -> Result<String, RenderError> {
        let schema = self.ctx.schemas.get(record.schema_id())?;
        let terms = record
            .to_terms(schema)?
            .iter()
            .map(constant)
            .collect::<Result<Vec<_>, _>>()?;
        self.atom(Resolved::Schema(schema), terms)
    }

    pub(crate) fn query_atom(&self, query: &Query) -> Result<String, RenderError> {
        self.namer.render_all(query.terms.iter().filter_map(Term::as_var))?;
        let terms = query
            .terms
            .iter()
            .map(|t| self.term(t))
            .collect::<Result<Vec<_>, _>>()?;
        match &query.target {
            QueryTarget::Schema(schema) => self.atom(Resolved::Schema(schema), terms),
            QueryTarget::Id(id) => {
                let resolved = self.resolve(id)?;
                self.atom(resolved, terms)
            }
        }
    }
}

/// Source names of the head variables: the signature for entities,
/// `Sub, Obj, props..` for relations.
fn head_names(schema: &PredicateSchema) -> Vec<&str> {
    match schema {
        PredicateSchema::Fact(_) => schema.signature().iter().map(|a| a.name.as_str()).collect(),
        PredicateSchema::Rel(rel) => [SUB_VAR, OBJ_VAR]
            .into_iter()
            .chain(rel.props().iter().map(|a| a.name.as_str()))
            .collect(),
    }
}

fn source_variables(cond: &Cond) -> impl Iterator<Item = &str> {
    cond.literals.iter().flat_map(literal_variables)
}

fn literal_variables(lit: &Literal) -> Vec<&str> {
    match lit {
        Literal::Ref(r) => r.terms.iter().filter_map(Term::as_var).collect(),
        Literal::Expr { expr } => expr.variables(),
    }
}

/// Number of arguments a rendered head or atom carries.
pub(crate) fn rendered_arity(schema: &PredicateSchema) -> usize {
    match schema {
        PredicateSchema::Fact(_) => schema.arity(),
        PredicateSchema::Rel(rel) => 2 + rel.props().len(),
    }
}

/// `name(args..)`, or the bare name for zero arguments.
fn compound(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{name}({})", args.join(", "))
    }
}

/// Flat relation terms `[sub keys.., obj keys.., props..]` grouped as
/// `rel(sub(..), obj(..), props..)`.
fn rel_atom(rel: &RelSchema, terms: &[String]) -> Result<String, RenderError> {
    let subs = rel.sub_key_fields().len();
    let objs = rel.obj_key_fields().len();
    let expected = subs + objs + rel.props().len();
    if terms.len() != expected {
        return Err(RenderError::RelationShape {
            predicate: rel.name().to_string(),
            expected,
            found: terms.len(),
        });
    }
    let mut args = Vec::with_capacity(2 + rel.props().len());
    args.push(compound(rel.sub().name(), &terms[..subs]));
    args.push(compound(rel.obj().name(), &terms[subs..subs + objs]));
    args.extend_from_slice(&terms[subs + objs..]);
    Ok(compound(rel.name(), &args))
}

fn infix_symbol(op: &str) -> Option<&'static str> {
    Some(match op {
        "eq" => "=",
        "ne" => "\\=",
        "lt" => "<",
        "le" => "=<",
        "gt" => ">",
        "ge" => ">=",
        "add" => "+",
        "sub" => "-",
        "mul" => "*",
        "div" => "/",
        "mod" => "mod",
        _ => return None,
    })
}

fn is_infix_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { op, args } if args.len() == 2 && infix_symbol(op).is_some())
}

/// Constants: lowercase identifiers stay bare atoms, other strings are quoted.
/// NaN and infinities have no term syntax.
pub(crate) fn constant(value: &Value) -> Result<String, RenderError> {
    Ok(match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if !f.is_finite() => return Err(RenderError::NonFiniteConstant { value: *f }),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => {
            let bare = s.chars().next().is_some_and(|c| c.is_ascii_lowercase())
                && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if bare {
                s.clone()
            } else {
                format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
        }
    })
}

/// Floats always carry a decimal point (`1.0`, `2.5e-8` -> `2.5e-8`, `1e-7` -> `1.0e-7`).
pub(crate) fn format_float(value: f64) -> String {
    let text = format!("{value:?}");
    match text.find('e') {
        Some(pos) if !text[..pos].contains('.') => format!("{}.0{}", &text[..pos], &text[pos..]),
        _ => text,
    }
}
