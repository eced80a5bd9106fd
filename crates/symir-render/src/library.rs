//! External predicates and expression operators.
//!
//! A [`Library`] declares names the rule IR may use without a registry schema:
//! predicate specs get a content-derived id and become admissible `Ref`
//! targets, expression specs name `Call` operators. Each spec may carry a
//! per-dialect mapping template; a [`LibraryRuntime`] goes further and attaches
//! handler closures that produce the dialect text directly.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use symir_ir::digest::digest_json;

use crate::error::{LibraryError, RenderError};

/// Aggregation and cut-like operators. Never registrable, never renderable.
pub const DISALLOWED_OPS: [&str; 13] = [
    "count",
    "sum",
    "min",
    "max",
    "avg",
    "mean",
    "aggregate",
    "aggregate_all",
    "findall",
    "bagof",
    "setof",
    "!",
    "cut",
];

pub fn is_disallowed(op: &str) -> bool {
    let op = op.trim().to_ascii_lowercase();
    DISALLOWED_OPS.contains(&op.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    Predicate,
    Expr,
}

impl LibraryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LibraryKind::Predicate => "predicate",
            LibraryKind::Expr => "expr",
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Specs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySpec {
    pub name: String,
    pub arity: usize,
    pub kind: LibraryKind,
    #[serde(default)]
    pub description: String,
    /// Argument datatypes, one per position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<String>>,
    /// Free-form typing note for tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing: Option<String>,
    /// Dialect name -> mapping. For predicates the mapping replaces the name;
    /// for expressions it is a template with `{}` / `{0}` placeholders.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backend_mapping: BTreeMap<String, String>,
}

impl LibrarySpec {
    pub fn predicate(name: impl Into<String>, arity: usize, description: impl Into<String>) -> Self {
        Self::new(name, arity, LibraryKind::Predicate, description)
    }

    pub fn expr(name: impl Into<String>, arity: usize, description: impl Into<String>) -> Self {
        Self::new(name, arity, LibraryKind::Expr, description)
    }

    fn new(name: impl Into<String>, arity: usize, kind: LibraryKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity,
            kind,
            description: description.into(),
            signature: None,
            typing: None,
            backend_mapping: BTreeMap::new(),
        }
    }

    pub fn with_signature<I, S>(mut self, datatypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signature = Some(datatypes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_typing(mut self, typing: impl Into<String>) -> Self {
        self.typing = Some(typing.into());
        self
    }

    pub fn with_mapping(mut self, dialect: impl Into<String>, mapping: impl Into<String>) -> Self {
        self.backend_mapping.insert(dialect.into(), mapping.into());
        self
    }

    pub fn check(&self) -> Result<(), LibraryError> {
        if self.name.trim().is_empty() {
            return Err(LibraryError::InvalidSpec {
                name: self.name.clone(),
                reason: "name must be non-empty".to_string(),
            });
        }
        if is_disallowed(&self.name) {
            return Err(LibraryError::DisallowedName { name: self.name.clone() });
        }
        if let Some(signature) = &self.signature {
            if signature.len() != self.arity {
                return Err(LibraryError::InvalidSpec {
                    name: self.name.clone(),
                    reason: format!("signature has {} entries but arity is {}", signature.len(), self.arity),
                });
            }
        }
        Ok(())
    }

    /// Content-derived id; only predicate specs have one.
    pub fn schema_id(&self) -> Option<String> {
        match self.kind {
            LibraryKind::Predicate => Some(digest_json(&json!({
                "kind": self.kind.as_str(),
                "name": self.name,
                "arity": self.arity,
                "signature": self.signature,
            }))),
            LibraryKind::Expr => None,
        }
    }
}

// ============================================================================
// Library
// ============================================================================

type SpecKey = (String, usize, LibraryKind);

#[derive(Debug, Clone, Default)]
pub struct Library {
    specs: BTreeMap<SpecKey, LibrarySpec>,
    /// Predicate schema_id -> key.
    by_id: BTreeMap<String, SpecKey>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: LibrarySpec) -> Result<(), LibraryError> {
        spec.check()?;
        let key = (spec.name.clone(), spec.arity, spec.kind);
        if self.specs.contains_key(&key) {
            return Err(LibraryError::DuplicateSpec {
                name: spec.name,
                arity: spec.arity,
                kind: spec.kind.as_str(),
            });
        }
        if let Some(id) = spec.schema_id() {
            self.by_id.insert(id, key.clone());
        }
        self.specs.insert(key, spec);
        Ok(())
    }

    /// Load a JSON array of specs.
    pub fn from_json(text: &str) -> Result<Self, LibraryError> {
        let specs: Vec<LibrarySpec> = serde_json::from_str(text).map_err(|e| LibraryError::InvalidSpec {
            name: "<library>".to_string(),
            reason: e.to_string(),
        })?;
        let mut library = Self::new();
        for spec in specs {
            library.register(spec)?;
        }
        Ok(library)
    }

    pub fn get(&self, name: &str, arity: usize, kind: LibraryKind) -> Option<&LibrarySpec> {
        self.specs.get(&(name.to_string(), arity, kind))
    }

    pub fn mapping(&self, name: &str, arity: usize, kind: LibraryKind, dialect: &str) -> Option<&str> {
        self.get(name, arity, kind)
            .and_then(|spec| spec.backend_mapping.get(dialect))
            .map(String::as_str)
    }

    pub fn predicate_by_id(&self, schema_id: &str) -> Option<&LibrarySpec> {
        self.by_id.get(schema_id).and_then(|key| self.specs.get(key))
    }

    pub fn predicate_ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    pub fn expr_ops(&self) -> Vec<&str> {
        self.specs
            .values()
            .filter(|s| s.kind == LibraryKind::Expr)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Fill `{}` (sequential) and `{N}` (positional) placeholders; `{{` and `}}`
/// are literal braces.
pub fn apply_template(op: &str, template: &str, args: &[String]) -> Result<String, RenderError> {
    let bad = |reason: String| RenderError::BadMapping {
        op: op.to_string(),
        template: template.to_string(),
        reason,
    };
    let mut out = String::with_capacity(template.len());
    let mut next = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_digit() => index.push(d),
                        _ => return Err(bad("unterminated or non-numeric placeholder".to_string())),
                    }
                }
                let position = if index.is_empty() {
                    next += 1;
                    next - 1
                } else {
                    index.parse::<usize>().map_err(|e| bad(e.to_string()))?
                };
                let arg = args
                    .get(position)
                    .ok_or_else(|| bad(format!("placeholder {position} but only {} arguments", args.len())))?;
                out.push_str(arg);
            }
            '}' => return Err(bad("unmatched `}`".to_string())),
            c => out.push(c),
        }
    }
    Ok(out)
}

// ============================================================================
// Runtime handlers
// ============================================================================

pub type Handler = Box<dyn Fn(&[String]) -> String + Send + Sync>;

type HandlerKey = (String, usize, LibraryKind, String);

/// Per-dialect handler closures, only for specs the library declares.
#[derive(Default)]
pub struct LibraryRuntime {
    handlers: HashMap<HandlerKey, Handler>,
}

impl LibraryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        library: &Library,
        name: &str,
        arity: usize,
        kind: LibraryKind,
        dialect: &str,
        handler: F,
    ) -> Result<(), LibraryError>
    where
        F: Fn(&[String]) -> String + Send + Sync + 'static,
    {
        if library.get(name, arity, kind).is_none() {
            return Err(LibraryError::MissingSpec {
                name: name.to_string(),
                arity,
                kind: kind.as_str(),
            });
        }
        let key = (name.to_string(), arity, kind, dialect.to_string());
        if self.handlers.contains_key(&key) {
            return Err(LibraryError::DuplicateHandler {
                name: name.to_string(),
                arity,
                kind: kind.as_str(),
                dialect: dialect.to_string(),
            });
        }
        self.handlers.insert(key, Box::new(handler));
        Ok(())
    }

    pub fn get(&self, name: &str, arity: usize, kind: LibraryKind, dialect: &str) -> Option<&Handler> {
        self.handlers
            .get(&(name.to_string(), arity, kind, dialect.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for LibraryRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .handlers
            .keys()
            .map(|(name, arity, kind, dialect)| format!("{name}/{arity} ({kind}) @ {dialect}"))
            .collect();
        keys.sort();
        f.debug_struct("LibraryRuntime").field("handlers", &keys).finish()
    }
}
