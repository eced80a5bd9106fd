//! Schema registry and restricted views.
//!
//! A [`SchemaRegistry`] is immutable and cheap to clone (an `Arc` over its
//! indexes). Adding a predicate produces a new registry; nothing is mutated
//! in place, so registries and views can be shared across threads freely.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchemaError;
use crate::filter::PredicateFilter;
use crate::schema::{PredicateKind, PredicatePayload, PredicateSchema};

pub const REGISTRY_PAYLOAD_VERSION: u32 = 1;

// ============================================================================
// Read-only lookup surface
// ============================================================================

/// Lookups shared by registries and views.
pub trait SchemaSource: Send + Sync {
    /// All visible predicates, ordered by (kind, name, schema_id).
    fn predicates(&self) -> Vec<&PredicateSchema>;

    fn get(&self, schema_id: &str) -> Result<&PredicateSchema, SchemaError>;

    fn contains(&self, schema_id: &str) -> bool {
        self.get(schema_id).is_ok()
    }

    fn by_name(&self, kind: PredicateKind, name: &str) -> Result<&PredicateSchema, SchemaError>;

    fn rel_of_ids(&self, name: &str, sub_schema_id: &str, obj_schema_id: &str) -> Result<&PredicateSchema, SchemaError>;

    fn fact(&self, name: &str) -> Result<&PredicateSchema, SchemaError> {
        self.by_name(PredicateKind::Fact, name)
    }

    fn rel(&self, name: &str) -> Result<&PredicateSchema, SchemaError> {
        self.by_name(PredicateKind::Rel, name)
    }

    /// Distinct predicate names across both kinds, sorted.
    fn names(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self.predicates().into_iter().map(|p| p.name()).collect();
        names.into_iter().collect()
    }
}

fn pick_one<'a>(
    kind: PredicateKind,
    name: &str,
    mut candidates: Vec<&'a PredicateSchema>,
) -> Result<&'a PredicateSchema, SchemaError> {
    match candidates.len() {
        0 => Err(SchemaError::UnknownPredicate {
            kind,
            name: name.to_string(),
        }),
        1 => Ok(candidates.remove(0)),
        count => Err(SchemaError::AmbiguousPredicate {
            kind,
            name: name.to_string(),
            count,
        }),
    }
}

// ============================================================================
// Registry
// ============================================================================

type NameKey = (PredicateKind, String);
type TripleKey = (String, String, String);

#[derive(Debug)]
struct RegistryInner {
    by_id: BTreeMap<String, PredicateSchema>,
    /// Ids ordered by (kind, name, schema_id).
    order: Vec<String>,
    by_name: BTreeMap<NameKey, Vec<String>>,
    by_triple: BTreeMap<TripleKey, String>,
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    inner: Arc<RegistryInner>,
}

impl SchemaRegistry {
    /// Register a batch. Fails on duplicate identifiers and on relation
    /// endpoints that do not resolve within the batch.
    pub fn new(schemas: impl IntoIterator<Item = PredicateSchema>) -> Result<Self, SchemaError> {
        let mut by_id = BTreeMap::new();
        for schema in schemas {
            let id = schema.schema_id().to_string();
            if by_id.contains_key(&id) {
                return Err(SchemaError::DuplicateIdentifier {
                    schema_id: id,
                    name: schema.name().to_string(),
                });
            }
            by_id.insert(id, schema);
        }

        let mut by_name: BTreeMap<NameKey, Vec<String>> = BTreeMap::new();
        let mut by_triple = BTreeMap::new();
        for (id, schema) in &by_id {
            by_name
                .entry((schema.kind(), schema.name().to_string()))
                .or_default()
                .push(id.clone());
            if let Some(rel) = schema.as_rel() {
                for endpoint in [rel.sub().schema_id(), rel.obj().schema_id()] {
                    if !by_id.contains_key(endpoint) {
                        return Err(SchemaError::UnresolvedEndpoint {
                            relation: schema.name().to_string(),
                            schema_id: endpoint.to_string(),
                        });
                    }
                }
                by_triple.insert(
                    (
                        schema.name().to_string(),
                        rel.sub().schema_id().to_string(),
                        rel.obj().schema_id().to_string(),
                    ),
                    id.clone(),
                );
            }
        }

        let mut order: Vec<String> = by_id.keys().cloned().collect();
        order.sort_by(|a, b| {
            let (sa, sb) = (&by_id[a], &by_id[b]);
            (sa.kind(), sa.name(), a).cmp(&(sb.kind(), sb.name(), b))
        });

        debug!(predicates = order.len(), "schema registry built");
        Ok(Self {
            inner: Arc::new(RegistryInner {
                by_id,
                order,
                by_name,
                by_triple,
            }),
        })
    }

    pub fn empty() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                by_id: BTreeMap::new(),
                order: Vec::new(),
                by_name: BTreeMap::new(),
                by_triple: BTreeMap::new(),
            }),
        }
    }

    /// A new registry holding every current predicate plus `schema`.
    pub fn with(&self, schema: PredicateSchema) -> Result<Self, SchemaError> {
        let mut all: Vec<PredicateSchema> = self.inner.by_id.values().cloned().collect();
        all.push(schema);
        Self::new(all)
    }

    pub fn len(&self) -> usize {
        self.inner.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.by_id.is_empty()
    }

    pub fn view<I, S>(&self, schema_ids: I) -> Result<SchemaView, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SchemaView::new(self, schema_ids)
    }

    pub fn view_of(&self, schemas: &[&PredicateSchema]) -> Result<SchemaView, SchemaError> {
        SchemaView::new(self, schemas.iter().map(|s| s.schema_id()))
    }

    pub fn view_from_filter(&self, filter: &PredicateFilter) -> SchemaView {
        let allowed = self
            .predicates()
            .into_iter()
            .filter(|s| filter.matches(s))
            .map(|s| s.schema_id().to_string())
            .collect();
        SchemaView {
            parent: self.clone(),
            allowed,
        }
    }

    /// A view over every registered predicate.
    pub fn full_view(&self) -> SchemaView {
        SchemaView {
            parent: self.clone(),
            allowed: self.inner.by_id.keys().cloned().collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Payloads
    // ------------------------------------------------------------------------

    pub fn to_payload(&self) -> RegistryPayload {
        RegistryPayload {
            version: Some(REGISTRY_PAYLOAD_VERSION),
            predicates: self.predicates().into_iter().map(PredicateSchema::to_payload).collect(),
        }
    }

    /// Load a payload, recomputing every identifier. Entity predicates load
    /// first so relations can resolve their endpoints against them.
    pub fn from_payload(payload: &RegistryPayload) -> Result<Self, SchemaError> {
        let version = payload.version.unwrap_or(REGISTRY_PAYLOAD_VERSION);
        if version != REGISTRY_PAYLOAD_VERSION {
            return Err(SchemaError::UnsupportedVersion(version));
        }

        let mut facts: BTreeMap<String, PredicateSchema> = BTreeMap::new();
        for p in payload.predicates.iter().filter(|p| p.kind() == PredicateKind::Fact) {
            let schema = PredicateSchema::from_payload(p, &|_| None)?;
            let id = schema.schema_id().to_string();
            if facts.insert(id.clone(), schema).is_some() {
                return Err(SchemaError::DuplicateIdentifier {
                    schema_id: id,
                    name: p.name().to_string(),
                });
            }
        }
        let lookup = |id: &str| facts.get(id).cloned();
        let mut rels = Vec::new();
        for p in payload.predicates.iter().filter(|p| p.kind() == PredicateKind::Rel) {
            rels.push(PredicateSchema::from_payload(p, &lookup)?);
        }

        Self::new(facts.into_values().chain(rels))
    }

    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let payload: RegistryPayload = serde_json::from_str(text)?;
        Self::from_payload(&payload)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(&self.to_payload())?)
    }

    fn named(&self, kind: PredicateKind, name: &str) -> Vec<&PredicateSchema> {
        self.inner
            .by_name
            .get(&(kind, name.to_string()))
            .map(|ids| ids.iter().filter_map(|id| self.inner.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    fn triple(&self, name: &str, sub: &str, obj: &str) -> Option<&PredicateSchema> {
        self.inner
            .by_triple
            .get(&(name.to_string(), sub.to_string(), obj.to_string()))
            .and_then(|id| self.inner.by_id.get(id))
    }
}

impl SchemaSource for SchemaRegistry {
    fn predicates(&self) -> Vec<&PredicateSchema> {
        self.inner
            .order
            .iter()
            .filter_map(|id| self.inner.by_id.get(id))
            .collect()
    }

    fn get(&self, schema_id: &str) -> Result<&PredicateSchema, SchemaError> {
        self.inner
            .by_id
            .get(schema_id)
            .ok_or_else(|| SchemaError::UnknownSchemaId(schema_id.to_string()))
    }

    fn by_name(&self, kind: PredicateKind, name: &str) -> Result<&PredicateSchema, SchemaError> {
        pick_one(kind, name, self.named(kind, name))
    }

    fn rel_of_ids(&self, name: &str, sub_schema_id: &str, obj_schema_id: &str) -> Result<&PredicateSchema, SchemaError> {
        self.triple(name, sub_schema_id, obj_schema_id)
            .ok_or_else(|| SchemaError::UnknownRelationTriple {
                name: name.to_string(),
                sub_schema_id: sub_schema_id.to_string(),
                obj_schema_id: obj_schema_id.to_string(),
            })
    }
}

// ============================================================================
// Restricted view
// ============================================================================

/// Allow-listed, read-only projection of a registry.
#[derive(Debug, Clone)]
pub struct SchemaView {
    parent: SchemaRegistry,
    allowed: BTreeSet<String>,
}

impl SchemaView {
    /// Every id must already be registered in `parent`.
    pub fn new<I, S>(parent: &SchemaRegistry, schema_ids: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = BTreeSet::new();
        for id in schema_ids {
            let id = id.as_ref();
            if !parent.inner.by_id.contains_key(id) {
                return Err(SchemaError::NotInParent(id.to_string()));
            }
            allowed.insert(id.to_string());
        }
        debug!(allowed = allowed.len(), parent = parent.len(), "schema view created");
        Ok(Self {
            parent: parent.clone(),
            allowed,
        })
    }

    pub fn parent(&self) -> &SchemaRegistry {
        &self.parent
    }

    pub fn allows(&self, schema_id: &str) -> bool {
        self.allowed.contains(schema_id)
    }

    pub fn schema_ids(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn to_payload(&self) -> RegistryPayload {
        RegistryPayload {
            version: Some(REGISTRY_PAYLOAD_VERSION),
            predicates: self.predicates().into_iter().map(PredicateSchema::to_payload).collect(),
        }
    }
}

impl SchemaSource for SchemaView {
    fn predicates(&self) -> Vec<&PredicateSchema> {
        self.parent
            .predicates()
            .into_iter()
            .filter(|p| self.allows(p.schema_id()))
            .collect()
    }

    fn get(&self, schema_id: &str) -> Result<&PredicateSchema, SchemaError> {
        if !self.allows(schema_id) {
            return Err(SchemaError::NotInView(schema_id.to_string()));
        }
        self.parent.get(schema_id)
    }

    fn by_name(&self, kind: PredicateKind, name: &str) -> Result<&PredicateSchema, SchemaError> {
        let visible = self
            .parent
            .named(kind, name)
            .into_iter()
            .filter(|p| self.allows(p.schema_id()))
            .collect();
        pick_one(kind, name, visible)
    }

    fn rel_of_ids(&self, name: &str, sub_schema_id: &str, obj_schema_id: &str) -> Result<&PredicateSchema, SchemaError> {
        self.parent
            .triple(name, sub_schema_id, obj_schema_id)
            .filter(|p| self.allows(p.schema_id()))
            .ok_or_else(|| SchemaError::UnknownRelationTriple {
                name: name.to_string(),
                sub_schema_id: sub_schema_id.to_string(),
                obj_schema_id: obj_schema_id.to_string(),
            })
    }
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryPayload {
    /// Missing means current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub predicates: Vec<PredicatePayload>,
}
