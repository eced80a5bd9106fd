//! Canonical records ("instances") of entity and relation predicates.
//!
//! Construction is two-phase: the caller's input shape ([`InstanceTerms`]) is
//! normalized into plain field maps, then a single strict constructor checks
//! keys, props and datatypes and derives the identity hashes.
//!
//! Identity rules:
//! - entity records: `entity_id = H(schema_id ++ [[key, value], ...])` over
//!   the schema's key fields only
//! - relation records: `sub_entity_id` / `obj_entity_id` are entity ids of
//!   the endpoints, computed from the relation's endpoint key fields
//! - `record_id` only under `keep_all`: `H(schema_id ++ primary ids ++ evidence)`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::digest::{digest_json, entity_id, record_id};
use crate::error::SchemaError;
use crate::meta::Meta;
use crate::registry::SchemaSource;
use crate::schema::{
    ArgRole, FactSchema, MergePolicy, PredicateKind, PredicateSchema, RelSchema, OBJ_PREFIX, SUB_PREFIX,
};
use crate::value::Value;

pub type FieldMap = BTreeMap<String, Value>;

// ============================================================================
// Input shapes
// ============================================================================

/// How endpoint values may be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    #[default]
    Strict,
    /// Also accept a bare scalar per endpoint; needs exactly one key field on
    /// each endpoint.
    Heuristic,
}

/// Opaque reference to an entity: schema id plus its key values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRef {
    pub schema_id: String,
    pub key_values: FieldMap,
}

#[derive(Debug, Clone)]
pub enum Endpoint<'a> {
    Record(&'a Instance),
    Ref(InstanceRef),
    /// Endpoint key values; keys may carry the `sub_` / `obj_` prefix.
    Keys(FieldMap),
    Scalar(Value),
}

impl Endpoint<'_> {
    pub fn keys<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Endpoint::Keys(field_map(pairs))
    }
}

#[derive(Debug, Clone)]
pub enum RelProps {
    Positional(Vec<Value>),
    /// Inline and nested forms; a name may appear in only one of them.
    Named { inline: FieldMap, nested: FieldMap },
}

impl RelProps {
    pub fn none() -> Self {
        RelProps::Positional(Vec::new())
    }

    pub fn named<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        RelProps::Named {
            inline: FieldMap::new(),
            nested: field_map(pairs),
        }
    }
}

#[derive(Debug, Clone)]
pub enum InstanceTerms<'a> {
    /// Values in signature order (the derived signature for relations).
    Positional(Vec<Value>),
    /// Values by argument name. For relations this is the flattened form:
    /// prop names, bare endpoint key names, or `sub_` / `obj_` prefixed keys.
    Keyed(FieldMap),
    Relation {
        sub: Endpoint<'a>,
        obj: Endpoint<'a>,
        props: RelProps,
    },
}

impl InstanceTerms<'_> {
    pub fn positional<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        InstanceTerms::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn keyed<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        InstanceTerms::Keyed(field_map(pairs))
    }
}

pub fn field_map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> FieldMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    pub prob: Option<f64>,
    pub meta: Meta,
    pub mode: ResolveMode,
}

// ============================================================================
// Instance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Entity { entity_id: String },
    Relation { sub_entity_id: String, obj_entity_id: String },
}

/// Endpoint key values of a relation record, unprefixed. Only present on
/// records built from terms; canonical payloads may omit them.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointKeys {
    pub sub: FieldMap,
    pub obj: FieldMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    schema_id: String,
    kind: PredicateKind,
    /// Entity records: every supplied field, keys included.
    /// Relation records: relation props only.
    props: FieldMap,
    prob: Option<f64>,
    meta: Meta,
    identity: Identity,
    record_id: Option<String>,
    endpoint_keys: Option<EndpointKeys>,
}

impl Instance {
    pub fn new(schema: &PredicateSchema, terms: InstanceTerms<'_>) -> Result<Self, SchemaError> {
        Self::with_options(schema, terms, InstanceOptions::default())
    }

    pub fn with_options(
        schema: &PredicateSchema,
        terms: InstanceTerms<'_>,
        options: InstanceOptions,
    ) -> Result<Self, SchemaError> {
        check_probability(options.prob)?;
        options.meta.validate()?;
        match (schema, normalize(schema, terms, options.mode)?) {
            (PredicateSchema::Fact(fact), Normalized::Fact(props)) => {
                build_fact(schema, fact, props, options.prob, options.meta)
            }
            (PredicateSchema::Rel(rel), Normalized::Relation { sub, obj, props }) => {
                build_rel(schema, rel, sub, obj, props, options.prob, options.meta)
            }
            _ => Err(SchemaError::InvalidTerms {
                predicate: schema.name().to_string(),
                reason: "terms do not match the predicate kind".to_string(),
            }),
        }
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn kind(&self) -> PredicateKind {
        self.kind
    }

    pub fn props(&self) -> &FieldMap {
        &self.props
    }

    pub fn prob(&self) -> Option<f64> {
        self.prob
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn entity_id(&self) -> Option<&str> {
        match &self.identity {
            Identity::Entity { entity_id } => Some(entity_id),
            Identity::Relation { .. } => None,
        }
    }

    pub fn sub_entity_id(&self) -> Option<&str> {
        match &self.identity {
            Identity::Relation { sub_entity_id, .. } => Some(sub_entity_id),
            Identity::Entity { .. } => None,
        }
    }

    pub fn obj_entity_id(&self) -> Option<&str> {
        match &self.identity {
            Identity::Relation { obj_entity_id, .. } => Some(obj_entity_id),
            Identity::Entity { .. } => None,
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn endpoint_keys(&self) -> Option<&EndpointKeys> {
        self.endpoint_keys.as_ref()
    }

    /// Values in signature order, as a ground term list.
    pub fn to_terms(&self, schema: &PredicateSchema) -> Result<Vec<Value>, SchemaError> {
        if schema.schema_id() != self.schema_id {
            return Err(SchemaError::SchemaMismatch {
                record: self.schema_id.clone(),
                schema: schema.schema_id().to_string(),
            });
        }
        let keys = match (schema, &self.endpoint_keys) {
            (PredicateSchema::Rel(_), None) => {
                return Err(SchemaError::EndpointKeysUnavailable {
                    schema_id: self.schema_id.clone(),
                })
            }
            (_, keys) => keys,
        };
        schema
            .signature()
            .iter()
            .map(|arg| {
                let found = match (arg.role, keys) {
                    (Some(ArgRole::SubKey), Some(k)) => arg.name.strip_prefix(SUB_PREFIX).and_then(|n| k.sub.get(n)),
                    (Some(ArgRole::ObjKey), Some(k)) => arg.name.strip_prefix(OBJ_PREFIX).and_then(|n| k.obj.get(n)),
                    _ => self.props.get(&arg.name),
                };
                found.cloned().ok_or_else(|| SchemaError::InvalidTerms {
                    predicate: schema.name().to_string(),
                    reason: format!("record has no value for `{}`", arg.name),
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Payloads
    // ------------------------------------------------------------------------

    /// Canonical payload. `include_keys` adds `sub_key` / `obj_key` for
    /// relation records and fails when those values are not in memory.
    pub fn to_payload(&self, include_keys: bool) -> Result<InstancePayload, SchemaError> {
        let mut payload = InstancePayload {
            schema_id: self.schema_id.clone(),
            kind: Some(self.kind),
            props: self.props.clone(),
            prob: self.prob,
            meta: self.meta.to_json()?,
            entity_id: None,
            sub_entity_id: None,
            obj_entity_id: None,
            record_id: self.record_id.clone(),
            sub_key: None,
            obj_key: None,
        };
        match &self.identity {
            Identity::Entity { entity_id } => payload.entity_id = Some(entity_id.clone()),
            Identity::Relation {
                sub_entity_id,
                obj_entity_id,
            } => {
                payload.sub_entity_id = Some(sub_entity_id.clone());
                payload.obj_entity_id = Some(obj_entity_id.clone());
                if include_keys {
                    let keys = self
                        .endpoint_keys
                        .as_ref()
                        .ok_or_else(|| SchemaError::EndpointKeysUnavailable {
                            schema_id: self.schema_id.clone(),
                        })?;
                    payload.sub_key = Some(keys.sub.clone());
                    payload.obj_key = Some(keys.obj.clone());
                }
            }
        }
        Ok(payload)
    }

    /// Restore a record, verifying every identity that can be recomputed.
    pub fn from_payload(payload: &InstancePayload, source: &dyn SchemaSource) -> Result<Self, SchemaError> {
        let schema = source.get(&payload.schema_id)?;
        if let Some(kind) = payload.kind {
            if kind != schema.kind() {
                return Err(SchemaError::KindMismatch {
                    schema_id: payload.schema_id.clone(),
                    expected: schema.kind(),
                    found: kind,
                });
            }
        }
        check_probability(payload.prob)?;
        let meta = Meta::from_json(&serde_json::Value::Object(payload.meta.clone()))?;

        let mut instance = match schema {
            PredicateSchema::Fact(fact) => {
                check_fact_props(fact, &payload.props)?;
                let computed = fact_entity_id(fact, &payload.props)?;
                let declared = require(&payload.schema_id, "entity_id", &payload.entity_id)?;
                verify(&payload.schema_id, "entity_id", declared, &computed)?;
                Instance {
                    schema_id: payload.schema_id.clone(),
                    kind: PredicateKind::Fact,
                    props: payload.props.clone(),
                    prob: payload.prob,
                    meta,
                    identity: Identity::Entity { entity_id: computed },
                    record_id: None,
                    endpoint_keys: None,
                }
            }
            PredicateSchema::Rel(rel) => {
                check_rel_props(rel, &payload.props)?;
                let sub_id = require(&payload.schema_id, "sub_entity_id", &payload.sub_entity_id)?;
                let obj_id = require(&payload.schema_id, "obj_entity_id", &payload.obj_entity_id)?;
                let endpoint_keys = match (&payload.sub_key, &payload.obj_key) {
                    (Some(sub), Some(obj)) => {
                        let (sub, computed_sub) = endpoint_identity(rel, Side::Sub, sub.clone())?;
                        let (obj, computed_obj) = endpoint_identity(rel, Side::Obj, obj.clone())?;
                        verify(&payload.schema_id, "sub_entity_id", sub_id, &computed_sub)?;
                        verify(&payload.schema_id, "obj_entity_id", obj_id, &computed_obj)?;
                        Some(EndpointKeys { sub, obj })
                    }
                    _ => None,
                };
                Instance {
                    schema_id: payload.schema_id.clone(),
                    kind: PredicateKind::Rel,
                    props: payload.props.clone(),
                    prob: payload.prob,
                    meta,
                    identity: Identity::Relation {
                        sub_entity_id: sub_id.to_string(),
                        obj_entity_id: obj_id.to_string(),
                    },
                    record_id: None,
                    endpoint_keys,
                }
            }
        };

        if schema.merge_policy() == MergePolicy::KeepAll {
            let computed = instance.compute_record_id();
            if let Some(declared) = &payload.record_id {
                verify(&payload.schema_id, "record_id", declared, &computed)?;
            }
            instance.record_id = Some(computed);
        } else if payload.record_id.is_some() {
            return Err(SchemaError::UnexpectedRecordId {
                schema_id: payload.schema_id.clone(),
            });
        }
        Ok(instance)
    }

    fn compute_record_id(&self) -> String {
        let primary: Vec<&str> = match &self.identity {
            Identity::Entity { entity_id } => vec![entity_id],
            Identity::Relation {
                sub_entity_id,
                obj_entity_id,
            } => vec![sub_entity_id, obj_entity_id],
        };
        let evidence = match self.meta.evidence_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let props: serde_json::Map<String, serde_json::Value> =
                    self.props.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                digest_json(&json!({
                    "props": props,
                    "source": self.meta.source,
                    "observed_at": self.meta.observed_at,
                    "ingested_at": self.meta.ingested_at,
                }))
            }
        };
        record_id(&self.schema_id, &primary, &evidence)
    }
}

// ============================================================================
// Canonical payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstancePayload {
    pub schema_id: String,
    #[serde(default)]
    pub kind: Option<PredicateKind>,
    #[serde(default)]
    pub props: FieldMap,
    #[serde(default)]
    pub prob: Option<f64>,
    #[serde(default)]
    pub meta: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<FieldMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_key: Option<FieldMap>,
}

// ============================================================================
// Normalization
// ============================================================================

enum Normalized {
    Fact(FieldMap),
    Relation { sub: FieldMap, obj: FieldMap, props: FieldMap },
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Sub,
    Obj,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Side::Sub => "sub",
            Side::Obj => "obj",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Side::Sub => SUB_PREFIX,
            Side::Obj => OBJ_PREFIX,
        }
    }

    fn endpoint(self, rel: &RelSchema) -> &FactSchema {
        match self {
            Side::Sub => rel.sub(),
            Side::Obj => rel.obj(),
        }
    }

    fn key_fields(self, rel: &RelSchema) -> &[String] {
        match self {
            Side::Sub => rel.sub_key_fields(),
            Side::Obj => rel.obj_key_fields(),
        }
    }
}

fn normalize(schema: &PredicateSchema, terms: InstanceTerms<'_>, mode: ResolveMode) -> Result<Normalized, SchemaError> {
    match (schema, terms) {
        (PredicateSchema::Fact(_), InstanceTerms::Positional(values)) => {
            check_arity(schema, values.len())?;
            let props = schema
                .signature()
                .iter()
                .map(|a| a.name.clone())
                .zip(values)
                .collect();
            Ok(Normalized::Fact(props))
        }
        (PredicateSchema::Fact(_), InstanceTerms::Keyed(map)) => Ok(Normalized::Fact(map)),
        (PredicateSchema::Fact(_), InstanceTerms::Relation { .. }) => Err(SchemaError::InvalidTerms {
            predicate: schema.name().to_string(),
            reason: "entity predicates take positional or keyed terms".to_string(),
        }),
        (PredicateSchema::Rel(_), InstanceTerms::Positional(values)) => {
            check_arity(schema, values.len())?;
            let (mut sub, mut obj, mut props) = (FieldMap::new(), FieldMap::new(), FieldMap::new());
            for (arg, value) in schema.signature().iter().zip(values) {
                match arg.role {
                    Some(ArgRole::SubKey) => {
                        sub.insert(strip(&arg.name, SUB_PREFIX), value);
                    }
                    Some(ArgRole::ObjKey) => {
                        obj.insert(strip(&arg.name, OBJ_PREFIX), value);
                    }
                    _ => {
                        props.insert(arg.name.clone(), value);
                    }
                }
            }
            Ok(Normalized::Relation { sub, obj, props })
        }
        (PredicateSchema::Rel(rel), InstanceTerms::Keyed(map)) => normalize_flattened(rel, map),
        (PredicateSchema::Rel(rel), InstanceTerms::Relation { sub, obj, props }) => {
            let sub = resolve_endpoint(rel, Side::Sub, sub, mode)?;
            let obj = resolve_endpoint(rel, Side::Obj, obj, mode)?;
            let props = match props {
                RelProps::Positional(values) => {
                    if values.len() != rel.props().len() {
                        return Err(SchemaError::InvalidTerms {
                            predicate: rel_name(rel),
                            reason: format!("expected {} prop values, got {}", rel.props().len(), values.len()),
                        });
                    }
                    rel.props().iter().map(|a| a.name.clone()).zip(values).collect()
                }
                RelProps::Named { mut inline, nested } => {
                    let overlap: Vec<String> = nested.keys().filter(|k| inline.contains_key(*k)).cloned().collect();
                    if !overlap.is_empty() {
                        return Err(SchemaError::DuplicateProps {
                            predicate: rel_name(rel),
                            props: overlap,
                        });
                    }
                    inline.extend(nested);
                    inline
                }
            };
            Ok(Normalized::Relation { sub, obj, props })
        }
    }
}

fn normalize_flattened(rel: &RelSchema, map: FieldMap) -> Result<Normalized, SchemaError> {
    let is_prop = |k: &str| rel.props().iter().any(|a| a.name == k);
    let is_sub = |k: &str| rel.sub_key_fields().iter().any(|f| f == k);
    let is_obj = |k: &str| rel.obj_key_fields().iter().any(|f| f == k);

    let (mut sub, mut obj, mut props) = (FieldMap::new(), FieldMap::new(), FieldMap::new());
    for (key, value) in map {
        if is_prop(&key) {
            props.insert(key, value);
        } else if is_sub(&key) && is_obj(&key) {
            return Err(SchemaError::AmbiguousEndpointKey {
                predicate: rel_name(rel),
                key,
            });
        } else if is_sub(&key) {
            sub.insert(key, value);
        } else if is_obj(&key) {
            obj.insert(key, value);
        } else if let Some(k) = key.strip_prefix(SUB_PREFIX).filter(|k| is_sub(k)) {
            sub.insert(k.to_string(), value);
        } else if let Some(k) = key.strip_prefix(OBJ_PREFIX).filter(|k| is_obj(k)) {
            obj.insert(k.to_string(), value);
        } else {
            // Reported as an unknown prop by the strict constructor.
            props.insert(key, value);
        }
    }
    Ok(Normalized::Relation { sub, obj, props })
}

fn resolve_endpoint(rel: &RelSchema, side: Side, endpoint: Endpoint<'_>, mode: ResolveMode) -> Result<FieldMap, SchemaError> {
    let expected = side.endpoint(rel).schema_id();
    let invalid = |reason: String| SchemaError::InvalidEndpoint {
        predicate: rel_name(rel),
        endpoint: side.label(),
        reason,
    };
    match endpoint {
        Endpoint::Record(record) => {
            if record.kind != PredicateKind::Fact {
                return Err(invalid("must be an entity record".to_string()));
            }
            if record.schema_id != expected {
                return Err(invalid(format!("record schema_id {} is not {}", record.schema_id, expected)));
            }
            Ok(side
                .key_fields(rel)
                .iter()
                .filter_map(|k| record.props.get(k).map(|v| (k.clone(), v.clone())))
                .collect())
        }
        Endpoint::Ref(reference) => {
            if reference.schema_id != expected {
                return Err(invalid(format!("reference schema_id {} is not {}", reference.schema_id, expected)));
            }
            Ok(strip_keys(reference.key_values, side.prefix()))
        }
        Endpoint::Keys(keys) => Ok(strip_keys(keys, side.prefix())),
        Endpoint::Scalar(value) => {
            if mode != ResolveMode::Heuristic {
                return Err(invalid("scalar values need heuristic resolution".to_string()));
            }
            if rel.sub_key_fields().len() != 1 || rel.obj_key_fields().len() != 1 {
                return Err(SchemaError::HeuristicUnavailable {
                    predicate: rel_name(rel),
                });
            }
            let key = side.key_fields(rel)[0].clone();
            Ok(FieldMap::from([(key, value)]))
        }
    }
}

fn strip_keys(keys: FieldMap, prefix: &str) -> FieldMap {
    keys.into_iter()
        .map(|(k, v)| (k.strip_prefix(prefix).map(str::to_string).unwrap_or(k), v))
        .collect()
}

fn strip(name: &str, prefix: &str) -> String {
    name.strip_prefix(prefix).unwrap_or(name).to_string()
}

fn rel_name(rel: &RelSchema) -> String {
    rel.name().to_string()
}

// ============================================================================
// Strict construction
// ============================================================================

fn build_fact(
    schema: &PredicateSchema,
    fact: &FactSchema,
    props: FieldMap,
    prob: Option<f64>,
    meta: Meta,
) -> Result<Instance, SchemaError> {
    check_fact_props(fact, &props)?;
    let entity_id = fact_entity_id(fact, &props)?;
    let mut instance = Instance {
        schema_id: schema.schema_id().to_string(),
        kind: PredicateKind::Fact,
        props,
        prob,
        meta,
        identity: Identity::Entity { entity_id },
        record_id: None,
        endpoint_keys: None,
    };
    if schema.merge_policy() == MergePolicy::KeepAll {
        instance.record_id = Some(instance.compute_record_id());
    }
    Ok(instance)
}

fn build_rel(
    schema: &PredicateSchema,
    rel: &RelSchema,
    sub: FieldMap,
    obj: FieldMap,
    props: FieldMap,
    prob: Option<f64>,
    meta: Meta,
) -> Result<Instance, SchemaError> {
    check_rel_props(rel, &props)?;
    let (sub, sub_entity_id) = endpoint_identity(rel, Side::Sub, sub)?;
    let (obj, obj_entity_id) = endpoint_identity(rel, Side::Obj, obj)?;
    let mut instance = Instance {
        schema_id: schema.schema_id().to_string(),
        kind: PredicateKind::Rel,
        props,
        prob,
        meta,
        identity: Identity::Relation {
            sub_entity_id,
            obj_entity_id,
        },
        record_id: None,
        endpoint_keys: Some(EndpointKeys { sub, obj }),
    };
    if schema.merge_policy() == MergePolicy::KeepAll {
        instance.record_id = Some(instance.compute_record_id());
    }
    Ok(instance)
}

fn check_arity(schema: &PredicateSchema, found: usize) -> Result<(), SchemaError> {
    if found != schema.arity() {
        return Err(SchemaError::ArityMismatch {
            predicate: schema.name().to_string(),
            expected: schema.arity(),
            found,
        });
    }
    Ok(())
}

fn check_probability(prob: Option<f64>) -> Result<(), SchemaError> {
    match prob {
        Some(p) if !(0.0..=1.0).contains(&p) => Err(SchemaError::ProbabilityOutOfRange {
            context: "record probability".to_string(),
            value: p,
        }),
        _ => Ok(()),
    }
}

fn check_value(predicate: &str, field: &str, datatype: &str, value: &Value) -> Result<(), SchemaError> {
    if value.fits(datatype) {
        return Ok(());
    }
    Err(SchemaError::ValueTypeMismatch {
        predicate: predicate.to_string(),
        field: field.to_string(),
        datatype: datatype.to_string(),
        value: value.to_string(),
    })
}

/// Entity props must name signature arguments and fit their datatypes.
/// Non-key fields may be omitted.
fn check_fact_props(fact: &FactSchema, props: &FieldMap) -> Result<(), SchemaError> {
    let unknown: Vec<String> = props.keys().filter(|k| fact.arg(k).is_none()).cloned().collect();
    if !unknown.is_empty() {
        return Err(SchemaError::UnknownProps {
            predicate: fact.name().to_string(),
            props: unknown,
        });
    }
    for (name, value) in props {
        if let Some(arg) = fact.arg(name) {
            check_value(fact.name(), name, &arg.datatype, value)?;
        }
    }
    Ok(())
}

/// Relation props must match the declared prop names exactly.
fn check_rel_props(rel: &RelSchema, props: &FieldMap) -> Result<(), SchemaError> {
    let declared = |k: &str| rel.props().iter().find(|a| a.name == k);
    let unknown: Vec<String> = props.keys().filter(|k| declared(k).is_none()).cloned().collect();
    if !unknown.is_empty() {
        return Err(SchemaError::UnknownProps {
            predicate: rel_name(rel),
            props: unknown,
        });
    }
    let missing: Vec<String> = rel
        .props()
        .iter()
        .filter(|a| !props.contains_key(&a.name))
        .map(|a| a.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingProps {
            predicate: rel_name(rel),
            props: missing,
        });
    }
    for (name, value) in props {
        if let Some(arg) = declared(name) {
            check_value(&rel_name(rel), name, &arg.datatype, value)?;
        }
    }
    Ok(())
}

fn fact_entity_id(fact: &FactSchema, props: &FieldMap) -> Result<String, SchemaError> {
    let missing: Vec<String> = fact
        .key_fields()
        .iter()
        .filter(|k| !props.contains_key(*k))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingKeyFields {
            predicate: fact.name().to_string(),
            fields: missing,
        });
    }
    let pairs: Vec<(&str, &Value)> = fact
        .key_fields()
        .iter()
        .filter_map(|k| props.get(k).map(|v| (k.as_str(), v)))
        .collect();
    Ok(entity_id(fact.schema_id(), &pairs))
}

/// Check an endpoint's key values and derive its entity id.
fn endpoint_identity(rel: &RelSchema, side: Side, keys: FieldMap) -> Result<(FieldMap, String), SchemaError> {
    let endpoint = side.endpoint(rel);
    let key_fields = side.key_fields(rel);
    let extra: Vec<&String> = keys.keys().filter(|k| !key_fields.contains(k)).collect();
    if let Some(first) = extra.first() {
        return Err(SchemaError::InvalidEndpoint {
            predicate: rel_name(rel),
            endpoint: side.label(),
            reason: format!("`{first}` is not an endpoint key field"),
        });
    }
    let missing: Vec<String> = key_fields.iter().filter(|k| !keys.contains_key(*k)).cloned().collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingEndpointKeyFields {
            predicate: rel_name(rel),
            endpoint: side.label(),
            fields: missing,
        });
    }
    let mut pairs = Vec::with_capacity(key_fields.len());
    for key in key_fields {
        let value = &keys[key];
        if let Some(arg) = endpoint.arg(key) {
            check_value(endpoint.name(), key, &arg.datatype, value)?;
        }
        pairs.push((key.as_str(), value));
    }
    let id = entity_id(endpoint.schema_id(), &pairs);
    Ok((keys, id))
}

fn require<'a>(schema_id: &str, field: &'static str, value: &'a Option<String>) -> Result<&'a str, SchemaError> {
    value.as_deref().ok_or_else(|| SchemaError::MissingIdentity {
        schema_id: schema_id.to_string(),
        field,
    })
}

fn verify(schema_id: &str, field: &'static str, declared: &str, computed: &str) -> Result<(), SchemaError> {
    if declared != computed {
        return Err(SchemaError::RecordIdentityMismatch {
            schema_id: schema_id.to_string(),
            field,
            declared: declared.to_string(),
            computed: computed.to_string(),
        });
    }
    Ok(())
}
