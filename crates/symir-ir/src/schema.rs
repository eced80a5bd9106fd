//! Predicate schemas: argument descriptors, entity (`fact`) and relation
//! (`rel`) predicates, and their canonical payloads.
//!
//! A schema is a frozen value. Its `schema_id` is a pure function of the
//! canonical fields (kind, name, signature, key fields, endpoints, props);
//! description and merge policy are descriptive only and never move the id.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::digest::digest_json;
use crate::error::SchemaError;
use crate::value::{is_known_datatype, normalize_datatype, DEFAULT_DATATYPE};

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    Fact,
    Rel,
}

impl PredicateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PredicateKind::Fact => "fact",
            PredicateKind::Rel => "rel",
        }
    }
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role tag of an argument. `key`, `id` and `name` drive key-field derivation
/// (in that order of precedence); `sub_key` / `obj_key` mark the endpoint
/// columns of a relation's derived signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgRole {
    Key,
    Id,
    Name,
    SubKey,
    ObjKey,
    Attr,
}

impl ArgRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ArgRole::Key => "key",
            ArgRole::Id => "id",
            ArgRole::Name => "name",
            ArgRole::SubKey => "sub_key",
            ArgRole::ObjKey => "obj_key",
            ArgRole::Attr => "attr",
        }
    }
}

/// Declarative reconciliation policy for duplicate records. Never executed
/// here; `KeepAll` only makes records carry a `record_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    Max,
    #[default]
    Latest,
    NoisyOr,
    Overwrite,
    KeepAll,
}

impl MergePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergePolicy::Max => "max",
            MergePolicy::Latest => "latest",
            MergePolicy::NoisyOr => "noisy_or",
            MergePolicy::Overwrite => "overwrite",
            MergePolicy::KeepAll => "keep_all",
        }
    }
}

impl FromStr for MergePolicy {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(MergePolicy::Max),
            "latest" => Ok(MergePolicy::Latest),
            "noisy_or" => Ok(MergePolicy::NoisyOr),
            "overwrite" => Ok(MergePolicy::Overwrite),
            "keep_all" => Ok(MergePolicy::KeepAll),
            _ => Err(SchemaError::InvalidMergePolicy(s.to_string())),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Argument descriptors
// ============================================================================

/// Unresolved argument description, as written by a caller.
///
/// Name and datatype are optional here; [`resolve_signature`] fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: Option<String>,
    pub datatype: Option<String>,
    pub role: Option<ArgRole>,
    pub namespace: Option<String>,
}

impl ArgSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn typed(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            datatype: Some(datatype.into()),
            ..Self::default()
        }
    }

    /// A string-typed argument tagged with the `key` role.
    pub fn key(name: impl Into<String>) -> Self {
        Self::named(name).with_role(ArgRole::Key)
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    pub fn with_role(mut self, role: ArgRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Parse the shorthand forms:
    ///
    /// - `"Name:type"` names the argument and sets its datatype
    /// - `"int"` (a known datatype token) sets only the datatype
    /// - `"Name"` (anything else) sets only the name
    pub fn parse(spec: &str) -> Result<Self, SchemaError> {
        let text = spec.trim();
        if text.is_empty() {
            return Err(SchemaError::InvalidArgSpec {
                spec: spec.to_string(),
                reason: "empty".to_string(),
            });
        }
        if let Some((name, datatype)) = text.split_once(':') {
            let (name, datatype) = (name.trim(), datatype.trim());
            if name.is_empty() || datatype.is_empty() {
                return Err(SchemaError::InvalidArgSpec {
                    spec: spec.to_string(),
                    reason: "expected `Name:type`".to_string(),
                });
            }
            return Ok(Self::typed(name, datatype));
        }
        if is_known_datatype(text) {
            return Ok(Self {
                datatype: Some(text.to_string()),
                ..Self::default()
            });
        }
        Ok(Self::named(text))
    }

    /// Attach an explicit name; fails when the spec already carries a different one.
    pub fn with_explicit_name(mut self, name: &str) -> Result<Self, SchemaError> {
        match &self.name {
            Some(existing) if existing != name => Err(SchemaError::AmbiguousArgName {
                spec: existing.clone(),
                name: name.to_string(),
            }),
            _ => {
                self.name = Some(name.to_string());
                Ok(self)
            }
        }
    }

    pub fn from_payload(payload: &ArgPayload) -> Result<Self, SchemaError> {
        let mut spec = match &payload.spec {
            Some(text) => Self::parse(text)?,
            None => Self::default(),
        };
        if let Some(name) = &payload.arg_name {
            spec = spec.with_explicit_name(name)?;
        }
        if let Some(datatype) = &payload.datatype {
            match &spec.datatype {
                Some(existing) if normalize_datatype(existing) != normalize_datatype(datatype) => {
                    return Err(SchemaError::InvalidArgSpec {
                        spec: payload.spec.clone().unwrap_or_default(),
                        reason: format!("conflicting datatype `{datatype}`"),
                    });
                }
                _ => spec.datatype = Some(datatype.clone()),
            }
        }
        spec.role = payload.role;
        spec.namespace = payload.namespace.clone();
        Ok(spec)
    }
}

/// A resolved argument: name and datatype are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: String,
    pub datatype: String,
    pub role: Option<ArgRole>,
    pub namespace: Option<String>,
}

impl Arg {
    pub fn is_key_like(&self) -> bool {
        matches!(
            self.role,
            Some(ArgRole::Key | ArgRole::Id | ArgRole::Name | ArgRole::SubKey | ArgRole::ObjKey)
        )
    }

    fn canonical(&self) -> serde_json::Value {
        json!({
            "arg_name": self.name,
            "datatype": self.datatype,
            "role": self.role.map(ArgRole::as_str),
            "namespace": self.namespace,
        })
    }

    pub fn to_payload(&self) -> ArgPayload {
        ArgPayload {
            datatype: Some(self.datatype.clone()),
            role: self.role,
            namespace: self.namespace.clone(),
            arg_name: Some(self.name.clone()),
            spec: None,
        }
    }
}

/// Resolve names and datatypes of a signature.
///
/// Explicit names must be unique. Unnamed arguments become `Arg{position}`
/// (1-based), suffixed `_2`, `_3`, ... until free.
pub fn resolve_signature(predicate: &str, specs: &[ArgSpec]) -> Result<Vec<Arg>, SchemaError> {
    let mut taken = BTreeSet::new();
    for spec in specs {
        if let Some(name) = &spec.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(SchemaError::EmptyName {
                    what: "argument name",
                });
            }
            if !taken.insert(name.to_string()) {
                return Err(SchemaError::DuplicateArgName {
                    predicate: predicate.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    let mut signature = Vec::with_capacity(specs.len());
    for (idx, spec) in specs.iter().enumerate() {
        let name = match &spec.name {
            Some(name) => name.trim().to_string(),
            None => {
                let base = format!("Arg{}", idx + 1);
                let mut candidate = base.clone();
                let mut suffix = 2;
                while taken.contains(&candidate) {
                    candidate = format!("{base}_{suffix}");
                    suffix += 1;
                }
                taken.insert(candidate.clone());
                candidate
            }
        };
        let datatype = spec
            .datatype
            .as_deref()
            .map(normalize_datatype)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DATATYPE.to_string());
        let namespace = spec
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        signature.push(Arg {
            name,
            datatype,
            role: spec.role,
            namespace,
        });
    }
    Ok(signature)
}

/// Key fields by role precedence `key > id > name > first position`.
fn derive_key_fields(signature: &[Arg]) -> Vec<String> {
    for role in [ArgRole::Key, ArgRole::Id, ArgRole::Name] {
        let fields: Vec<String> = signature
            .iter()
            .filter(|a| a.role == Some(role))
            .map(|a| a.name.clone())
            .collect();
        if !fields.is_empty() {
            return fields;
        }
    }
    signature.first().map(|a| vec![a.name.clone()]).unwrap_or_default()
}

fn check_fields_exist(predicate: &str, signature: &[Arg], fields: &[String]) -> Result<(), SchemaError> {
    for field in fields {
        if !signature.iter().any(|a| &a.name == field) {
            return Err(SchemaError::UnknownKeyField {
                predicate: predicate.to_string(),
                field: field.clone(),
            });
        }
    }
    Ok(())
}

fn checked_name(name: &str) -> Result<String, SchemaError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SchemaError::EmptyName {
            what: "predicate name",
        });
    }
    Ok(name.to_string())
}

// ============================================================================
// Entity schema
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FactSchema {
    name: String,
    signature: Vec<Arg>,
    key_fields: Vec<String>,
    description: Option<String>,
    merge_policy: MergePolicy,
    schema_id: String,
}

impl FactSchema {
    fn build(
        name: &str,
        specs: &[ArgSpec],
        description: Option<String>,
        merge_policy: MergePolicy,
        key_fields: Option<Vec<String>>,
    ) -> Result<Self, SchemaError> {
        let name = checked_name(name)?;
        let signature = resolve_signature(&name, specs)?;
        let key_fields = match key_fields {
            Some(fields) if !fields.is_empty() => {
                check_fields_exist(&name, &signature, &fields)?;
                fields
            }
            _ => derive_key_fields(&signature),
        };
        let schema_id = fact_schema_id(&name, &signature, &key_fields);
        Ok(Self {
            name,
            signature,
            key_fields,
            description,
            merge_policy,
            schema_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &[Arg] {
        &self.signature
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn arg(&self, name: &str) -> Option<&Arg> {
        self.signature.iter().find(|a| a.name == name)
    }
}

fn fact_schema_id(name: &str, signature: &[Arg], key_fields: &[String]) -> String {
    digest_json(&json!({
        "kind": "fact",
        "name": name,
        "signature": signature.iter().map(Arg::canonical).collect::<Vec<_>>(),
        "key_fields": key_fields,
    }))
}

// ============================================================================
// Relation schema
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RelSchema {
    name: String,
    sub: Box<FactSchema>,
    obj: Box<FactSchema>,
    sub_key_fields: Vec<String>,
    obj_key_fields: Vec<String>,
    props: Vec<Arg>,
    signature: Vec<Arg>,
    key_fields: Vec<String>,
    description: Option<String>,
    merge_policy: MergePolicy,
    schema_id: String,
}

pub const SUB_PREFIX: &str = "sub_";
pub const OBJ_PREFIX: &str = "obj_";

impl RelSchema {
    #[allow(clippy::too_many_arguments)]
    fn build(
        name: &str,
        sub: &PredicateSchema,
        obj: &PredicateSchema,
        prop_specs: &[ArgSpec],
        endpoints: Option<(Vec<String>, Vec<String>)>,
        description: Option<String>,
        merge_policy: MergePolicy,
    ) -> Result<Self, SchemaError> {
        let name = checked_name(name)?;
        let sub = endpoint_fact(&name, "sub", sub)?;
        let obj = endpoint_fact(&name, "obj", obj)?;

        let (mut sub_key_fields, mut obj_key_fields) = endpoints.unwrap_or_default();
        if sub_key_fields.is_empty() {
            sub_key_fields = sub.key_fields.clone();
        }
        if obj_key_fields.is_empty() {
            obj_key_fields = obj.key_fields.clone();
        }
        check_fields_exist(&sub.name, &sub.signature, &sub_key_fields)?;
        check_fields_exist(&obj.name, &obj.signature, &obj_key_fields)?;

        let props = resolve_signature(&name, prop_specs)?;
        let mut signature = Vec::with_capacity(sub_key_fields.len() + obj_key_fields.len() + props.len());
        signature.extend(endpoint_args(&sub, &sub_key_fields, SUB_PREFIX, ArgRole::SubKey));
        signature.extend(endpoint_args(&obj, &obj_key_fields, OBJ_PREFIX, ArgRole::ObjKey));
        let key_fields: Vec<String> = signature.iter().map(|a| a.name.clone()).collect();
        signature.extend(props.iter().cloned());

        let mut seen = BTreeSet::new();
        for arg in &signature {
            if !seen.insert(arg.name.as_str()) {
                return Err(SchemaError::DuplicateArgName {
                    predicate: name.clone(),
                    name: arg.name.clone(),
                });
            }
        }

        let schema_id = rel_schema_id(&name, &sub, &obj, &sub_key_fields, &obj_key_fields, &props);
        Ok(Self {
            name,
            sub: Box::new(sub),
            obj: Box::new(obj),
            sub_key_fields,
            obj_key_fields,
            props,
            signature,
            key_fields,
            description,
            merge_policy,
            schema_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn sub(&self) -> &FactSchema {
        &self.sub
    }

    pub fn obj(&self) -> &FactSchema {
        &self.obj
    }

    /// Key field names on the subject endpoint, unprefixed.
    pub fn sub_key_fields(&self) -> &[String] {
        &self.sub_key_fields
    }

    pub fn obj_key_fields(&self) -> &[String] {
        &self.obj_key_fields
    }

    pub fn props(&self) -> &[Arg] {
        &self.props
    }
}

fn endpoint_fact(relation: &str, endpoint: &'static str, schema: &PredicateSchema) -> Result<FactSchema, SchemaError> {
    match schema {
        PredicateSchema::Fact(fact) => Ok(fact.clone()),
        PredicateSchema::Rel(rel) => Err(SchemaError::EndpointNotEntity {
            relation: relation.to_string(),
            endpoint,
            found: rel.name.clone(),
        }),
    }
}

fn endpoint_args<'a>(
    endpoint: &'a FactSchema,
    keys: &'a [String],
    prefix: &'a str,
    role: ArgRole,
) -> impl Iterator<Item = Arg> + 'a {
    keys.iter().filter_map(move |key| {
        endpoint.arg(key).map(|arg| Arg {
            name: format!("{prefix}{key}"),
            datatype: arg.datatype.clone(),
            role: Some(role),
            namespace: arg.namespace.clone(),
        })
    })
}

fn rel_schema_id(
    name: &str,
    sub: &FactSchema,
    obj: &FactSchema,
    sub_key_fields: &[String],
    obj_key_fields: &[String],
    props: &[Arg],
) -> String {
    digest_json(&json!({
        "kind": "rel",
        "name": name,
        "sub_schema_id": sub.schema_id,
        "obj_schema_id": obj.schema_id,
        "endpoints": {
            "sub_key_fields": sub_key_fields,
            "obj_key_fields": obj_key_fields,
        },
        "props": props.iter().map(Arg::canonical).collect::<Vec<_>>(),
    }))
}

// ============================================================================
// PredicateSchema
// ============================================================================

/// A predicate schema of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateSchema {
    Fact(FactSchema),
    Rel(RelSchema),
}

impl PredicateSchema {
    /// Start building an entity predicate.
    pub fn fact(name: impl Into<String>) -> FactBuilder {
        FactBuilder {
            name: name.into(),
            args: Vec::new(),
            description: None,
            merge_policy: MergePolicy::default(),
            key_fields: None,
        }
    }

    /// Start building a relation predicate between two entity predicates.
    pub fn rel(name: impl Into<String>, sub: &PredicateSchema, obj: &PredicateSchema) -> RelBuilder {
        RelBuilder {
            name: name.into(),
            sub: sub.clone(),
            obj: obj.clone(),
            props: Vec::new(),
            endpoints: None,
            description: None,
            merge_policy: MergePolicy::default(),
        }
    }

    pub fn kind(&self) -> PredicateKind {
        match self {
            PredicateSchema::Fact(_) => PredicateKind::Fact,
            PredicateSchema::Rel(_) => PredicateKind::Rel,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PredicateSchema::Fact(f) => &f.name,
            PredicateSchema::Rel(r) => &r.name,
        }
    }

    pub fn schema_id(&self) -> &str {
        match self {
            PredicateSchema::Fact(f) => &f.schema_id,
            PredicateSchema::Rel(r) => &r.schema_id,
        }
    }

    /// Effective signature; for relations this is the derived one.
    pub fn signature(&self) -> &[Arg] {
        match self {
            PredicateSchema::Fact(f) => &f.signature,
            PredicateSchema::Rel(r) => &r.signature,
        }
    }

    pub fn arity(&self) -> usize {
        self.signature().len()
    }

    /// Key fields in signature naming; relation keys carry their endpoint prefix.
    pub fn key_fields(&self) -> &[String] {
        match self {
            PredicateSchema::Fact(f) => &f.key_fields,
            PredicateSchema::Rel(r) => &r.key_fields,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            PredicateSchema::Fact(f) => f.description.as_deref(),
            PredicateSchema::Rel(r) => r.description.as_deref(),
        }
    }

    pub fn merge_policy(&self) -> MergePolicy {
        match self {
            PredicateSchema::Fact(f) => f.merge_policy,
            PredicateSchema::Rel(r) => r.merge_policy,
        }
    }

    pub fn as_fact(&self) -> Option<&FactSchema> {
        match self {
            PredicateSchema::Fact(f) => Some(f),
            PredicateSchema::Rel(_) => None,
        }
    }

    pub fn as_rel(&self) -> Option<&RelSchema> {
        match self {
            PredicateSchema::Rel(r) => Some(r),
            PredicateSchema::Fact(_) => None,
        }
    }

    pub fn arg(&self, name: &str) -> Option<&Arg> {
        self.signature().iter().find(|a| a.name == name)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.signature().iter().position(|a| a.name == name)
    }

    // ------------------------------------------------------------------------
    // Payloads
    // ------------------------------------------------------------------------

    pub fn to_payload(&self) -> PredicatePayload {
        match self {
            PredicateSchema::Fact(f) => PredicatePayload::Fact(FactPayload {
                name: f.name.clone(),
                arity: Some(f.signature.len()),
                schema_id: Some(f.schema_id.clone()),
                description: f.description.clone(),
                merge_policy: f.merge_policy,
                signature: f.signature.iter().map(Arg::to_payload).collect(),
                key_fields: f.key_fields.clone(),
            }),
            PredicateSchema::Rel(r) => {
                let name_of = |args: &[Arg]| args.iter().map(|a| a.name.clone()).collect::<Vec<_>>();
                let n_sub = r.sub_key_fields.len();
                let n_obj = r.obj_key_fields.len();
                PredicatePayload::Rel(RelPayload {
                    name: r.name.clone(),
                    arity: Some(r.signature.len()),
                    schema_id: Some(r.schema_id.clone()),
                    description: r.description.clone(),
                    merge_policy: r.merge_policy,
                    sub_schema_id: r.sub.schema_id.clone(),
                    obj_schema_id: r.obj.schema_id.clone(),
                    endpoints: EndpointsPayload {
                        sub_key_fields: r.sub_key_fields.clone(),
                        obj_key_fields: r.obj_key_fields.clone(),
                    },
                    props: r.props.iter().map(Arg::to_payload).collect(),
                    signature: r.signature.iter().map(Arg::to_payload).collect(),
                    key_fields: r.key_fields.clone(),
                    derived_signature: Some(DerivedSignature {
                        sub_args: name_of(&r.signature[..n_sub]),
                        obj_args: name_of(&r.signature[n_sub..n_sub + n_obj]),
                        prop_args: name_of(&r.props),
                    }),
                })
            }
        }
    }

    /// Rebuild a schema from its payload, recomputing the identifier.
    ///
    /// `lookup` resolves relation endpoint ids; a declared `schema_id` or
    /// `arity` that disagrees with the recomputed one fails the load.
    pub fn from_payload(
        payload: &PredicatePayload,
        lookup: &dyn Fn(&str) -> Option<PredicateSchema>,
    ) -> Result<Self, SchemaError> {
        let schema = match payload {
            PredicatePayload::Fact(p) => {
                let specs = p
                    .signature
                    .iter()
                    .map(ArgSpec::from_payload)
                    .collect::<Result<Vec<_>, _>>()?;
                let key_fields = (!p.key_fields.is_empty()).then(|| p.key_fields.clone());
                PredicateSchema::Fact(FactSchema::build(
                    &p.name,
                    &specs,
                    p.description.clone(),
                    p.merge_policy,
                    key_fields,
                )?)
            }
            PredicatePayload::Rel(p) => {
                let resolve = |id: &str| {
                    lookup(id).ok_or_else(|| SchemaError::UnresolvedEndpoint {
                        relation: p.name.clone(),
                        schema_id: id.to_string(),
                    })
                };
                let sub = resolve(&p.sub_schema_id)?;
                let obj = resolve(&p.obj_schema_id)?;
                let props = p
                    .props
                    .iter()
                    .map(ArgSpec::from_payload)
                    .collect::<Result<Vec<_>, _>>()?;
                let endpoints = (
                    p.endpoints.sub_key_fields.clone(),
                    p.endpoints.obj_key_fields.clone(),
                );
                PredicateSchema::Rel(RelSchema::build(
                    &p.name,
                    &sub,
                    &obj,
                    &props,
                    Some(endpoints),
                    p.description.clone(),
                    p.merge_policy,
                )?)
            }
        };

        if let Some(declared) = payload.schema_id() {
            if declared != schema.schema_id() {
                return Err(SchemaError::IdentifierMismatch {
                    name: schema.name().to_string(),
                    declared: declared.to_string(),
                    computed: schema.schema_id().to_string(),
                });
            }
        }
        if let Some(declared) = payload.arity() {
            if declared != schema.arity() {
                return Err(SchemaError::ArityDeclarationMismatch {
                    name: schema.name().to_string(),
                    declared,
                    computed: schema.arity(),
                });
            }
        }
        Ok(schema)
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builder argument: a structured [`ArgSpec`] or a shorthand string.
pub enum ArgInput {
    Spec(ArgSpec),
    Shorthand(String),
}

impl From<ArgSpec> for ArgInput {
    fn from(spec: ArgSpec) -> Self {
        ArgInput::Spec(spec)
    }
}

impl From<&str> for ArgInput {
    fn from(text: &str) -> Self {
        ArgInput::Shorthand(text.to_string())
    }
}

impl From<String> for ArgInput {
    fn from(text: String) -> Self {
        ArgInput::Shorthand(text)
    }
}

fn parse_inputs(inputs: Vec<ArgInput>) -> Result<Vec<ArgSpec>, SchemaError> {
    inputs
        .into_iter()
        .map(|input| match input {
            ArgInput::Spec(spec) => Ok(spec),
            ArgInput::Shorthand(text) => ArgSpec::parse(&text),
        })
        .collect()
}

pub struct FactBuilder {
    name: String,
    args: Vec<ArgInput>,
    description: Option<String>,
    merge_policy: MergePolicy,
    key_fields: Option<Vec<String>>,
}

impl FactBuilder {
    /// Append an argument, either an [`ArgSpec`] or a shorthand string.
    pub fn arg(mut self, arg: impl Into<ArgInput>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.args.extend(args.into_iter().map(ArgInput::Spec));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Override role-derived key fields; each must name a signature argument.
    pub fn key_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<PredicateSchema, SchemaError> {
        let specs = parse_inputs(self.args)?;
        Ok(PredicateSchema::Fact(FactSchema::build(
            &self.name,
            &specs,
            self.description,
            self.merge_policy,
            self.key_fields,
        )?))
    }
}

pub struct RelBuilder {
    name: String,
    sub: PredicateSchema,
    obj: PredicateSchema,
    props: Vec<ArgInput>,
    endpoints: Option<(Vec<String>, Vec<String>)>,
    description: Option<String>,
    merge_policy: MergePolicy,
}

impl RelBuilder {
    pub fn prop(mut self, prop: impl Into<ArgInput>) -> Self {
        self.props.push(prop.into());
        self
    }

    pub fn props(mut self, props: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.props.extend(props.into_iter().map(ArgInput::Spec));
        self
    }

    /// Override which endpoint fields identify each side; an empty list keeps
    /// that endpoint's own key fields.
    pub fn endpoints<I, S>(mut self, sub_key_fields: I, obj_key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some((
            sub_key_fields.into_iter().map(Into::into).collect(),
            obj_key_fields.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn build(self) -> Result<PredicateSchema, SchemaError> {
        let props = parse_inputs(self.props)?;
        Ok(PredicateSchema::Rel(RelSchema::build(
            &self.name,
            &self.sub,
            &self.obj,
            &props,
            self.endpoints,
            self.description,
            self.merge_policy,
        )?))
    }
}

// ============================================================================
// Payload types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArgPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ArgRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub arg_name: Option<String>,
    /// Shorthand form (`"Name:type"`), accepted on load only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicatePayload {
    Fact(FactPayload),
    Rel(RelPayload),
}

impl PredicatePayload {
    pub fn kind(&self) -> PredicateKind {
        match self {
            PredicatePayload::Fact(_) => PredicateKind::Fact,
            PredicatePayload::Rel(_) => PredicateKind::Rel,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PredicatePayload::Fact(p) => &p.name,
            PredicatePayload::Rel(p) => &p.name,
        }
    }

    pub fn schema_id(&self) -> Option<&str> {
        match self {
            PredicatePayload::Fact(p) => p.schema_id.as_deref(),
            PredicatePayload::Rel(p) => p.schema_id.as_deref(),
        }
    }

    pub fn arity(&self) -> Option<usize> {
        match self {
            PredicatePayload::Fact(p) => p.arity,
            PredicatePayload::Rel(p) => p.arity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub merge_policy: MergePolicy,
    #[serde(default)]
    pub signature: Vec<ArgPayload>,
    #[serde(default)]
    pub key_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointsPayload {
    #[serde(default)]
    pub sub_key_fields: Vec<String>,
    #[serde(default)]
    pub obj_key_fields: Vec<String>,
}

/// Descriptive breakdown of a relation's derived signature. Ignored on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSignature {
    pub sub_args: Vec<String>,
    pub obj_args: Vec<String>,
    pub prop_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub merge_policy: MergePolicy,
    pub sub_schema_id: String,
    pub obj_schema_id: String,
    #[serde(default)]
    pub endpoints: EndpointsPayload,
    #[serde(default)]
    pub props: Vec<ArgPayload>,
    /// Derived, descriptive only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<ArgPayload>,
    /// Derived, descriptive only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_signature: Option<DerivedSignature>,
}
