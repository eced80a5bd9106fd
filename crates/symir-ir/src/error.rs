//! Structural errors raised while building schemas, records and IR literals.
//!
//! Every variant names the offending predicate / field / position so callers
//! can point at the violation without re-deriving context.

use thiserror::Error;

use crate::schema::PredicateKind;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid argument spec `{spec}`: {reason}")]
    InvalidArgSpec { spec: String, reason: String },

    #[error("argument spec `{spec}` already names the argument; conflicting explicit name `{name}`")]
    AmbiguousArgName { spec: String, name: String },

    #[error("predicate `{predicate}` declares argument `{name}` more than once")]
    DuplicateArgName { predicate: String, name: String },

    #[error("{what} must be a non-empty string")]
    EmptyName { what: &'static str },

    #[error("unknown merge policy `{0}` (expected max|latest|noisy_or|overwrite|keep_all)")]
    InvalidMergePolicy(String),

    #[error("relation `{relation}`: {endpoint} endpoint `{found}` is not an entity predicate")]
    EndpointNotEntity {
        relation: String,
        endpoint: &'static str,
        found: String,
    },

    #[error("predicate `{predicate}`: key field `{field}` is not in the signature")]
    UnknownKeyField { predicate: String, field: String },

    #[error("predicate `{name}`: declared schema_id {declared} does not match recomputed {computed}")]
    IdentifierMismatch {
        name: String,
        declared: String,
        computed: String,
    },

    #[error("predicate `{name}`: declared arity {declared} does not match signature length {computed}")]
    ArityDeclarationMismatch {
        name: String,
        declared: usize,
        computed: usize,
    },

    #[error("duplicate predicate schema_id {schema_id} (`{name}`)")]
    DuplicateIdentifier { schema_id: String, name: String },

    #[error("relation `{relation}`: endpoint schema_id {schema_id} is not registered in the same batch")]
    UnresolvedEndpoint { relation: String, schema_id: String },

    #[error("unknown predicate schema_id: {0}")]
    UnknownSchemaId(String),

    #[error("no {kind} predicate named `{name}`")]
    UnknownPredicate { kind: PredicateKind, name: String },

    #[error("{count} {kind} predicates are named `{name}`; look it up by schema_id instead")]
    AmbiguousPredicate {
        kind: PredicateKind,
        name: String,
        count: usize,
    },

    #[error("no relation `{name}` between {sub_schema_id} and {obj_schema_id}")]
    UnknownRelationTriple {
        name: String,
        sub_schema_id: String,
        obj_schema_id: String,
    },

    #[error("predicate schema_id {0} is not present in the parent registry")]
    NotInParent(String),

    #[error("predicate schema_id {0} is outside this view")]
    NotInView(String),

    #[error("unsupported registry payload version {0}")]
    UnsupportedVersion(u32),

    #[error("predicate `{predicate}`: expected {expected} terms, got {found}")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        found: usize,
    },

    #[error("predicate `{predicate}` argument {position}: constant datatype `{found}` does not match `{expected}`")]
    DatatypeMismatch {
        predicate: String,
        position: usize,
        expected: String,
        found: String,
    },

    #[error("predicate `{predicate}` field `{field}`: value {value} is not a valid `{datatype}`")]
    ValueTypeMismatch {
        predicate: String,
        field: String,
        datatype: String,
        value: String,
    },

    #[error("{context}: probability {value} is outside [0.0, 1.0]")]
    ProbabilityOutOfRange { context: String, value: f64 },

    #[error("unknown meta keys: {0:?}")]
    UnknownMetaKeys(Vec<String>),

    #[error("meta.{key}: {reason}")]
    InvalidMeta { key: String, reason: String },

    #[error("predicate `{predicate}`: missing key fields {fields:?}")]
    MissingKeyFields {
        predicate: String,
        fields: Vec<String>,
    },

    #[error("relation `{predicate}`: {endpoint} endpoint missing key fields {fields:?}")]
    MissingEndpointKeyFields {
        predicate: String,
        endpoint: &'static str,
        fields: Vec<String>,
    },

    #[error("predicate `{predicate}`: unknown props {props:?}")]
    UnknownProps {
        predicate: String,
        props: Vec<String>,
    },

    #[error("relation `{predicate}`: missing props {props:?}")]
    MissingProps {
        predicate: String,
        props: Vec<String>,
    },

    #[error("relation `{predicate}`: props duplicated across inline and nested forms {props:?}")]
    DuplicateProps {
        predicate: String,
        props: Vec<String>,
    },

    #[error("relation `{predicate}`: key `{key}` matches both endpoints; prefix it with sub_ or obj_")]
    AmbiguousEndpointKey { predicate: String, key: String },

    #[error("relation `{predicate}`: {endpoint} endpoint {reason}")]
    InvalidEndpoint {
        predicate: String,
        endpoint: &'static str,
        reason: String,
    },

    #[error("relation `{predicate}`: heuristic resolution needs exactly one key field per endpoint")]
    HeuristicUnavailable { predicate: String },

    #[error("predicate `{predicate}`: {reason}")]
    InvalidTerms { predicate: String, reason: String },

    #[error("schema_id {schema_id}: record kind `{found}` does not match schema kind `{expected}`")]
    KindMismatch {
        schema_id: String,
        expected: PredicateKind,
        found: PredicateKind,
    },

    #[error("record for {schema_id}: declared {field} {declared} does not match recomputed {computed}")]
    RecordIdentityMismatch {
        schema_id: String,
        field: &'static str,
        declared: String,
        computed: String,
    },

    #[error("record for {schema_id}: missing {field}")]
    MissingIdentity {
        schema_id: String,
        field: &'static str,
    },

    #[error("record for {schema_id}: record_id is only carried by keep_all schemas")]
    UnexpectedRecordId { schema_id: String },

    #[error("relation record for {schema_id} has no endpoint key values in memory; it was restored from a canonical payload")]
    EndpointKeysUnavailable { schema_id: String },

    #[error("record schema_id {record} does not match schema {schema}")]
    SchemaMismatch { record: String, schema: String },

    #[error("invalid term: {0}")]
    InvalidTerm(String),

    #[error("query needs either a predicate schema or a predicate id")]
    InvalidQuery,

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures surfaced by data providers (collaborators producing records).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("provider backend failure: {0}")]
    Backend(String),
}
