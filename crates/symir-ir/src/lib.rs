//! Symir IR: a serializable intermediate representation for logic-program
//! facts and rules.
//!
//! Layers, leaves first:
//!
//! - `schema`: argument descriptors and entity / relation predicate schemas
//!   with content-derived `schema_id`s
//! - `registry`: immutable schema registry, restricted views and the shared
//!   [`SchemaSource`] lookup trait (`filter` selects predicates for views)
//! - `instance`: canonical records with derived entity / record identities
//! - `expr` and `rule`: terms, expressions, literals, conditions, rules, queries
//! - `provider`: the data-provider collaborator interface
//!
//! Everything here is synchronous and immutable once built; lowering rules to
//! concrete dialects lives in `symir-render`.

pub mod digest;
pub mod error;
pub mod expr;
pub mod filter;
pub mod instance;
pub mod meta;
pub mod provider;
pub mod registry;
pub mod rule;
pub mod schema;
pub mod value;

pub use error::{ProviderError, SchemaError};
pub use expr::{Const, Expr, Ref, Term, Var};
pub use filter::{PredMatch, PredicateFilter};
pub use instance::{
    field_map, Endpoint, FieldMap, Identity, Instance, InstanceOptions, InstancePayload, InstanceRef, InstanceTerms,
    RelProps, ResolveMode,
};
pub use meta::{Meta, RecordStatus};
pub use provider::{DataProvider, MemoryProvider};
pub use registry::{RegistryPayload, SchemaRegistry, SchemaSource, SchemaView};
pub use rule::{Cond, Literal, Query, QueryTarget, RelBinding, Rule, RulePayload, RuleRenderConfig, VarMode};
pub use schema::{
    Arg, ArgRole, ArgSpec, MergePolicy, PredicateKind, PredicatePayload, PredicateSchema,
};
pub use value::Value;
