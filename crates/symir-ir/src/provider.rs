//! Data-provider collaborator interface.
//!
//! Ingestion backends (CSV, graph stores, ...) live outside this crate; they
//! only need to produce canonical records for the predicates a view allows.

use tracing::debug;

use crate::error::ProviderError;
use crate::filter::PredicateFilter;
use crate::instance::Instance;
use crate::registry::{SchemaSource, SchemaView};

pub trait DataProvider {
    /// Records whose predicate is in `view` and, when given, matches `filter`.
    fn query(&self, view: &SchemaView, filter: Option<&PredicateFilter>) -> Result<Vec<Instance>, ProviderError>;
}

/// Holds records in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    records: Vec<Instance>,
}

impl MemoryProvider {
    pub fn new(records: impl IntoIterator<Item = Instance>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    pub fn push(&mut self, record: Instance) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DataProvider for MemoryProvider {
    fn query(&self, view: &SchemaView, filter: Option<&PredicateFilter>) -> Result<Vec<Instance>, ProviderError> {
        let mut out = Vec::new();
        for record in &self.records {
            if !view.allows(record.schema_id()) {
                continue;
            }
            let schema = view.get(record.schema_id())?;
            if filter.map_or(true, |f| f.matches(schema)) {
                out.push(record.clone());
            }
        }
        debug!(matched = out.len(), scanned = self.records.len(), "memory provider query");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceTerms;
    use crate::registry::SchemaRegistry;
    use crate::schema::{ArgSpec, PredicateSchema};

    #[test]
    fn query_respects_view_and_filter() {
        let person = PredicateSchema::fact("person").arg(ArgSpec::key("Name")).build().unwrap();
        let city = PredicateSchema::fact("city").arg(ArgSpec::key("Name")).build().unwrap();
        let registry = SchemaRegistry::new([person.clone(), city.clone()]).unwrap();
        let provider = MemoryProvider::new([
            Instance::new(&person, InstanceTerms::positional(["alice"])).unwrap(),
            Instance::new(&city, InstanceTerms::positional(["darmstadt"])).unwrap(),
            Instance::new(&person, InstanceTerms::positional(["bob"])).unwrap(),
        ]);

        let people = registry.view([person.schema_id()]).unwrap();
        assert_eq!(provider.query(&people, None).unwrap().len(), 2);

        let everything = registry.full_view();
        let only_cities = PredicateFilter::name("city");
        let found = provider.query(&everything, Some(&only_cities)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].schema_id(), city.schema_id());
    }
}
