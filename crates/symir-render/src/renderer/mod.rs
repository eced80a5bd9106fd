//! Dialect renderers.
//!
//! A [`Renderer`] lowers validated rules (plus records and queries) into one
//! dialect's program text. ProbLog and Prolog share the clause lowering in
//! `clause`; Datalog and Cypher are declared slots that refuse every call.

mod clause;
mod problog;
mod prolog;
mod stub;

use symir_ir::{Instance, Query, Rule, SchemaSource};

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::library::{Library, LibraryRuntime};

pub use problog::ProbLogRenderer;
pub use prolog::PrologRenderer;
pub use stub::StubRenderer;

pub const PROBLOG: &str = "problog";
pub const PROLOG: &str = "prolog";
pub const DATALOG: &str = "datalog";
pub const CYPHER: &str = "cypher";

/// Everything a renderer may consult besides the IR itself.
#[derive(Clone)]
pub struct RenderContext<'a> {
    /// Resolves `Ref` / record / query schema ids to names and signatures.
    pub schemas: &'a dyn SchemaSource,
    pub library: Option<&'a Library>,
    pub runtime: Option<&'a LibraryRuntime>,
    pub config: RenderConfig,
}

impl<'a> RenderContext<'a> {
    pub fn new(schemas: &'a dyn SchemaSource) -> Self {
        Self {
            schemas,
            library: None,
            runtime: None,
            config: RenderConfig::default(),
        }
    }

    pub fn with_library(mut self, library: &'a Library) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_runtime(mut self, runtime: &'a LibraryRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }
}

pub trait Renderer: Send + Sync {
    /// Dialect name this renderer is registered under.
    fn name(&self) -> &str;

    /// One clause per condition.
    fn render_rule(&self, rule: &Rule, ctx: &RenderContext<'_>) -> Result<String, RenderError>;

    fn render_facts(&self, records: &[Instance], ctx: &RenderContext<'_>) -> Result<String, RenderError>;

    fn render_query(&self, query: &Query, ctx: &RenderContext<'_>) -> Result<String, RenderError>;

    fn render_queries(&self, queries: &[Query], ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let lines = queries
            .iter()
            .map(|q| self.render_query(q, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    /// Facts, then rules, then queries; non-empty sections separated by a blank line.
    fn render_program(
        &self,
        facts: &[Instance],
        rules: &[Rule],
        queries: &[Query],
        ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        let mut sections = Vec::new();
        if !facts.is_empty() {
            sections.push(self.render_facts(facts, ctx)?);
        }
        if !rules.is_empty() {
            let rendered = rules
                .iter()
                .map(|r| self.render_rule(r, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            sections.push(rendered.join("\n"));
        }
        if !queries.is_empty() {
            sections.push(self.render_queries(queries, ctx)?);
        }
        sections.retain(|s| !s.is_empty());
        Ok(sections.join("\n\n"))
    }
}
