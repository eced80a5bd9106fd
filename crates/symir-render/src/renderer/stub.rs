use symir_ir::{Instance, Query, Rule};

use super::{RenderContext, Renderer, CYPHER, DATALOG};
use crate::error::RenderError;

/// A declared dialect without an implementation. Every call fails with
/// [`RenderError::UnsupportedDialect`], including empty programs.
#[derive(Debug, Clone, Copy)]
pub struct StubRenderer {
    dialect: &'static str,
}

impl StubRenderer {
    pub fn datalog() -> Self {
        Self { dialect: DATALOG }
    }

    pub fn cypher() -> Self {
        Self { dialect: CYPHER }
    }

    fn unsupported(&self) -> RenderError {
        RenderError::UnsupportedDialect {
            dialect: self.dialect.to_string(),
        }
    }
}

impl Renderer for StubRenderer {
    fn name(&self) -> &str {
        self.dialect
    }

    fn render_rule(&self, _rule: &Rule, _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Err(self.unsupported())
    }

    fn render_facts(&self, _records: &[Instance], _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Err(self.unsupported())
    }

    fn render_query(&self, _query: &Query, _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Err(self.unsupported())
    }

    fn render_queries(&self, _queries: &[Query], _ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        Err(self.unsupported())
    }

    fn render_program(
        &self,
        _facts: &[Instance],
        _rules: &[Rule],
        _queries: &[Query],
        _ctx: &RenderContext<'_>,
    ) -> Result<String, RenderError> {
        Err(self.unsupported())
    }
}
