//! Renderer registration and the validate-then-render pipeline.

use std::collections::BTreeMap;

use symir_ir::{Instance, Query, Rule, SchemaView};
use tracing::debug;

use crate::error::{PipelineError, RenderError};
use crate::renderer::{ProbLogRenderer, PrologRenderer, RenderContext, Renderer, StubRenderer};
use crate::validator::RuleValidator;

/// Dialect name -> renderer.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: BTreeMap<String, Box<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// ProbLog and Prolog, plus the Datalog and Cypher stubs.
    pub fn standard() -> Self {
        let renderers: [Box<dyn Renderer>; 4] = [
            Box::new(ProbLogRenderer),
            Box::new(PrologRenderer),
            Box::new(StubRenderer::datalog()),
            Box::new(StubRenderer::cypher()),
        ];
        Self {
            renderers: renderers
                .into_iter()
                .map(|r| (r.name().to_string(), r))
                .collect(),
        }
    }

    pub fn register(&mut self, renderer: Box<dyn Renderer>) -> Result<(), RenderError> {
        let name = renderer.name().to_string();
        if self.renderers.contains_key(&name) {
            return Err(RenderError::DuplicateDialect(name));
        }
        self.renderers.insert(name, renderer);
        Ok(())
    }

    pub fn get(&self, dialect: &str) -> Result<&dyn Renderer, RenderError> {
        self.renderers
            .get(dialect)
            .map(|r| &**r)
            .ok_or_else(|| RenderError::UnknownDialect(dialect.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A renderer resolved once by dialect name, fronted by the validator.
pub struct RenderPipeline<'r> {
    renderer: &'r dyn Renderer,
}

impl<'r> RenderPipeline<'r> {
    /// Unknown names fail here, before any rule is seen.
    pub fn new(registry: &'r RendererRegistry, dialect: &str) -> Result<Self, RenderError> {
        Ok(Self {
            renderer: registry.get(dialect)?,
        })
    }

    pub fn dialect(&self) -> &str {
        self.renderer.name()
    }

    pub fn compile(&self, rule: &Rule, view: &SchemaView, ctx: &RenderContext<'_>) -> Result<String, PipelineError> {
        RuleValidator::new(view).with_library(ctx.library).validate(rule)?;
        let text = self.renderer.render_rule(rule, ctx)?;
        debug!(dialect = self.dialect(), rule = rule.head.name(), "rule compiled");
        Ok(text)
    }

    /// Validate every rule, then render facts, rules and queries as one program.
    pub fn compile_program(
        &self,
        facts: &[Instance],
        rules: &[Rule],
        queries: &[Query],
        view: &SchemaView,
        ctx: &RenderContext<'_>,
    ) -> Result<String, PipelineError> {
        let validator = RuleValidator::new(view).with_library(ctx.library);
        for rule in rules {
            validator.validate(rule)?;
        }
        Ok(self.renderer.render_program(facts, rules, queries, ctx)?)
    }

    pub fn render_facts(&self, facts: &[Instance], ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        self.renderer.render_facts(facts, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{DATALOG, PROBLOG};
    use crate::ValidationError;
    use symir_ir::{ArgSpec, Cond, PredicateSchema, Ref, SchemaRegistry, Term};

    fn setup() -> (SchemaRegistry, PredicateSchema, PredicateSchema) {
        let person = PredicateSchema::fact("person").arg(ArgSpec::key("X")).build().unwrap();
        let resident = PredicateSchema::fact("resident").arg(ArgSpec::key("X")).build().unwrap();
        let registry = SchemaRegistry::new([person.clone(), resident.clone()]).unwrap();
        (registry, person, resident)
    }

    #[test]
    fn unknown_and_unsupported_dialects_are_distinct() {
        let renderers = RendererRegistry::standard();
        assert!(matches!(
            RenderPipeline::new(&renderers, "souffle"),
            Err(RenderError::UnknownDialect(_))
        ));

        let (registry, person, resident) = setup();
        let body = Ref::new(&person, vec![Term::var("X")]).unwrap();
        let rule = Rule::new(resident, vec![Cond::new(vec![body.into()])]);
        let ctx = RenderContext::new(&registry);
        let pipeline = RenderPipeline::new(&renderers, DATALOG).unwrap();
        let err = pipeline.compile(&rule, &registry.full_view(), &ctx).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Render(RenderError::UnsupportedDialect { .. })
        ));
    }

    #[test]
    fn validation_runs_before_rendering() {
        let renderers = RendererRegistry::standard();
        let (registry, person, resident) = setup();
        let body = Ref::new(&person, vec![Term::var("X")]).unwrap();
        let rule = Rule::new(resident.clone(), vec![Cond::new(vec![body.into()])]);
        let ctx = RenderContext::new(&registry);
        let narrow = registry.view_of(&[&resident]).unwrap();
        let err = RenderPipeline::new(&renderers, PROBLOG)
            .unwrap()
            .compile(&rule, &narrow, &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::OutOfScope { .. })
        ));
    }

    #[test]
    fn custom_renderers_register_once() {
        let mut renderers = RendererRegistry::standard();
        assert!(matches!(
            renderers.register(Box::new(PrologRenderer)),
            Err(RenderError::DuplicateDialect(_))
        ));
        let names: Vec<&str> = renderers.names().collect();
        assert_eq!(names, vec!["cypher", "datalog", "problog", "prolog"]);
    }
}
