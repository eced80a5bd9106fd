use symir_ir::{Instance, Query, Rule};
use tracing::debug;

use super::clause::{format_float, rendered_arity, ClauseWriter, IfStyle};
use super::{RenderContext, Renderer, PROBLOG};
use crate::error::RenderError;

/// ProbLog: every clause and fact carries a `p::` annotation, resolved through
/// the configured default-probability policy when the IR has none.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbLogRenderer;

impl Renderer for ProbLogRenderer {
    fn name(&self) -> &str {
        PROBLOG
    }

    fn render_rule(&self, rule: &Rule, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let writer = ClauseWriter::for_rule(ctx, PROBLOG, IfStyle::Disjunction, rule);
        let head = writer.head(&rule.head)?;
        let name = rule.head.name();
        let total = rule.conditions.len();
        let mut lines = Vec::with_capacity(total * 2);
        for (index, cond) in rule.conditions.iter().enumerate() {
            let (prob, source) = writer
                .config()
                .probability
                .resolve_rule(cond.prob, || format!("rule `{name}` condition {index}"))?;
            let body = writer.body(rule, index, cond)?;
            let prob = format_float(prob);
            if writer.config().comments {
                lines.push(format!(
                    "% {name}/{} clause {} of {total}: probability {prob} ({source})",
                    rendered_arity(&rule.head),
                    index + 1,
                ));
            }
            lines.push(format!("{prob}::{head} :- {body}."));
        }
        debug!(dialect = PROBLOG, rule = name, clauses = total, "rule rendered");
        Ok(lines.join("\n"))
    }

    fn render_facts(&self, records: &[Instance], ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let writer = ClauseWriter::new(ctx, PROBLOG, IfStyle::Disjunction);
        let lines = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let (prob, _) = ctx
                    .config
                    .probability
                    .resolve_fact(record.prob(), || format!("fact {index}"))?;
                Ok(format!("{}::{}.", format_float(prob), writer.fact_atom(record)?))
            })
            .collect::<Result<Vec<_>, RenderError>>()?;
        Ok(lines.join("\n"))
    }

    fn render_query(&self, query: &Query, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let writer = ClauseWriter::new(ctx, PROBLOG, IfStyle::Disjunction);
        Ok(format!("query({}).", writer.query_atom(query)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::probability::{MissingProbPolicy, ProbabilityConfig};
    use symir_ir::{ArgSpec, Cond, Expr, PredicateSchema, Ref, SchemaRegistry, Term};

    fn person() -> PredicateSchema {
        PredicateSchema::fact("person").arg("X:string").build().unwrap()
    }

    fn resident() -> PredicateSchema {
        PredicateSchema::fact("resident").arg("X:string").build().unwrap()
    }

    fn person_x() -> Ref {
        Ref::new(&person(), vec![Term::var("X")]).unwrap()
    }

    fn quiet() -> RenderConfig {
        RenderConfig {
            comments: false,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn clause_probability_annotates_only_its_own_clause() {
        let registry = SchemaRegistry::new([person(), resident()]).unwrap();
        let rule = Rule::new(
            resident(),
            vec![
                Cond::with_prob(vec![person_x().into()], 0.7).unwrap(),
                Cond::new(vec![person_x().negate().into()]),
            ],
        );
        let ctx = RenderContext::new(&registry).with_config(quiet());
        let text = ProbLogRenderer.render_rule(&rule, &ctx).unwrap();
        assert_eq!(
            text,
            "0.7::resident(X) :- person(X).\n1.0::resident(X) :- \\+ person(X)."
        );
    }

    #[test]
    fn comments_explain_probability_source() {
        let registry = SchemaRegistry::new([person(), resident()]).unwrap();
        let rule = Rule::new(
            resident(),
            vec![
                Cond::with_prob(vec![person_x().into()], 0.5).unwrap(),
                Cond::new(vec![person_x().into()]),
            ],
        );
        let text = ProbLogRenderer
            .render_rule(&rule, &RenderContext::new(&registry))
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "% resident/1 clause 1 of 2: probability 0.5 (declared)");
        assert_eq!(lines[2], "% resident/1 clause 2 of 2: probability 1.0 (default)");
    }

    #[test]
    fn missing_probability_follows_policy() {
        let registry = SchemaRegistry::new([person(), resident()]).unwrap();
        let rule = Rule::new(resident(), vec![Cond::new(vec![person_x().into()])]);
        let mut config = quiet();
        config.probability = ProbabilityConfig {
            default_rule_prob: 0.7,
            ..ProbabilityConfig::default()
        };
        let ctx = RenderContext::new(&registry).with_config(config.clone());
        assert_eq!(
            ProbLogRenderer.render_rule(&rule, &ctx).unwrap(),
            "0.7::resident(X) :- person(X)."
        );

        config.probability.missing_prob_policy = MissingProbPolicy::Error;
        let ctx = RenderContext::new(&registry).with_config(config);
        assert!(matches!(
            ProbLogRenderer.render_rule(&rule, &ctx),
            Err(RenderError::MissingProbability { .. })
        ));
    }

    #[test]
    fn if_expression_uses_branch_disjunction() {
        let calc = PredicateSchema::fact("calc").arg("X:int").arg("Y:int").build().unwrap();
        let registry = SchemaRegistry::new([calc.clone()]).unwrap();
        let expr = Expr::if_then_else(
            Expr::call("gt", vec![Expr::var("X"), Expr::constant(0)]),
            Expr::unify(Expr::var("Y"), Expr::call("add", vec![Expr::var("X"), Expr::constant(1)])),
            Expr::unify(Expr::var("Y"), Expr::constant(0)),
        );
        let rule = Rule::new(calc, vec![Cond::with_prob(vec![expr.into()], 0.8).unwrap()]);
        let text = ProbLogRenderer
            .render_rule(&rule, &RenderContext::new(&registry))
            .unwrap();
        assert!(text.contains("((X > 0, Y = X + 1) ; (\\+ (X > 0), Y = 0))"), "{text}");
    }

    #[test]
    fn facts_and_queries() {
        let city = PredicateSchema::fact("city").arg(ArgSpec::key("Name")).build().unwrap();
        let registry = SchemaRegistry::new([city.clone()]).unwrap();
        let ctx = RenderContext::new(&registry);
        let records = vec![
            symir_ir::Instance::with_options(
                &city,
                symir_ir::InstanceTerms::positional(["darmstadt"]),
                symir_ir::InstanceOptions {
                    prob: Some(0.9),
                    ..Default::default()
                },
            )
            .unwrap(),
            symir_ir::Instance::new(&city, symir_ir::InstanceTerms::positional(["Berlin"])).unwrap(),
        ];
        assert_eq!(
            ProbLogRenderer.render_facts(&records, &ctx).unwrap(),
            "0.9::city(darmstadt).\n1.0::city('Berlin')."
        );

        let by_schema = Query::for_schema(&city, vec![Term::var("C")]).unwrap();
        let by_id = Query::for_id(city.schema_id(), vec![Term::constant("darmstadt")]).unwrap();
        assert_eq!(
            ProbLogRenderer.render_queries(&[by_schema, by_id], &ctx).unwrap(),
            "query(city(C)).\nquery(city(darmstadt))."
        );
    }
}
