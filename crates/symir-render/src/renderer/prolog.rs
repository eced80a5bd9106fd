use symir_ir::{Instance, Query, Rule};
use tracing::debug;

use super::clause::{ClauseWriter, IfStyle};
use super::{RenderContext, Renderer, PROLOG};
use crate::error::RenderError;

/// Plain Prolog. Probabilities are not part of the dialect and are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrologRenderer;

impl Renderer for PrologRenderer {
    fn name(&self) -> &str {
        PROLOG
    }

    fn render_rule(&self, rule: &Rule, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let writer = ClauseWriter::for_rule(ctx, PROLOG, IfStyle::Arrow, rule);
        let head = writer.head(&rule.head)?;
        let clauses = rule
            .conditions
            .iter()
            .enumerate()
            .map(|(index, cond)| Ok(format!("{head} :- {}.", writer.body(rule, index, cond)?)))
            .collect::<Result<Vec<_>, RenderError>>()?;
        debug!(dialect = PROLOG, rule = rule.head.name(), clauses = clauses.len(), "rule rendered");
        Ok(clauses.join("\n"))
    }

    fn render_facts(&self, records: &[Instance], ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let writer = ClauseWriter::new(ctx, PROLOG, IfStyle::Arrow);
        let lines = records
            .iter()
            .map(|record| Ok(format!("{}.", writer.fact_atom(record)?)))
            .collect::<Result<Vec<_>, RenderError>>()?;
        Ok(lines.join("\n"))
    }

    fn render_query(&self, query: &Query, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        let writer = ClauseWriter::new(ctx, PROLOG, IfStyle::Arrow);
        Ok(format!("?- {}.", writer.query_atom(query)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{Library, LibraryKind, LibraryRuntime, LibrarySpec};
    use symir_ir::{
        ArgSpec, Cond, Endpoint, Expr, InstanceTerms, PredicateSchema, Ref, RelBinding, RelProps, RuleRenderConfig,
        SchemaRegistry, Term, VarMode,
    };

    struct Employment {
        person: PredicateSchema,
        company: PredicateSchema,
        employment: PredicateSchema,
        registry: SchemaRegistry,
    }

    fn employment() -> Employment {
        let person = PredicateSchema::fact("person")
            .arg(ArgSpec::key("Name"))
            .arg("Addr")
            .build()
            .unwrap();
        let company = PredicateSchema::fact("company").arg(ArgSpec::key("Company")).build().unwrap();
        let employment = PredicateSchema::rel("employment", &person, &company)
            .prop("Since:int")
            .build()
            .unwrap();
        let registry = SchemaRegistry::new([person.clone(), company.clone(), employment.clone()]).unwrap();
        Employment {
            person,
            company,
            employment,
            registry,
        }
    }

    #[test]
    fn entity_rule_renders_signature_head() {
        let person = PredicateSchema::fact("person")
            .arg(ArgSpec::key("Name"))
            .arg("Address")
            .build()
            .unwrap();
        let adult = PredicateSchema::fact("adult").arg(ArgSpec::key("Name")).build().unwrap();
        let registry = SchemaRegistry::new([person.clone(), adult.clone()]).unwrap();
        let body = Ref::new(&person, vec![Term::var("Name"), Term::var("Address")]).unwrap();
        let rule = Rule::new(adult, vec![Cond::with_prob(vec![body.into()], 0.4).unwrap()]);
        let text = PrologRenderer.render_rule(&rule, &RenderContext::new(&registry)).unwrap();
        assert_eq!(text, "adult(Name) :- person(Name, Address).");
    }

    #[test]
    fn relation_head_binding_styles_render_equivalently() {
        let e = employment();
        let person_ref = Ref::new(&e.person, vec![Term::var("sub_Name"), Term::var("Addr")]).unwrap();
        let company_ref = Ref::new(&e.company, vec![Term::var("obj_Company")]).unwrap();
        let since = Expr::unify(Expr::var("Since"), Expr::constant(2020));

        let flattened = Cond::new(vec![person_ref.clone().into(), company_ref.clone().into(), since.clone().into()]);
        let explicit = Cond::new(vec![
            person_ref.into(),
            company_ref.into(),
            since.into(),
            Expr::unify(Expr::var("Sub"), Expr::call("person", vec![Expr::var("sub_Name")])).into(),
            Expr::unify(Expr::var("Obj"), Expr::call("company", vec![Expr::var("obj_Company")])).into(),
        ]);
        let ctx = RenderContext::new(&e.registry);
        let auto = PrologRenderer
            .render_rule(&Rule::new(e.employment.clone(), vec![flattened]), &ctx)
            .unwrap();
        let written = PrologRenderer
            .render_rule(&Rule::new(e.employment.clone(), vec![explicit]), &ctx)
            .unwrap();
        let expected = "employment(Sub, Obj, Since) :- person(Sub_Name, Addr), company(Obj_Company), \
                        Since = 2020, Sub = person(Sub_Name), Obj = company(Obj_Company).";
        assert_eq!(auto, expected);
        assert_eq!(written, expected);
    }

    #[test]
    fn unbound_relation_endpoints_fail_under_auto_binding() {
        let e = employment();
        let cond = Cond::new(vec![Expr::unify(Expr::var("Since"), Expr::constant(2020)).into()]);
        let rule = Rule::new(e.employment.clone(), vec![cond]);
        let ctx = RenderContext::new(&e.registry);
        match PrologRenderer.render_rule(&rule, &ctx) {
            Err(RenderError::UnboundEndpoint { endpoint, missing, .. }) => {
                assert_eq!(endpoint, "sub");
                assert_eq!(missing, vec!["Sub_Name"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let verbatim = rule.with_render(RuleRenderConfig {
            rel_binding: Some(RelBinding::Explicit),
            ..RuleRenderConfig::default()
        });
        assert_eq!(
            PrologRenderer.render_rule(&verbatim, &ctx).unwrap(),
            "employment(Sub, Obj, Since) :- Since = 2020."
        );
    }

    #[test]
    fn relation_facts_group_endpoint_keys() {
        let e = employment();
        let record = symir_ir::Instance::new(
            &e.employment,
            InstanceTerms::Relation {
                sub: Endpoint::keys([("Name", "alice")]),
                obj: Endpoint::keys([("Company", "acme")]),
                props: RelProps::named([("Since", 2020)]),
            },
        )
        .unwrap();
        let ctx = RenderContext::new(&e.registry);
        assert_eq!(
            PrologRenderer.render_facts(&[record], &ctx).unwrap(),
            "employment(person(alice), company(acme), 2020)."
        );

        let query = symir_ir::Query::for_schema(
            &e.employment,
            vec![Term::var("P"), Term::var("C"), Term::var("Y")],
        )
        .unwrap();
        assert_eq!(
            PrologRenderer.render_query(&query, &ctx).unwrap(),
            "?- employment(person(P), company(C), Y)."
        );
    }

    #[test]
    fn var_modes_apply_per_rule() {
        let person = PredicateSchema::fact("person").arg("x:string").build().unwrap();
        let resident = PredicateSchema::fact("resident").arg("x:string").build().unwrap();
        let registry = SchemaRegistry::new([person.clone(), resident.clone()]).unwrap();
        let body = Ref::new(&person, vec![Term::var("x")]).unwrap();
        let rule = Rule::new(resident, vec![Cond::new(vec![body.into()])]);
        let ctx = RenderContext::new(&registry);

        assert_eq!(PrologRenderer.render_rule(&rule, &ctx).unwrap(), "resident(X) :- person(X).");

        let prefixed = rule.clone().with_render(RuleRenderConfig {
            var_mode: Some(VarMode::Prefix),
            var_prefix: Some("VAR_".to_string()),
            ..RuleRenderConfig::default()
        });
        assert_eq!(
            PrologRenderer.render_rule(&prefixed, &ctx).unwrap(),
            "resident(VAR_x) :- person(VAR_x)."
        );

        let strict = rule.with_render(RuleRenderConfig {
            var_mode: Some(VarMode::Error),
            ..RuleRenderConfig::default()
        });
        assert!(matches!(
            PrologRenderer.render_rule(&strict, &ctx),
            Err(RenderError::InvalidVariable { .. })
        ));
    }

    #[test]
    fn library_operators_and_predicates() {
        let person = PredicateSchema::fact("person").arg(ArgSpec::key("Name")).build().unwrap();
        let greeting = PredicateSchema::fact("greeting").arg("Text").build().unwrap();
        let registry = SchemaRegistry::new([person.clone(), greeting.clone()]).unwrap();

        let mut library = Library::new();
        library
            .register(LibrarySpec::expr("concat", 3, "join two atoms").with_mapping("prolog", "atom_concat({}, {}, {})"))
            .unwrap();
        let upper = LibrarySpec::predicate("upper", 2, "upper-case an atom").with_mapping("prolog", "upcase_atom");
        let upper_id = upper.schema_id().unwrap();
        library.register(upper).unwrap();
        library.register(LibrarySpec::expr("shout", 1, "")).unwrap();
        let mut runtime = LibraryRuntime::new();
        runtime
            .register(&library, "shout", 1, LibraryKind::Expr, "prolog", |a| format!("format(\"~w!\", [{}])", a[0]))
            .unwrap();

        let cond = Cond::new(vec![
            Ref::new(&person, vec![Term::var("Name")]).unwrap().into(),
            Ref::unchecked(upper_id, vec![Term::var("Name"), Term::var("Up")]).into(),
            Expr::call(
                "concat",
                vec![Expr::constant("hello_"), Expr::var("Up"), Expr::var("Text")],
            )
            .into(),
            Expr::call("shout", vec![Expr::var("Text")]).into(),
        ]);
        let rule = Rule::new(greeting, vec![cond]);
        let ctx = RenderContext::new(&registry)
            .with_library(&library)
            .with_runtime(&runtime);
        assert_eq!(
            PrologRenderer.render_rule(&rule, &ctx).unwrap(),
            "greeting(Text) :- person(Name), upcase_atom(Name, Up), atom_concat(hello_, Up, Text), format(\"~w!\", [Text])."
        );
    }

    #[test]
    fn variables_merged_by_naming_are_rejected() {
        let pair = PredicateSchema::fact("pair").arg("Left").arg("Right").build().unwrap();
        let same = PredicateSchema::fact("same").arg("A").build().unwrap();
        let registry = SchemaRegistry::new([pair.clone(), same.clone()]).unwrap();
        let ctx = RenderContext::new(&registry);

        let body = Ref::new(&pair, vec![Term::var("x"), Term::var("X")]).unwrap();
        let rule = Rule::new(same.clone(), vec![Cond::new(vec![body.into()])]);
        match PrologRenderer.render_rule(&rule, &ctx) {
            Err(RenderError::VariableCollision { first, second, rendered, .. }) => {
                assert_eq!((first.as_str(), second.as_str(), rendered.as_str()), ("x", "X", "X"));
            }
            other => panic!("unexpected {other:?}"),
        }

        // A body variable may not capture a head variable either.
        let body = Ref::new(&pair, vec![Term::var("a"), Term::var("B")]).unwrap();
        let rule = Rule::new(same.clone(), vec![Cond::new(vec![body.into()])]);
        assert!(matches!(
            PrologRenderer.render_rule(&rule, &ctx),
            Err(RenderError::VariableCollision { .. })
        ));

        // Prefix keeps case, so the same names stay apart.
        let body = Ref::new(&pair, vec![Term::var("x"), Term::var("X")]).unwrap();
        let prefixed = Rule::new(same, vec![Cond::new(vec![body.into()])]).with_render(RuleRenderConfig {
            var_mode: Some(VarMode::Prefix),
            ..RuleRenderConfig::default()
        });
        assert_eq!(
            PrologRenderer.render_rule(&prefixed, &ctx).unwrap(),
            "same(V_A) :- pair(V_x, V_X)."
        );

        let query = symir_ir::Query::for_schema(&pair, vec![Term::var("first name"), Term::var("first_name")]).unwrap();
        assert!(matches!(
            PrologRenderer.render_query(&query, &ctx),
            Err(RenderError::VariableCollision { .. })
        ));
    }

    #[test]
    fn relation_props_cannot_shadow_endpoint_variables() {
        let e = employment();
        for prop in ["Obj", "sub"] {
            let shadowing = PredicateSchema::rel("managed_by", &e.person, &e.company)
                .prop(prop)
                .build()
                .unwrap();
            let registry = e.registry.with(shadowing.clone()).unwrap();
            let cond = Cond::new(vec![
                Expr::unify(Expr::var("Sub"), Expr::constant("alice")).into(),
                Expr::unify(Expr::var("Obj"), Expr::constant("acme")).into(),
            ]);
            let rule = Rule::new(shadowing, vec![cond]);
            match PrologRenderer.render_rule(&rule, &RenderContext::new(&registry)) {
                Err(RenderError::ReservedHeadVariable { prop: found, .. }) => assert_eq!(found, prop),
                other => panic!("{prop}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn if_uses_arrow_and_nested_arithmetic_is_parenthesised() {
        let calc = PredicateSchema::fact("calc").arg("X:int").arg("Y:int").build().unwrap();
        let registry = SchemaRegistry::new([calc.clone()]).unwrap();
        let product = Expr::call(
            "mul",
            vec![Expr::call("add", vec![Expr::var("X"), Expr::constant(1)]), Expr::constant(2)],
        );
        let expr = Expr::if_then_else(
            Expr::call("gt", vec![Expr::var("X"), Expr::constant(0)]),
            Expr::unify(Expr::var("Y"), product),
            Expr::unify(Expr::var("Y"), Expr::constant(0)),
        );
        let rule = Rule::new(calc, vec![Cond::new(vec![expr.into()])]);
        assert_eq!(
            PrologRenderer.render_rule(&rule, &RenderContext::new(&registry)).unwrap(),
            "calc(X, Y) :- (X > 0 -> Y = (X + 1) * 2 ; Y = 0)."
        );
    }
}
