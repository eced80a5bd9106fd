//! Integration tests across the IR and rendering crates
//!
//! These tests drive the full pipeline:
//! - schemas → registry → view → validator → renderer
//! - records → canonical payload → restored records → facts
//! - rules → payload JSON → rules
//!
//! Run with: cargo test --test integration_tests

use symir_ir::digest;
use symir_ir::{
    ArgSpec, Cond, DataProvider, Endpoint, Expr, Instance, InstanceTerms, MemoryProvider, PredicateFilter,
    PredicateKind, PredicateSchema, Query, Ref, RelProps, Rule, SchemaRegistry, SchemaSource, Term, Value,
};
use symir_render::renderer::{CYPHER, DATALOG, PROBLOG, PROLOG};
use symir_render::{
    PipelineError, ProbabilityConfig, RenderConfig, RenderContext, RenderError, RenderPipeline, RendererRegistry,
};

fn entity(name: &str, args: &[&str]) -> PredicateSchema {
    let mut builder = PredicateSchema::fact(name);
    for (i, arg) in args.iter().enumerate() {
        builder = if i == 0 {
            builder.arg(ArgSpec::key(*arg))
        } else {
            builder.arg(*arg)
        };
    }
    builder.build().unwrap()
}

fn quiet() -> RenderConfig {
    RenderConfig {
        comments: false,
        ..RenderConfig::default()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_a_single_clause_in_prolog() {
    let person = entity("person", &["Name", "Address"]);
    let adult = entity("adult", &["Name"]);
    let registry = SchemaRegistry::new([person.clone(), adult.clone()]).unwrap();

    let body = Ref::new(&person, vec![Term::var("Name"), Term::var("Address")]).unwrap();
    let rule = Rule::new(adult, vec![Cond::new(vec![body.into()])]);

    let renderers = RendererRegistry::standard();
    let text = RenderPipeline::new(&renderers, PROLOG)
        .unwrap()
        .compile(&rule, &registry.full_view(), &RenderContext::new(&registry))
        .unwrap();
    assert_eq!(text, "adult(Name) :- person(Name, Address).");
}

#[test]
fn scenario_b_relation_payload_carries_endpoint_identities() {
    let person = entity("person", &["Name"]);
    let city = entity("city", &["Name"]);
    let lives_in = PredicateSchema::rel("lives_in", &person, &city)
        .prop("since:int")
        .build()
        .unwrap();
    let _registry = SchemaRegistry::new([person.clone(), city.clone(), lives_in.clone()]).unwrap();

    let record = Instance::new(
        &lives_in,
        InstanceTerms::Relation {
            sub: Endpoint::keys([("Name", "alice")]),
            obj: Endpoint::keys([("Name", "darmstadt")]),
            props: RelProps::named([("since", 2020)]),
        },
    )
    .unwrap();
    let payload = record.to_payload(false).unwrap();

    let alice = Value::from("alice");
    let darmstadt = Value::from("darmstadt");
    assert_eq!(
        payload.sub_entity_id.as_deref(),
        Some(digest::entity_id(person.schema_id(), &[("Name", &alice)]).as_str())
    );
    assert_eq!(
        payload.obj_entity_id.as_deref(),
        Some(digest::entity_id(city.schema_id(), &[("Name", &darmstadt)]).as_str())
    );
    assert_eq!(payload.props.get("since"), Some(&Value::Int(2020)));
    assert_eq!(payload.props.len(), 1);
    assert!(payload.sub_key.is_none() && payload.obj_key.is_none());
}

#[test]
fn scenario_c_probability_annotates_only_its_clause() {
    let person = entity("person", &["X"]);
    let visitor = entity("visitor", &["X"]);
    let resident = entity("resident", &["X"]);
    let registry = SchemaRegistry::new([person.clone(), visitor.clone(), resident.clone()]).unwrap();

    let rule = Rule::new(
        resident,
        vec![
            Cond::with_prob(vec![Ref::new(&person, vec![Term::var("X")]).unwrap().into()], 0.7).unwrap(),
            Cond::new(vec![Ref::new(&visitor, vec![Term::var("X")]).unwrap().into()]),
        ],
    );
    let ctx = RenderContext::new(&registry).with_config(RenderConfig {
        probability: ProbabilityConfig {
            default_rule_prob: 0.2,
            ..ProbabilityConfig::default()
        },
        ..quiet()
    });
    let renderers = RendererRegistry::standard();
    let text = RenderPipeline::new(&renderers, PROBLOG)
        .unwrap()
        .compile(&rule, &registry.full_view(), &ctx)
        .unwrap();

    let clauses: Vec<&str> = text.lines().collect();
    assert_eq!(clauses, vec!["0.7::resident(X) :- person(X).", "0.2::resident(X) :- visitor(X)."]);
}

#[test]
fn scenario_d_stub_dialects_fail_as_rendering_errors() {
    let person = entity("person", &["X"]);
    let resident = entity("resident", &["X"]);
    let registry = SchemaRegistry::new([person.clone(), resident.clone()]).unwrap();
    let rule = Rule::new(
        resident,
        vec![Cond::new(vec![Ref::new(&person, vec![Term::var("X")]).unwrap().into()])],
    );
    let renderers = RendererRegistry::standard();
    let ctx = RenderContext::new(&registry);

    for dialect in [DATALOG, CYPHER] {
        let pipeline = RenderPipeline::new(&renderers, dialect).unwrap();
        match pipeline.compile(&rule, &registry.full_view(), &ctx) {
            Err(PipelineError::Render(RenderError::UnsupportedDialect { dialect: d })) => assert_eq!(d, dialect),
            other => panic!("{dialect}: expected UnsupportedDialect, got {other:?}"),
        }
        assert!(matches!(
            pipeline.compile_program(&[], &[], &[], &registry.full_view(), &ctx),
            Err(PipelineError::Render(RenderError::UnsupportedDialect { .. }))
        ));
    }
}

// ============================================================================
// Round-trip laws
// ============================================================================

#[test]
fn registry_survives_json() {
    let person = entity("person", &["Name", "Age:int"]);
    let company = entity("company", &["Company"]);
    let works_at = PredicateSchema::rel("works_at", &person, &company)
        .prop("Since:int")
        .prop("Role")
        .build()
        .unwrap();
    let registry = SchemaRegistry::new([person, company, works_at.clone()]).unwrap();

    let restored = SchemaRegistry::from_json(&registry.to_json_pretty().unwrap()).unwrap();
    assert_eq!(restored.to_payload(), registry.to_payload());
    assert_eq!(restored.rel("works_at").unwrap(), &works_at);
    assert_eq!(
        restored.predicates().iter().map(|p| p.schema_id()).collect::<Vec<_>>(),
        registry.predicates().iter().map(|p| p.schema_id()).collect::<Vec<_>>()
    );
}

#[test]
fn records_survive_payloads() {
    let person = entity("person", &["Name", "Age:int"]);
    let company = entity("company", &["Company"]);
    let works_at = PredicateSchema::rel("works_at", &person, &company)
        .prop("Since:int")
        .build()
        .unwrap();
    let registry = SchemaRegistry::new([person.clone(), company, works_at.clone()]).unwrap();

    let alice = Instance::new(
        &person,
        InstanceTerms::keyed([("Name", Value::from("alice")), ("Age", Value::from(34))]),
    )
    .unwrap();
    let job = Instance::new(
        &works_at,
        InstanceTerms::Relation {
            sub: Endpoint::keys([("Name", "alice")]),
            obj: Endpoint::keys([("Company", "acme")]),
            props: RelProps::named([("Since", 2019)]),
        },
    )
    .unwrap();

    for record in [&alice, &job] {
        let payload = record.to_payload(true).unwrap();
        let json = serde_json::to_string(&payload).unwrap();
        let restored = Instance::from_payload(&serde_json::from_str(&json).unwrap(), &registry).unwrap();
        assert_eq!(restored.identity(), record.identity());
        assert_eq!(restored.to_payload(true).unwrap(), payload);
    }

    // Without keys the relation identity survives but terms are unavailable.
    let bare = Instance::from_payload(&job.to_payload(false).unwrap(), &registry).unwrap();
    assert_eq!(bare.identity(), job.identity());
    assert!(bare.to_terms(&works_at).is_err());
}

#[test]
fn rules_survive_payloads() {
    let person = entity("person", &["Name", "Age:int"]);
    let adult = entity("adult", &["Name"]);
    let registry = SchemaRegistry::new([person.clone(), adult.clone()]).unwrap();

    let rule = Rule::new(
        adult,
        vec![
            Cond::with_prob(
                vec![
                    Ref::new(&person, vec![Term::var("Name"), Term::var("Age")]).unwrap().into(),
                    Expr::if_then_else(
                        Expr::call("ge", vec![Expr::var("Age"), Expr::constant(18)]),
                        Expr::constant(true),
                        Expr::constant(false),
                    )
                    .into(),
                ],
                0.8,
            )
            .unwrap(),
            Cond::new(vec![Ref::new(&person, vec![Term::var("Name"), Term::constant(40)])
                .unwrap()
                .negate()
                .into()]),
        ],
    );

    let json = serde_json::to_string(&rule.to_payload()).unwrap();
    let restored = Rule::from_json(&json, &registry).unwrap();
    assert_eq!(restored, rule);
}

// ============================================================================
// Views, providers and programs
// ============================================================================

#[test]
fn filtered_view_scopes_rules_and_provider_queries() {
    let person = entity("person", &["X"]);
    let city = entity("city", &["X"]);
    let resident = entity("resident", &["X"]);
    let registry = SchemaRegistry::new([person.clone(), city.clone(), resident.clone()]).unwrap();

    let view = registry.view_from_filter(&PredicateFilter::name("person").or(PredicateFilter::name("resident")));
    assert!(view.allows(person.schema_id()));
    assert!(!view.allows(city.schema_id()));
    assert!(view.get(city.schema_id()).is_err());

    let provider = MemoryProvider::new([
        Instance::new(&person, InstanceTerms::positional(["alice"])).unwrap(),
        Instance::new(&city, InstanceTerms::positional(["berlin"])).unwrap(),
    ]);
    let visible = provider.query(&view, None).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].kind(), PredicateKind::Fact);

    let rule = Rule::new(
        resident.clone(),
        vec![Cond::new(vec![Ref::new(&city, vec![Term::var("X")]).unwrap().into()])],
    );
    let renderers = RendererRegistry::standard();
    let err = RenderPipeline::new(&renderers, PROLOG)
        .unwrap()
        .compile(&rule, &view, &RenderContext::new(&registry))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn problog_program_orders_facts_rules_queries() {
    let person = entity("person", &["X"]);
    let resident = entity("resident", &["X"]);
    let registry = SchemaRegistry::new([person.clone(), resident.clone()]).unwrap();

    let facts = vec![Instance::new(&person, InstanceTerms::positional(["alice"])).unwrap()];
    let rule = Rule::new(
        resident.clone(),
        vec![Cond::with_prob(vec![Ref::new(&person, vec![Term::var("X")]).unwrap().into()], 0.7).unwrap()],
    );
    let query = Query::for_schema(&resident, vec![Term::var("X")]).unwrap();

    let renderers = RendererRegistry::standard();
    let ctx = RenderContext::new(&registry).with_config(quiet());
    let program = RenderPipeline::new(&renderers, PROBLOG)
        .unwrap()
        .compile_program(&facts, &[rule], &[query], &registry.full_view(), &ctx)
        .unwrap();
    assert_eq!(
        program,
        "1.0::person(alice).\n\n0.7::resident(X) :- person(X).\n\nquery(resident(X))."
    );
}
