//! Drives the `symir` binary over payload files in a scratch directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use symir_ir::{
    ArgSpec, Cond, Endpoint, Expr, Instance, InstanceTerms, PredicateSchema, Ref, RelProps, Rule, SchemaRegistry, Term,
    Value,
};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    person: PredicateSchema,
    company: PredicateSchema,
    employment: PredicateSchema,
    adult: PredicateSchema,
}

impl Workspace {
    fn new() -> Self {
        let person = PredicateSchema::fact("person")
            .arg(ArgSpec::key("Name"))
            .arg("Age:int")
            .build()
            .unwrap();
        let company = PredicateSchema::fact("company").arg(ArgSpec::key("Company")).build().unwrap();
        let employment = PredicateSchema::rel("employment", &person, &company)
            .prop("Since:int")
            .build()
            .unwrap();
        let adult = PredicateSchema::fact("adult").arg(ArgSpec::key("Name")).build().unwrap();
        let registry =
            SchemaRegistry::new([person.clone(), company.clone(), employment.clone(), adult.clone()]).unwrap();

        let ws = Self {
            dir: tempfile::tempdir().unwrap(),
            person,
            company,
            employment,
            adult,
        };
        ws.write("registry.json", &registry.to_json_pretty().unwrap());
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn adult_rule(&self) -> PathBuf {
        let body = Cond::with_prob(
            vec![
                Ref::new(&self.person, vec![Term::var("Name"), Term::var("Age")]).unwrap().into(),
                Expr::call("ge", vec![Expr::var("Age"), Expr::constant(18)]).into(),
            ],
            0.9,
        )
        .unwrap();
        let rule = Rule::new(self.adult.clone(), vec![body]);
        self.write("rule.json", &serde_json::to_string_pretty(&rule.to_payload()).unwrap())
    }
}

fn symir(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_symir"))
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to launch symir")
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim_end().to_string()
}

#[test]
fn check_lists_every_predicate() {
    let ws = Workspace::new();
    let out = symir(&["check", arg(&ws.path("registry.json"))]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains(ws.employment.schema_id()));
    assert!(text.contains("person/2"));
}

#[test]
fn check_rejects_tampered_identifiers() {
    let ws = Workspace::new();
    let tampered = std::fs::read_to_string(ws.path("registry.json"))
        .unwrap()
        .replace(ws.company.schema_id(), &"0".repeat(64));
    let path = ws.write("tampered.json", &tampered);
    let out = symir(&["check", arg(&path)]);
    assert!(!out.status.success());
}

#[test]
fn render_rule_in_both_dialects() {
    let ws = Workspace::new();
    let rule = ws.adult_rule();
    let config = ws.write("config.json", r#"{"comments": false}"#);

    let out = symir(&[
        "render",
        "--registry",
        arg(&ws.path("registry.json")),
        "--rule",
        arg(&rule),
        "--dialect",
        "problog",
        "--config",
        arg(&config),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout(&out), "0.9::adult(Name) :- person(Name, Age), Age >= 18.");

    let out = symir(&[
        "render",
        "--registry",
        arg(&ws.path("registry.json")),
        "--rule",
        arg(&rule),
        "-d",
        "prolog",
    ]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "adult(Name) :- person(Name, Age), Age >= 18.");
}

#[test]
fn render_respects_the_view() {
    let ws = Workspace::new();
    let rule = ws.adult_rule();
    let out = symir(&[
        "render",
        "--registry",
        arg(&ws.path("registry.json")),
        "--rule",
        arg(&rule),
        "--dialect",
        "prolog",
        "--view",
        &format!("{},{}", ws.adult.schema_id(), ws.company.schema_id()),
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains(ws.person.schema_id()), "{stderr}");
}

#[test]
fn stub_and_unknown_dialects_fail() {
    let ws = Workspace::new();
    let rule = ws.adult_rule();
    for dialect in ["datalog", "cypher", "souffle"] {
        let out = symir(&[
            "render",
            "--registry",
            arg(&ws.path("registry.json")),
            "--rule",
            arg(&rule),
            "--dialect",
            dialect,
        ]);
        assert!(!out.status.success(), "{dialect} should fail");
        assert!(out.stdout.is_empty());
    }
}

#[test]
fn facts_render_entity_and_relation_records() {
    let ws = Workspace::new();
    let alice = Instance::new(
        &ws.person,
        InstanceTerms::keyed([("Name", Value::from("alice")), ("Age", Value::from(34))]),
    )
    .unwrap();
    let job = Instance::new(
        &ws.employment,
        InstanceTerms::Relation {
            sub: Endpoint::keys([("Name", "alice")]),
            obj: Endpoint::keys([("Company", "acme")]),
            props: RelProps::named([("Since", 2020)]),
        },
    )
    .unwrap();
    let payloads = vec![alice.to_payload(true).unwrap(), job.to_payload(true).unwrap()];
    let records = ws.write("records.json", &serde_json::to_string(&payloads).unwrap());

    let out = symir(&[
        "facts",
        "--registry",
        arg(&ws.path("registry.json")),
        "--records",
        arg(&records),
        "--dialect",
        "problog",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        stdout(&out),
        "1.0::person(alice, 34).\n1.0::employment(person(alice), company(acme), 2020)."
    );
}

#[test]
fn dialects_marks_stubs() {
    let out = symir(&["dialects"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.lines().any(|l| l.starts_with("datalog") && l.contains("stub")));
    assert!(text.lines().any(|l| l.trim() == "problog"));
}
