//! Symir CLI: inspect schema registries and render rules or records to a
//! logic-programming dialect.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use symir_ir::{Instance, InstancePayload, PredicateKind, Rule, SchemaRegistry, SchemaSource, SchemaView};
use symir_render::renderer::{CYPHER, DATALOG};
use symir_render::{Library, RenderConfig, RenderContext, RenderPipeline, RendererRegistry};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "symir")]
#[command(author, version, about = "Schema registries and rule rendering for logic programs")]
struct Cli {
    /// Log at DEBUG instead of WARN (stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a registry payload, recompute every schema id and summarize it
    Check {
        /// Registry payload (JSON)
        registry: PathBuf,
    },

    /// Validate a rule payload against a view and render it
    Render {
        #[command(flatten)]
        input: RenderInput,

        /// Rule payload (JSON)
        #[arg(long)]
        rule: PathBuf,

        /// Comma-separated schema ids visible to the rule (default: the whole registry)
        #[arg(long, value_delimiter = ',')]
        view: Vec<String>,

        /// Library spec array (JSON)
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// Render a JSON array of record payloads as facts
    Facts {
        #[command(flatten)]
        input: RenderInput,

        /// Record payloads (JSON array)
        #[arg(long)]
        records: PathBuf,
    },

    /// List the registered dialects
    Dialects,
}

#[derive(Args)]
struct RenderInput {
    /// Registry payload (JSON)
    #[arg(long)]
    registry: PathBuf,

    /// Target dialect
    #[arg(long, short)]
    dialect: String,

    /// Render configuration (JSON); defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    match cli.command {
        Commands::Check { registry } => cmd_check(&registry),
        Commands::Render {
            input,
            rule,
            view,
            library,
        } => cmd_render(&input, &rule, &view, library.as_deref()),
        Commands::Facts { input, records } => cmd_facts(&input, &records),
        Commands::Dialects => {
            cmd_dialects();
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_check(path: &Path) -> Result<()> {
    let registry = load_registry(path)?;
    for schema in registry.predicates() {
        println!(
            "{:<5} {}/{} {}",
            schema.kind().as_str(),
            schema.name().bold(),
            schema.arity(),
            schema.schema_id().dimmed()
        );
    }
    let relations = registry
        .predicates()
        .iter()
        .filter(|s| s.kind() == PredicateKind::Rel)
        .count();
    eprintln!(
        "{} {} predicates ({} relations) in {}",
        "ok".green().bold(),
        registry.len(),
        relations,
        path.display()
    );
    Ok(())
}

fn cmd_render(input: &RenderInput, rule_path: &Path, view_ids: &[String], library: Option<&Path>) -> Result<()> {
    let registry = load_registry(&input.registry)?;
    let rule = Rule::from_json(&read(rule_path)?, &registry)
        .with_context(|| format!("invalid rule payload {}", rule_path.display()))?;
    let view = build_view(&registry, view_ids)?;
    let library = library
        .map(|path| {
            Library::from_json(&read(path)?).with_context(|| format!("invalid library {}", path.display()))
        })
        .transpose()?;

    let renderers = RendererRegistry::standard();
    let pipeline = RenderPipeline::new(&renderers, &input.dialect)?;
    let mut ctx = RenderContext::new(&registry).with_config(load_config(input.config.as_deref())?);
    if let Some(library) = &library {
        ctx = ctx.with_library(library);
    }
    debug!(dialect = pipeline.dialect(), view = view.len(), "rendering rule");

    let text = pipeline
        .compile(&rule, &view, &ctx)
        .with_context(|| format!("cannot render rule `{}` as {}", rule.head.name(), input.dialect))?;
    println!("{text}");
    Ok(())
}

fn cmd_facts(input: &RenderInput, records_path: &Path) -> Result<()> {
    let registry = load_registry(&input.registry)?;
    let payloads: Vec<InstancePayload> = serde_json::from_str(&read(records_path)?)
        .with_context(|| format!("records must be a JSON array: {}", records_path.display()))?;
    let records = payloads
        .iter()
        .enumerate()
        .map(|(index, payload)| {
            Instance::from_payload(payload, &registry)
                .with_context(|| format!("record #{index} ({})", payload.schema_id))
        })
        .collect::<Result<Vec<_>>>()?;

    let renderers = RendererRegistry::standard();
    let pipeline = RenderPipeline::new(&renderers, &input.dialect)?;
    let ctx = RenderContext::new(&registry).with_config(load_config(input.config.as_deref())?);
    let text = pipeline
        .render_facts(&records, &ctx)
        .with_context(|| format!("cannot render {} records as {}", records.len(), input.dialect))?;
    println!("{text}");
    Ok(())
}

fn cmd_dialects() {
    for name in RendererRegistry::standard().names() {
        if name == DATALOG || name == CYPHER {
            println!("{name} {}", "(stub)".yellow());
        } else {
            println!("{}", name.green());
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_registry(path: &Path) -> Result<SchemaRegistry> {
    SchemaRegistry::from_json(&read(path)?).with_context(|| format!("invalid registry {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => {
            RenderConfig::from_json(&read(path)?).with_context(|| format!("invalid render config {}", path.display()))
        }
        None => Ok(RenderConfig::default()),
    }
}

fn build_view(registry: &SchemaRegistry, ids: &[String]) -> Result<SchemaView> {
    let ids: Vec<&str> = ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    if ids.is_empty() {
        return Ok(registry.full_view());
    }
    registry.view(ids).map_err(|e| anyhow!("invalid view: {e}"))
}
