use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use authz_compiler::{AuthzCompilerLocalClient, CompilerConfig, Service};
use authz_compiler_sdk::{
    AuthzCompilerClient, DecisionTarget, Operation, RelationSpec, RuleCatalog, StaticKeySchemas,
};
use authz_security::RequestContext;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Exit status when the decision rejects the request.
const EXIT_DENIED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "authz-cli",
    version,
    about = "Evaluate authorization decisions against a rule catalog"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide one request and print the outcome
    Decide(DecideArgs),
}

#[derive(clap::Args, Debug)]
struct DecideArgs {
    /// YAML configuration file; `AUTHZ_COMPILER_*` variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rule catalog (JSON list of rule entries)
    #[arg(long)]
    rules: PathBuf,

    /// Key schemas by type name (JSON object)
    #[arg(long)]
    schemas: PathBuf,

    /// Request context (JSON)
    #[arg(long)]
    context: PathBuf,

    /// Model type name
    #[arg(long = "type")]
    type_name: String,

    /// Operation, e.g. `update`, `list`, `fieldRead`
    #[arg(long, value_parser = parse_operation)]
    operation: Operation,

    /// Secondary index queried
    #[arg(long)]
    index: Option<String>,

    /// Field read
    #[arg(long)]
    field: Option<String>,

    /// Relationship join description (JSON)
    #[arg(long)]
    relation: Option<PathBuf>,
}

fn parse_operation(raw: &str) -> Result<Operation, String> {
    serde_json::from_value(json!(raw)).map_err(|_| format!("unknown operation `{raw}`"))
}

fn init_logging(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn target_of(args: &DecideArgs) -> Result<DecisionTarget> {
    let mut target = match &args.field {
        Some(field) => DecisionTarget::field_read(&args.type_name, field),
        None => DecisionTarget::new(&args.type_name, args.operation),
    };
    if let Some(index) = &args.index {
        target = target.with_index(index);
    }
    if let Some(path) = &args.relation {
        target = target.with_relation(read_json::<RelationSpec>(path)?);
    }
    Ok(target)
}

async fn decide(args: &DecideArgs) -> Result<ExitCode> {
    let config = CompilerConfig::load(args.config.as_deref())?;
    let catalog: RuleCatalog = read_json(&args.rules)?;
    let schemas: StaticKeySchemas = read_json(&args.schemas)?;
    let mut ctx: RequestContext = read_json(&args.context)?;
    let target = target_of(args)?;

    let svc = Arc::new(Service::new(&config, catalog, Arc::new(schemas)));
    let client = AuthzCompilerLocalClient::new(svc);
    let outcome = client.authorize(&target, &mut ctx).await?;
    tracing::info!(
        authorized = outcome.authorized,
        fatal = outcome.fatal,
        "decision evaluated"
    );

    let report = json!({ "outcome": outcome, "scratch": ctx.scratch() });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if outcome.fatal {
        ExitCode::from(EXIT_DENIED)
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match cli.command {
        Command::Decide(args) => decide(&args).await,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_operation_names() {
        assert_eq!(parse_operation("fieldRead").unwrap(), Operation::FieldRead);
        assert!(parse_operation("upsert").is_err());
    }

    #[test]
    fn field_flag_builds_field_read_target() {
        let cli = Cli::parse_from([
            "authz-cli",
            "decide",
            "--rules",
            "r.json",
            "--schemas",
            "s.json",
            "--context",
            "c.json",
            "--type",
            "Blog",
            "--operation",
            "get",
            "--field",
            "notes",
        ]);
        let Command::Decide(args) = cli.command;
        let target = target_of(&args).unwrap();
        assert_eq!(target, DecisionTarget::field_read("Blog", "notes"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
