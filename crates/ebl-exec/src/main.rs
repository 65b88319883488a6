//! `ebl` command line: run the case corpus, evaluate or naively execute a bundle

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ebl_bundle::{ActionBundle, ContextSnapshot, GatePolicy};
use ebl_exec::{NaiveExecutor, TraceComparator};
use ebl_gate::{AdmissibilityGate, Gate, Verdict};
use ebl_state::ResourceState;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn cli() -> Command {
    let bundle_arg = Arg::new("bundle")
        .long("bundle")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Action bundle JSON file");
    let state_arg = Arg::new("state")
        .long("state")
        .value_parser(value_parser!(PathBuf))
        .help("Initial resource state JSON file (empty when omitted)");
    let policy_arg = Arg::new("policy")
        .long("policy")
        .value_parser(value_parser!(PathBuf))
        .help("Gate policy TOML file (built-in default when omitted)");

    Command::new("ebl")
        .version(ebl_exec::VERSION)
        .about("Execution boundary layer: admissibility gate and differential executors")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("run-cases")
                .about("Run the case corpus through both executors")
                .arg(
                    Arg::new("dir")
                        .long("dir")
                        .default_value("cases")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of case fixtures"),
                )
                .arg(policy_arg.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Evaluate a bundle against the gate without executing it")
                .arg(bundle_arg.clone())
                .arg(state_arg.clone())
                .arg(policy_arg),
        )
        .subcommand(
            Command::new("naive")
                .about("Execute a bundle with the naive executor")
                .arg(bundle_arg)
                .arg(state_arg),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries reports
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("logging init failed: {e}");
    }
}

fn load_policy(args: &ArgMatches) -> Result<GatePolicy> {
    match args.get_one::<PathBuf>("policy") {
        Some(path) => GatePolicy::load(path)
            .with_context(|| format!("failed to load policy {}", path.display())),
        None => Ok(GatePolicy::default()),
    }
}

fn load_bundle(path: &Path) -> Result<ActionBundle> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read bundle {}", path.display()))?;
    ActionBundle::from_json(&text)
        .with_context(|| format!("malformed bundle {}", path.display()))
}

fn load_state(args: &ArgMatches) -> Result<ResourceState> {
    match args.get_one::<PathBuf>("state") {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read state {}", path.display()))?;
            ResourceState::from_json(&text)
                .with_context(|| format!("malformed state {}", path.display()))
        }
        None => Ok(ResourceState::new()),
    }
}

fn run_cases(args: &ArgMatches) -> Result<bool> {
    let dir = args
        .get_one::<PathBuf>("dir")
        .context("missing --dir")?;
    let comparator = TraceComparator::new().with_policy(load_policy(args)?);
    let report = comparator
        .run_dir(dir)
        .with_context(|| format!("failed to run cases in {}", dir.display()))?;

    if args.get_flag("json") {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.passed())
}

fn evaluate(args: &ArgMatches) -> Result<bool> {
    let bundle_path = args.get_one::<PathBuf>("bundle").context("missing --bundle")?;
    let bundle = load_bundle(bundle_path)?;
    let state = load_state(args)?;
    let policy = load_policy(args)?;

    let snapshot = ContextSnapshot::for_bundle(&state, &bundle, &policy);
    let decision = AdmissibilityGate::with_policy(policy).evaluate(&bundle, &snapshot);

    println!("Verdict: {}", decision.verdict());
    for finding in decision.findings() {
        println!("  {finding}");
    }
    Ok(decision.verdict() == Verdict::Allow)
}

fn naive(args: &ArgMatches) -> Result<()> {
    let bundle_path = args.get_one::<PathBuf>("bundle").context("missing --bundle")?;
    let bundle = load_bundle(bundle_path)?;
    let mut state = load_state(args)?;

    let executor = NaiveExecutor::default();
    executor.execute(&bundle, &mut state)?;

    println!("{}", serde_json::to_string_pretty(&state)?);
    println!();
    print!("{}", executor.trace().format_trace());
    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("run-cases", args)) => {
            if !run_cases(args)? {
                std::process::exit(1);
            }
        }
        Some(("evaluate", args)) => {
            // Exit status mirrors the verdict: 0 only on ALLOW
            if !evaluate(args)? {
                std::process::exit(2);
            }
        }
        Some(("naive", args)) => naive(args)?,
        _ => cli().print_help()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn run_cases_defaults_to_cases_dir() {
        let matches = cli().get_matches_from(["ebl", "run-cases"]);
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(
            args.get_one::<PathBuf>("dir"),
            Some(&PathBuf::from("cases"))
        );
        assert!(!args.get_flag("json"));
    }

    #[test]
    fn evaluate_requires_bundle() {
        assert!(cli().try_get_matches_from(["ebl", "evaluate"]).is_err());
    }
}
