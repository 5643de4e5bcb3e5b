use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use recon_core::telemetry::init_tracing;
use recon_core::{ConsoleConfig, RecoveryOrchestrator, RunRequest};
use recon_kernel::ranking::{rank_routes, Route};
use recon_kernel::test_harness::{run_simulator, SimulatorConfig};
use recon_kernel::validation::parse_payload;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn cli() -> Command {
    Command::new("recon-console")
        .version(recon_core::VERSION)
        .about("Recovery console: rank routes, run recoveries, simulate campaigns")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Drive seeded campaigns through the scheduler")
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("campaigns")
                        .long("campaigns")
                        .default_value("64")
                        .value_parser(value_parser!(usize))
                        .help("Number of campaigns to generate"),
                )
                .arg(
                    Arg::new("max-ticks")
                        .long("max-ticks")
                        .default_value("32")
                        .value_parser(value_parser!(u64))
                        .help("Stop after this many ticks"),
                )
                .arg(
                    Arg::new("cancel-probability")
                        .long("cancel-probability")
                        .default_value("0.05")
                        .value_parser(value_parser!(f64))
                        .help("Chance that any pulse is cancelled"),
                ),
        )
        .subcommand(
            Command::new("rank")
                .about("Rank routes from a JSON file")
                .arg(
                    Arg::new("routes")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of routes"),
                )
                .arg(
                    Arg::new("top")
                        .long("top")
                        .value_parser(value_parser!(usize))
                        .help("Candidates to keep (defaults to top_candidates)"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Execute a JSON run request")
                .arg(
                    Arg::new("request")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON run request"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json")).context("installing tracing subscriber")?;

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConsoleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConsoleConfig::default(),
    };

    match matches.subcommand() {
        Some(("simulate", args)) => simulate(args),
        Some(("rank", args)) => rank(args, &config),
        Some(("run", args)) => run(args, config).await,
        Some(("config", _)) => {
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            cli().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn required<'a, T>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    args.get_one::<T>(name)
        .with_context(|| format!("missing argument {name}"))
}

fn simulate(args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config = SimulatorConfig {
        seed: *required::<u64>(args, "seed")?,
        campaigns: *required::<usize>(args, "campaigns")?,
        max_ticks: *required::<u64>(args, "max-ticks")?,
        cancel_probability: *required::<f64>(args, "cancel-probability")?,
        ..SimulatorConfig::default()
    };
    if !(0.0..=1.0).contains(&config.cancel_probability) {
        bail!("--cancel-probability must be within 0-1");
    }

    let report = run_simulator(config);
    println!("{}", report.generate_text());
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn rank(args: &ArgMatches, config: &ConsoleConfig) -> anyhow::Result<ExitCode> {
    let path: &PathBuf = required(args, "routes")?;
    let routes: Vec<Route> = parse_payload(&read_file(path)?)
        .with_context(|| format!("invalid routes in {}", path.display()))?;
    let top = args
        .get_one::<usize>("top")
        .copied()
        .unwrap_or(config.top_candidates);

    let candidates = rank_routes(&routes, &config.ranking, top);
    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(ExitCode::SUCCESS)
}

async fn run(args: &ArgMatches, config: ConsoleConfig) -> anyhow::Result<ExitCode> {
    let path: &PathBuf = required(args, "request")?;
    let request: RunRequest = parse_payload(&read_file(path)?)
        .with_context(|| format!("invalid run request in {}", path.display()))?;
    let key = request.run_key();

    let orchestrator = RecoveryOrchestrator::new(config).context("building orchestrator")?;
    let result = orchestrator.execute(request).await;
    let snapshot = orchestrator.snapshot(&key)?;

    match result {
        Ok(outcome) => {
            let body = serde_json::json!({ "outcome": outcome, "snapshot": snapshot });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let body = serde_json::json!({
                "error": err.to_string(),
                "run": orchestrator.run(&key),
                "snapshot": snapshot,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::FAILURE)
        }
    }
}
