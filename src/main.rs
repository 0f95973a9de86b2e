use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write as _;
use std::io::Stdout;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use nodeprobe::config::{FileConfig, load_config};
use nodeprobe::output::Output;
use nodeprobe::probe::prelude::*;
use nodeprobe::probe::{concurrency_from, duration_from_secs, retries_from};
use nodeprobe::targets::{self, read_target_lines, split_targets};

type CliResult = Result<(), Box<dyn Error>>;
type SharedOutput = Arc<Mutex<Output<Stdout>>>;

#[derive(Parser)]
#[command(name = "nodeprobe", version, about = "TCP reachability prober for peer-to-peer nodes")]
struct Cli {
    /// Emit JSON lines instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// YAML configuration file. Defaults to $CONFIG_FILE.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe targets.
    Probe {
        #[command(subcommand)]
        kind: ProbeCommand,
    },
    /// Inspect target descriptors.
    Targets {
        #[command(subcommand)]
        command: TargetsCommand,
    },
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
enum ProbeCommand {
    /// Dial each target's TCP endpoint.
    Tcp(TcpArgs),
}

#[derive(Subcommand)]
enum TargetsCommand {
    /// Parse and resolve target descriptors without dialing them.
    Parse(ParseArgs),
}

#[derive(Args)]
struct TcpArgs {
    /// Targets: host:port, enode:// URLs or node records.
    targets: Vec<String>,

    /// Comma-separated targets. May be repeated.
    #[arg(long = "targets", value_name = "LIST")]
    target_lists: Vec<String>,

    /// File with one target per line, `-` for stdin.
    #[arg(long, value_name = "FILE")]
    targets_file: Option<PathBuf>,

    /// Per-attempt dial timeout in seconds [default: 3].
    #[arg(long, value_name = "SECS", allow_negative_numbers = true)]
    timeout: Option<f64>,

    /// Targets probed at the same time [default: 6].
    #[arg(long, allow_negative_numbers = true)]
    concurrency: Option<i64>,

    /// Extra attempts after a transient failure [default: 0].
    #[arg(long, allow_negative_numbers = true)]
    retries: Option<i64>,

    /// Run identifier. Generated when not given.
    #[arg(long)]
    run_id: Option<String>,

    /// Case identifier [default: probe.tcp].
    #[arg(long)]
    case_id: Option<String>,

    /// Record directory, empty to disable persistence [default: runs].
    #[arg(long, value_name = "DIR")]
    record_dir: Option<String>,

    /// Overall run budget in seconds.
    #[arg(long, value_name = "SECS", allow_negative_numbers = true)]
    deadline: Option<f64>,
}

#[derive(Args)]
struct ParseArgs {
    targets: Vec<String>,

    /// File with one target per line, `-` for stdin.
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,
}

fn report(mut err: &(dyn Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, "\n\nCaused by: {}", src);
        err = src;
    }
    s
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", report(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult {
    match cli.command {
        Command::Probe {
            kind: ProbeCommand::Tcp(args),
        } => {
            let config = load_config(cli.config.as_deref())?;
            probe_tcp(cli.json, config, args).await
        }
        Command::Targets {
            command: TargetsCommand::Parse(args),
        } => parse_targets(cli.json, args),
        Command::Version => {
            let mut output = Output::stdout(cli.json);
            output.event(
                "version",
                &json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            )?;
            Ok(())
        }
    }
}

fn collect_inputs(
    positional: &[String],
    lists: &[String],
    file: Option<&PathBuf>,
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut inputs = split_targets(positional);
    inputs.extend(split_targets(lists));
    if let Some(path) = file {
        let lines = read_target_lines(path)
            .map_err(|err| format!("failed to read targets from {}: {err}", path.display()))?;
        inputs.extend(lines);
    }
    Ok(inputs)
}

async fn probe_tcp(json: bool, config: FileConfig, args: TcpArgs) -> CliResult {
    let defaults = config.probe;

    let mut inputs = collect_inputs(&args.targets, &args.target_lists, args.targets_file.as_ref())?;
    inputs.extend(split_targets(&config.targets));
    if inputs.is_empty() {
        return Err("need at least one target".into());
    }

    let record_dir = args.record_dir.unwrap_or(defaults.record_dir);
    let params = ProbeParams {
        run_id: args.run_id.unwrap_or_default(),
        case_id: args.case_id.unwrap_or(defaults.case_id),
        timeout: duration_from_secs(args.timeout.unwrap_or(defaults.timeout_secs)),
        concurrency: concurrency_from(args.concurrency.unwrap_or(defaults.concurrency)),
        retries: retries_from(args.retries.unwrap_or(defaults.retries)),
        record_dir: (!record_dir.is_empty()).then(|| PathBuf::from(record_dir)),
    }
    .normalized();

    // A deadline of zero or less leaves the run unbounded.
    let budget = args
        .deadline
        .or(defaults.deadline_secs)
        .map(duration_from_secs);
    let scope = match budget {
        Some(budget) if !budget.is_zero() => CancelScope::with_timeout(budget),
        _ => CancelScope::new(),
    };
    let signal_scope = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, canceling run");
            signal_scope.cancel();
        }
    });

    let output: SharedOutput = Arc::new(Mutex::new(Output::stdout(json)));
    let counts: Arc<Mutex<BTreeMap<&'static str, usize>>> = Arc::new(Mutex::new(
        ErrorClass::ALL.iter().map(|class| (class.as_str(), 0)).collect(),
    ));

    output
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .event(
            "run.start",
            &json!({
                "run_id": params.run_id,
                "case_id": params.case_id,
                "targets": inputs.len(),
                "timeout_ms": params.timeout.as_millis() as u64,
                "concurrency": params.concurrency,
                "retries": params.retries,
                "record_dir": params.record_dir,
                "deadline": scope.deadline().is_some(),
            }),
        )?;

    let deliver = {
        let output = Arc::clone(&output);
        let counts = Arc::clone(&counts);
        move |record: SessionRecord| {
            *counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(record.error_class.as_str())
                .or_default() += 1;
            if let Err(err) = output
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .session(&record)
            {
                log::warn!("failed to write session event for {}: {err}", record.target_id);
            }
        }
    };

    let (probe_targets, local_failures) = targets::split_resolved(&inputs, &params);
    for record in local_failures {
        if let Some(dir) = &params.record_dir {
            if let Err(err) = write_tcp_record(
                dir,
                &params.run_id,
                &params.case_id,
                &record.target_id,
                &record,
            )
            .await
            {
                log::warn!("failed to persist record for {}: {err}", record.target_id);
            }
        }
        deliver(record);
    }

    let started = tokio::time::Instant::now();
    run_tcp_probe(&scope, params.clone(), probe_targets, deliver).await?;
    let elapsed = started.elapsed();

    let counts = counts
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    let ok = counts.get(ErrorClass::Ok.as_str()).copied().unwrap_or_default();
    let mut output = output.lock().unwrap_or_else(PoisonError::into_inner);
    output.event(
        "run.end",
        &json!({
            "run_id": params.run_id,
            "case_id": params.case_id,
            "targets": inputs.len(),
            "ok": ok,
            "failed": inputs.len().saturating_sub(ok),
            "elapsed_ms": elapsed.as_millis() as u64,
            "canceled": scope.cause().map(|cause| cause.to_string()),
        }),
    )?;
    output.event(
        "run.summary",
        &json!({
            "run_id": params.run_id,
            "classes": counts,
        }),
    )?;
    Ok(())
}

fn parse_targets(json: bool, args: ParseArgs) -> CliResult {
    let inputs = collect_inputs(&args.targets, &[], args.file.as_ref())?;
    if inputs.is_empty() {
        return Err("need at least one target".into());
    }

    let mut output = Output::stdout(json);
    for raw in &inputs {
        let data = match targets::parse_any(raw) {
            Ok(target) => json!({
                "raw": raw,
                "ok": true,
                "target_id": target.target_id,
                "node": target.node_string(),
                "tcp": target.tcp_endpoint,
                "udp": target.udp_endpoint,
            }),
            Err(err) => json!({
                "raw": raw,
                "ok": false,
                "error": err.to_string(),
            }),
        };
        output.event("target", &data)?;
    }
    Ok(())
}
