//! flow-nodes - Main Entry Point
//!
//! Runs a flow file against newline-delimited JSON messages and prints every
//! message that leaves the flow.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use flow_nodes::config::{default_flow_path, FlowConfig, NodeType};
use flow_nodes::flow::{into_message, shared_store, Flow, FlowBridge, FlowEvent, FlowRunner};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory for a daily-rotated log file (in addition to stderr)
    #[clap(long, global = true)]
    log_dir: Option<PathBuf>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a flow, injecting one message per input line
    Run {
        /// Flow file (defaults to the platform config directory)
        flow: Option<PathBuf>,

        /// Newline-delimited JSON input; stdin when omitted
        #[clap(long)]
        input: Option<PathBuf>,

        /// Node receiving the input (defaults to the first node)
        #[clap(long)]
        inject: Option<String>,

        /// Keep the flow alive this long after the last input so timers can fire
        #[clap(long, default_value_t = 0)]
        linger_ms: u64,
    },
    /// Validate a flow file and print any corrections
    Check {
        flow: Option<PathBuf>,
    },
    /// List the available node types
    Nodes,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.log_dir.as_deref())?;

    match args.cmd {
        Command::Run {
            flow,
            input,
            inject,
            linger_ms,
        } => run(flow, input, inject, Duration::from_millis(linger_ms)),
        Command::Check { flow } => check(flow),
        Command::Nodes => {
            for ty in NodeType::all() {
                println!("{:<20} {}", ty.key(), ty.display_name());
                for line in ty.description().lines() {
                    println!("{:<20} {}", "", line.trim());
                }
            }
            Ok(())
        }
    }
}

fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flow_nodes=debug"));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "flow-nodes.log"));
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            Ok(None)
        }
    }
}

fn load(path: Option<PathBuf>) -> Result<(PathBuf, FlowConfig)> {
    let path = match path {
        Some(path) => path,
        None => default_flow_path().context("no flow file given and no config directory found")?,
    };
    let config = FlowConfig::load(&path)?;
    Ok((path, config))
}

fn check(path: Option<PathBuf>) -> Result<()> {
    let (path, mut config) = load(path)?;
    let warnings = config.validate()?;
    for warning in &warnings {
        println!("warning: {warning}");
    }
    println!(
        "{}: {} node(s), {} correction(s)",
        path.display(),
        config.nodes.len(),
        warnings.len()
    );
    Ok(())
}

fn run(path: Option<PathBuf>, input: Option<PathBuf>, inject: Option<String>, linger: Duration) -> Result<()> {
    let (path, mut config) = load(path)?;
    for warning in config.validate()? {
        tracing::warn!("{}", warning);
    }

    let target = match inject.or_else(|| config.nodes.first().map(|n| n.id.clone())) {
        Some(target) if config.find(&target).is_some() => target,
        Some(target) => bail!("no node '{}' in {}", target, path.display()),
        None => bail!("{} has no nodes", path.display()),
    };

    let flow = Flow::from_config(&config, shared_store())?;
    let (bridge, handle) = FlowRunner::spawn(flow)?;
    tracing::info!(flow = %config.name, inject = %target, "flow running");

    let reader: Box<dyn BufRead> = match &input {
        Some(file) => Box::new(std::io::BufReader::new(
            std::fs::File::open(file).with_context(|| format!("opening {}", file.display()))?,
        )),
        None => Box::new(std::io::stdin().lock()),
    };

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(value) => bridge.inject(target.as_str(), into_message(value))?,
            Err(e) => tracing::warn!(line = n + 1, "skipping invalid JSON: {}", e),
        }
        print_events(&bridge);
    }

    let until = Instant::now() + linger;
    while Instant::now() < until {
        if let Some(event) = bridge.recv_timeout(until.saturating_duration_since(Instant::now())) {
            print_event(&event);
        }
    }

    bridge.shutdown();
    loop {
        match bridge.recv_timeout(Duration::from_secs(5)) {
            Some(FlowEvent::Shutdown) | None => break,
            Some(event) => print_event(&event),
        }
    }
    if handle.join().is_err() {
        bail!("flow thread panicked");
    }
    Ok(())
}

fn print_events(bridge: &FlowBridge) {
    for event in bridge.drain() {
        print_event(&event);
    }
}

/// Outputs and debug values go to stdout as JSON lines; everything else is
/// already in the log.
fn print_event(event: &FlowEvent) {
    let line = match event {
        FlowEvent::Output { label, port, msg, .. } => serde_json::json!({
            "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "node": label,
            "port": port,
            "msg": msg,
        }),
        FlowEvent::Debug { label, value, at, .. } => serde_json::json!({
            "time": at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "node": label,
            "debug": value,
        }),
        _ => return,
    };
    println!("{line}");
}
