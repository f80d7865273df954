use std::env;
use std::fs;

use contracts::SimulationConfig;
use kernel_core::blocks::default_psub;
use kernel_core::{label_index, EventLog, SeededRandom, Simulation};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("kernel-cli <command>");
    println!("commands:");
    println!("  simulate <seed> [timesteps] [--json]");
    println!("    runs the default commons pipeline and prints one line per substep");
    println!("  run-config <path> [--json]");
    println!("    same, with the configuration read from a JSON file");
    println!("  labels");
    println!("  default-config");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_seed(value: Option<&String>) -> Result<u64, String> {
    let raw = value.ok_or_else(|| "missing seed".to_string())?;
    raw.trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid seed: {raw}"))
}

fn positional(args: &[String]) -> Vec<&String> {
    args.iter().filter(|arg| !arg.starts_with("--")).collect()
}

fn wants_json(args: &[String]) -> bool {
    args.iter().any(|arg| arg == "--json")
}

fn load_config(path: &str) -> Result<SimulationConfig, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    serde_json::from_str::<SimulationConfig>(&raw)
        .map_err(|err| format!("failed to parse {path}: {err}"))
}

fn print_rows(log: &EventLog, json: bool) -> Result<(), String> {
    for summary in log.summaries() {
        if json {
            let line = serde_json::to_string(&summary)
                .map_err(|err| format!("failed to encode row: {err}"))?;
            println!("{line}");
        } else {
            println!("{summary}");
        }
    }
    Ok(())
}

fn execute(config: SimulationConfig, json: bool) -> Result<(), String> {
    let psub = default_psub().map_err(|err| format!("invalid pipeline: {err}"))?;
    let seed = config.seed;
    let mut simulation = Simulation::<SeededRandom>::bootstrap(config, psub)
        .map_err(|err| format!("failed to bootstrap: {err}"))?;

    let outcome = simulation.run().map(|_| ());
    print_rows(simulation.event_log(), json)?;
    println!(
        "simulated seed={} rows={} log={} replay_hash={:016x} {}",
        seed,
        simulation.event_log().len(),
        simulation.event_log().status(),
        simulation.replay_hash(),
        simulation.status()
    );
    outcome.map_err(|err| format!("simulation aborted: {err}"))
}

fn run_simulate(args: &[String]) -> Result<(), String> {
    let positional = positional(args);
    let seed = parse_seed(positional.get(2).copied())?;
    let timesteps = positional
        .get(3)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| format!("invalid timesteps: {value}"))
        })
        .transpose()?
        .unwrap_or(SimulationConfig::default().timesteps);

    let config = SimulationConfig {
        run_id: format!("commons_seed_{seed}"),
        seed,
        timesteps,
        ..SimulationConfig::default()
    };
    execute(config, wants_json(args))
}

fn run_config(args: &[String]) -> Result<(), String> {
    let positional = positional(args);
    let path = positional
        .get(2)
        .ok_or_else(|| "missing config path".to_string())?;
    let config = load_config(path)?;
    info!(path = %path, run_id = %config.run_id, seed = config.seed, "loaded configuration");
    execute(config, wants_json(args))
}

fn print_labels() -> Result<(), String> {
    let psub = default_psub().map_err(|err| format!("invalid pipeline: {err}"))?;
    for (substep, label) in label_index(&psub) {
        println!("{substep}: {label}");
    }
    Ok(())
}

fn print_default_config() -> Result<(), String> {
    let encoded = serde_json::to_string_pretty(&SimulationConfig::default())
        .map_err(|err| format!("failed to encode config: {err}"))?;
    println!("{encoded}");
    Ok(())
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let result = match command {
        Some("simulate") => run_simulate(&args),
        Some("run-config") => run_config(&args),
        Some("labels") => print_labels(),
        Some("default-config") => print_default_config(),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
