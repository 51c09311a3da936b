use std::process;
use std::sync::Arc;

use anyhow::Context;
use cauldron::TracingSink;
use cauldron_cli::cli::{Command, FeastOptions, USAGE, parse_args};
use cauldron_cli::logging::init_tracing;
use cauldron_cli::{run_feast, run_race};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(command) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Feast(options) => feast(&options),
        Command::Race {
            increments,
            decrements,
            counter,
            json,
        } => {
            let outcome = run_race(increments, decrements, counter);
            if json {
                let json = serde_json::to_string_pretty(&outcome)
                    .context("failed to serialize race outcome")?;
                println!("{json}");
            } else {
                println!("{outcome}");
            }
            Ok(())
        }
    }
}

fn feast(options: &FeastOptions) -> anyhow::Result<()> {
    let config = options.resolve()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let report = runtime.block_on(run_feast(&config, Arc::new(TracingSink)))?;

    if options.json {
        let json =
            serde_json::to_string_pretty(&report).context("failed to serialize feast report")?;
        println!("{json}");
    } else {
        println!("{report}");
    }
    Ok(())
}
