//! ATB CLI
//!
//! `atb simulate --scenario battle.json [--out trace.json]`
//! `atb config --preset ctb`

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use atb_cli::{init_logging, preset_json, simulate_file, Preset};
use atb_core::BattleResponse;

#[derive(Parser)]
#[command(name = "atb")]
#[command(about = "Run scripted active-time battles", long_about = None)]
struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a battle scenario
    Simulate {
        /// Scenario JSON file path
        #[arg(long)]
        scenario: PathBuf,

        /// Write the full event trace to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print a config preset as JSON
    Config {
        #[arg(long, value_enum, default_value = "atb")]
        preset: Preset,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate { scenario, out } => {
            println!("Simulating battle...");
            println!("   Scenario: {}", scenario.display());

            let response = simulate_file(&scenario, out.as_deref())?;
            print_summary(&response);

            if let Some(out) = out {
                println!("\nTrace saved to: {}", out.display());
            }
        }

        Commands::Config { preset } => {
            println!("{}", preset_json(preset)?);
        }
    }

    Ok(())
}

fn print_summary(response: &BattleResponse) {
    match response.outcome {
        Some(outcome) => println!("\nOutcome: {:?}", outcome),
        None => println!("\nOutcome: undecided (frame limit reached)"),
    }
    println!("   Frames: {}", response.frames);
    println!("   Rounds: {}", response.rounds);
    println!("   Events: {}", response.events.len());
    for member in &response.members {
        let state = if member.alive { "alive" } else { "down" };
        println!("   {} hp={} {}", member.participant, member.hp, state);
    }
}
