//! Void Arena
//!
//! Headless skirmish runner. Loads an arena description, spawns a player
//! dummy, hostiles, an elite and an allied squad, then runs the fixed-tick
//! simulation and prints what happened to everyone.
//!
//! Run with: cargo run -p void_arena -- --config arena.toml
//!       or: cargo run -p void_arena -- arena.toml --json

mod arena;
mod config;

use arena::{Arena, RunSummary};
use config::ArenaConfig;

struct Args {
    config: Option<String>,
    json: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self {
            config: None,
            json: false,
        };
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => args.config = iter.next(),
                "--json" => args.json = true,
                flag if flag.starts_with("--") => log::warn!("ignoring unknown flag {flag}"),
                // First positional argument is the arena file
                path if args.config.is_none() => args.config = Some(path.to_string()),
                _ => {}
            }
        }
        args
    }
}

fn load_config(args: &Args) -> Result<ArenaConfig, config::ArenaError> {
    match &args.config {
        Some(path) => {
            let config = ArenaConfig::load(path)?;
            log::info!("Loaded arena from {path}");
            Ok(config)
        }
        None => {
            log::info!("No arena file given, using the built-in skirmish");
            Ok(ArenaConfig::builtin())
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} ticks, {:.1}s simulated, player health {:.0}%, {} deaths",
        summary.ticks,
        summary.elapsed,
        summary.player_health * 100.0,
        summary.deaths
    );
    println!(
        "{:>5}  {:<8} {:<9} {:>6} {:>6} {:>5} {:>5} {:>8}",
        "id", "kind", "state", "health", "shots", "hits", "kills", "damage"
    );
    for agent in &summary.agents {
        println!(
            "{:>5}  {:<8} {:<9} {:>5.0}% {:>6} {:>5} {:>5} {:>8.1}",
            agent.id,
            agent.kind,
            agent.state,
            agent.health * 100.0,
            agent.shots_fired,
            agent.hits,
            agent.kills,
            agent.damage_dealt
        );
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load arena: {e}");
            std::process::exit(1);
        }
    };

    let mut arena = match Arena::build(&config) {
        Ok(arena) => arena,
        Err(e) => {
            log::error!("Failed to build arena: {e}");
            std::process::exit(1);
        }
    };
    log::info!(
        "Running {} ticks at {} Hz with {} squad members",
        config.tick_count(),
        config.arena.tick_rate,
        arena.squad().len()
    );

    arena.run(config.tick_count(), config.tick_delta());
    let summary = arena.summary();

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("Failed to encode summary: {e}"),
        }
    } else {
        print_summary(&summary);
    }
}
