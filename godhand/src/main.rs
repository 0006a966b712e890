//! Godhand - gesture combat and learned enemy steering, headless driver.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use godhand::rl::{
    AgentConfig, FileStore, MemoryStore, ModelStore, PersistedModel, QLearningAgent, StateKey,
};
use godhand::sim::{HeadlessConfig, Simulation};
use godhand::tracking::TrackingMode;

#[derive(Parser, Debug)]
#[command(name = "godhand", version, about = "Gesture combat with a learned enemy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the headless frame loop and train the enemy agent
    Simulate {
        /// Episodes to run
        #[arg(long, default_value = "50")]
        episodes: u32,

        /// Seed for the agent and spawn positions (default: random)
        #[arg(long)]
        seed: Option<u64>,

        /// Model directory (default: $XDG_DATA_HOME/godhand)
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Keep the model in memory only
        #[arg(long)]
        no_persist: bool,

        /// Discard any saved model before starting
        #[arg(long)]
        fresh: bool,

        /// Simulated frame length in milliseconds
        #[arg(long, default_value = "33")]
        frame_ms: u64,

        /// Arena size as WxH
        #[arg(long, default_value = "1280x720")]
        arena: String,

        /// Two-player hand tracking (four hands)
        #[arg(long)]
        coop: bool,

        /// Abandon an episode after N seconds
        #[arg(long, default_value = "60")]
        max_episode_secs: u64,
    },

    /// Inspect or clear a saved model
    Model {
        #[command(subcommand)]
        action: ModelAction,

        /// Model directory (default: $XDG_DATA_HOME/godhand)
        #[arg(long, global = true)]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ModelAction {
    /// Print training statistics and the greedy action per state
    Show,
    /// Delete the saved model
    Reset,
}

/// `$XDG_DATA_HOME/godhand`, falling back to `~/.local/share/godhand`.
fn default_model_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(dir).join("godhand");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/share/godhand"),
        Err(_) => PathBuf::from("/tmp/godhand"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "godhand=info".into()),
        )
        .init();

    match cli.command {
        Command::Simulate {
            episodes,
            seed,
            model_dir,
            no_persist,
            fresh,
            frame_ms,
            arena,
            coop,
            max_episode_secs,
        } => {
            let (width, height) = HeadlessConfig::parse_resolution(&arena)
                .with_context(|| format!("invalid arena size {arena:?}, expected WxH"))?;
            anyhow::ensure!(frame_ms > 0, "--frame-ms must be positive");

            let store: Box<dyn ModelStore> = if no_persist {
                Box::new(MemoryStore::new())
            } else {
                let dir = model_dir.unwrap_or_else(default_model_dir);
                info!("model directory: {}", dir.display());
                Box::new(FileStore::new(dir))
            };
            let mut agent = match seed {
                Some(seed) => QLearningAgent::seeded(AgentConfig::default(), store, seed),
                None => QLearningAgent::new(AgentConfig::default(), store),
            };
            if fresh {
                agent.reset_model();
            }

            let config = HeadlessConfig {
                episodes,
                frame_ms,
                max_episode_ms: max_episode_secs.saturating_mul(1000),
                width,
                height,
                mode: if coop {
                    TrackingMode::Coop
                } else {
                    TrackingMode::Solo
                },
                seed: seed.unwrap_or_else(rand::random),
                ..Default::default()
            };
            let mut sim = Simulation::new(config, agent);
            let report = sim.run();
            sim.pilot_mut().agent_mut().save_model();
            info!("simulation finished: {}", report.status_sexp());
            println!("{}", report.status_sexp());
        }

        Command::Model { action, model_dir } => {
            let store = FileStore::new(model_dir.unwrap_or_else(default_model_dir));
            match action {
                ModelAction::Show => show_model(&store)?,
                ModelAction::Reset => {
                    let mut agent =
                        QLearningAgent::new(AgentConfig::default(), Box::new(store.clone()));
                    agent.reset_model();
                    println!("removed {}", store.path_for(&agent.config().storage_key).display());
                }
            }
        }
    }

    Ok(())
}

fn show_model(store: &FileStore) -> anyhow::Result<()> {
    let key = AgentConfig::default().storage_key;
    let Some(json) = store.load(&key)? else {
        println!("no saved model in {}", store.dir().display());
        return Ok(());
    };
    let model = PersistedModel::from_json(&json)?;

    println!("model:       {}", store.path_for(&key).display());
    println!(
        "version:     {}",
        model.version.map_or_else(|| "unversioned".to_string(), |v| v.to_string())
    );
    println!("episodes:    {}", model.episodes);
    println!("epsilon:     {:.3}", model.epsilon);
    println!("states:      {}", model.q_table.len());
    println!("total:       {:.1}", model.total_reward);
    println!("avg reward:  {:.2}", model.average_reward());
    for (key, row) in &model.q_table {
        let marker = if key.parse::<StateKey>().is_ok() { "" } else { " (unreadable)" };
        println!(
            "  {:<12} {:<8} max {:>8.2}{}",
            key,
            row.best().as_str(),
            row.max(),
            marker
        );
    }
    Ok(())
}
