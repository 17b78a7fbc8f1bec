//! Snake Royal Server
//!
//! Headless authority or follower. Runs the session loop at the tick rate
//! until Ctrl-C or, for a follower, until the authority goes away.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snake_royal::{
    core::{hash::short_hex, rng::ParkMiller},
    game::state::GameState,
    network::{Network, Session, Simulation},
    Config, TICK_RATE, VERSION,
};

/// Seconds between state hash log lines.
const HASH_LOG_INTERVAL_SECS: u64 = 5;

#[derive(Parser)]
#[clap(name = "snake-royal-server", version)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Display name sent to the authority
    #[clap(long)]
    name: Option<String>,

    /// JSON configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Run without a window (always the case for this binary)
    #[clap(long, default_value_t = false)]
    headless: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Host a session as the authority
    Host {
        /// Port to listen on
        port: Option<u16>,
        /// Address to bind
        address: Option<String>,
    },
    /// Join an authority at host[:port]
    Join {
        /// Authority address
        target: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .ok();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(name) = args.name {
        config.network.player_name = name;
    }

    info!("Snake Royal Server v{}", VERSION);
    info!("Tick Rate: {} Hz (default {})", config.session.tick_rate, TICK_RATE);
    if args.headless {
        info!("Headless mode");
    }

    let network = match args.command {
        Command::Host { port, address } => {
            if let Some(port) = port {
                config.network.port = port;
            }
            if let Some(address) = address {
                config.network.host = address;
            }
            Network::host(config.network.clone())?
        }
        Command::Join { target } => {
            let (host, port) = parse_target(&target, config.network.port)?;
            Network::join(&host, port, config.network.clone())
        }
    };

    let seed = config
        .session
        .seed
        .unwrap_or_else(|| u64::from(ParkMiller::from_time().next_u32()));
    let sim = GameState::new(seed, config.session.restart_delay_ticks);
    let session = Session::new(network, sim, config.session.clone());

    run(session).await
}

/// Split `host[:port]`.
fn parse_target(target: &str, default_port: u16) -> anyhow::Result<(String, u16)> {
    match target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {}", target))?;
            Ok((host.to_string(), port))
        }
        Some(_) => bail!("missing host in {}", target),
        None => Ok((target.to_string(), default_port)),
    }
}

async fn run(mut session: Session<GameState>) -> anyhow::Result<()> {
    let mut ticker = interval(session.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_hash_log = Instant::now();

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = session.update() {
                    error!("Session ended: {}", e);
                    break Err(e.into());
                }
                session.flush();

                if last_hash_log.elapsed().as_secs() >= HASH_LOG_INTERVAL_SECS {
                    last_hash_log = Instant::now();
                    let sim = session.sim();
                    info!(
                        "Tick {} state {:?} hash {}",
                        sim.tick(),
                        sim.round_state(),
                        short_hex(&sim.state_hash())
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break Ok(());
            }
        }
    };

    session.shutdown();
    result
}
