//! Counter terminal front-end

use anyhow::Result;
use counter_client::{Config, CounterSession, Intent, Outcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the panel on stdout
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  RPC:            {}", config.rpc_url);
    info!("  Counter:        {}", config.counter_address);
    info!(
        "  Account:        {}",
        config.account.map_or_else(|| "not connected".to_string(), |a| a.to_string())
    );
    info!("  Settle delay:   {} ms", config.timing.settle_delay.as_millis());
    if config.trace.enabled {
        info!("  Journal:        {}", config.trace.path.display());
    }
    let config_json = serde_json::to_string(&config)?;
    debug!(config = %config_json, "Loaded configuration");

    let mut session = CounterSession::connect(&config)?;
    let mut changes = session.watch();
    session.start().await;
    println!("{}\n", session.render());
    if let Some(balances) = session.portfolio_text() {
        println!("{balances}\n");
    }
    changes.mark_seen();
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(intent) = Intent::parse(&line) else {
                    println!("Unknown command `{}`. Type `help` for commands.", line.trim());
                    continue;
                };
                match session.dispatch(intent).await {
                    Outcome::Quit => break,
                    Outcome::Message(text) => println!("{text}\n"),
                    Outcome::Submitted(_) | Outcome::Refreshed(_) | Outcome::Rejected(_) => {
                        println!("{}\n", session.render());
                        changes.mark_seen();
                    }
                }
            }
            alive = changes.changed() => {
                if !alive {
                    break;
                }
                println!("{}\n", session.render());
            }
        }
    }

    info!("Shutting down");
    session.shutdown();
    Ok(())
}
