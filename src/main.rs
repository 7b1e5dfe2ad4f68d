//! Operator tool for a policy-watcher channel.
//!
//! `tail` prints every policy update replicas announce; `reload` asks every
//! replica to reload its whole policy from the database.

use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use futures::FutureExt;
use policy_watcher::metrics;
use policy_watcher::Message;
use policy_watcher::Result;
use policy_watcher::UpdateCallback;
use policy_watcher::Watcher;
use policy_watcher::WatcherConfig;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;

#[derive(Parser)]
#[command(name = "policy-watcher")]
#[command(about = "Inspect and drive a policy-watcher notification channel")]
struct Cli {
    /// Configuration file merged over CONFIG_PATH and the defaults
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every policy update seen on the channel until interrupted
    Tail {
        /// Dump watcher metrics on exit
        #[arg(long)]
        metrics: bool,
    },
    /// Ask every replica to reload its policy
    Reload,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = WatcherConfig::new()?;
    if let Some(path) = &cli.config {
        config = config.with_override_config(path)?;
    }
    let config = config.validate()?;

    match cli.command {
        Command::Tail { metrics } => tail(config, metrics).await,
        Command::Reload => reload(config).await,
    }
}

async fn tail(
    config: WatcherConfig,
    dump_metrics: bool,
) -> Result<()> {
    let watcher = Watcher::connect(config).await?;

    let printer: UpdateCallback = Arc::new(|raw: String| {
        async move {
            match Message::decode(&raw) {
                Ok(message) => print_update(&message),
                Err(e) => println!("[UNDECODABLE] {e}: {raw}"),
            }
        }
        .boxed()
    });
    watcher.set_update_callback(printer);

    println!("Tailing channel {} (Ctrl+C to exit)", watcher.config().channel.name);
    if let Err(e) = graceful_shutdown().await {
        error!("Failed to listen for shutdown signals: {}", e);
    }

    let stats = watcher.stats();
    info!(
        received = stats.received,
        dispatched = stats.dispatched,
        dropped = stats.dropped,
        "tail finished"
    );
    if dump_metrics {
        print!("{}", metrics::render());
    }

    watcher.close().await?;
    Ok(())
}

async fn reload(config: WatcherConfig) -> Result<()> {
    let watcher = Watcher::connect(config).await?;

    let report = watcher.update().await?;
    println!(
        "Requested full reload on {} ({} bytes)",
        watcher.config().channel.name,
        report.sent_bytes
    );

    watcher.close().await?;
    Ok(())
}

fn print_update(message: &Message) {
    let target = if message.sec.is_empty() {
        String::new()
    } else {
        format!(" {}/{}", message.sec, message.ptype)
    };
    println!("[{}] from {}{}", message.method, message.id, target);

    for (old, new) in message.old_rules.iter().zip(&message.new_rules) {
        println!("    {} -> {}", old.join(", "), new.join(", "));
    }
    if message.old_rules.is_empty() {
        for rule in &message.new_rules {
            println!("    {}", rule.join(", "));
        }
    }
    if let Some(index) = message.field_index {
        println!("    filter from field {}: {}", index, message.field_values.join(", "));
    }
}

async fn graceful_shutdown() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }
    Ok(())
}
