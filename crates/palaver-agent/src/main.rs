//! Palaver — shared-chat agents with relationship memory

use anyhow::Context;
use clap::{Parser, Subcommand};
use palaver_agent::{AgentRuntime, ChannelClient, PalaverConfig};
use palaver_llm::AnthropicBackend;
use palaver_store::HttpContextStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "palaver", about = "Palaver — shared-chat agents with relationship memory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn the configured agents against the shared channel
    Run {
        /// Config file path
        #[arg(short, long, default_value = "palaver.toml")]
        config: PathBuf,
        /// Override the channel WebSocket URL
        #[arg(long)]
        url: Option<String>,
        /// Override the store base URL
        #[arg(long)]
        store_url: Option<String>,
    },
    /// Write the default config to a file
    InitConfig {
        #[arg(default_value = "palaver.toml")]
        path: PathBuf,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, url, store_url } => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "palaver=info".into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut config = PalaverConfig::load(&config);
            if let Some(url) = url {
                config.channel.url = url;
            }
            if let Some(store_url) = store_url {
                config.store.base_url = store_url;
            }
            run(config).await
        }
        Commands::InitConfig { path } => {
            let config = PalaverConfig::default();
            std::fs::write(&path, config.to_toml())
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
        Commands::Version => {
            println!("palaver {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run(config: PalaverConfig) -> anyhow::Result<()> {
    if config.agents.is_empty() {
        anyhow::bail!("no agents configured");
    }

    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY environment variable not set")?;

    let backend = Arc::new(AnthropicBackend::new(api_key));
    let store = Arc::new(HttpContextStore::new(config.store.base_url.clone()));
    let settings = config.pipeline_settings();

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    for entry in &config.agents {
        let persona = entry.to_persona();
        tracing::info!(
            agent = %persona.id,
            archetype = ?persona.archetype,
            "spawning agent"
        );

        // One socket per agent: each runtime owns its connection lifecycle.
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::channel(256);

        let client = ChannelClient::new(config.channel.url.clone(), persona.id.to_string());
        handles.push(tokio::spawn(client.run(
            inbound_tx,
            outbound_rx,
            shutdown.clone(),
        )));

        let runtime = AgentRuntime::new(
            persona,
            store.clone(),
            backend.clone(),
            settings.clone(),
            outbound_tx,
        );
        handles.push(tokio::spawn(runtime.run(inbound_rx, shutdown.clone())));
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    shutdown.cancel();

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
