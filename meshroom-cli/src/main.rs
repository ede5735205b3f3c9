use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use std::net::SocketAddr;

mod join;

#[derive(Parser)]
#[command(name = "meshroom")]
#[command(about = "Full-mesh WebRTC rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, default_value = "0.0.0.0:3000")]
        bind: SocketAddr,
    },
    /// Join a room and print who comes and goes.
    Join {
        #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
        url: String,

        #[arg(short, long)]
        room: String,

        #[arg(short, long)]
        name: Option<String>,

        /// STUN server, repeatable. Defaults to Google's public server.
        #[arg(long)]
        stun: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().context("Invalid log directive")?),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay { bind } => {
            println!("{}", "📡 Starting signaling relay...".green().bold());
            meshroom_relay::serve(meshroom_relay::RelayConfig { bind }).await
        }
        Commands::Join {
            url,
            room,
            name,
            stun,
        } => {
            let name = match name {
                Some(name) => name,
                None => Input::<String>::new()
                    .with_prompt("Display name")
                    .interact_text()
                    .context("Failed to read display name")?,
            };
            join::run(join::JoinArgs {
                url,
                room,
                name,
                stun,
            })
            .await
        }
    }
}
