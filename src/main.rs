// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use policy_engine::policy::cache::{PolicyCache, DEFAULT_CAPACITY};
use policy_engine::server;
use policy_engine::service::{InferRequest, InferService};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the inference API over HTTP
    Serve {
        /// Address to bind
        #[arg(long, env = "POLICY_ENGINE_HOST", default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, env = "POLICY_ENGINE_PORT", default_value_t = 8080)]
        port: u16,

        /// Number of compiled policies kept in memory
        #[arg(long, env = "POLICY_CACHE_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
        cache_capacity: usize,
    },
    /// Evaluate a policy file against one input record
    Eval {
        /// Path to the policy graph (DOT)
        #[arg(long)]
        policy: PathBuf,

        /// Input record as a JSON object
        #[arg(short, long)]
        input: String,

        /// Optional field type schema (YAML or JSON)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve {
            host,
            port,
            cache_capacity,
        } => {
            let service =
                InferService::with_capacity(cache_capacity).context("Invalid cache capacity")?;
            log::info!("Policy cache capacity: {}", service.cache().capacity());

            server::serve(SocketAddr::new(host, port), service)
                .await
                .context("Server failed")?;
        }
        Commands::Eval {
            policy,
            input,
            schema,
        } => {
            let request = InferRequest::from_files(&policy, &input, schema.as_deref())
                .with_context(|| format!("Failed to load request for {}", policy.display()))?;

            let service = InferService::new(Arc::new(PolicyCache::default()));
            let decision = service.decide(&request)?;
            log::info!("Path: {}", decision.evaluation.path.join(" -> "));

            println!("{}", serde_json::to_string_pretty(&decision.output)?);
        }
    }

    Ok(())
}
