use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use hoscord::{
    api::{
        auth::AuthClient,
        client::Client,
        model::{CallId, Server, ServerId, UserId},
        state::{Action, Store},
    },
    config::Config,
    ui,
};

#[derive(Parser)]
#[command(name = "hoscord", about = "Server and channel browser for the hosted chat platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List servers and open the first one
    Servers,
    /// Open direct messages
    Dms,
    /// Open one server's channels
    Channels {
        #[arg(long)]
        server: String,
    },
    CreateServer {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        image: String,
        /// Comma separated user ids
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,
    },
    CreateChannel {
        #[arg(long)]
        server: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,
    },
    /// Provision a voice channel in a server
    CreateCall {
        #[arg(long)]
        server: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,
    },
    JoinCall { call_id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env may carry RUST_LOG, so it is loaded before the filter is built
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeouts.request_secs))
        .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
        .build()?;
    let session = AuthClient::new(http, config.app_url.clone())
        .sign_in(&config.user)
        .await?;
    tracing::info!(user_id = %session.user_id, name = %session.name, "signed in");

    let client = Arc::new(Client::new(&config, &session)?);
    let store = Arc::new(Store::new(client.clone(), client));

    let me = session.user_id.clone();
    let mut changes = Box::pin(store.changes());
    let renderer = tokio::spawn(async move {
        while let Some(state) = changes.next().await {
            println!("{}\n", ui::render(&state, Some(&me)));
        }
    });

    run(&store, cli.command).await?;

    drop(store);
    renderer.await?;
    Ok(())
}

async fn run(store: &Arc<Store>, command: Command) -> Result<()> {
    match command {
        Command::Servers => {
            store.load_servers().await?;
        }
        Command::Dms => store.select_server(None).await?,
        Command::Channels { server } => {
            let server = find_server(store, &server).await?;
            store.select_server(Some(server)).await?;
        }
        Command::CreateServer {
            name,
            image,
            members,
        } => {
            let created = store.create_server(&name, &image, user_ids(members)).await?;
            println!("created server {} ({})", created.server.name, created.server.id);
            match created.call {
                Some(call_id) => println!("voice channel call {}", call_id),
                None => println!("voice channel could not be provisioned"),
            }
        }
        Command::CreateChannel {
            server,
            name,
            category,
            members,
        } => {
            let server = find_server(store, &server).await?;
            store.select_server(Some(server.clone())).await?;
            let channel = store
                .create_channel(&name, &category, user_ids(members))
                .await?;
            println!("created channel {}", channel.id);
            // creating does not refresh the grouping
            store.select_server(Some(server)).await?;
        }
        Command::CreateCall {
            server,
            name,
            members,
        } => {
            let server = find_server(store, &server).await?;
            let call_id = store.create_call(&server, &name, user_ids(members)).await?;
            println!("created call {}", call_id);
        }
        Command::JoinCall { call_id } => {
            store
                .dispatch(Action::SetActiveCall(Some(CallId(call_id))))
                .await?;
        }
    }
    Ok(())
}

async fn find_server(store: &Store, id: &str) -> Result<Server> {
    let id = ServerId(id.to_string());
    let servers = store.load_servers().await?;
    servers
        .into_iter()
        .find(|server| server.id == id)
        .with_context(|| format!("no server with id {}", id))
}

fn user_ids(members: Vec<String>) -> Vec<UserId> {
    members.into_iter().map(UserId).collect()
}
