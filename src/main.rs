mod cli;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use facedb::EmbeddingStore;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facedb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store = EmbeddingStore::open(cli.store_config());

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => cli::run_repl(&store),
        Command::Serve { bind } => {
            tracing::info!(
                "Serving {} identities from '{}' on {}",
                store.count(),
                store.path().display(),
                bind
            );
            let store = web::Data::new(store);
            HttpServer::new(move || App::new().app_data(store.clone()).configure(facedb::server::config))
                .bind(&bind)
                .with_context(|| format!("failed to bind {}", bind))?
                .run()
                .await?;
        }
        command => cli::execute_command(&store, command)?,
    }

    Ok(())
}
