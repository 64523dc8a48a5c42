use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use clap::{Parser, Subcommand};
use codectx_core::config::Config;
use codectx_core::{build_context, resolve_config_path};
use codectx_gateway::GatewayServer;
use codectx_index::{AppContext, IndexWatcher, IngestReport, LanguageKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "codectx", version, about = "Semantic code-context indexer")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Index the project once and print the report.
    Ingest {
        /// Overrides `index.project_root`.
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Search the index and print ranked hits as JSON.
    Query {
        text: String,
        /// Hits from this path are listed first.
        #[arg(long)]
        current_file: Option<String>,
        #[arg(long)]
        top_n: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            config.validate()?;
            serve(config).await
        }
        Command::Ingest { root } => {
            if let Some(root) = root {
                config.index.project_root = root;
            }
            config.validate()?;
            ingest_once(&config).await
        }
        Command::Query {
            text,
            current_file,
            top_n,
        } => {
            if let Some(n) = top_n {
                config.query.top_n = n;
            }
            config.validate()?;
            query_once(&config, &text, current_file.as_deref()).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone(), Some(shutdown_tx.clone()));

    let slot = Arc::new(OnceLock::new());
    let server = GatewayServer::new(
        &config.server.bind,
        config.server.port,
        Arc::clone(&slot),
        shutdown_rx,
    )
    .with_auth(config.server.auth_token.clone())
    .with_rate_limit(config.server.rate_limit)
    .with_max_body_size(config.server.max_body_size);
    let server_handle = tokio::spawn(server.serve());

    let context = match build_context(&config).await {
        Ok(context) => Arc::new(context),
        Err(e) => {
            let _ = shutdown_tx.send(true);
            let _ = server_handle.await;
            return Err(e);
        }
    };
    if slot.set(Arc::clone(&context)).is_err() {
        anyhow::bail!("context initialized twice");
    }
    tracing::info!("context store initialized");

    if config.index.startup_ingest {
        let context = Arc::clone(&context);
        let config = config.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_plans(&context, &config, &cancel).await;
        });
    }

    let _watcher = if config.index.watch {
        match IndexWatcher::start(
            &config.index.project_root,
            config.index.extensions(),
            Arc::clone(&context.indexer),
        ) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!("index watcher failed to start: {e:#}");
                None
            }
        }
    } else {
        None
    };

    server_handle
        .await
        .context("gateway task panicked")?
        .context("gateway failed")?;
    cancel.cancel();
    tracing::info!("shut down");
    Ok(())
}

async fn ingest_once(config: &Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone(), None);

    let context = build_context(config).await?;
    let reports = run_plans(&context, config, &cancel).await;
    let summary: serde_json::Map<String, serde_json::Value> = reports
        .into_iter()
        .map(|(language, report)| Ok((language, serde_json::to_value(report)?)))
        .collect::<Result<_, serde_json::Error>>()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn query_once(config: &Config, text: &str, current_file: Option<&str>) -> anyhow::Result<()> {
    let context = build_context(config).await?;
    let hits = context
        .query
        .search(text, current_file)
        .await
        .context("query failed")?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

/// Run every configured language plan in order; failures are logged per plan.
async fn run_plans(
    context: &AppContext,
    config: &Config,
    cancel: &CancellationToken,
) -> Vec<(String, IngestReport)> {
    let mut reports = Vec::new();
    for plan in config.ingest_plans() {
        if cancel.is_cancelled() {
            break;
        }
        let language = plan.language.map_or("auto", LanguageKind::id).to_owned();
        match context.indexer.ingest(&plan, cancel).await {
            Ok(report) => {
                tracing::info!(
                    language = %language,
                    files = report.files_indexed,
                    records = report.records_written,
                    failed = report.files_failed,
                    "project indexed"
                );
                reports.push((language, report));
            }
            Err(e) => tracing::warn!(language = %language, "project indexing failed: {e:#}"),
        }
    }
    reports
}

fn spawn_signal_handler(cancel: CancellationToken, shutdown_tx: Option<watch::Sender<bool>>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        cancel.cancel();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
    });
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries command output.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["codectx"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["codectx", "ingest", "--config", "ctx.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ctx.toml")));
        assert!(matches!(cli.command, Some(Command::Ingest { root: None })));
    }

    #[test]
    fn query_arguments() {
        let cli = Cli::try_parse_from([
            "codectx",
            "query",
            "where is auth handled",
            "--current-file",
            "src/auth.js",
            "--top-n",
            "3",
        ])
        .unwrap();
        let Some(Command::Query {
            text,
            current_file,
            top_n,
        }) = cli.command
        else {
            panic!("expected query command");
        };
        assert_eq!(text, "where is auth handled");
        assert_eq!(current_file.as_deref(), Some("src/auth.js"));
        assert_eq!(top_n, Some(3));
    }

    #[test]
    fn query_requires_text() {
        assert!(Cli::try_parse_from(["codectx", "query"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
