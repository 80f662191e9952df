use clap::{Parser, Subcommand};
use magpie::{
    BiliClient, CancelToken, CleanOptions, CrawlerConfig, CredentialStore, DatasetStore,
    EnvCredentialSource, FfmpegMuxer, FfprobeProber, MaintenanceEngine, Orchestrator,
    SessionManager, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the stored cookie set for login.
const COOKIE_ENV: &str = "MAGPIE_COOKIES";

#[derive(Parser)]
#[command(name = "magpie")]
#[command(about = "Keyword-driven video dataset crawler", long_about = None)]
struct Cli {
    /// Path to a configuration file (defaults to ./magpie.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl keywords into the dataset
    Crawl {
        /// Keywords to search
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// Offline dataset maintenance
    Maintain {
        #[command(subcommand)]
        operation: MaintainOp,
    },
}

#[derive(Subcommand)]
enum MaintainOp {
    /// Report the orphan categories without touching anything
    Analyze,

    /// Reconcile the index with the artifacts on disk
    Sync {
        /// Report the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every item whose duration exceeds the limit
    FilterDuration {
        /// Duration limit in seconds
        max_seconds: u64,
        /// Report the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove orphaned artifacts
    Clean {
        /// Delete media files that have no metadata file
        #[arg(long)]
        media: bool,
        /// Delete metadata files that have no media file
        #[arg(long)]
        metadata: bool,
        /// Drop index entries that have neither file
        #[arg(long)]
        index: bool,
        /// Report the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    magpie::observability::init();

    let cli = Cli::parse();
    let config = CrawlerConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Crawl { keywords } => crawl(config, keywords).await,
        Commands::Maintain { operation } => maintain(config, operation).await,
    }
}

async fn crawl(config: CrawlerConfig, keywords: Vec<String>) -> anyhow::Result<()> {
    let transport = Arc::new(Transport::new(&config.network)?);
    if !config.network.probe_urls.is_empty() {
        transport.precheck(&config.network.probe_urls).await?;
    }

    let remote = Arc::new(BiliClient::new(transport.clone()));
    let store = Arc::new(DatasetStore::open(&config.storage).await?);
    let session = Arc::new(SessionManager::new(
        remote.clone(),
        Arc::new(EnvCredentialSource::new(COOKIE_ENV)),
        CredentialStore::new(config.storage.credential_file.clone()),
        config.network.max_retries,
        config.network.retry_base_interval,
    ));
    let muxer = Arc::new(FfmpegMuxer::new(config.download.ffmpeg_path.clone()));

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping intake");
                cancel.cancel();
            }
        });
    }

    let orchestrator = Orchestrator::new(
        remote,
        store,
        session,
        muxer,
        Some(transport.retry_stats()),
        config,
        cancel,
    );
    let report = orchestrator.run(keywords).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn maintain(config: CrawlerConfig, operation: MaintainOp) -> anyhow::Result<()> {
    let store = Arc::new(DatasetStore::open(&config.storage).await?);
    let prober = Arc::new(FfprobeProber::new(config.download.ffprobe_path.clone()));
    let engine = MaintenanceEngine::new(store, Some(prober));

    match operation {
        MaintainOp::Analyze => {
            let report = engine.analyze().await?;
            println!("{report:#?}");
        }
        MaintainOp::Sync { dry_run } => {
            let report = engine.sync_index(dry_run).await?;
            println!("{report:#?}");
        }
        MaintainOp::FilterDuration {
            max_seconds,
            dry_run,
        } => {
            let report = engine.filter_by_duration(max_seconds, dry_run).await?;
            println!("{report:#?}");
        }
        MaintainOp::Clean {
            media,
            metadata,
            index,
            dry_run,
        } => {
            let report = engine
                .clean(CleanOptions {
                    clean_media_orphans: media,
                    clean_metadata_orphans: metadata,
                    update_index: index,
                    dry_run,
                })
                .await?;
            println!("{report:#?}");
        }
    }
    Ok(())
}
