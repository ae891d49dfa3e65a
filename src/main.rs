use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fusion_viewer::backend::{BackendClient, GenerationBackend};
use fusion_viewer::config::Config;
use fusion_viewer::models::JobId;
use fusion_viewer::poller::{JobPoller, PollEvent};
use fusion_viewer::proxy::{AssetResolver, HttpAssetStore};
use fusion_viewer::viewer::{job_id_from_location, FileRenderer, ProxyClient, ViewerSession};
use fusion_viewer::{api, Error};

#[derive(Parser)]
#[command(name = "fusion-viewer")]
#[command(about = "Asset proxy, job poller and viewer for the generation backend")]
struct Cli {
    /// Config file (defaults to <config dir>/fusion-viewer/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Generation backend base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the same-origin asset proxy
    Serve {
        /// Port for the HTTP proxy
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create a generation job
    Create {
        prompt: String,
        /// Keep polling until the job finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Poll a job's status until it finishes
    Watch {
        job_id: String,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Resolve a job's scene and manifest through the proxy
    View {
        /// Job id, or a viewer URL carrying `?job_id=`
        job: String,
        /// Where to write the scene
        #[arg(short, long, default_value = "scene.glb")]
        out: PathBuf,
        /// Proxy base URL
        #[arg(long)]
        proxy: Option<String>,
    },
}

const DEFAULT_LOG_FILTER: &str = "fusion_viewer=debug,tower_http=debug";

/// Install the global subscriber. `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`].
///
/// `serve` logs to stdout. `create`, `watch` and `view` write job ids and
/// statuses to stdout for scripts to consume, so their logs go to stderr.
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if use_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_server = matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(!is_server);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }

    match cli.command {
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(&config).await?;
        }
        Some(Commands::Create { prompt, watch }) => {
            let backend = backend(&config)?;
            let job = backend
                .create_job(&prompt)
                .await
                .context("Failed to create job")?;
            println!("job_id: {}", job.id);
            if let Some(status) = &job.status {
                println!("status: {}", status);
            }
            if watch {
                watch_until_terminal(backend, job.id, &config).await?;
            }
        }
        Some(Commands::Watch {
            job_id,
            interval_ms,
        }) => {
            if let Some(ms) = interval_ms {
                config.poll_interval_ms = ms;
            }
            let job_id = JobId::parse(&job_id).map_err(Error::from)?;
            watch_until_terminal(backend(&config)?, job_id, &config).await?;
        }
        Some(Commands::View { job, out, proxy }) => {
            if let Some(proxy) = proxy {
                config.proxy_base = proxy;
            }
            view(&config, &job, out).await?;
        }
        None => serve(&config).await?,
    }

    Ok(())
}

fn backend(config: &Config) -> Result<Arc<dyn GenerationBackend>> {
    Ok(Arc::new(BackendClient::new(&config.api_base)?))
}

async fn serve(config: &Config) -> Result<()> {
    tracing::info!("Starting fusion-viewer proxy on {}", config.bind_addr());
    tracing::info!("Generation backend at {}", config.api_base);

    let client = reqwest::Client::new();
    let backend = BackendClient::with_client(&config.api_base, client.clone())?;
    let resolver = AssetResolver::new(Arc::new(backend), Arc::new(HttpAssetStore::new(client)));
    let app = api::create_router_with_config(resolver, config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        "fusion-viewer proxy listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Print status transitions until the job reaches a terminal status or Ctrl-C.
async fn watch_until_terminal(
    backend: Arc<dyn GenerationBackend>,
    job_id: JobId,
    config: &Config,
) -> Result<()> {
    let mut poller = JobPoller::new(backend);
    let mut events = poller.start(job_id, config.poll_interval())?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PollEvent::Status(status)) => {
                    println!("status: {}", status);
                    if status.is_terminal() {
                        break;
                    }
                }
                Some(PollEvent::Error(e)) => eprintln!("Failed to fetch status: {}", e),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.stop();
    Ok(())
}

async fn view(config: &Config, job: &str, out: PathBuf) -> Result<()> {
    let job_id = if job.contains("job_id=") {
        job_id_from_location(job)?
    } else {
        JobId::parse(job).map_err(Error::from)?
    };

    let source = Arc::new(ProxyClient::new(&config.proxy_base)?);
    let mut session = ViewerSession::new(job_id, source);
    session.activate().await;

    if let Some(prompt) = session.prompt() {
        println!("prompt: {}", prompt);
    } else if let Some(e) = session.manifest_error() {
        eprintln!("manifest unavailable: {}", e);
    }

    let mut renderer = FileRenderer::new(out);
    let loaded = session
        .present(&mut renderer)
        .with_context(|| format!("Failed to write {}", renderer.path().display()))?;
    if loaded {
        println!(
            "scene: {} ({} bytes)",
            renderer.path().display(),
            renderer.bytes_written()
        );
    } else if let Some(e) = session.scene_error() {
        eprintln!("scene unavailable: {}", e);
    }

    session.teardown();
    Ok(())
}
