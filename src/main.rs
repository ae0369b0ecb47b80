use anyhow::Context;
use clap::Parser;
use ladon::{QueryPipeline, ServiceConfig, ServiceConfigBuilder, ServiceFront};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Regex rule matching service
#[derive(Parser, Debug)]
#[command(name = "ladon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML configuration file; command-line values override it
    #[arg(short = 'c', long = "config", env = "LADON_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "LADON_DEBUG")]
    debug: bool,

    /// Listen port [default: 8080]
    #[arg(long, env = "LADON_PORT")]
    port: Option<u16>,

    /// Rule file path (one `id<TAB>pattern<TAB>payload` per line)
    #[arg(long, env = "LADON_FILEPATH")]
    filepath: Option<PathBuf>,

    /// Compile flags applied to every rule [default: iu]
    #[arg(long, env = "LADON_FLAG")]
    flag: Option<String>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServiceConfig> {
        let base = match &self.config {
            Some(path) => ServiceConfig::from_yaml_file(path)
                .with_context(|| format!("reading config file {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        let mut builder = ServiceConfigBuilder::from_config(base);
        if self.debug {
            builder = builder.debug(true);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(path) = self.filepath {
            builder = builder.rule_path(path);
        }
        if let Some(flag) = self.flag {
            builder = builder.flags(flag);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve once `signal` fires. If the handler could not be installed the
/// service keeps running and never shuts down on its own.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!(error = %e, "Cannot listen for shutdown signal, serving until killed");
        std::future::pending::<()>().await;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config()?;
    init_tracing(config.debug);
    debug!(?config, "Starting");

    let flags = config.compile_flags()?;
    let rule_path = config
        .rule_path
        .clone()
        .context("empty rule file path")?;

    info!(path = %rule_path.display(), flags = %flags, "Loading rules");
    let pipeline = QueryPipeline::from_path(config.engine(), &rule_path, flags)
        .with_context(|| format!("building rule database from {}", rule_path.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    runtime.block_on(async move {
        let listener = TcpListener::bind(config.listen_addr())
            .await
            .with_context(|| format!("binding {}", config.listen_addr()))?;

        let service = Arc::new(ServiceFront::new(Arc::new(pipeline)));
        service
            .serve(listener, shutdown_on(tokio::signal::ctrl_c()))
            .await?;
        Ok::<(), anyhow::Error>(())
    })
}
