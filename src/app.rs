use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use calc_api::{create_app, AppState};
use calc_core::AppConfig;
use calc_dispatcher::ExpressionService;
use calc_infrastructure::{create_repositories, MetricsCollector, Repositories};
use calc_worker::WorkerAgent;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

/// Which components this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Store, scheduler and HTTP API.
    Orchestrator,
    /// Worker agent polling a remote orchestrator.
    Agent,
    /// Both in one process.
    All,
}

impl AppMode {
    pub fn runs_orchestrator(self) -> bool {
        matches!(self, AppMode::Orchestrator | AppMode::All)
    }

    pub fn runs_agent(self) -> bool {
        matches!(self, AppMode::Agent | AppMode::All)
    }
}

impl FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orchestrator" => Ok(AppMode::Orchestrator),
            "agent" => Ok(AppMode::Agent),
            "all" => Ok(AppMode::All),
            _ => Err(anyhow::anyhow!("unsupported mode: {s}")),
        }
    }
}

pub struct Application {
    config: AppConfig,
    mode: AppMode,
    repositories: Option<Repositories>,
    metrics: MetricsCollector,
}

impl Application {
    /// Opens the store when the mode includes the orchestrator.
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!(mode = ?mode, "initializing application");

        let repositories = if mode.runs_orchestrator() {
            let repositories = create_repositories(&config.database)
                .await
                .with_context(|| format!("failed to open store {}", config.database.url))?;
            Some(repositories)
        } else {
            None
        };

        Ok(Self {
            config,
            mode,
            repositories,
            metrics: MetricsCollector::new(),
        })
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(mode = ?self.mode, "starting application");

        match self.mode {
            AppMode::Orchestrator => self.run_orchestrator(shutdown_rx).await,
            AppMode::Agent => self.run_agent(shutdown_rx).await,
            AppMode::All => {
                let agent_rx = shutdown_rx.resubscribe();
                tokio::try_join!(
                    self.run_orchestrator(shutdown_rx),
                    self.run_agent(agent_rx)
                )?;
                Ok(())
            }
        }
    }

    async fn run_orchestrator(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let repositories = self
            .repositories
            .clone()
            .context("orchestrator started without a store")?;

        let service = Arc::new(ExpressionService::new(
            repositories.expressions.clone(),
            repositories.tasks.clone(),
            &self.config.dispatcher,
            self.metrics.clone(),
        ));
        let app = create_app(AppState::new(service), &self.config.api);

        let bind_address = &self.config.api.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("failed to bind {bind_address}"))?;
        info!(address = %bind_address, "orchestrator listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("orchestrator received shutdown signal");
            })
            .await
            .context("http server failed")?;

        repositories.close().await;
        info!("orchestrator stopped");
        Ok(())
    }

    async fn run_agent(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let agent = WorkerAgent::from_config(&self.config.worker, self.metrics.clone())
            .context("failed to create worker agent")?;
        info!(
            agent_id = agent.agent_id(),
            dispatcher = %self.config.worker.dispatcher_url,
            "starting worker agent"
        );

        agent.run(shutdown_rx).await.context("worker agent failed")?;
        Ok(())
    }
}
