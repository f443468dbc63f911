use std::sync::Arc;
use std::time::{Duration, Instant};

use calc_core::config::WorkerConfig;
use calc_core::{SchedulerResult, TaskAssignment, TaskResultReport};
use calc_infrastructure::MetricsCollector;
use rand::Rng;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::components::{DispatcherClient, TaskSource};
use crate::executor::execute;

pub struct WorkerAgentBuilder {
    source: Arc<dyn TaskSource>,
    agent_id: String,
    computing_power: usize,
    poll_backoff: Duration,
    poll_jitter: Duration,
    metrics: MetricsCollector,
}

impl WorkerAgentBuilder {
    pub fn new(source: Arc<dyn TaskSource>) -> Self {
        Self {
            source,
            agent_id: local_agent_id(),
            computing_power: 5,
            poll_backoff: Duration::from_secs(1),
            poll_jitter: Duration::ZERO,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Number of concurrent workers; also the capacity of both queues.
    pub fn computing_power(mut self, computing_power: usize) -> Self {
        self.computing_power = computing_power.max(1);
        self
    }

    /// Pause after an empty or failed fetch.
    pub fn poll_backoff(mut self, poll_backoff: Duration) -> Self {
        self.poll_backoff = poll_backoff;
        self
    }

    /// Upper bound of the random delay added to each backoff.
    pub fn poll_jitter(mut self, poll_jitter: Duration) -> Self {
        self.poll_jitter = poll_jitter;
        self
    }

    pub fn metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> WorkerAgent {
        WorkerAgent {
            source: self.source,
            agent_id: self.agent_id,
            computing_power: self.computing_power,
            poll_backoff: self.poll_backoff,
            poll_jitter: self.poll_jitter,
            metrics: self.metrics,
        }
    }
}

/// Fetch loop, worker pool and report loop connected by two bounded queues.
///
/// ```text
/// fetch loop --tasks(N)--> N workers --results(N)--> report loop
/// ```
///
/// Stopping the fetch loop closes the task queue; workers finish what they
/// hold and exit; the result queue closes once the last worker is gone and
/// the report loop exits after delivering what is left.
pub struct WorkerAgent {
    source: Arc<dyn TaskSource>,
    agent_id: String,
    computing_power: usize,
    poll_backoff: Duration,
    poll_jitter: Duration,
    metrics: MetricsCollector,
}

impl WorkerAgent {
    pub fn builder(source: Arc<dyn TaskSource>) -> WorkerAgentBuilder {
        WorkerAgentBuilder::new(source)
    }

    /// Agent talking HTTP to `config.dispatcher_url`.
    pub fn from_config(config: &WorkerConfig, metrics: MetricsCollector) -> SchedulerResult<Self> {
        let agent_id = if config.agent_id.is_empty() {
            local_agent_id()
        } else {
            config.agent_id.clone()
        };
        let client = DispatcherClient::new(
            &config.dispatcher_url,
            agent_id.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )?;

        Ok(Self::builder(Arc::new(client))
            .agent_id(agent_id)
            .computing_power(config.computing_power)
            .poll_backoff(config.poll_backoff())
            .poll_jitter(Duration::from_millis(config.poll_jitter_ms))
            .metrics(metrics)
            .build())
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn computing_power(&self) -> usize {
        self.computing_power
    }

    /// Runs until `shutdown_rx` fires, then drains in-flight work.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SchedulerResult<()> {
        let capacity = self.computing_power;
        let (task_tx, task_rx) = mpsc::channel::<TaskAssignment>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<TaskResultReport>(capacity);

        info!(agent_id = %self.agent_id, workers = capacity, "agent started");
        self.metrics.set_agent_workers(capacity);

        let task_rx = Arc::new(Mutex::new(task_rx));
        let workers: Vec<JoinHandle<()>> = (0..capacity)
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    task_rx.clone(),
                    result_tx.clone(),
                    self.metrics.clone(),
                ))
            })
            .collect();
        // the result queue closes when the last worker drops its sender
        drop(result_tx);

        let reporter = tokio::spawn(report_loop(
            self.source.clone(),
            result_rx,
            self.metrics.clone(),
        ));

        self.fetch_loop(task_tx, &mut shutdown_rx).await;

        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "worker task failed");
            }
        }
        if let Err(e) = reporter.await {
            error!(error = %e, "report loop failed");
        }

        self.metrics.set_agent_workers(0);
        info!(agent_id = %self.agent_id, "agent stopped");
        Ok(())
    }

    /// Consumes `task_tx`; returning closes the task queue.
    ///
    /// Shutdown is observed between fetches and during the backoff sleep
    /// only. A fetch in flight has already claimed its task, so it runs to
    /// completion and the task is queued for the workers.
    async fn fetch_loop(
        &self,
        task_tx: mpsc::Sender<TaskAssignment>,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) {
        loop {
            if shutdown_requested(shutdown_rx) {
                break;
            }

            match self.source.fetch_task().await {
                Ok(Some(task)) => {
                    if task_tx.send(task).await.is_err() {
                        break;
                    }
                    continue;
                }
                Ok(None) => debug!("no task available"),
                Err(e) => {
                    self.metrics.record_agent_fetch_failure();
                    if e.is_retryable() {
                        warn!(error = %e, "failed to fetch task");
                    } else {
                        error!(error = %e, "failed to fetch task");
                    }
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.backoff()) => {}
            }
        }
        debug!("fetch loop stopped");
    }

    fn backoff(&self) -> Duration {
        let jitter_ms = self.poll_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.poll_backoff;
        }
        self.poll_backoff + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// True once the shutdown signal was sent or its sender is gone.
fn shutdown_requested(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

async fn worker_loop(
    index: usize,
    tasks: Arc<Mutex<mpsc::Receiver<TaskAssignment>>>,
    results: mpsc::Sender<TaskResultReport>,
    metrics: MetricsCollector,
) {
    loop {
        let next = tasks.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let started = Instant::now();
        let result = execute(&task).await;
        metrics.record_agent_task(started.elapsed().as_secs_f64());

        if results
            .send(TaskResultReport {
                id: task.id,
                result,
            })
            .await
            .is_err()
        {
            break;
        }
    }
    debug!(worker = index, "worker stopped");
}

async fn report_loop(
    source: Arc<dyn TaskSource>,
    mut results: mpsc::Receiver<TaskResultReport>,
    metrics: MetricsCollector,
) {
    while let Some(report) = results.recv().await {
        if let Err(e) = source.submit_result(report).await {
            metrics.record_agent_report_failure();
            warn!(task_id = report.id, error = %e, "result dropped");
        }
    }
    debug!("report loop stopped");
}

fn local_agent_id() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|_| "agent".to_string())
}
