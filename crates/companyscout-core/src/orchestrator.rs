//! Research orchestrator: fans a company lookup out over providers in
//! parallel or chains them sequentially, producing a settled [`Job`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use crate::events::{EventCollector, ProviderOutcome};
use crate::logging::{log_job_completion, redact_secrets};
use crate::metrics;
use crate::model::{DiscoveryParams, Entity, Job, JobStatus, ResearchMode, ResearchOptions};
use crate::performance::{PerformanceTracker, RunSample};
use crate::registry::{ProviderLookup, ProviderRegistry};
use crate::{ProviderError, ResearchError};

/// Outcome of a single provider invocation inside a job.
#[derive(Debug)]
struct ProviderRun {
    provider: String,
    result: Result<Entity, RunFailure>,
    elapsed: Duration,
    /// False when the name never resolved to a provider.
    resolved: bool,
}

#[derive(Debug)]
struct RunFailure {
    message: String,
    api_failure: bool,
}

impl RunFailure {
    fn unresolved(err: ResearchError) -> Self {
        Self {
            message: err.to_string(),
            api_failure: false,
        }
    }

    fn from_provider(err: &ProviderError) -> Self {
        Self {
            message: redact_secrets(&err.to_string()),
            api_failure: err.is_api_failure(),
        }
    }
}

pub struct ResearchOrchestrator {
    registry: Arc<ProviderRegistry>,
    events: EventCollector,
    job_log_dir: Option<PathBuf>,
}

impl ResearchOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            events: EventCollector::disabled(),
            job_log_dir: None,
        }
    }

    pub fn with_events(mut self, events: EventCollector) -> Self {
        self.events = events;
        self
    }

    /// Append a summary of every finished job under `dir`.
    pub fn with_job_log(mut self, dir: impl Into<PathBuf>) -> Self {
        self.job_log_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        self.registry.tracker()
    }

    pub async fn execute(
        &self,
        mode: ResearchMode,
        company_name: &str,
        providers: &[String],
        options: &ResearchOptions,
    ) -> Result<Job, ResearchError> {
        match mode {
            ResearchMode::Parallel => {
                self.execute_parallel_research(company_name, providers, options)
                    .await
            }
            ResearchMode::Sequential => {
                self.execute_sequential_research(company_name, providers, options)
                    .await
            }
        }
    }

    /// Run every provider concurrently and wait for all of them to settle.
    ///
    /// Only caller input errors are returned as `Err`; everything else is
    /// reported through the returned job.
    #[instrument(
        name = "research.parallel",
        skip(self, providers, options),
        fields(company = %company_name, providers = providers.len())
    )]
    pub async fn execute_parallel_research(
        &self,
        company_name: &str,
        providers: &[String],
        options: &ResearchOptions,
    ) -> Result<Job, ResearchError> {
        let company_name = validate_request(company_name, providers)?;
        let mut job = Job::start(company_name, providers, ResearchMode::Parallel);
        info!(job_id = %job.id, "parallel research started");

        if let Err(err) = self.registry.initialize().await {
            return Ok(self.abort(job, err));
        }

        let params = DiscoveryParams::new(company_name).with_context(options.parameters.clone());
        let mut tasks = JoinSet::new();
        let mut task_providers = HashMap::new();
        let started = Instant::now();

        for name in providers {
            job.status_mut(name).mark_running();
            self.events.provider_started(&job.id, name);

            let registry = Arc::clone(&self.registry);
            let params = params.clone();
            let provider = name.clone();
            let handle =
                tasks.spawn(async move { run_provider(&registry, &provider, &params).await });
            task_providers.insert(handle.id(), name.clone());
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let run = match joined {
                Ok((_, run)) => run,
                Err(join_err) => {
                    let provider = task_providers
                        .get(&join_err.id())
                        .cloned()
                        .unwrap_or_default();
                    aborted_run(provider, &join_err, started.elapsed())
                }
            };
            self.settle(&mut job, run);
        }

        let succeeded = job.succeeded();
        let status = if succeeded == 0 {
            JobStatus::Failed
        } else if succeeded == providers.len() {
            JobStatus::Completed
        } else {
            JobStatus::Partial
        };
        Ok(self.complete(job, status))
    }

    /// Run providers one after another, feeding each the fields found so far.
    ///
    /// The job is `completed` when the final provider succeeds, even if an
    /// earlier one failed.
    #[instrument(
        name = "research.sequential",
        skip(self, providers, options),
        fields(company = %company_name, providers = providers.len())
    )]
    pub async fn execute_sequential_research(
        &self,
        company_name: &str,
        providers: &[String],
        options: &ResearchOptions,
    ) -> Result<Job, ResearchError> {
        let company_name = validate_request(company_name, providers)?;
        let mut job = Job::start(company_name, providers, ResearchMode::Sequential);
        info!(job_id = %job.id, "sequential research started");

        if let Err(err) = self.registry.initialize().await {
            return Ok(self.abort(job, err));
        }

        let mut accumulator = Map::new();
        accumulator.insert("name".into(), Value::String(company_name.to_string()));
        let mut last_succeeded = false;

        for name in providers {
            job.status_mut(name).mark_running();
            self.events.provider_started(&job.id, name);

            let mut context = options.parameters.clone();
            context.extend(accumulator.clone());
            let params = DiscoveryParams::new(company_name).with_context(context);

            let registry = Arc::clone(&self.registry);
            let provider = name.clone();
            let started = Instant::now();
            let task =
                tokio::spawn(async move { run_provider(&registry, &provider, &params).await });
            let run = match task.await {
                Ok(run) => run,
                Err(join_err) => aborted_run(name.clone(), &join_err, started.elapsed()),
            };
            last_succeeded = run.result.is_ok();
            if let Ok(entity) = &run.result {
                let fields = entity.shared_fields();
                debug!(provider = %name, merged = fields.len(), "merging provider findings");
                accumulator.extend(fields);
            }
            self.settle(&mut job, run);
        }

        job.accumulated = Some(accumulator);
        let status = if job.succeeded() == 0 {
            JobStatus::Failed
        } else if last_succeeded {
            JobStatus::Completed
        } else {
            JobStatus::Partial
        };
        Ok(self.complete(job, status))
    }

    /// Fold one provider outcome into the job, performance stats and observers.
    fn settle(&self, job: &mut Job, run: ProviderRun) {
        let ProviderRun {
            provider,
            result,
            elapsed,
            resolved,
        } = run;
        let elapsed_ms = elapsed.as_millis() as u64;
        let run_time_seconds = elapsed.as_secs_f64();

        match result {
            Ok(entity) => {
                let total_score = entity.score_breakdown.total_score;
                info!(%provider, total_score, elapsed_ms, "provider completed");
                job.status_mut(&provider)
                    .mark_completed(entity.agent_steps.clone());
                job.per_provider_result.insert(provider.clone(), entity);
                self.tracker()
                    .record(&provider, RunSample::success(run_time_seconds));
                metrics::record_provider_run(&provider, true, elapsed_ms);
                self.events.provider_finished(
                    &job.id,
                    &provider,
                    ProviderOutcome::Success { total_score },
                    elapsed_ms,
                );
            }
            Err(failure) => {
                warn!(%provider, error = %failure.message, elapsed_ms, "provider failed");
                job.status_mut(&provider).mark_failed(failure.message.clone());
                if resolved {
                    self.tracker().record(
                        &provider,
                        RunSample::failure(run_time_seconds, !failure.api_failure),
                    );
                }
                metrics::record_provider_run(&provider, false, elapsed_ms);
                self.events.provider_finished(
                    &job.id,
                    &provider,
                    ProviderOutcome::Failure {
                        reason: failure.message,
                    },
                    elapsed_ms,
                );
            }
        }
    }

    fn abort(&self, mut job: Job, err: ResearchError) -> Job {
        error!(job_id = %job.id, error = %err, "research job aborted");
        job.fail(redact_secrets(&err.to_string()));
        self.publish(&job);
        job
    }

    fn complete(&self, mut job: Job, status: JobStatus) -> Job {
        job.finish(status);
        info!(
            job_id = %job.id,
            status = status.as_str(),
            succeeded = job.succeeded(),
            total = job.providers.len(),
            duration_seconds = job.duration_seconds().unwrap_or_default(),
            "research job finished"
        );
        self.publish(&job);
        job
    }

    fn publish(&self, job: &Job) {
        metrics::record_job(job.mode.as_str(), job.status.as_str());
        self.events
            .job_finished(&job.id, job.status, job.succeeded(), job.providers.len());
        if let Some(dir) = &self.job_log_dir {
            if let Err(err) = log_job_completion(dir, job) {
                warn!(job_id = %job.id, error = %err, "failed to write job log");
            }
        }
    }
}

fn validate_request<'a>(
    company_name: &'a str,
    providers: &[String],
) -> Result<&'a str, ResearchError> {
    let company_name = company_name.trim();
    if company_name.is_empty() {
        return Err(ResearchError::validation("company name is required"));
    }
    if providers.is_empty() {
        return Err(ResearchError::validation(
            "at least one provider must be requested",
        ));
    }
    let mut seen = HashSet::new();
    for name in providers {
        if name.trim().is_empty() {
            return Err(ResearchError::validation("provider names must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(ResearchError::validation(format!(
                "provider {name} requested more than once"
            )));
        }
    }
    Ok(company_name)
}

/// A provider task that panicked or was cancelled becomes a failed slot.
fn aborted_run(provider: String, join_err: &JoinError, elapsed: Duration) -> ProviderRun {
    error!(%provider, error = %join_err, "provider task aborted");
    ProviderRun {
        provider,
        result: Err(RunFailure {
            message: format!("provider task aborted: {join_err}"),
            api_failure: false,
        }),
        elapsed,
        resolved: true,
    }
}

async fn run_provider(
    registry: &ProviderRegistry,
    name: &str,
    params: &DiscoveryParams,
) -> ProviderRun {
    let started = Instant::now();
    let unresolved = |err: ResearchError| ProviderRun {
        provider: name.to_string(),
        result: Err(RunFailure::unresolved(err)),
        elapsed: started.elapsed(),
        resolved: false,
    };

    let provider = match registry.lookup(name).await {
        Ok(ProviderLookup::Available(provider)) => provider,
        Ok(ProviderLookup::Disabled) => {
            return unresolved(ResearchError::ProviderDisabled(name.to_string()));
        }
        Ok(ProviderLookup::Unknown) => {
            return unresolved(ResearchError::ProviderNotFound(name.to_string()));
        }
        Err(err) => return unresolved(err),
    };

    let result = match provider.discover(params).await {
        Ok(entities) => entities.into_iter().next().ok_or_else(|| {
            RunFailure::from_provider(&ProviderError::Extraction(
                "provider returned no entities".into(),
            ))
        }),
        Err(err) => Err(RunFailure::from_provider(&err)),
    };

    ProviderRun {
        provider: name.to_string(),
        result,
        elapsed: started.elapsed(),
        resolved: true,
    }
}
