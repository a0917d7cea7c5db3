//! CompanyScout core: provider contract, registry, scoring, remote gateway
//! and the research orchestrator that ties them together.
//!
//! Providers live in `companyscout-agents`; this crate only knows them
//! through [`ResearchProvider`].

pub mod config;
mod error;
pub mod events;
pub mod extract;
pub mod gateway;
mod logging;
mod metrics;
pub mod model;
mod orchestrator;
pub mod performance;
pub mod provider;
pub mod registry;
pub mod scoring;
mod security;
mod telemetry;
mod trace;

pub use config::{LlmConfig, ResearchConfig};
pub use error::{GatewayError, GatewayErrorKind, ProviderError, ResearchError};
pub use events::{Event, EventCollector, ProviderOutcome};
pub use gateway::{CompletionClient, CompletionRequest, CompletionResponse, Gateway, RetryPolicy};
pub use logging::{log_job_completion, redact_secrets};
pub use model::{
    AgentSpec, DiscoveryParams, Entity, Job, JobStatus, ProviderMeta, ProviderRunStatus,
    ResearchMode, ResearchOptions, RunState, ScoreBreakdown, StockQuote, WorkflowDescription,
};
pub use orchestrator::ResearchOrchestrator;
pub use performance::{PerformanceRecord, PerformanceTracker, RunSample};
pub use provider::{
    AdapterRun, DynProvider, LlmAdapter, NoQuotes, PromptProfile, QuoteSource, ResearchProvider,
};
pub use registry::{ProviderComparison, ProviderLookup, ProviderRegistry};
pub use scoring::{ScoringConfig, ScoringWeights};
pub use security::{SecretValue, require_env, validate_api_key};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use trace::{Step, StepTrace, render_steps_markdown};
