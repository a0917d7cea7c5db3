//! Data model shared by providers, the registry and the orchestrator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::trace::Step;

/// Static description of a provider, immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMeta {
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub limitations: Vec<String>,
    pub enabled: bool,
}

/// One agent within a provider's reported topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    pub goal: String,
}

/// Agent/topology metadata reported by a provider. Used for observability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub topology: String,
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub funding_score: f64,
    pub buzz_score: f64,
    pub relevance_score: f64,
    pub total_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuote {
    pub symbol: String,
    pub current_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub market_cap: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/// A researched company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub founding_year: Option<u16>,
    pub location: Option<String>,
    pub focus_area: Option<String>,
    pub investors: Vec<String>,
    pub funding_amount: Option<String>,
    pub news_headlines: Vec<String>,
    pub website_url: String,
    pub is_public: bool,
    pub stock_symbol: Option<String>,
    pub stock: Option<StockQuote>,
    pub score_breakdown: ScoreBreakdown,
    pub agent_steps: Vec<Step>,
}

impl Entity {
    /// Fields visible to later providers in a sequential chain. Trace and
    /// unset fields are omitted.
    pub fn shared_fields(&self) -> Map<String, Value> {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.remove("agentSteps");
        fields.retain(|_, value| match value {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::String(text) => !text.is_empty(),
            _ => true,
        });
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    Parallel,
    Sequential,
}

impl ResearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchMode::Parallel => "parallel",
            ResearchMode::Sequential => "sequential",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Partial,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            RunState::Pending => 0,
            RunState::Running => 1,
            RunState::Completed | RunState::Failed => 2,
        }
    }
}

/// Per-provider progress within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRunStatus {
    pub status: RunState,
    pub progress: u8,
    pub steps: Vec<Step>,
    pub error: Option<String>,
}

impl Default for ProviderRunStatus {
    fn default() -> Self {
        Self {
            status: RunState::Pending,
            progress: 0,
            steps: Vec::new(),
            error: None,
        }
    }
}

impl ProviderRunStatus {
    pub fn mark_running(&mut self) {
        self.advance(RunState::Running);
    }

    pub fn mark_completed(&mut self, steps: Vec<Step>) {
        if self.advance(RunState::Completed) {
            self.progress = 100;
            self.steps = steps;
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if self.advance(RunState::Failed) {
            self.error = Some(error.into());
        }
    }

    // Transitions only move forward; a settled slot never changes again.
    fn advance(&mut self, next: RunState) -> bool {
        if next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }
}

/// Caller-supplied parameters merged into every provider's discovery input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchOptions {
    #[serde(flatten)]
    pub parameters: Map<String, Value>,
}

impl ResearchOptions {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Input handed to a provider's `discover`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryParams {
    pub company_name: String,
    /// Known facts and caller options. In sequential mode this carries the
    /// fields extracted by earlier providers.
    pub context: Map<String, Value>,
}

impl DiscoveryParams {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }
}

/// One orchestration request spanning one or more providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub company_name: String,
    pub providers: Vec<String>,
    pub mode: ResearchMode,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub per_provider_status: HashMap<String, ProviderRunStatus>,
    pub per_provider_result: HashMap<String, Entity>,
    /// Final merged view in sequential mode.
    pub accumulated: Option<Map<String, Value>>,
}

impl Job {
    pub fn start(company_name: &str, providers: &[String], mode: ResearchMode) -> Self {
        let per_provider_status = providers
            .iter()
            .map(|name| (name.clone(), ProviderRunStatus::default()))
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            company_name: company_name.to_string(),
            providers: providers.to_vec(),
            mode,
            status: JobStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            per_provider_status,
            per_provider_result: HashMap::new(),
            accumulated: None,
        }
    }

    pub fn status_mut(&mut self, provider: &str) -> &mut ProviderRunStatus {
        self.per_provider_status
            .entry(provider.to_string())
            .or_default()
    }

    pub fn succeeded(&self) -> usize {
        self.per_provider_status
            .values()
            .filter(|slot| slot.status == RunState::Completed)
            .count()
    }

    pub(crate) fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        for slot in self.per_provider_status.values_mut() {
            if !matches!(slot.status, RunState::Completed | RunState::Failed) {
                slot.mark_failed("job aborted before provider ran");
            }
        }
        self.finish(JobStatus::Failed);
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}
