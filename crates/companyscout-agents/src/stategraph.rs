//! State-graph provider: gather, extract and validate nodes over shared state.

use async_trait::async_trait;
use companyscout_core::provider::workflow_steps;
use companyscout_core::{
    AgentSpec, DiscoveryParams, Entity, LlmAdapter, PromptProfile, ProviderError, ProviderMeta,
    ResearchProvider, StepTrace, WorkflowDescription,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::provider_meta;

const SYSTEM_PROMPT: &str = "You are a research graph. Walk the company through three states: \
gather public facts, extract them into labelled fields, then validate each field. Answer with \
labelled lines ('Founded:', 'Headquarters:', 'Focus Area:', 'Total funding:', 'Investors:', \
'Website:'), a 'Recent News:' bullet list, and a statement of whether the company is publicly \
traded. Write 'Unknown' for any field you cannot confirm.";

pub struct StateGraphProvider {
    meta: ProviderMeta,
    adapter: LlmAdapter,
    profile: PromptProfile,
    ready: OnceCell<bool>,
}

impl StateGraphProvider {
    pub const NAME: &'static str = "stategraph";

    pub fn new(adapter: LlmAdapter, enabled: bool) -> Self {
        Self {
            meta: provider_meta(
                Self::NAME,
                "Graph of gather/extract/validate nodes with explicit state transitions",
                &["company-profile", "field-validation"],
                &["rejects responses without any company facts"],
                enabled,
            ),
            adapter,
            profile: PromptProfile {
                system_prompt: SYSTEM_PROMPT.to_string(),
                temperature: 0.2,
            },
            ready: OnceCell::new(),
        }
    }
}

fn missing_fields(entity: &Entity) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if entity.founding_year.is_none() {
        missing.push("foundingYear");
    }
    if entity.location.is_none() {
        missing.push("location");
    }
    if entity.focus_area.is_none() {
        missing.push("focusArea");
    }
    if entity.funding_amount.is_none() {
        missing.push("fundingAmount");
    }
    if entity.investors.is_empty() {
        missing.push("investors");
    }
    if entity.news_headlines.is_empty() {
        missing.push("newsHeadlines");
    }
    if entity.website_url.is_empty() {
        missing.push("websiteUrl");
    }
    missing
}

const TRACKED_FIELDS: usize = 7;

#[async_trait]
impl ResearchProvider for StateGraphProvider {
    fn metadata(&self) -> &ProviderMeta {
        &self.meta
    }

    fn workflow(&self) -> WorkflowDescription {
        WorkflowDescription {
            topology: "state graph".into(),
            agents: vec![
                AgentSpec {
                    name: "gather".into(),
                    role: "Gather Node".into(),
                    goal: "Collect raw facts about the company".into(),
                },
                AgentSpec {
                    name: "extract".into(),
                    role: "Extract Node".into(),
                    goal: "Map facts onto profile fields".into(),
                },
                AgentSpec {
                    name: "validate".into(),
                    role: "Validate Node".into(),
                    goal: "Flag unconfirmed or missing fields".into(),
                },
            ],
        }
    }

    async fn initialize(&self) -> bool {
        *self
            .ready
            .get_or_init(|| async {
                info!(provider = Self::NAME, nodes = 3, "state graph compiled");
                true
            })
            .await
    }

    async fn discover(&self, params: &DiscoveryParams) -> Result<Vec<Entity>, ProviderError> {
        let run = self.adapter.research(&self.meta, &self.profile, params).await?;
        let missing = missing_fields(&run.entity);
        if missing.len() == TRACKED_FIELDS {
            return Err(ProviderError::Extraction(
                "validation node found no company facts".into(),
            ));
        }
        debug!(provider = Self::NAME, ?missing, "validation finished");

        let mut trace = StepTrace::new(Self::NAME);
        for step in workflow_steps(Self::NAME, &self.workflow(), &run) {
            trace.record(step.name, step.description, step.completed, step.result);
        }
        trace.record(
            "validation-report",
            "Summarize unconfirmed fields",
            missing.is_empty(),
            if missing.is_empty() {
                "all fields confirmed".to_string()
            } else {
                format!("unconfirmed: {}", missing.join(", "))
            },
        );

        let mut entity = run.entity;
        entity.agent_steps = trace.into_steps();
        Ok(vec![entity])
    }
}
