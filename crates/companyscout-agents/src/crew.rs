//! Role-based crew: researcher, analyst and writer working in sequence.

use async_trait::async_trait;
use companyscout_core::provider::workflow_steps;
use companyscout_core::{
    AgentSpec, DiscoveryParams, Entity, LlmAdapter, PromptProfile, ProviderError, ProviderMeta,
    ResearchProvider, WorkflowDescription,
};
use tokio::sync::OnceCell;
use tracing::info;

use crate::provider_meta;

const SYSTEM_PROMPT: &str = "You are a crew of three specialists researching a company. \
The researcher gathers facts, the analyst checks funding and market position, and the writer \
produces a concise profile. Use labelled lines such as 'Founded:', 'Headquarters:', \
'Focus Area:', 'Total funding:', 'Investors:', 'Website:' and a 'Recent News:' bullet list. \
State whether the company is publicly traded and give its ticker if so.";

pub struct CrewProvider {
    meta: ProviderMeta,
    adapter: LlmAdapter,
    profile: PromptProfile,
    ready: OnceCell<bool>,
}

impl CrewProvider {
    pub const NAME: &'static str = "crew";

    pub fn new(adapter: LlmAdapter, enabled: bool) -> Self {
        Self {
            meta: provider_meta(
                Self::NAME,
                "Role-based agent crew producing a written company profile",
                &["company-profile", "funding-analysis", "news-summary"],
                &["single completion per run", "no live web access"],
                enabled,
            ),
            adapter,
            profile: PromptProfile {
                system_prompt: SYSTEM_PROMPT.to_string(),
                temperature: 0.3,
            },
            ready: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ResearchProvider for CrewProvider {
    fn metadata(&self) -> &ProviderMeta {
        &self.meta
    }

    fn workflow(&self) -> WorkflowDescription {
        WorkflowDescription {
            topology: "sequential crew".into(),
            agents: vec![
                AgentSpec {
                    name: "researcher".into(),
                    role: "Company Researcher".into(),
                    goal: "Collect founding, location, funding and investor facts".into(),
                },
                AgentSpec {
                    name: "analyst".into(),
                    role: "Market Analyst".into(),
                    goal: "Assess funding stage and market position".into(),
                },
                AgentSpec {
                    name: "writer".into(),
                    role: "Profile Writer".into(),
                    goal: "Summarize findings as a structured profile".into(),
                },
            ],
        }
    }

    async fn initialize(&self) -> bool {
        *self
            .ready
            .get_or_init(|| async {
                info!(provider = Self::NAME, agents = 3, "crew assembled");
                true
            })
            .await
    }

    async fn discover(&self, params: &DiscoveryParams) -> Result<Vec<Entity>, ProviderError> {
        let run = self.adapter.research(&self.meta, &self.profile, params).await?;
        let steps = workflow_steps(Self::NAME, &self.workflow(), &run);
        let mut entity = run.entity;
        entity.agent_steps = steps;
        Ok(vec![entity])
    }
}
