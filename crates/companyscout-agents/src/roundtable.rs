//! Roundtable provider: a moderated group conversation between specialists.

use async_trait::async_trait;
use companyscout_core::{
    AdapterRun, AgentSpec, DiscoveryParams, Entity, LlmAdapter, PromptProfile, ProviderError,
    ProviderMeta, ResearchProvider, Step, StepTrace, WorkflowDescription,
};
use tokio::sync::OnceCell;
use tracing::info;

use crate::provider_meta;

const ROUNDS: usize = 2;

const SYSTEM_PROMPT: &str = "You moderate a roundtable of a venture analyst, an industry \
expert and a news editor discussing one company. After two rounds of discussion, write the \
agreed profile with labelled lines ('Founded:', 'Headquarters:', 'Focus Area:', \
'Total funding:', 'Investors:', 'Website:'), a 'Recent News:' bullet list, and whether the \
company is publicly traded, including its ticker symbol if it is.";

pub struct RoundtableProvider {
    meta: ProviderMeta,
    adapter: LlmAdapter,
    profile: PromptProfile,
    ready: OnceCell<bool>,
}

impl RoundtableProvider {
    pub const NAME: &'static str = "roundtable";

    pub fn new(adapter: LlmAdapter, enabled: bool) -> Self {
        Self {
            meta: provider_meta(
                Self::NAME,
                "Moderated multi-agent discussion converging on one company profile",
                &["company-profile", "news-summary", "public-market-check"],
                &["higher sampling temperature", "no live web access"],
                enabled,
            ),
            adapter,
            profile: PromptProfile {
                system_prompt: SYSTEM_PROMPT.to_string(),
                temperature: 0.5,
            },
            ready: OnceCell::new(),
        }
    }

    fn conversation_steps(&self, run: &AdapterRun) -> Vec<Step> {
        let workflow = self.workflow();
        let mut trace = StepTrace::new(Self::NAME);
        for round in 1..=ROUNDS {
            for agent in &workflow.agents {
                trace.record(
                    format!("round-{round}-{}", agent.name),
                    agent.goal.clone(),
                    true,
                    format!("{} spoke in round {round}", agent.role),
                );
            }
        }
        let entity = &run.entity;
        trace.record(
            "consensus",
            "Agree on the final company profile",
            true,
            format!(
                "{} investors, {} headlines, total score {}",
                entity.investors.len(),
                entity.news_headlines.len(),
                entity.score_breakdown.total_score
            ),
        );
        trace.into_steps()
    }
}

#[async_trait]
impl ResearchProvider for RoundtableProvider {
    fn metadata(&self) -> &ProviderMeta {
        &self.meta
    }

    fn workflow(&self) -> WorkflowDescription {
        WorkflowDescription {
            topology: "group chat".into(),
            agents: vec![
                AgentSpec {
                    name: "venture-analyst".into(),
                    role: "Venture Analyst".into(),
                    goal: "Discuss funding rounds and investors".into(),
                },
                AgentSpec {
                    name: "industry-expert".into(),
                    role: "Industry Expert".into(),
                    goal: "Place the company in its market".into(),
                },
                AgentSpec {
                    name: "news-editor".into(),
                    role: "News Editor".into(),
                    goal: "Surface recent headlines".into(),
                },
            ],
        }
    }

    async fn initialize(&self) -> bool {
        *self
            .ready
            .get_or_init(|| async {
                info!(provider = Self::NAME, rounds = ROUNDS, "roundtable seated");
                true
            })
            .await
    }

    async fn discover(&self, params: &DiscoveryParams) -> Result<Vec<Entity>, ProviderError> {
        let run = self.adapter.research(&self.meta, &self.profile, params).await?;
        let steps = self.conversation_steps(&run);
        let mut entity = run.entity;
        entity.agent_steps = steps;
        Ok(vec![entity])
    }
}
