//! Provider capability contract and the shared completion-backed adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::extract::extract_entity;
use crate::gateway::{CompletionClient, CompletionRequest};
use crate::model::{DiscoveryParams, Entity, ProviderMeta, StockQuote, WorkflowDescription};
use crate::scoring::ScoringConfig;
use crate::trace::{Step, StepTrace};
use crate::ProviderError;

/// A research strategy that turns a company name into structured entities.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    fn metadata(&self) -> &ProviderMeta;

    /// Agent topology, reported for observability only.
    fn workflow(&self) -> WorkflowDescription;

    /// Idempotent; repeated calls return the first outcome.
    async fn initialize(&self) -> bool;

    /// Errors are returned, never folded into an empty result.
    async fn discover(&self, params: &DiscoveryParams) -> Result<Vec<Entity>, ProviderError>;

    fn name(&self) -> &str {
        &self.metadata().name
    }
}

pub type DynProvider = Arc<dyn ResearchProvider>;

/// Live price lookups for public companies.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Option<StockQuote>>;
}

/// Quote source used when no market data collaborator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoQuotes;

#[async_trait]
impl QuoteSource for NoQuotes {
    async fn quote(&self, _symbol: &str) -> anyhow::Result<Option<StockQuote>> {
        Ok(None)
    }
}

/// Per-provider prompt settings.
#[derive(Debug, Clone)]
pub struct PromptProfile {
    pub system_prompt: String,
    pub temperature: f32,
}

/// Raw output of one adapter run, before provider-specific trace shaping.
#[derive(Debug, Clone)]
pub struct AdapterRun {
    pub entity: Entity,
    pub raw_text: String,
    pub enriched: bool,
}

/// Shared plumbing every provider uses: completion call, field extraction,
/// scoring and optional stock enrichment.
#[derive(Clone)]
pub struct LlmAdapter {
    client: Arc<dyn CompletionClient>,
    scoring: Arc<ScoringConfig>,
    quotes: Arc<dyn QuoteSource>,
    model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for LlmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAdapter")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmAdapter {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        scoring: Arc<ScoringConfig>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            scoring,
            quotes: Arc::new(NoQuotes),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn with_quotes(mut self, quotes: Arc<dyn QuoteSource>) -> Self {
        self.quotes = quotes;
        self
    }

    pub fn scoring(&self) -> &Arc<ScoringConfig> {
        &self.scoring
    }

    #[instrument(name = "provider.research", skip(self, meta, profile, params), fields(provider = %meta.name, company = %params.company_name))]
    pub async fn research(
        &self,
        meta: &ProviderMeta,
        profile: &PromptProfile,
        params: &DiscoveryParams,
    ) -> Result<AdapterRun, ProviderError> {
        if !meta.enabled {
            return Err(ProviderError::NotEnabled(meta.name.clone()));
        }
        let company = params.company_name.trim();
        if company.is_empty() {
            return Err(ProviderError::Execution("company name is empty".into()));
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: profile.system_prompt.clone(),
            user_prompt: build_user_prompt(company, &params.context),
            temperature: profile.temperature,
            max_tokens: self.max_tokens,
        };
        let response = self.client.complete(&request).await?;
        if response.text.trim().is_empty() {
            return Err(ProviderError::Extraction(format!(
                "{} returned an empty completion",
                response.model
            )));
        }
        debug!(chars = response.text.len(), "completion received");

        let mut entity = extract_entity(company, &response.text);
        entity.score_breakdown = self.scoring.score(&entity);
        let enriched = self.enrich_stock(&mut entity).await;

        Ok(AdapterRun {
            entity,
            raw_text: response.text,
            enriched,
        })
    }

    // Enrichment failures never fail discovery.
    async fn enrich_stock(&self, entity: &mut Entity) -> bool {
        if !entity.is_public {
            return false;
        }
        let Some(symbol) = entity.stock_symbol.clone() else {
            return false;
        };
        match self.quotes.quote(&symbol).await {
            Ok(Some(quote)) => {
                entity.stock = Some(quote);
                true
            }
            Ok(None) => {
                debug!(%symbol, "no quote available");
                false
            }
            Err(err) => {
                warn!(%symbol, error = %err, "stock enrichment failed");
                false
            }
        }
    }
}

/// Render the user prompt, listing known facts from `context` so later
/// providers in a chain can build on earlier findings.
pub fn build_user_prompt(company_name: &str, context: &Map<String, Value>) -> String {
    let mut prompt = format!(
        "Research the company \"{company_name}\". Report: founding year, headquarters location, \
         primary focus area, total funding amount, notable investors, recent news headlines, \
         website, and whether it is publicly traded (with ticker symbol if so)."
    );

    let known: Vec<String> = context
        .iter()
        .filter(|(key, _)| key.as_str() != "name" && key.as_str() != "companyName")
        .filter_map(|(key, value)| render_context_value(value).map(|text| format!("- {key}: {text}")))
        .collect();
    if !known.is_empty() {
        prompt.push_str("\n\nKnown so far (verify and extend):\n");
        prompt.push_str(&known.join("\n"));
    }
    prompt
}

fn render_context_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// Deterministic trace: one step per workflow agent followed by extraction
/// and scoring summaries.
pub fn workflow_steps(prefix: &str, workflow: &WorkflowDescription, run: &AdapterRun) -> Vec<Step> {
    let mut trace = StepTrace::new(prefix);
    for agent in &workflow.agents {
        trace.record(
            agent.name.clone(),
            agent.goal.clone(),
            true,
            format!("{} contributed to the {} pass", agent.role, workflow.topology),
        );
    }
    let entity = &run.entity;
    let populated = [
        entity.founding_year.is_some(),
        entity.location.is_some(),
        entity.focus_area.is_some(),
        entity.funding_amount.is_some(),
        !entity.investors.is_empty(),
        !entity.news_headlines.is_empty(),
        !entity.website_url.is_empty(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    trace.record(
        "extraction",
        "Parse structured fields from generated text",
        true,
        format!("{populated} of 7 fields populated"),
    );
    trace.record(
        "scoring",
        "Compute weighted company score",
        true,
        format!("total score {}", entity.score_breakdown.total_score),
    );
    if entity.is_public && entity.stock_symbol.is_some() {
        trace.record(
            "stock-enrichment",
            "Attach live quote for public company",
            run.enriched,
            if run.enriched { "quote attached" } else { "quote unavailable" },
        );
    }
    trace.into_steps()
}
