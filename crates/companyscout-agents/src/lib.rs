//! Concrete research providers built on the shared completion adapter.
//!
//! Each provider reports its own agent topology and shapes its own step
//! trace; the remote call, extraction and scoring are shared.

mod crew;
mod roundtable;
mod stategraph;

use std::sync::Arc;

use companyscout_core::{
    CompletionClient, DynProvider, LlmAdapter, ProviderMeta, ProviderRegistry, QuoteSource,
    ResearchConfig, ScoringConfig,
};

pub use crew::CrewProvider;
pub use roundtable::RoundtableProvider;
pub use stategraph::StateGraphProvider;

pub const PROVIDER_NAMES: [&str; 3] = [
    CrewProvider::NAME,
    StateGraphProvider::NAME,
    RoundtableProvider::NAME,
];

/// Build every known provider, honouring `<NAME>_ENABLED` toggles.
pub fn build_providers(config: &ResearchConfig, adapter: LlmAdapter) -> Vec<DynProvider> {
    vec![
        Arc::new(CrewProvider::new(
            adapter.clone(),
            config.provider_enabled(CrewProvider::NAME),
        )),
        Arc::new(StateGraphProvider::new(
            adapter.clone(),
            config.provider_enabled(StateGraphProvider::NAME),
        )),
        Arc::new(RoundtableProvider::new(
            adapter,
            config.provider_enabled(RoundtableProvider::NAME),
        )),
    ]
}

/// Registry wired with all providers sharing one client, scoring config and quote source.
pub fn default_registry(
    config: &ResearchConfig,
    client: Arc<dyn CompletionClient>,
    scoring: Arc<ScoringConfig>,
    quotes: Arc<dyn QuoteSource>,
) -> ProviderRegistry {
    let adapter = LlmAdapter::new(
        client,
        scoring,
        config.llm.model.clone(),
        config.llm.max_tokens,
    )
    .with_quotes(quotes);
    ProviderRegistry::new(build_providers(config, adapter))
}

pub(crate) fn provider_meta(
    name: &str,
    description: &str,
    capabilities: &[&str],
    limitations: &[&str],
    enabled: bool,
) -> ProviderMeta {
    ProviderMeta {
        name: name.to_string(),
        description: description.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        capabilities: capabilities.iter().map(|item| item.to_string()).collect(),
        limitations: limitations.iter().map(|item| item.to_string()).collect(),
        enabled,
    }
}


#[cfg(test)]
mod tests {
    use companyscout_core::{NoQuotes, ProviderLookup};

    use super::testing::ScriptedClient;
    use super::*;

    #[tokio::test]
    async fn toggles_control_registry_listing() {
        let config = ResearchConfig::default().with_provider_enabled("roundtable", false);
        let registry = default_registry(
            &config,
            ScriptedClient::replying("ok"),
            Arc::new(ScoringConfig::default()),
            Arc::new(NoQuotes),
        );

        let listed: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|meta| meta.name)
            .collect();
        assert_eq!(listed, vec!["crew", "stategraph"]);
        assert!(matches!(
            registry.lookup("roundtable").await.unwrap(),
            ProviderLookup::Disabled
        ));
    }

    #[test]
    fn provider_names_are_unique() {
        let mut names = PROVIDER_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PROVIDER_NAMES.len());
    }
}
