//! Provider registry with lazy, single-flight initialization.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::model::{ProviderMeta, WorkflowDescription};
use crate::performance::{PerformanceRecord, PerformanceTracker};
use crate::provider::DynProvider;
use crate::ResearchError;

/// Result of resolving a provider by name.
#[derive(Clone)]
pub enum ProviderLookup {
    Available(DynProvider),
    /// Registered but switched off or failed to initialize.
    Disabled,
    Unknown,
}

impl ProviderLookup {
    pub fn into_available(self) -> Option<DynProvider> {
        match self {
            ProviderLookup::Available(provider) => Some(provider),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ProviderLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderLookup::Available(provider) => {
                write!(f, "Available({})", provider.metadata().name)
            }
            ProviderLookup::Disabled => f.write_str("Disabled"),
            ProviderLookup::Unknown => f.write_str("Unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderComparison {
    pub details: ProviderMeta,
    pub workflow: WorkflowDescription,
    pub performance: Option<PerformanceRecord>,
}

struct Catalog {
    active: Vec<DynProvider>,
    inactive: HashSet<String>,
}

pub struct ProviderRegistry {
    registered: Vec<DynProvider>,
    catalog: OnceCell<Catalog>,
    tracker: Arc<PerformanceTracker>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<DynProvider>) -> Self {
        Self::with_tracker(providers, Arc::new(PerformanceTracker::new()))
    }

    pub fn with_tracker(providers: Vec<DynProvider>, tracker: Arc<PerformanceTracker>) -> Self {
        Self {
            registered: providers,
            catalog: OnceCell::new(),
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn is_initialized(&self) -> bool {
        self.catalog.initialized()
    }

    /// Initialize every registered provider once. Concurrent callers wait on
    /// the same attempt; a failed attempt is retried by the next caller.
    pub async fn initialize(&self) -> Result<(), ResearchError> {
        self.catalog().await.map(|_| ())
    }

    async fn catalog(&self) -> Result<&Catalog, ResearchError> {
        self.catalog.get_or_try_init(|| self.build_catalog()).await
    }

    async fn build_catalog(&self) -> Result<Catalog, ResearchError> {
        if self.registered.is_empty() {
            return Err(ResearchError::Registry("no providers registered".into()));
        }
        let mut seen = HashSet::new();
        for provider in &self.registered {
            if !seen.insert(provider.name().to_string()) {
                return Err(ResearchError::Registry(format!(
                    "provider {} registered twice",
                    provider.name()
                )));
            }
        }

        let mut active = Vec::new();
        let mut inactive = HashSet::new();
        for provider in &self.registered {
            let name = provider.name().to_string();
            if !provider.metadata().enabled {
                info!(provider = %name, "provider disabled by configuration");
                inactive.insert(name);
                continue;
            }
            if provider.initialize().await {
                active.push(Arc::clone(provider));
            } else {
                warn!(provider = %name, "provider failed to initialize");
                inactive.insert(name);
            }
        }
        info!(
            active = active.len(),
            inactive = inactive.len(),
            "provider registry initialized"
        );
        Ok(Catalog { active, inactive })
    }

    /// Metadata of every enabled provider, in registration order.
    pub async fn list(&self) -> Result<Vec<ProviderMeta>, ResearchError> {
        Ok(self
            .catalog()
            .await?
            .active
            .iter()
            .map(|provider| provider.metadata().clone())
            .collect())
    }

    pub async fn get(&self, name: &str) -> Result<Option<DynProvider>, ResearchError> {
        Ok(self.lookup(name).await?.into_available())
    }

    pub async fn lookup(&self, name: &str) -> Result<ProviderLookup, ResearchError> {
        let catalog = self.catalog().await?;
        if let Some(provider) = catalog
            .active
            .iter()
            .find(|provider| provider.name() == name)
        {
            return Ok(ProviderLookup::Available(Arc::clone(provider)));
        }
        if catalog.inactive.contains(name) {
            return Ok(ProviderLookup::Disabled);
        }
        Ok(ProviderLookup::Unknown)
    }

    /// Performance of an enabled provider, if it has run at least once.
    pub async fn get_performance(
        &self,
        name: &str,
    ) -> Result<Option<PerformanceRecord>, ResearchError> {
        if self.get(name).await?.is_none() {
            return Ok(None);
        }
        Ok(self.tracker.get(name))
    }

    /// Side-by-side view of the named providers. Unknown or disabled names are omitted.
    pub async fn compare(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, ProviderComparison>, ResearchError> {
        let mut comparison = BTreeMap::new();
        for name in names {
            let Some(provider) = self.get(name).await? else {
                continue;
            };
            comparison.insert(
                name.clone(),
                ProviderComparison {
                    details: provider.metadata().clone(),
                    workflow: provider.workflow(),
                    performance: self.tracker.get(name),
                },
            );
        }
        Ok(comparison)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::model::{DiscoveryParams, Entity};
    use crate::performance::RunSample;
    use crate::provider::ResearchProvider;
    use crate::ProviderError;

    struct CountingProvider {
        meta: ProviderMeta,
        init_calls: AtomicUsize,
        init_ok: bool,
    }

    impl CountingProvider {
        fn new(name: &str, enabled: bool, init_ok: bool) -> Arc<Self> {
            Arc::new(Self {
                meta: ProviderMeta {
                    name: name.into(),
                    description: format!("{name} provider"),
                    version: "1.0.0".into(),
                    capabilities: vec!["discovery".into()],
                    limitations: vec![],
                    enabled,
                },
                init_calls: AtomicUsize::new(0),
                init_ok,
            })
        }
    }

    #[async_trait]
    impl ResearchProvider for CountingProvider {
        fn metadata(&self) -> &ProviderMeta {
            &self.meta
        }

        fn workflow(&self) -> WorkflowDescription {
            WorkflowDescription {
                topology: "single".into(),
                agents: vec![],
            }
        }

        async fn initialize(&self) -> bool {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.init_ok
        }

        async fn discover(&self, params: &DiscoveryParams) -> Result<Vec<Entity>, ProviderError> {
            Ok(vec![Entity {
                name: params.company_name.clone(),
                ..Entity::default()
            }])
        }
    }

    #[tokio::test]
    async fn concurrent_readers_initialize_once() {
        let provider = CountingProvider::new("crew", true, true);
        let registry = Arc::new(ProviderRegistry::new(vec![provider.clone() as DynProvider]));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.list().await }));
        }
        for handle in handles {
            let listed = handle.await.unwrap().unwrap();
            assert_eq!(listed.len(), 1);
        }
        registry.initialize().await.unwrap();

        assert_eq!(provider.init_calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_initialized());
    }

    #[tokio::test]
    async fn disabled_and_unknown_are_distinguished() {
        let registry = ProviderRegistry::new(vec![
            CountingProvider::new("crew", true, true),
            CountingProvider::new("roundtable", false, true),
            CountingProvider::new("stategraph", true, false),
        ]);

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|meta| meta.name)
            .collect();
        assert_eq!(names, vec!["crew"]);

        assert!(matches!(
            registry.lookup("crew").await.unwrap(),
            ProviderLookup::Available(_)
        ));
        assert!(matches!(
            registry.lookup("roundtable").await.unwrap(),
            ProviderLookup::Disabled
        ));
        assert!(matches!(
            registry.lookup("stategraph").await.unwrap(),
            ProviderLookup::Disabled
        ));
        assert!(matches!(
            registry.lookup("nope").await.unwrap(),
            ProviderLookup::Unknown
        ));
        assert!(registry.get("roundtable").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_registry_fails_to_initialize() {
        let registry = ProviderRegistry::new(Vec::new());
        let err = registry.list().await.unwrap_err();
        assert!(matches!(err, ResearchError::Registry(_)));
        assert!(!registry.is_initialized());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = ProviderRegistry::new(vec![
            CountingProvider::new("crew", true, true),
            CountingProvider::new("crew", true, true),
        ]);
        assert!(matches!(
            registry.initialize().await,
            Err(ResearchError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn compare_includes_performance_and_skips_unknown() {
        let registry = ProviderRegistry::new(vec![
            CountingProvider::new("crew", true, true),
            CountingProvider::new("stategraph", true, true),
        ]);
        registry
            .tracker()
            .record("crew", RunSample::success(1.5));

        let names = vec!["crew".to_string(), "stategraph".to_string(), "ghost".to_string()];
        let comparison = registry.compare(&names).await.unwrap();

        assert_eq!(comparison.len(), 2);
        assert_eq!(
            comparison["crew"].performance.as_ref().map(|p| p.total_runs),
            Some(1)
        );
        assert!(comparison["stategraph"].performance.is_none());
        assert!(registry.get_performance("ghost").await.unwrap().is_none());
        assert!(registry.get_performance("crew").await.unwrap().is_some());
    }
}
