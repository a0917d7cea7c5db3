use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use companyscout_core::{
    DiscoveryParams, DynProvider, Entity, Event, EventCollector, JobStatus, ProviderError,
    ProviderMeta, ProviderRegistry, ResearchError, ResearchOptions, ResearchOrchestrator,
    ResearchProvider, RunState, ScoreBreakdown, StepTrace, WorkflowDescription, events,
};
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::sync::Barrier;

#[derive(Clone)]
enum Behavior {
    Succeed(Entity),
    Fail(&'static str),
    Panic,
    /// Succeed only once every provider sharing the barrier has started.
    Rendezvous(Arc<Barrier>, Entity),
}

struct ScriptedProvider {
    meta: ProviderMeta,
    behavior: Behavior,
    seen: Mutex<Vec<Map<String, Value>>>,
}

impl ScriptedProvider {
    fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            meta: ProviderMeta {
                name: name.into(),
                description: format!("scripted {name}"),
                version: "0.0.1".into(),
                capabilities: vec!["discovery".into()],
                limitations: vec![],
                enabled: true,
            },
            behavior,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn contexts(&self) -> Vec<Map<String, Value>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResearchProvider for ScriptedProvider {
    fn metadata(&self) -> &ProviderMeta {
        &self.meta
    }

    fn workflow(&self) -> WorkflowDescription {
        WorkflowDescription {
            topology: "scripted".into(),
            agents: vec![],
        }
    }

    async fn initialize(&self) -> bool {
        true
    }

    async fn discover(&self, params: &DiscoveryParams) -> Result<Vec<Entity>, ProviderError> {
        self.seen.lock().unwrap().push(params.context.clone());
        match &self.behavior {
            Behavior::Succeed(entity) => Ok(vec![with_steps(&self.meta.name, entity.clone())]),
            Behavior::Fail(reason) => Err(ProviderError::Execution((*reason).to_string())),
            Behavior::Panic => panic!("scripted provider blew up"),
            Behavior::Rendezvous(barrier, entity) => {
                barrier.wait().await;
                Ok(vec![with_steps(&self.meta.name, entity.clone())])
            }
        }
    }
}

fn with_steps(prefix: &str, mut entity: Entity) -> Entity {
    let mut trace = StepTrace::new(prefix);
    trace.record("discover", "scripted discovery", true, "ok");
    entity.agent_steps = trace.into_steps();
    entity
}

fn scored(total: u32) -> Entity {
    Entity {
        name: "Acme".into(),
        score_breakdown: ScoreBreakdown {
            total_score: total,
            ..ScoreBreakdown::default()
        },
        ..Entity::default()
    }
}

fn focused(area: &str) -> Entity {
    Entity {
        name: "Acme".into(),
        focus_area: Some(area.into()),
        ..Entity::default()
    }
}

fn orchestrator(providers: Vec<DynProvider>) -> ResearchOrchestrator {
    ResearchOrchestrator::new(Arc::new(ProviderRegistry::new(providers)))
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn parallel_all_succeed_completes() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Succeed(scored(70))),
        ScriptedProvider::new("p2", Behavior::Succeed(scored(85))),
    ]);

    let job = orchestrator
        .execute_parallel_research("Acme", &names(&["p1", "p2"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.per_provider_result["p1"].score_breakdown.total_score, 70);
    assert_eq!(job.per_provider_result["p2"].score_breakdown.total_score, 85);
    assert!(job.end_time.is_some());
    for slot in job.per_provider_status.values() {
        assert_eq!(slot.status, RunState::Completed);
        assert_eq!(slot.progress, 100);
        assert_eq!(slot.steps.len(), 1);
    }
}

#[tokio::test]
async fn parallel_failure_is_isolated() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Succeed(scored(64))),
        ScriptedProvider::new("p2", Behavior::Fail("upstream exploded")),
        ScriptedProvider::new("p3", Behavior::Succeed(scored(12))),
    ]);

    let job = orchestrator
        .execute_parallel_research(
            "Acme",
            &names(&["p1", "p2", "p3"]),
            &ResearchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Partial);
    assert_eq!(job.per_provider_result.len(), 2);
    assert_eq!(job.per_provider_result["p1"].score_breakdown.total_score, 64);
    assert_eq!(job.per_provider_result["p3"].score_breakdown.total_score, 12);
    let failed = &job.per_provider_status["p2"];
    assert_eq!(failed.status, RunState::Failed);
    assert!(failed.error.as_deref().unwrap().contains("upstream exploded"));
    assert!(job.error.is_none());
}

#[tokio::test]
async fn parallel_panic_only_fails_its_own_slot() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("steady", Behavior::Succeed(scored(50))),
        ScriptedProvider::new("crashy", Behavior::Panic),
    ]);

    let job = orchestrator
        .execute_parallel_research(
            "Acme",
            &names(&["steady", "crashy"]),
            &ResearchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Partial);
    assert_eq!(job.per_provider_status["crashy"].status, RunState::Failed);
    assert!(job.per_provider_result.contains_key("steady"));
}

#[tokio::test]
async fn parallel_providers_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("a", Behavior::Rendezvous(barrier.clone(), scored(1))),
        ScriptedProvider::new("b", Behavior::Rendezvous(barrier, scored(2))),
    ]);

    let job = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        orchestrator.execute_parallel_research(
            "Acme",
            &names(&["a", "b"]),
            &ResearchOptions::default(),
        ),
    )
    .await
    .expect("providers should not run one after another")
    .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn unknown_provider_fails_only_its_slot() {
    let orchestrator = orchestrator(vec![ScriptedProvider::new(
        "p1",
        Behavior::Succeed(scored(40)),
    )]);

    let job = orchestrator
        .execute_parallel_research("Acme", &names(&["p1", "ghost"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Partial);
    let ghost = &job.per_provider_status["ghost"];
    assert_eq!(ghost.status, RunState::Failed);
    assert!(ghost.error.as_deref().unwrap().contains("not found"));
    assert!(orchestrator.tracker().get("ghost").is_none());
}

#[tokio::test]
async fn parallel_with_no_successes_fails() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Fail("one")),
        ScriptedProvider::new("p2", Behavior::Fail("two")),
    ]);

    let job = orchestrator
        .execute_parallel_research("Acme", &names(&["p1", "p2"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.per_provider_result.is_empty());
}

#[tokio::test]
async fn sequential_completes_when_last_provider_succeeds() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Fail("first provider down")),
        ScriptedProvider::new("p2", Behavior::Succeed(focused("Robotics"))),
    ]);

    let job = orchestrator
        .execute_sequential_research("Acme", &names(&["p1", "p2"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.per_provider_status["p1"].status, RunState::Failed);
    assert_eq!(job.per_provider_status["p2"].status, RunState::Completed);
}

#[tokio::test]
async fn sequential_partial_when_chain_ends_on_failure() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Succeed(focused("Robotics"))),
        ScriptedProvider::new("p2", Behavior::Fail("late failure")),
    ]);

    let job = orchestrator
        .execute_sequential_research("Acme", &names(&["p1", "p2"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Partial);
    let accumulated = job.accumulated.unwrap();
    assert_eq!(accumulated["focusArea"], "Robotics");
}

#[tokio::test]
async fn sequential_later_findings_overwrite_earlier_ones() {
    let first = ScriptedProvider::new("a", Behavior::Succeed(focused("X")));
    let second = ScriptedProvider::new("b", Behavior::Succeed(focused("Y")));
    let orchestrator = orchestrator(vec![first.clone() as DynProvider, second.clone()]);
    let options = ResearchOptions::default().with("region", "EMEA");

    let job = orchestrator
        .execute_sequential_research("Acme", &names(&["a", "b"]), &options)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let accumulated = job.accumulated.as_ref().unwrap();
    assert_eq!(accumulated["focusArea"], "Y");
    assert_eq!(accumulated["name"], "Acme");

    let first_seen = &first.contexts()[0];
    assert_eq!(first_seen["name"], "Acme");
    assert_eq!(first_seen["region"], "EMEA");
    assert!(!first_seen.contains_key("focusArea"));

    let second_seen = &second.contexts()[0];
    assert_eq!(second_seen["focusArea"], "X");
    assert_eq!(second_seen["region"], "EMEA");
}

#[tokio::test]
async fn sequential_failure_is_not_merged() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("a", Behavior::Succeed(focused("X"))),
        ScriptedProvider::new("b", Behavior::Fail("nope")),
        ScriptedProvider::new("c", Behavior::Succeed(Entity {
            name: "Acme".into(),
            location: Some("Berlin".into()),
            ..Entity::default()
        })),
    ]);

    let job = orchestrator
        .execute_sequential_research("Acme", &names(&["a", "b", "c"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let accumulated = job.accumulated.unwrap();
    assert_eq!(accumulated["focusArea"], "X");
    assert_eq!(accumulated["location"], "Berlin");
    assert!(!accumulated.contains_key("agentSteps"));
}

#[tokio::test]
async fn sequential_panic_fails_its_slot_and_chain_continues() {
    let steady = ScriptedProvider::new("steady", Behavior::Succeed(focused("Robotics")));
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("crashy", Behavior::Panic) as DynProvider,
        steady.clone(),
    ]);

    let job = orchestrator
        .execute_sequential_research(
            "Acme",
            &names(&["crashy", "steady"]),
            &ResearchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let crashed = &job.per_provider_status["crashy"];
    assert_eq!(crashed.status, RunState::Failed);
    assert!(crashed.error.as_deref().unwrap().contains("aborted"));
    assert_eq!(steady.contexts().len(), 1);
    assert_eq!(job.accumulated.unwrap()["focusArea"], "Robotics");
    assert_eq!(orchestrator.tracker().get("crashy").unwrap().failed_runs, 1);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_a_job_exists() {
    let orchestrator = orchestrator(vec![ScriptedProvider::new(
        "p1",
        Behavior::Succeed(scored(1)),
    )]);

    let blank = orchestrator
        .execute_parallel_research("  ", &names(&["p1"]), &ResearchOptions::default())
        .await;
    assert!(matches!(blank, Err(ResearchError::Validation(_))));

    let empty = orchestrator
        .execute_sequential_research("Acme", &[], &ResearchOptions::default())
        .await;
    assert!(matches!(empty, Err(ResearchError::Validation(_))));
}

#[tokio::test]
async fn registry_failure_lands_in_job_error() {
    let orchestrator = orchestrator(Vec::new());

    let job = orchestrator
        .execute_parallel_research("Acme", &names(&["p1"]), &ResearchOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("no providers registered"));
    assert_eq!(job.per_provider_status["p1"].status, RunState::Failed);
}

#[tokio::test]
async fn performance_is_recorded_once_per_provider() {
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Succeed(scored(10))),
        ScriptedProvider::new("p2", Behavior::Fail("boom")),
    ]);
    let providers = names(&["p1", "p2"]);

    orchestrator
        .execute_parallel_research("Acme", &providers, &ResearchOptions::default())
        .await
        .unwrap();
    orchestrator
        .execute_sequential_research("Acme", &providers, &ResearchOptions::default())
        .await
        .unwrap();

    let p1 = orchestrator.tracker().get("p1").unwrap();
    assert_eq!(p1.total_runs, 2);
    assert_eq!(p1.completion_rate_pct, 100.0);
    let p2 = orchestrator.tracker().get("p2").unwrap();
    assert_eq!(p2.total_runs, 2);
    assert_eq!(p2.failed_runs, 2);
    assert_eq!(p2.api_success_rate_pct, 100.0);
}

#[tokio::test]
async fn observers_receive_events_and_job_log() {
    let temp = TempDir::new().unwrap();
    let (collector, mut receiver) = EventCollector::new();
    let orchestrator = orchestrator(vec![
        ScriptedProvider::new("p1", Behavior::Succeed(scored(33))),
        ScriptedProvider::new("p2", Behavior::Fail("boom")),
    ])
    .with_events(collector)
    .with_job_log(temp.path());

    let job = orchestrator
        .execute_parallel_research("Acme", &names(&["p1", "p2"]), &ResearchOptions::default())
        .await
        .unwrap();

    let received = events::drain(&mut receiver);
    let started = received
        .iter()
        .filter(|event| matches!(event, Event::ProviderStarted { .. }))
        .count();
    assert_eq!(started, 2);
    assert!(matches!(
        received.last(),
        Some(Event::JobFinished {
            status: JobStatus::Partial,
            succeeded: 1,
            total: 2,
            ..
        })
    ));

    let logs: Vec<_> = walk(temp.path());
    assert_eq!(logs.len(), 1);
    let contents = std::fs::read_to_string(&logs[0]).unwrap();
    let record: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(record["job_id"], json!(job.id));
    assert_eq!(record["status"], "partial");
}

fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.extend(walk(&path));
        } else {
            files.push(path);
        }
    }
    files
}
