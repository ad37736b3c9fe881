//! Apply driver behavior against the orchestration engine seam.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use healthstack::config::StackConfig;
use healthstack::engine::{
    apply, EngineError, OrchestrationEngine, Outcome, Outputs, ResolvedDeclaration,
    SimulatedEngine,
};
use healthstack::graph::{Declaration, DeploymentGraph, GraphError, LogicalName, ResourceKind};
use healthstack::stack::{self, names};

fn build() -> DeploymentGraph {
    let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    stack::build(&StackConfig::default(), time).unwrap()
}

fn engine() -> SimulatedEngine {
    SimulatedEngine::new("us-east-1", "123456789012")
}

/// Wraps the simulator and records every declaration it is asked to realize.
struct RecordingEngine {
    inner: SimulatedEngine,
    seen: Mutex<Vec<ResolvedDeclaration>>,
}

impl RecordingEngine {
    fn new(inner: SimulatedEngine) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<ResolvedDeclaration> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrchestrationEngine for RecordingEngine {
    async fn realize(&self, declaration: &ResolvedDeclaration) -> Result<Outputs, EngineError> {
        self.seen.lock().unwrap().push(declaration.clone());
        self.inner.realize(declaration).await
    }
}

#[tokio::test]
async fn test_apply_realizes_every_declaration() {
    let graph = build();
    let report = apply(&graph, &engine()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.applied().count(), graph.len());
}

#[tokio::test]
async fn test_no_declaration_is_realized_before_its_dependencies() {
    let graph = build();
    let recorder = RecordingEngine::new(engine());
    apply(&graph, &recorder).await.unwrap();

    let seen: Vec<String> = recorder
        .seen()
        .into_iter()
        .map(|d| d.name.to_string())
        .collect();
    for declaration in graph.iter() {
        let at = seen
            .iter()
            .position(|n| n == declaration.name().as_str())
            .unwrap();
        for dependency in declaration.dependencies() {
            let dep_at = seen.iter().position(|n| n == dependency.as_str()).unwrap();
            assert!(dep_at < at, "{} realized before {}", declaration.name(), dependency);
        }
    }
}

#[tokio::test]
async fn test_engine_sees_resolved_attributes() {
    let graph = build();
    let recorder = RecordingEngine::new(engine());
    let report = apply(&graph, &recorder).await.unwrap();

    let seen = recorder.seen();
    let find = |name: &str| seen.iter().find(|d| d.name == name).unwrap().clone();

    let rest_api = match report.outcome(names::REST_API).unwrap() {
        Outcome::Applied { outputs } => outputs.clone(),
        other => panic!("rest api not applied: {:?}", other),
    };
    let permission = find(names::LAMBDA_PERMISSION);
    assert_eq!(
        permission.str_property("source_arn").unwrap(),
        format!("{}/*/*/*", rest_api["execution_arn"])
    );

    let integration = find(names::API_INTEGRATION);
    assert_eq!(integration.str_property("http_method"), Some("ANY"));
    assert!(integration
        .str_property("uri")
        .unwrap()
        .ends_with("/invocations"));

    let settings = find(names::METHOD_SETTINGS);
    assert_eq!(settings.str_property("stage_name"), Some("test"));
}

#[tokio::test]
async fn test_failure_skips_only_transitive_dependents() {
    let graph = build();
    let failing = engine().failing(names::LAMBDA_LOGGING_POLICY);
    let report = apply(&graph, &failing).await.unwrap();

    assert!(!report.is_success());
    let failed: Vec<&str> = report.failed().map(LogicalName::as_str).collect();
    assert_eq!(failed, vec![names::LAMBDA_LOGGING_POLICY]);

    let mut skipped: Vec<&str> = report.skipped().map(LogicalName::as_str).collect();
    let mut expected: Vec<&str> = graph
        .dependents_transitive(names::LAMBDA_LOGGING_POLICY)
        .unwrap()
        .into_iter()
        .map(LogicalName::as_str)
        .collect();
    skipped.sort_unstable();
    expected.sort_unstable();
    assert_eq!(skipped, expected);
    assert!(skipped.contains(&names::LAMBDA));
    assert!(skipped.contains(&names::API_STAGE));

    // Independent branches still apply
    for name in [
        names::LOG_GROUP,
        names::CLOUDWATCH_ROLE,
        names::API_ACCOUNT,
        names::REST_API,
        names::API_METHOD,
    ] {
        assert!(
            matches!(report.outcome(name), Some(Outcome::Applied { .. })),
            "{name} should have applied"
        );
    }
}

#[tokio::test]
async fn test_failure_is_reported_with_error() {
    let graph = build();
    let report = apply(&graph, &engine().failing(names::REST_API))
        .await
        .unwrap();
    match report.outcome(names::REST_API) {
        Some(Outcome::Failed { error }) => assert!(error.contains("simulated failure")),
        other => panic!("expected failure, got {:?}", other),
    }
    match report.outcome(names::API_RESOURCE) {
        Some(Outcome::Skipped { blocked_by }) => assert_eq!(blocked_by, names::REST_API),
        other => panic!("expected skip, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_graph_is_never_submitted() {
    let mut graph = DeploymentGraph::new();
    let ghost = LogicalName::new("ghost").unwrap();
    graph
        .add(
            Declaration::new("api", ResourceKind::RestApi)
                .unwrap()
                .depends_on(&ghost),
        )
        .unwrap();

    let recorder = RecordingEngine::new(engine());
    let err = apply(&graph, &recorder).await.unwrap_err();
    assert!(matches!(err, GraphError::UndefinedDependency { .. }));
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn test_building_makes_no_engine_calls() {
    let recorder = RecordingEngine::new(engine());
    let _graph = build();
    assert!(recorder.seen().is_empty());
}
