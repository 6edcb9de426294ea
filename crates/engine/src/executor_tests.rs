//! End-to-end tests for the workflow runner.
//!
//! Every provider is a deterministic double from `nodes::mock`, so no
//! embedding service, language model, or Postgres instance is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use nodes::mock::{
    providers, FailingEmbedder, FixedClock, GenerationCall, StubEmbedder, StubGenerator,
};
use nodes::{FinalOutput, InMemoryDocumentStore, NodeError, Providers, StoredChunk};

use crate::models::{Edge, Node, NodeKind, Workflow};
use crate::{EngineError, RunnerConfig, WorkflowRunner};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn owner() -> Uuid {
    Uuid::from_u128(0xA11CE)
}

fn runner(providers: Providers) -> WorkflowRunner {
    WorkflowRunner::new(providers, RunnerConfig::default())
        .with_clock(Arc::new(FixedClock::default()))
}

/// A runner answering every prompt with `reply` and holding no documents.
fn simple_runner(reply: &str) -> (WorkflowRunner, Arc<Mutex<Vec<GenerationCall>>>) {
    let generator = StubGenerator::replying(reply);
    let calls = Arc::clone(&generator.calls);
    let providers = providers(
        StubEmbedder::constant(vec![1.0, 0.0]),
        generator,
        InMemoryDocumentStore::new(),
    );
    (runner(providers), calls)
}

fn node(id: &str, kind: NodeKind) -> Node {
    Node::new(id, kind)
}

/// `ids[0] → ids[1] → … → ids[n-1]`
fn chain(ids: &[&str]) -> Vec<Edge> {
    ids.windows(2).map(|w| Edge::new(w[0], w[1])).collect()
}

fn qa_nodes() -> Vec<Node> {
    vec![
        node("q", NodeKind::QueryIntake),
        node("r", NodeKind::KnowledgeRetrieval),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ]
}

// ============================================================
// Happy paths
// ============================================================

#[tokio::test]
async fn minimal_graph_answers_the_question() {
    let (runner, calls) = simple_runner("4");
    let nodes = vec![
        node("1", NodeKind::QueryIntake),
        node("2", NodeKind::Generation),
        node("3", NodeKind::OutputFormat),
    ];

    let ctx = runner
        .execute(owner(), &nodes, &chain(&["1", "2", "3"]), json!({ "query": "What is 2+2?" }))
        .await
        .expect("run should succeed");

    assert_eq!(ctx.query.as_deref(), Some("What is 2+2?"));
    assert!(ctx.timestamp.is_some());
    assert_eq!(ctx.generated_text.as_deref(), Some("4"));
    assert_eq!(ctx.answer.as_deref(), Some("4"));
    assert_eq!(ctx.final_output, Some(FinalOutput::Text("4".into())));
    assert!(ctx.error.is_none());

    let calls = calls.lock().unwrap().clone();
    assert!(matches!(&calls[..], [GenerationCall::Prompt(p)] if p.contains("What is 2+2?")));
}

#[tokio::test]
async fn retrieval_grounds_generation() {
    let document_id = Uuid::from_u128(7);
    let store = InMemoryDocumentStore::with_chunks(
        owner(),
        vec![StoredChunk {
            document_id,
            document_title: "Leave policy".into(),
            content: "Employees get 25 days of leave.".into(),
            embedding: vec![0.9, 0.435_889_9],
        }],
    );
    let generator = StubGenerator::replying("25 days");
    let calls = Arc::clone(&generator.calls);
    let runner = runner(providers(StubEmbedder::constant(vec![1.0, 0.0]), generator, store));

    let ctx = runner
        .execute(
            owner(),
            &qa_nodes(),
            &chain(&["q", "r", "g", "o"]),
            json!({ "query": "How much leave?" }),
        )
        .await
        .unwrap();

    assert_eq!(ctx.context_documents_count, Some(1));
    assert_eq!(ctx.retrieved_chunks.len(), 1);
    assert!((ctx.retrieved_chunks[0].similarity - 0.9).abs() < 1e-4);
    assert_eq!(ctx.retrieved_context.as_deref(), Some("Employees get 25 days of leave."));

    let calls = calls.lock().unwrap().clone();
    match &calls[..] {
        [GenerationCall::WithContext { query, context }] => {
            assert_eq!(query, "How much leave?");
            assert!(!context[0].is_empty());
        }
        other => panic!("expected one grounded call, got {other:?}"),
    }

    assert_eq!(
        ctx.final_output.unwrap().as_text(),
        Some("25 days\n\nSources:\n1. Leave policy (similarity: 0.90)")
    );
}

#[tokio::test]
async fn other_owners_documents_are_invisible() {
    let store = InMemoryDocumentStore::with_chunks(
        Uuid::from_u128(999),
        vec![StoredChunk {
            document_id: Uuid::from_u128(1),
            document_title: "Secret".into(),
            content: "not yours".into(),
            embedding: vec![1.0, 0.0],
        }],
    );
    let runner = runner(providers(
        StubEmbedder::constant(vec![1.0, 0.0]),
        StubGenerator::replying("ok"),
        store,
    ));

    let ctx = runner
        .execute(owner(), &qa_nodes(), &chain(&["q", "r", "g", "o"]), json!("question"))
        .await
        .unwrap();

    assert_eq!(ctx.context_documents_count, Some(0));
    assert_eq!(ctx.retrieved_context.as_deref(), Some(""));
}

#[tokio::test]
async fn json_output_from_a_parsed_workflow() {
    let (runner, _) = simple_runner("42");
    let workflow = Workflow::from_json(json!({
        "name": "json answer",
        "nodes": [
            { "id": "q", "kind": "query_intake" },
            { "id": "g", "kind": "generation", "config": { "model": "custom" } },
            { "id": "o", "kind": "output_format", "config": { "format": "json" } }
        ],
        "edges": [
            { "source": "q", "target": "g" },
            { "source": "g", "target": "o" }
        ]
    }))
    .unwrap();

    let ctx = runner
        .execute_workflow(owner(), &workflow, json!({ "query": "meaning?" }))
        .await
        .unwrap();

    let output = serde_json::to_value(ctx.final_output.unwrap()).unwrap();
    assert_eq!(output["answer"], "42");
    assert_eq!(output["metadata"]["model_used"], "custom");
    assert_eq!(output["metadata"]["context_documents_count"], 0);
}

#[tokio::test]
async fn caller_keys_survive_the_run() {
    let (runner, _) = simple_runner("ok");
    let nodes = vec![node("q", NodeKind::QueryIntake), node("o", NodeKind::OutputFormat)];

    let ctx = runner
        .execute(owner(), &nodes, &chain(&["q", "o"]), json!({ "query": "hi", "session": "s-1" }))
        .await
        .unwrap();

    assert_eq!(ctx.extra_str("session"), Some("s-1"));
    let value: Value = serde_json::to_value(&ctx).unwrap();
    assert_eq!(value["session"], "s-1");
}

// ============================================================
// Traversal
// ============================================================

#[tokio::test]
async fn cycle_terminates_and_matches_linear_run() {
    let (linear_runner, _) = simple_runner("same");
    let (cyclic_runner, _) = simple_runner("same");
    let input = json!({ "query": "loop?" });

    let linear = linear_runner
        .execute_traced(owner(), &qa_nodes(), &chain(&["q", "r", "g", "o"]), input.clone())
        .await
        .unwrap();

    let mut cyclic_edges = chain(&["q", "r"]);
    cyclic_edges.push(Edge::new("r", "q"));
    cyclic_edges.extend(chain(&["r", "g", "o"]));
    let cyclic = cyclic_runner
        .execute_traced(owner(), &qa_nodes(), &cyclic_edges, input)
        .await
        .unwrap();

    assert_eq!(cyclic.visited, vec!["q", "r", "g", "o"]);
    assert_eq!(cyclic.visited, linear.visited);
    assert_eq!(cyclic.context, linear.context);
}

#[tokio::test]
async fn self_loop_runs_once() {
    let (runner, calls) = simple_runner("once");
    let nodes = vec![
        node("q", NodeKind::QueryIntake),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ];
    let edges = vec![Edge::new("q", "g"), Edge::new("g", "g"), Edge::new("g", "o")];

    let report = runner
        .execute_traced(owner(), &nodes, &edges, json!("x"))
        .await
        .unwrap();

    assert_eq!(report.visited, vec!["q", "g", "o"]);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn branching_follows_first_unvisited_edge_only() {
    let (runner, calls) = simple_runner("unused");
    let nodes = vec![
        node("q", NodeKind::QueryIntake),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ];
    let edges = vec![Edge::new("q", "o"), Edge::new("q", "g"), Edge::new("g", "o")];

    let report = runner
        .execute_traced(owner(), &nodes, &edges, json!("x"))
        .await
        .unwrap();

    assert_eq!(report.visited, vec!["q", "o"]);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(report.context.answer.as_deref(), Some("No response generated"));
}

#[tokio::test]
async fn entry_without_edges_stops_after_intake() {
    let (runner, _) = simple_runner("unused");
    let report = runner
        .execute_traced(owner(), &qa_nodes(), &[], json!("alone"))
        .await
        .unwrap();

    assert_eq!(report.visited, vec!["q"]);
    assert!(report.context.final_output.is_none());
}

#[tokio::test]
async fn dangling_edges_are_ignored_at_run_time() {
    let (runner, _) = simple_runner("fine");
    let nodes = vec![
        node("q", NodeKind::QueryIntake),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ];
    let edges = vec![Edge::new("q", "ghost"), Edge::new("q", "g"), Edge::new("g", "o")];

    let report = runner
        .execute_traced(owner(), &nodes, &edges, json!("x"))
        .await
        .unwrap();

    assert_eq!(report.visited, vec!["q", "g", "o"]);
}

#[tokio::test]
async fn identical_runs_are_deterministic() {
    let (runner, _) = simple_runner("stable");
    let edges = chain(&["q", "r", "g", "o"]);

    let first = runner
        .execute(owner(), &qa_nodes(), &edges, json!({ "query": "again" }))
        .await
        .unwrap();
    let second = runner
        .execute(owner(), &qa_nodes(), &edges, json!({ "query": "again" }))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.timestamp, Some(FixedClock::default().0));
}

// ============================================================
// Degraded steps
// ============================================================

#[tokio::test]
async fn failing_embedder_still_reaches_output() {
    let generator = StubGenerator::replying("best effort");
    let calls = Arc::clone(&generator.calls);
    let runner = runner(providers(
        FailingEmbedder::new("embedding service down"),
        generator,
        InMemoryDocumentStore::new(),
    ));

    let ctx = runner
        .execute(owner(), &qa_nodes(), &chain(&["q", "r", "g", "o"]), json!("q?"))
        .await
        .unwrap();

    assert!(ctx.is_degraded());
    assert!(ctx.error.as_deref().unwrap().contains("embedding service down"));
    assert_eq!(ctx.retrieved_context.as_deref(), Some(""));
    assert_eq!(ctx.answer.as_deref(), Some("best effort"));
    assert!(ctx.final_output.is_some());

    let calls = calls.lock().unwrap().clone();
    assert!(matches!(&calls[..], [GenerationCall::Prompt(_)]));
}

#[tokio::test]
async fn failing_generator_renders_apology() {
    let runner = runner(providers(
        StubEmbedder::constant(vec![1.0]),
        StubGenerator::failing(nodes::ProviderError::NotConfigured("generation provider")),
        InMemoryDocumentStore::new(),
    ));
    let nodes = vec![
        node("q", NodeKind::QueryIntake),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ];

    let ctx = runner
        .execute(owner(), &nodes, &chain(&["q", "g", "o"]), json!("q?"))
        .await
        .unwrap();

    assert!(ctx.answer.as_deref().unwrap().starts_with("I apologize"));
    assert!(ctx.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn hanging_generator_is_bounded_by_step_timeout() {
    let providers = providers(
        StubEmbedder::constant(vec![1.0]),
        StubGenerator::hanging(),
        InMemoryDocumentStore::new(),
    );
    let runner = WorkflowRunner::new(
        providers,
        RunnerConfig {
            step_timeout: Duration::from_secs(2),
        },
    );
    let nodes = vec![
        node("q", NodeKind::QueryIntake),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ];

    let ctx = runner
        .execute(owner(), &nodes, &chain(&["q", "g", "o"]), json!("slow?"))
        .await
        .unwrap();

    assert!(ctx.error.unwrap().contains("timed out"));
    assert!(ctx.final_output.is_some());
}

#[tokio::test]
async fn mistyped_node_config_falls_back_to_defaults() {
    let (runner, _) = simple_runner("4");
    let nodes = vec![
        node("1", NodeKind::QueryIntake),
        node("r", NodeKind::KnowledgeRetrieval).with_config(json!({ "max_results": -1 })),
        node("2", NodeKind::Generation).with_config(json!({ "temperature": "0.7" })),
        node("3", NodeKind::OutputFormat).with_config(json!({ "include_sources": "yes" })),
    ];

    let ctx = runner
        .execute(owner(), &nodes, &chain(&["1", "r", "2", "3"]), json!("What is 2+2?"))
        .await
        .expect("config fields that do not fit never abort a run");

    assert_eq!(ctx.generated_text.as_deref(), Some("4"));
    assert_eq!(ctx.final_output, Some(FinalOutput::Text("4".into())));
    assert!(ctx.error.is_none());
    assert_eq!(ctx.warnings.len(), 3);
    for (node_id, field) in [("r", "max_results"), ("2", "temperature"), ("3", "include_sources")] {
        assert!(
            ctx.warnings
                .iter()
                .any(|w| w.starts_with(&format!("node '{node_id}'")) && w.contains(field)),
            "no warning for {node_id}.{field}: {:?}",
            ctx.warnings
        );
    }
}

#[tokio::test]
async fn mistyped_input_keys_do_not_abort() {
    let (runner, _) = simple_runner("4");
    let nodes = vec![
        node("1", NodeKind::QueryIntake),
        node("2", NodeKind::Generation),
        node("3", NodeKind::OutputFormat),
    ];

    let ctx = runner
        .execute(
            owner(),
            &nodes,
            &chain(&["1", "2", "3"]),
            json!({ "query": "q", "timestamp": "2024-01-01" }),
        )
        .await
        .unwrap();

    assert_eq!(ctx.timestamp, Some(FixedClock::default().0));
    assert_eq!(ctx.answer.as_deref(), Some("4"));
    assert!(ctx.warnings[0].contains("`timestamp`"));
}

// ============================================================
// Aborted runs
// ============================================================

#[tokio::test]
async fn no_entry_point_is_an_error() {
    let (runner, _) = simple_runner("unused");
    let nodes = vec![node("g", NodeKind::Generation), node("o", NodeKind::OutputFormat)];

    let err = runner
        .execute(owner(), &nodes, &chain(&["g", "o"]), json!("x"))
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::MissingEntryPoint);
}

#[tokio::test]
async fn missing_query_aborts_at_intake() {
    let (runner, calls) = simple_runner("unused");

    let err = runner
        .execute(owner(), &qa_nodes(), &chain(&["q", "r", "g", "o"]), json!({}))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::NodeFailed {
            node_id: "q".into(),
            source: NodeError::MissingQuery,
        }
    );
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_input_is_rejected() {
    let (runner, _) = simple_runner("unused");
    let err = runner
        .execute(owner(), &qa_nodes(), &[], json!(42))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_kind_is_rejected_at_parse_time() {
    let err = Workflow::from_json(json!({
        "name": "bad",
        "nodes": [{ "id": "x", "kind": "webhook" }]
    }))
    .unwrap_err();

    assert_eq!(err, EngineError::UnknownNodeKind("webhook".into()));
}

#[tokio::test]
async fn cancelled_token_stops_before_first_node() {
    let (runner, calls) = simple_runner("unused");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = runner
        .execute_with_cancel(owner(), &qa_nodes(), &chain(&["q", "g", "o"]), json!("x"), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::Cancelled);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_running_node() {
    let providers = providers(
        StubEmbedder::constant(vec![1.0]),
        StubGenerator::hanging(),
        InMemoryDocumentStore::new(),
    );
    let runner = WorkflowRunner::new(
        providers,
        RunnerConfig {
            step_timeout: Duration::from_secs(600),
        },
    );
    let nodes = vec![
        node("q", NodeKind::QueryIntake),
        node("g", NodeKind::Generation),
        node("o", NodeKind::OutputFormat),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = runner
        .execute_with_cancel(owner(), &nodes, &chain(&["q", "g", "o"]), json!("x"), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::Cancelled);
}
