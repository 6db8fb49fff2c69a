//! The run driver.
//!
//! [`RunDriver::handle`] takes a trigger event through the execution state
//! machine:
//!
//! ```text
//! CREATED --begin--> RUNNING --all nodes ok--> SUCCESS
//!                       |
//!                       +--structural or node error--> FAILED
//! ```
//!
//! The execution record is created keyed by the trigger event id, so a
//! redelivered event never produces a second record. Nodes run strictly one
//! at a time in topological order, and the first failing node ends the run.
//! Failures of the driver's own dependencies (stores) are returned as
//! errors without touching the record, so the event can be delivered again.

use crate::context::ExecutionContext;
use crate::definition::{SourceError, WorkflowSource};
use crate::error::RunError;
use crate::execution::{
    BeginOutcome, ExecutionRecord, ExecutionStatus, ExecutionStore, ExecutionStoreError,
    TerminalOutcome,
};
use crate::executor::{NodeExecutor, NodeInvocation};
use crate::lint::unresolved_references;
use crate::node::{Node, NodeId};
use crate::registry::ExecutorRegistry;
use crate::retry::RetryPolicy;
use crate::status::{StatusPublisher, StatusReporter};
use crate::step::{DurableStepRunner, StepStore};
use crate::trigger::TriggerEvent;
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How handling a trigger event ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run finished with SUCCESS.
    Succeeded(ExecutionRecord),
    /// The run finished with FAILED.
    Failed(ExecutionRecord),
    /// The trigger event had already been handled; nothing ran.
    AlreadyFinished(ExecutionRecord),
}

impl RunOutcome {
    fn from_record(record: ExecutionRecord) -> Self {
        match record.status {
            ExecutionStatus::Success => Self::Succeeded(record),
            ExecutionStatus::Running | ExecutionStatus::Failed => Self::Failed(record),
        }
    }

    /// Returns the execution record.
    #[must_use]
    pub fn record(&self) -> &ExecutionRecord {
        match self {
            Self::Succeeded(record) | Self::Failed(record) | Self::AlreadyFinished(record) => {
                record
            }
        }
    }
}

/// Drives workflow runs.
pub struct RunDriver {
    workflows: Arc<dyn WorkflowSource>,
    registry: Arc<ExecutorRegistry>,
    executions: Arc<dyn ExecutionStore>,
    steps: Arc<dyn StepStore>,
    status: Arc<dyn StatusPublisher>,
    retry: RetryPolicy,
}

impl RunDriver {
    /// Creates a driver using the standard retry policy.
    #[must_use]
    pub fn new(
        workflows: Arc<dyn WorkflowSource>,
        registry: Arc<ExecutorRegistry>,
        executions: Arc<dyn ExecutionStore>,
        steps: Arc<dyn StepStore>,
        status: Arc<dyn StatusPublisher>,
    ) -> Self {
        Self {
            workflows,
            registry,
            executions,
            steps,
            status,
            retry: RetryPolicy::STANDARD,
        }
    }

    /// Sets the retry policy applied to every step.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handles one delivery of a trigger event.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Store`] when persistence fails. The record is
    /// left as it was, and handling the same event again is safe.
    #[instrument(skip(self, event), fields(trigger_event_id = %event.id, workflow_id = %event.workflow_id, source = %event.source))]
    pub async fn handle(
        &self,
        event: &TriggerEvent,
    ) -> nodeflow_core::Result<RunOutcome, RunError> {
        let begin = self
            .executions
            .begin(ExecutionRecord::start(event.workflow_id, event.id))
            .await
            .map_err(store_error)?;

        match begin {
            BeginOutcome::Existing(record) if record.status.is_terminal() => {
                info!(
                    execution_id = %record.id,
                    status = %record.status,
                    "Trigger event already handled"
                );
                return Ok(RunOutcome::AlreadyFinished(record));
            }
            BeginOutcome::Existing(record) => {
                info!(execution_id = %record.id, "Resuming interrupted execution");
            }
            BeginOutcome::Created(record) => {
                info!(execution_id = %record.id, "Execution started");
            }
        }

        let outcome = match self.run(event).await {
            Ok(context) => TerminalOutcome::Success {
                output: context.into_json(),
            },
            Err(error) if error.is_run_fatal() => {
                warn!(error = %error, "Execution failed");
                let message = error.to_string();
                let report: Report<RunError> = error.into();
                TerminalOutcome::Failed {
                    error: message,
                    error_stack: format!("{report:?}"),
                }
            }
            Err(error) => return Err(error.into()),
        };

        let record = self
            .executions
            .finish(event.id, outcome)
            .await
            .map_err(store_error)?;
        info!(execution_id = %record.id, status = %record.status, "Execution finished");

        Ok(RunOutcome::from_record(record))
    }

    async fn run(&self, event: &TriggerEvent) -> Result<ExecutionContext, RunError> {
        let workflow = self
            .workflows
            .load(event.workflow_id)
            .await
            .map_err(|e| match e {
                SourceError::UnknownNodeType { node_id, tag } => RunError::UnknownNodeType {
                    node_id: NodeId::new(node_id),
                    node_type: tag,
                },
                SourceError::LoadFailed { message } => RunError::Store { message },
            })?
            .ok_or(RunError::WorkflowNotFound {
                workflow_id: event.workflow_id,
            })?;

        let graph = workflow.graph()?;
        let order = graph.topological_order()?;

        let mut plan = Vec::with_capacity(order.len());
        for node in &order {
            let executor =
                self.registry
                    .resolve(node.node_type)
                    .map_err(|_| RunError::UnknownNodeType {
                        node_id: node.id.clone(),
                        node_type: node.node_type.to_string(),
                    })?;
            plan.push((*node, executor));
        }

        let mut context = event
            .initial_data
            .clone()
            .map(ExecutionContext::from)
            .unwrap_or_default();

        for reference in unresolved_references(&order, &context) {
            warn!(
                node_id = %reference.node_id,
                expression = %reference.expression,
                root = %reference.root,
                "Template references a key no upstream node writes; it will render empty"
            );
        }

        debug!(node_count = plan.len(), "Executing nodes in topological order");
        for (node, executor) in plan {
            context = self
                .execute_node(event, node, executor.as_ref(), &context)
                .await?;
        }

        Ok(context)
    }

    #[instrument(skip_all, fields(node_id = %node.id, node_type = %node.node_type))]
    async fn execute_node(
        &self,
        event: &TriggerEvent,
        node: &Node,
        executor: &dyn NodeExecutor,
        context: &ExecutionContext,
    ) -> Result<ExecutionContext, RunError> {
        let steps = DurableStepRunner::new(
            Arc::clone(&self.steps),
            event.id,
            node.id.clone(),
            self.retry,
        );
        let invocation = NodeInvocation {
            node,
            context,
            steps: &steps,
            status: StatusReporter::new(self.status.as_ref(), node.node_type, &node.id),
        };

        let next = executor
            .execute(invocation)
            .await
            .map_err(|error| RunError::NodeFailed {
                node_id: node.id.clone(),
                node_type: node.node_type.to_string(),
                error,
            })?;

        debug!("Node completed");
        Ok(next)
    }
}

fn store_error(e: ExecutionStoreError) -> RunError {
    RunError::Store {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{InMemoryWorkflowSource, Workflow};
    use crate::edge::Connection;
    use crate::error::NodeError;
    use crate::execution::InMemoryExecutionStore;
    use crate::node::NodeType;
    use crate::status::{NodeStatus, RecordingStatusPublisher};
    use crate::step::{InMemoryStepStore, StepKey, step_fn};
    use async_trait::async_trait;
    use nodeflow_core::{UserId, WorkflowId};
    use serde_json::{Map, Value as JsonValue, json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Executor that records what it saw and writes `{"ran": <node id>}`
    /// under the node's output key.
    #[derive(Default)]
    struct ProbeExecutor {
        invoked: Mutex<Vec<(String, ExecutionContext)>>,
        work_runs: Arc<AtomicU32>,
        failures: HashMap<String, NodeError>,
        fail_first_attempt: HashMap<String, NodeError>,
    }

    impl ProbeExecutor {
        fn failing_at(mut self, node_id: &str, error: NodeError) -> Self {
            self.failures.insert(node_id.to_string(), error);
            self
        }

        fn flaky_at(mut self, node_id: &str, error: NodeError) -> Self {
            self.fail_first_attempt.insert(node_id.to_string(), error);
            self
        }

        fn invoked_ids(&self) -> Vec<String> {
            self.invoked
                .lock()
                .map(|v| v.iter().map(|(id, _)| id.clone()).collect())
                .unwrap_or_default()
        }

        fn context_seen_by(&self, node_id: &str) -> Option<ExecutionContext> {
            self.invoked.lock().ok().and_then(|v| {
                v.iter()
                    .find(|(id, _)| id == node_id)
                    .map(|(_, ctx)| ctx.clone())
            })
        }

        fn work_runs(&self) -> u32 {
            self.work_runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NodeExecutor for ProbeExecutor {
        async fn execute(&self, invocation: NodeInvocation<'_>) -> Result<ExecutionContext, NodeError> {
            let node_id = invocation.node_id().to_string();
            if let Ok(mut invoked) = self.invoked.lock() {
                invoked.push((node_id.clone(), invocation.context.clone()));
            }

            invocation
                .run_with_status(|| async {
                    let runs = Arc::clone(&self.work_runs);
                    let failure = self.failures.get(&node_id).cloned();
                    let flaky = self.fail_first_attempt.get(&node_id).cloned();
                    let id = node_id.clone();
                    let output = invocation
                        .steps
                        .run(
                            "probe",
                            step_fn(move || {
                                let runs = Arc::clone(&runs);
                                let failure = failure.clone();
                                let flaky = flaky.clone();
                                let id = id.clone();
                                async move {
                                    let attempt = runs.fetch_add(1, Ordering::SeqCst) + 1;
                                    if let Some(error) = failure {
                                        return Err(error);
                                    }
                                    match flaky {
                                        Some(error) if attempt == 1 => Err(error),
                                        _ => Ok(json!({ "ran": id })),
                                    }
                                }
                            }),
                        )
                        .await?;

                    Ok(match invocation.node.output_key() {
                        Some(key) => invocation.context.with_output(key, output),
                        None => invocation.context.clone(),
                    })
                })
                .await
        }
    }

    struct Harness {
        workflows: Arc<InMemoryWorkflowSource>,
        executions: Arc<InMemoryExecutionStore>,
        steps: Arc<InMemoryStepStore>,
        status: Arc<RecordingStatusPublisher>,
        probe: Arc<ProbeExecutor>,
    }

    impl Harness {
        fn new(probe: ProbeExecutor) -> Self {
            Self {
                workflows: Arc::new(InMemoryWorkflowSource::new()),
                executions: Arc::new(InMemoryExecutionStore::new()),
                steps: Arc::new(InMemoryStepStore::new()),
                status: Arc::new(RecordingStatusPublisher::new()),
                probe: Arc::new(probe),
            }
        }

        fn registry(&self, types: &[NodeType]) -> ExecutorRegistry {
            let shared: Arc<dyn NodeExecutor> = self.probe.clone();
            types
                .iter()
                .fold(ExecutorRegistry::builder(), |builder, t| {
                    builder.register_shared(*t, Arc::clone(&shared))
                })
                .build()
        }

        fn driver_with(&self, registry: ExecutorRegistry, retry: RetryPolicy) -> RunDriver {
            RunDriver::new(
                self.workflows.clone(),
                Arc::new(registry),
                self.executions.clone(),
                self.steps.clone(),
                self.status.clone(),
            )
            .with_retry_policy(retry)
        }

        fn driver(&self) -> RunDriver {
            self.driver_with(self.registry(&NodeType::ALL), RetryPolicy::NONE)
        }

        fn add(&self, workflow: Workflow) -> WorkflowId {
            let id = workflow.id;
            self.workflows.insert(workflow);
            id
        }
    }

    fn http(id: &str, variable: &str) -> Node {
        Node::new(id, NodeType::HttpRequest)
            .with_data("variableName", variable)
            .with_data("endpoint", "https://x")
            .with_data("method", "GET")
    }

    fn chain(ids: &[&str]) -> Workflow {
        let mut workflow = Workflow::new("chain", UserId::new());
        for id in ids {
            workflow = workflow.with_node(http(id, &format!("out_{id}")));
        }
        for pair in ids.windows(2) {
            workflow = workflow.with_connection(Connection::new(pair[0], pair[1]));
        }
        workflow
    }

    fn event(workflow_id: WorkflowId) -> TriggerEvent {
        TriggerEvent::new(workflow_id, crate::trigger::TriggerSource::Manual)
    }

    #[tokio::test]
    async fn trigger_then_http_succeeds() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(
            Workflow::new("demo", UserId::new())
                .with_node(Node::new("1", NodeType::ManualTrigger))
                .with_node(http("2", "resp"))
                .with_connection(Connection::new("1", "2")),
        );

        let outcome = harness
            .driver()
            .handle(&event(workflow_id))
            .await
            .expect("run completes");

        assert_eq!(harness.probe.invoked_ids(), vec!["1", "2"]);
        let seen_by_http = harness.probe.context_seen_by("2").expect("node 2 ran");
        assert!(!seen_by_http.contains_key("resp"));

        match outcome {
            RunOutcome::Succeeded(record) => {
                assert_eq!(record.status, ExecutionStatus::Success);
                assert_eq!(record.output, Some(json!({ "resp": { "ran": "2" } })));
                assert!(record.completed_at.is_some());
                assert!(record.error.is_none());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chain_accumulates_context() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(chain(&["a", "b", "c"]));

        let mut initial = Map::new();
        initial.insert("seed".to_string(), json!(1));
        let outcome = harness
            .driver()
            .handle(&event(workflow_id).with_initial_data(initial))
            .await
            .expect("run completes");

        assert_eq!(
            outcome.record().output,
            Some(json!({
                "seed": 1,
                "out_a": { "ran": "a" },
                "out_b": { "ran": "b" },
                "out_c": { "ran": "c" },
            }))
        );
        let seen_by_c = harness.probe.context_seen_by("c").expect("c ran");
        assert_eq!(seen_by_c.get("out_a"), Some(&json!({ "ran": "a" })));
        assert!(!seen_by_c.contains_key("out_c"));
    }

    #[tokio::test]
    async fn failing_node_stops_the_run() {
        let harness = Harness::new(
            ProbeExecutor::default().failing_at("b", NodeError::internal("upstream exploded")),
        );
        let workflow_id = harness.add(chain(&["a", "b", "c"]));

        let outcome = harness
            .driver()
            .handle(&event(workflow_id))
            .await
            .expect("run finishes");

        assert_eq!(harness.probe.invoked_ids(), vec!["a", "b"]);
        let record = match outcome {
            RunOutcome::Failed(record) => record,
            other => panic!("expected failure, got {other:?}"),
        };
        assert_eq!(record.status, ExecutionStatus::Failed);
        let error = record.error.unwrap_or_default();
        assert!(error.contains("node b"), "{error}");
        assert!(error.contains("upstream exploded"), "{error}");
        assert!(record.error_stack.is_some_and(|s| s.contains("upstream exploded")));
        assert!(record.output.is_none());

        assert_eq!(
            harness.status.statuses_for("a"),
            vec![NodeStatus::Loading, NodeStatus::Success]
        );
        assert_eq!(
            harness.status.statuses_for("b"),
            vec![NodeStatus::Loading, NodeStatus::Error]
        );
        assert!(harness.status.statuses_for("c").is_empty());
    }

    #[tokio::test]
    async fn cycle_fails_without_invoking_executors() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(
            chain(&["A", "B"]).with_connection(Connection::new("B", "A")),
        );

        let outcome = harness
            .driver()
            .handle(&event(workflow_id))
            .await
            .expect("run finishes");

        assert!(harness.probe.invoked_ids().is_empty());
        assert!(harness.status.messages().is_empty());
        let record = outcome.record();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.as_deref().unwrap_or_default().contains("cycle"));
    }

    #[tokio::test]
    async fn unregistered_type_fails_before_any_node_runs() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(
            Workflow::new("mixed", UserId::new())
                .with_node(Node::new("1", NodeType::ManualTrigger))
                .with_node(Node::new("2", NodeType::WalrusNodeStorage))
                .with_connection(Connection::new("1", "2")),
        );
        let driver = harness.driver_with(
            harness.registry(&[NodeType::ManualTrigger]),
            RetryPolicy::NONE,
        );

        let outcome = driver.handle(&event(workflow_id)).await.expect("run finishes");

        assert!(harness.probe.invoked_ids().is_empty());
        let record = outcome.record();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(
            record
                .error
                .as_deref()
                .unwrap_or_default()
                .contains("WALRUS_NODE_STORAGE")
        );
    }

    #[tokio::test]
    async fn missing_workflow_fails_the_run() {
        let harness = Harness::new(ProbeExecutor::default());
        let outcome = harness
            .driver()
            .handle(&event(WorkflowId::new()))
            .await
            .expect("run finishes");
        assert_eq!(outcome.record().status, ExecutionStatus::Failed);
        assert!(
            outcome
                .record()
                .error
                .as_deref()
                .unwrap_or_default()
                .contains("workflow not found")
        );
    }

    #[tokio::test]
    async fn empty_workflow_succeeds_with_initial_data() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(Workflow::new("empty", UserId::new()));
        let mut initial = Map::new();
        initial.insert("k".to_string(), json!("v"));

        let outcome = harness
            .driver()
            .handle(&event(workflow_id).with_initial_data(initial))
            .await
            .expect("run completes");

        assert!(matches!(outcome, RunOutcome::Succeeded(_)));
        assert_eq!(outcome.record().output, Some(json!({ "k": "v" })));
    }

    #[tokio::test]
    async fn redelivery_after_success_does_nothing() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(chain(&["a", "b"]));
        let driver = harness.driver();
        let trigger = event(workflow_id);

        let first = driver.handle(&trigger).await.expect("first delivery");
        let second = driver.handle(&trigger).await.expect("second delivery");

        assert!(matches!(first, RunOutcome::Succeeded(_)));
        match second {
            RunOutcome::AlreadyFinished(record) => assert_eq!(record, *first.record()),
            other => panic!("expected already finished, got {other:?}"),
        }
        assert_eq!(harness.executions.len(), 1);
        assert_eq!(harness.probe.invoked_ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn redelivery_after_failure_keeps_the_failure() {
        let harness = Harness::new(
            ProbeExecutor::default().failing_at("a", NodeError::validation("endpoint is required")),
        );
        let workflow_id = harness.add(chain(&["a"]));
        let driver = harness.driver();
        let trigger = event(workflow_id);

        let first = driver.handle(&trigger).await.expect("first delivery");
        let second = driver.handle(&trigger).await.expect("second delivery");

        assert!(matches!(first, RunOutcome::Failed(_)));
        assert!(matches!(second, RunOutcome::AlreadyFinished(_)));
        assert_eq!(second.record().status, ExecutionStatus::Failed);
        assert_eq!(harness.probe.invoked_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn interrupted_run_resumes_from_saved_steps() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(chain(&["a", "b"]));
        let trigger = event(workflow_id);

        harness
            .executions
            .begin(ExecutionRecord::start(workflow_id, trigger.id))
            .await
            .expect("begin");
        harness
            .steps
            .save(
                &StepKey {
                    trigger_event_id: trigger.id,
                    node_id: NodeId::new("a"),
                    step_name: "probe".to_string(),
                },
                &json!({ "ran": "a (before crash)" }),
            )
            .await
            .expect("save");

        let outcome = harness.driver().handle(&trigger).await.expect("resumed");

        assert!(matches!(outcome, RunOutcome::Succeeded(_)));
        assert_eq!(harness.probe.work_runs(), 1);
        assert_eq!(
            outcome.record().output,
            Some(json!({
                "out_a": { "ran": "a (before crash)" },
                "out_b": { "ran": "b" },
            }))
        );
        assert_eq!(harness.executions.len(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let harness = Harness::new(
            ProbeExecutor::default().flaky_at("a", NodeError::transient("429 Too Many Requests")),
        );
        let workflow_id = harness.add(chain(&["a"]));
        let driver = harness.driver_with(
            harness.registry(&NodeType::ALL),
            RetryPolicy::immediate(3),
        );

        let outcome = driver.handle(&event(workflow_id)).await.expect("run completes");

        assert!(matches!(outcome, RunOutcome::Succeeded(_)));
        assert_eq!(harness.probe.work_runs(), 2);
        assert_eq!(
            harness.status.statuses_for("a"),
            vec![NodeStatus::Loading, NodeStatus::Success]
        );
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let harness = Harness::new(
            ProbeExecutor::default().failing_at("a", NodeError::validation("model is required")),
        );
        let workflow_id = harness.add(chain(&["a"]));
        let driver = harness.driver_with(
            harness.registry(&NodeType::ALL),
            RetryPolicy::immediate(5),
        );

        let outcome = driver.handle(&event(workflow_id)).await.expect("run finishes");

        assert!(matches!(outcome, RunOutcome::Failed(_)));
        assert_eq!(harness.probe.work_runs(), 1);
    }

    #[tokio::test]
    async fn status_events_follow_execution_order() {
        let harness = Harness::new(ProbeExecutor::default());
        let workflow_id = harness.add(
            Workflow::new("diamond", UserId::new())
                .with_node(http("d", "d"))
                .with_node(http("b", "b"))
                .with_node(http("c", "c"))
                .with_node(Node::new("a", NodeType::ManualTrigger))
                .with_connection(Connection::new("a", "b"))
                .with_connection(Connection::new("a", "c"))
                .with_connection(Connection::new("b", "d"))
                .with_connection(Connection::new("c", "d")),
        );

        harness
            .driver()
            .handle(&event(workflow_id))
            .await
            .expect("run completes");

        let sequence: Vec<(String, NodeStatus)> = harness
            .status
            .messages()
            .into_iter()
            .map(|m| (m.event.node_id.to_string(), m.event.status))
            .collect();
        let expected: Vec<(String, NodeStatus)> = ["a", "b", "c", "d"]
            .iter()
            .flat_map(|id| {
                [
                    (id.to_string(), NodeStatus::Loading),
                    (id.to_string(), NodeStatus::Success),
                ]
            })
            .collect();
        assert_eq!(sequence, expected);
    }

    struct BrokenSource;

    #[async_trait]
    impl WorkflowSource for BrokenSource {
        async fn load(&self, _workflow_id: WorkflowId) -> Result<Option<Workflow>, SourceError> {
            Err(SourceError::LoadFailed {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn store_failures_leave_the_record_running() {
        let harness = Harness::new(ProbeExecutor::default());
        let driver = RunDriver::new(
            Arc::new(BrokenSource),
            Arc::new(harness.registry(&NodeType::ALL)),
            harness.executions.clone(),
            harness.steps.clone(),
            harness.status.clone(),
        );
        let trigger = event(WorkflowId::new());

        let result = driver.handle(&trigger).await;

        assert!(result.is_err());
        let record = harness
            .executions
            .find_by_trigger_event(trigger.id)
            .await
            .expect("lookup")
            .expect("record exists");
        assert_eq!(record.status, ExecutionStatus::Running);
    }

    #[test]
    fn outcome_classification_follows_record_status() {
        let mut record =
            ExecutionRecord::start(WorkflowId::new(), nodeflow_core::TriggerEventId::new());
        record.finish(
            &TerminalOutcome::Success {
                output: JsonValue::Null,
            },
            chrono::Utc::now(),
        );
        assert!(matches!(
            RunOutcome::from_record(record),
            RunOutcome::Succeeded(_)
        ));
    }
}
