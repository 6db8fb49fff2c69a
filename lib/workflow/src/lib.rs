//! Workflow engine for nodeflow.
//!
//! This crate provides the execution engine:
//!
//! - **Graph Model**: workflow nodes and connections in a petgraph `DiGraph`,
//!   validated and ordered with a deterministic topological sort
//! - **Context**: the JSON object threaded through a run, with template
//!   resolution against it
//! - **Executors**: the [`NodeExecutor`] contract and the registry mapping node
//!   types to implementations
//! - **Durable Steps**: memoized, retried units of work so a redelivered
//!   trigger event resumes instead of repeating side effects
//! - **Run Driver**: the execution state machine with one record per trigger
//!   event
//! - **Transports**: NATS JetStream trigger queue and status publishing

pub mod context;
pub mod definition;
pub mod driver;
pub mod edge;
pub mod error;
pub mod execution;
pub mod executor;
pub mod graph;
pub mod lint;
pub mod nats;
pub mod node;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod sort;
pub mod status;
pub mod step;
pub mod template;
pub mod trigger;

pub use context::ExecutionContext;
pub use definition::{InMemoryWorkflowSource, SourceError, Workflow, WorkflowSource};
pub use driver::{RunDriver, RunOutcome};
pub use edge::Connection;
pub use error::{GraphError, NodeError, RunError};
pub use execution::{
    BeginOutcome, ExecutionRecord, ExecutionStatus, ExecutionStore, ExecutionStoreError,
    InMemoryExecutionStore, TerminalOutcome,
};
pub use executor::{NodeExecutor, NodeInvocation};
pub use graph::WorkflowGraph;
pub use node::{Node, NodeData, NodeId, NodeType, OutputKey};
pub use queue::{ChannelTriggerQueue, QueueError, Settlement, TriggerQueue};
pub use registry::{ExecutorRegistry, RegistryError};
pub use retry::RetryPolicy;
pub use status::{
    BroadcastStatusPublisher, NodeStatus, NodeStatusEvent, RecordingStatusPublisher,
    StatusPublisher,
};
pub use step::{
    DurableStepRunner, InMemoryStepStore, StepKey, StepRunner, StepStore, StepStoreError,
    step_fn,
};
pub use template::{TemplateError, TemplateResolver};
pub use trigger::{TriggerEvent, TriggerSource};
