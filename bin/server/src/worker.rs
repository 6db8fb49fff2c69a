//! Background consumer of the trigger queue.

use nodeflow_workflow::RunDriver;
use nodeflow_workflow::nats::NatsTriggerQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Spawns the worker that feeds trigger events to the run driver.
///
/// The consumer is recreated after a setup failure or when its message
/// stream ends.
pub fn spawn(queue: Arc<NatsTriggerQueue>, driver: Arc<RunDriver>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match queue.consume(&driver).await {
                Ok(()) => tracing::warn!("Trigger consumer stopped; restarting"),
                Err(e) => tracing::error!(error = %e, "Trigger consumer failed; restarting"),
            }
            tokio::time::sleep(RESTART_DELAY).await;
        }
    })
}
