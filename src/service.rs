//! Common shape for the crate's two background loops (reconciler, outbox
//! worker): a name for logging and a `run` that owns itself and drains
//! gracefully when asked to stop.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Runs until `shutdown` is cancelled, then finishes any in-flight work
    /// and returns. Implementations must not block forever on cancellation.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()>;
}
