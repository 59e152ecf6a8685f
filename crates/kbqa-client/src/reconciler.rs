//! Predicate-gated periodic refresh.
//!
//! A `PollingReconciler` fetches a collection immediately, then again every
//! period for as long as the keep-polling predicate holds on the latest
//! result. It is tied to one watched resource and owns the cancellation
//! token of its background task.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ClientError;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Result of one fetch tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent<T> {
    /// Fresh items; another fetch is scheduled.
    Updated(T),
    /// This tick failed; the schedule continues.
    FetchFailed(ClientError),
    /// Fresh items on which the predicate no longer holds. Final event.
    Settled(T),
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a background polling task for one watched resource.
///
/// Dropping the handle cancels the task.
pub struct PollingReconciler<K> {
    resource: K,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl<K: fmt::Debug> PollingReconciler<K> {
    /// Start polling `resource`. Returns `(reconciler, event_receiver)`.
    ///
    /// The first fetch is issued immediately. Dropping the receiver stops
    /// the task.
    pub fn spawn<T, F, Fut, P>(
        resource: K,
        period: Duration,
        fetch: F,
        keep_polling: P,
    ) -> (Self, mpsc::Receiver<ReconcileEvent<T>>)
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
        P: Fn(&T) -> bool + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let label = format!("{resource:?}");

        debug!(resource = %label, period_ms = period.as_millis() as u64, "starting reconciler");
        let handle = tokio::spawn(poll_loop(
            label,
            period,
            fetch,
            keep_polling,
            event_tx,
            token.clone(),
        ));

        (
            Self {
                resource,
                token,
                handle,
            },
            event_rx,
        )
    }
}

impl<K> PollingReconciler<K> {
    pub fn resource(&self) -> &K {
        &self.resource
    }

    /// Stop the task. No fetch is issued afterwards.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the task has exited (settled, cancelled or receiver dropped).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<K> Drop for PollingReconciler<K> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<K: fmt::Debug> fmt::Debug for PollingReconciler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingReconciler")
            .field("resource", &self.resource)
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

async fn poll_loop<T, F, Fut, P>(
    resource: String,
    period: Duration,
    mut fetch: F,
    keep_polling: P,
    event_tx: mpsc::Sender<ReconcileEvent<T>>,
    token: CancellationToken,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
    P: Fn(&T) -> bool,
{
    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = fetch() => result,
        };

        let event = match result {
            Ok(items) if keep_polling(&items) => ReconcileEvent::Updated(items),
            Ok(items) => ReconcileEvent::Settled(items),
            Err(e) => {
                warn!(resource = %resource, error = %e, "reconciler fetch failed");
                ReconcileEvent::FetchFailed(e)
            }
        };
        let settled = matches!(event, ReconcileEvent::Settled(_));

        let delivered = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = event_tx.send(event) => sent.is_ok(),
        };
        if !delivered {
            debug!(resource = %resource, "reconciler receiver dropped");
            break;
        }
        if settled {
            debug!(resource = %resource, "reconciler settled");
            break;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }
    debug!(resource = %resource, "reconciler stopped");
}
