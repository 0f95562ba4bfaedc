//! Primitives for a reactive layer on top of [`Call`]s.
//!
//! [`Call::watch`] streams a call's normalized entry whenever its slice of the tree
//! changes. A [`Poller`] is the background task a binding runs for an eager call:
//! fetch once if never executed, refetch one interval after each completed fetch,
//! stop when cancelled.

use std::time::Duration;

use futures::{future, Stream, StreamExt};
use serde_json::Value;
use tokio::{task::JoinHandle, time::Instant};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::{
    call::Call,
    state::Entry,
    util::time::unix_now,
};

impl Call {
    /// Normalized entries of this call: the current one first, then one per change
    /// of the raw entry.
    pub fn watch(&self) -> impl Stream<Item = Entry> + Send + 'static {
        let call = self.clone();
        let mut last: Option<Option<Entry>> = None;

        WatchStream::new(self.store().subscribe()).filter_map(move |_| {
            let raw = call.location().get();
            let changed = last.as_ref() != Some(&raw);
            last = Some(raw);

            future::ready(changed.then(|| call.get_state()))
        })
    }
}

/// Keeps an eager call fresh until cancelled.
///
/// Cancelling never interrupts an execute already in flight; the poller stops after
/// it completes.
pub struct Poller {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start polling `call`. Must be called inside a tokio runtime.
    ///
    /// Without an interval the call is only executed once, if it never was. With
    /// one, it is executed again `interval` after each completed execute. Lazy calls
    /// are only refreshed once something else executed them.
    pub fn spawn(call: Call, interval: Option<Duration>, request_data: Option<Value>) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(call, interval, request_data, token.clone()));

        Poller { token, handle }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait for the task to wind down.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.handle).await {
            tracing::debug!("poller task ended abnormally: {e}");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Polling intervals shorter than this are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

fn needs_first_fetch(call: &Call) -> bool {
    !call.is_lazy() && !call.location().get().map_or(false, |e| e.executed)
}

fn refreshable(call: &Call) -> bool {
    match call.location().get() {
        Some(entry) if entry.executed => !entry.loading,
        _ => !call.is_lazy(),
    }
}

/// When the entry was last written, on the tokio clock. Second precision.
fn last_written(call: &Call) -> Option<Instant> {
    let last_updated = call.location().get()?.last_updated?;
    let age = unix_now().saturating_sub(last_updated).max(0) as u64;
    Instant::now().checked_sub(Duration::from_secs(age))
}

async fn run(
    call: Call,
    interval: Option<Duration>,
    request_data: Option<Value>,
    token: CancellationToken,
) {
    let mut last_run = None;
    if !token.is_cancelled() && needs_first_fetch(&call) {
        call.execute(request_data.clone()).await;
        last_run = Some(Instant::now());
    }

    match interval {
        None => token.cancelled().await,
        Some(interval) => {
            let interval = interval.max(MIN_INTERVAL);
            let mut next = last_run
                .or_else(|| last_written(&call))
                .unwrap_or_else(Instant::now)
                + interval;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep_until(next) => {}
                }

                if refreshable(&call) {
                    call.execute(request_data.clone()).await;
                }
                next = Instant::now() + interval;
            }
        }
    }

    tracing::debug!("stopped polling {}", call.address());
}
