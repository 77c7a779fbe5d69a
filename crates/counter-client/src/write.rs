//! Write channel
//!
//! Submits state-changing Counter calls and turns the wallet's
//! submit-then-confirm flow into a [`WriteStatus`] sequence on a watch
//! channel. Only the most recently submitted call is tracked; results of a
//! superseded call are still returned to its submitter but never published.

use alloy_primitives::B256;
use counter_bindings::{ContractBinding, CounterCall};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::{info, warn};

use crate::{
    config::Timing,
    error::ProviderError,
    journal::{LifecycleEvent, WriteJournal},
    provider::{ChainProvider, ReceiptStatus},
};

/// Message shown for a mined transaction with status 0
pub const REVERTED_MESSAGE: &str = "transaction reverted";

/// Deadline used when the receipt timeout does not fit in an [`Instant`]
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Status of the tracked write call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WriteStatus {
    /// Nothing submitted yet
    #[default]
    Idle,
    /// Waiting for signature, broadcast or confirmation
    Pending,
    /// Mined with success status
    Success,
    /// Rejected, reverted or not confirmed in time
    Failed,
}

impl WriteStatus {
    /// Returns the string representation of the status
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition can happen for this call
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// State of the tracked write call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteState {
    /// Id of the tracked submission, `0` before the first one
    pub submission: u64,
    /// The tracked call
    pub call: Option<CounterCall>,
    /// Current status
    pub status: WriteStatus,
    /// Provider message of a failed call, verbatim
    pub error: Option<String>,
    /// Transaction id once broadcast
    pub tx_id: Option<B256>,
}

impl WriteState {
    /// Whether the tracked call is in flight
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, WriteStatus::Pending)
    }
}

#[derive(Debug)]
struct WriteInner {
    provider: Arc<dyn ChainProvider>,
    binding: ContractBinding,
    timing: Timing,
    journal: WriteJournal,
    state: watch::Sender<WriteState>,
    outcomes: Mutex<Vec<mpsc::UnboundedSender<WriteState>>>,
    next_submission: AtomicU64,
}

/// Submits Counter calls and owns the [`WriteState`]
#[derive(Debug, Clone)]
pub struct WriteChannel {
    inner: Arc<WriteInner>,
}

impl WriteChannel {
    /// Create a channel writing to `binding.address`
    pub fn new(
        provider: Arc<dyn ChainProvider>,
        binding: ContractBinding,
        timing: Timing,
        journal: WriteJournal,
    ) -> Self {
        Self {
            inner: Arc::new(WriteInner {
                provider,
                binding,
                timing,
                journal,
                state: watch::Sender::new(WriteState::default()),
                outcomes: Mutex::new(Vec::new()),
                next_submission: AtomicU64::new(0),
            }),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> WriteState {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<WriteState> {
        self.inner.state.subscribe()
    }

    /// Every terminal state published for a tracked call, in order and
    /// without coalescing
    pub fn outcomes(&self) -> mpsc::UnboundedReceiver<WriteState> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut outcomes) = self.inner.outcomes.lock() {
            outcomes.push(tx);
        }
        rx
    }

    /// Submit `call`. Tracking switches to the new call immediately; a call
    /// already in flight keeps running and cannot be cancelled. The handle
    /// resolves to the final state of this call.
    pub fn submit(&self, call: CounterCall) -> JoinHandle<WriteState> {
        let submission = self.inner.next_submission.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = WriteState {
            submission,
            call: Some(call),
            status: WriteStatus::Pending,
            error: None,
            tx_id: None,
        };
        self.inner.state.send_replace(pending.clone());

        info!(target: "counter::write", submission, function = call.function_name(), "Submitting write");
        self.inner.journal.record(LifecycleEvent::Submitted, call.function_name(), None, "");

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.drive(pending).await })
    }
}

impl WriteInner {
    async fn drive(&self, mut current: WriteState) -> WriteState {
        let Some(call) = current.call else {
            return current;
        };
        let function = call.function_name();

        let result = match call.encode(&self.binding) {
            Ok(data) => self.provider.send_transaction(self.binding.address, data).await,
            Err(e) => Err(ProviderError::from(e)),
        };
        let tx = match result {
            Ok(tx) => tx,
            Err(e) => return self.fail(current, e.to_string()),
        };

        current.tx_id = Some(tx);
        self.publish(&current);
        info!(target: "counter::write", submission = current.submission, function, tx = %tx, "Transaction broadcast");
        self.journal.record(LifecycleEvent::Broadcast, function, Some(tx), "");

        let now = Instant::now();
        let deadline = now
            .checked_add(self.timing.receipt_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        loop {
            match self.provider.receipt_status(tx).await {
                Ok(Some(ReceiptStatus::Success)) => {
                    current.status = WriteStatus::Success;
                    self.publish(&current);
                    info!(target: "counter::write", submission = current.submission, function, tx = %tx, "Transaction confirmed");
                    self.journal.record(LifecycleEvent::Confirmed, function, Some(tx), "");
                    return current;
                }
                Ok(Some(ReceiptStatus::Reverted)) => {
                    return self.fail(current, REVERTED_MESSAGE.to_string());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "counter::write", tx = %tx, error = %e, "Receipt query failed");
                }
            }

            if Instant::now() >= deadline {
                return self.fail(current, ProviderError::ConfirmationTimeout(tx).to_string());
            }
            sleep(self.timing.receipt_poll).await;
        }
    }

    fn fail(&self, mut current: WriteState, message: String) -> WriteState {
        let function = current.call.map(|c| c.function_name()).unwrap_or_default();
        warn!(
            target: "counter::write",
            submission = current.submission,
            function,
            error = %message,
            "Write failed"
        );
        self.journal.record(LifecycleEvent::Failed, function, current.tx_id, &message);

        current.status = WriteStatus::Failed;
        current.error = Some(message);
        self.publish(&current);
        current
    }

    /// Publish `next` if it belongs to the tracked submission and the tracked
    /// state has not reached a terminal status yet. Terminal states are also
    /// handed to every [`WriteChannel::outcomes`] receiver.
    fn publish(&self, next: &WriteState) -> bool {
        let published = self.state.send_if_modified(|state| {
            if state.submission != next.submission || state.status.is_terminal() {
                return false;
            }
            *state = next.clone();
            true
        });

        if published
            && next.status.is_terminal()
            && let Ok(mut outcomes) = self.outcomes.lock()
        {
            outcomes.retain(|tx| tx.send(next.clone()).is_ok());
        }
        published
    }
}
