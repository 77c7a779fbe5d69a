//! Reconciliation controller
//!
//! Consumes every terminal write outcome. Each transition of a tracked call
//! into `success` schedules one refresh of the read channel (and of any
//! follower channels) after the settling delay, followed by a short "value
//! changed" pulse. A `failed` call schedules nothing.
//!
//! All timers live in a [`JoinSet`] owned by the observer task, and the
//! observer is aborted when the controller is dropped, so tearing the
//! controller down cancels every pending refresh.

use alloy_primitives::U256;
use counter_bindings::{CounterCall, NUMBER_FN};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    config::Timing,
    journal::{LifecycleEvent, WriteJournal},
    read::ReadChannel,
    write::{WriteChannel, WriteState, WriteStatus},
};

/// Display hints owned by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Value shown when the latest write was submitted
    pub last_observed_prior_value: Option<U256>,
    /// The "value changed" pulse is on
    pub is_pulsing: bool,
}

#[derive(Debug)]
struct Shared {
    read: Arc<ReadChannel>,
    followers: Vec<Arc<ReadChannel>>,
    state: watch::Sender<ReconciliationState>,
    journal: WriteJournal,
    settle_delay: Duration,
    pulse: Duration,
    pulse_epoch: AtomicU64,
    scheduled: AtomicU64,
}

/// Couples a write channel to a read channel
#[derive(Debug)]
pub struct ReconciliationController {
    shared: Arc<Shared>,
    write: WriteChannel,
    observer: JoinHandle<()>,
}

impl ReconciliationController {
    /// Start observing `write`. Must be called within a tokio runtime.
    pub fn spawn(
        read: Arc<ReadChannel>,
        write: WriteChannel,
        timing: &Timing,
        journal: WriteJournal,
    ) -> Self {
        Self::spawn_with_followers(read, Vec::new(), write, timing, journal)
    }

    /// Like [`Self::spawn`], also refreshing `followers` after each confirmed
    /// write. Followers do not drive the pulse.
    pub fn spawn_with_followers(
        read: Arc<ReadChannel>,
        followers: Vec<Arc<ReadChannel>>,
        write: WriteChannel,
        timing: &Timing,
        journal: WriteJournal,
    ) -> Self {
        let shared = Arc::new(Shared {
            read,
            followers,
            state: watch::Sender::new(ReconciliationState::default()),
            journal,
            settle_delay: timing.settle_delay,
            pulse: timing.pulse,
            pulse_epoch: AtomicU64::new(0),
            scheduled: AtomicU64::new(0),
        });

        let observer = tokio::spawn(observe(write.outcomes(), shared.clone()));
        Self { shared, write, observer }
    }

    /// Capture the currently displayed value, then submit `call`
    pub fn submit(&self, call: CounterCall) -> JoinHandle<WriteState> {
        let prior = self.shared.read.state().value;
        self.shared.state.send_modify(|s| s.last_observed_prior_value = prior);
        self.write.submit(call)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ReconciliationState {
        self.shared.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<ReconciliationState> {
        self.shared.state.subscribe()
    }

    /// Number of refreshes scheduled so far
    pub fn refreshes_scheduled(&self) -> u64 {
        self.shared.scheduled.load(Ordering::SeqCst)
    }

    /// Stop observing and cancel pending refreshes
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for ReconciliationController {
    fn drop(&mut self) {
        self.observer.abort();
    }
}

async fn observe(mut outcomes: mpsc::UnboundedReceiver<WriteState>, shared: Arc<Shared>) {
    let mut timers = JoinSet::new();

    loop {
        tokio::select! {
            outcome = outcomes.recv() => {
                let Some(outcome) = outcome else {
                    break;
                };

                match outcome.status {
                    WriteStatus::Success => {
                        shared.scheduled.fetch_add(1, Ordering::SeqCst);
                        debug!(
                            target: "counter::reconcile",
                            submission = outcome.submission,
                            delay = ?shared.settle_delay,
                            "Scheduling refresh"
                        );
                        timers.spawn(settle_then_refresh(shared.clone()));
                    }
                    WriteStatus::Failed => {
                        debug!(
                            target: "counter::reconcile",
                            submission = outcome.submission,
                            "Write failed, no refresh"
                        );
                    }
                    WriteStatus::Idle | WriteStatus::Pending => {}
                }
            }
            Some(joined) = timers.join_next(), if !timers.is_empty() => {
                if let Err(e) = joined {
                    warn!(target: "counter::reconcile", error = %e, "Refresh task ended abnormally");
                }
            }
        }
    }

    while timers.join_next().await.is_some() {}
}

async fn settle_then_refresh(shared: Arc<Shared>) {
    sleep(shared.settle_delay).await;

    // Followers refresh alongside the value; dropping the set cancels them.
    let mut followers = JoinSet::new();
    for follower in &shared.followers {
        let follower = follower.clone();
        followers.spawn(async move { follower.refresh().await });
    }

    let refreshed = shared.read.refresh().await;
    let shown = refreshed.value.map(|v| v.to_string()).unwrap_or_default();
    info!(target: "counter::reconcile", value = %shown, "Value refreshed after write");
    shared.journal.record(LifecycleEvent::Refreshed, NUMBER_FN, None, &shown);

    let epoch = shared.pulse_epoch.fetch_add(1, Ordering::SeqCst) + 1;
    shared.state.send_modify(|s| s.is_pulsing = true);
    sleep(shared.pulse).await;
    if shared.pulse_epoch.load(Ordering::SeqCst) == epoch {
        shared.state.send_modify(|s| s.is_pulsing = false);
    }

    while followers.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mock::MockProvider, read::ReadQuery};
    use counter_bindings::{COUNTER_ADDRESS, counter_binding};

    struct Fixture {
        provider: Arc<MockProvider>,
        read: Arc<ReadChannel>,
        controller: ReconciliationController,
    }

    fn timing() -> Timing {
        Timing {
            settle_delay: Duration::from_secs(2),
            pulse: Duration::from_secs(1),
            ..Timing::default()
        }
    }

    async fn fixture(value: u64) -> Fixture {
        let provider = Arc::new(MockProvider::new(value));
        let binding = counter_binding(COUNTER_ADDRESS);
        let query = ReadQuery::contract(&binding, NUMBER_FN, &[]).unwrap();
        let read = Arc::new(ReadChannel::new(provider.clone(), query));
        read.refresh().await;

        let write =
            WriteChannel::new(provider.clone(), binding, timing(), WriteJournal::disabled());
        let controller =
            ReconciliationController::spawn(read.clone(), write, &timing(), WriteJournal::disabled());
        Fixture { provider, read, controller }
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_refreshes_after_settling_delay() {
        let f = fixture(5).await;
        assert_eq!(f.read.state().value, Some(U256::from(5u64)));

        let done = f.controller.submit(CounterCall::Increment).await.unwrap();
        assert_eq!(done.status, WriteStatus::Success);
        assert_eq!(f.controller.state().last_observed_prior_value, Some(U256::from(5u64)));

        // Chain already says 6 but nothing re-read it yet.
        sleep(Duration::from_secs(1)).await;
        assert_eq!(f.read.state().value, Some(U256::from(5u64)));
        assert_eq!(f.provider.read_count(), 1);
        assert!(!f.controller.state().is_pulsing);

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(f.read.state().value, Some(U256::from(6u64)));
        assert!(f.controller.state().is_pulsing);

        sleep(Duration::from_secs(1)).await;
        assert!(!f.controller.state().is_pulsing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_refresh_per_success() {
        let f = fixture(1).await;

        f.controller.submit(CounterCall::SetNumber(U256::from(10u64))).await.unwrap();
        sleep(Duration::from_secs(30)).await;

        assert_eq!(f.controller.refreshes_scheduled(), 1);
        assert_eq!(f.provider.read_count(), 2);
        assert_eq!(f.read.state().value, Some(U256::from(10u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_refresh() {
        let f = fixture(5).await;

        f.controller.submit(CounterCall::Increment).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(f.controller.refreshes_scheduled(), 1);

        f.controller.shutdown();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(f.provider.read_count(), 1);
        assert_eq!(f.read.state().value, Some(U256::from(5u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_schedules_nothing() {
        let f = fixture(5).await;
        f.provider.reject_next_send("user rejected");

        let done = f.controller.submit(CounterCall::Increment).await.unwrap();
        assert_eq!(done.status, WriteStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("user rejected"));

        sleep(Duration::from_secs(10)).await;
        assert_eq!(f.controller.refreshes_scheduled(), 0);
        assert_eq!(f.provider.read_count(), 1);
        assert_eq!(f.read.state().value, Some(U256::from(5u64)));
        assert!(!f.controller.state().is_pulsing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prior_value_captured_at_submit() {
        let f = fixture(3).await;
        f.provider.set_receipt_polls(3);

        let handle = f.controller.submit(CounterCall::Decrement);
        assert_eq!(f.controller.state().last_observed_prior_value, Some(U256::from(3u64)));

        handle.await.unwrap();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(f.read.state().value, Some(U256::from(2u64)));
        // Still the value from before the write landed.
        assert_eq!(f.controller.state().last_observed_prior_value, Some(U256::from(3u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_followed_by_rejection_still_refreshes() {
        let f = fixture(5).await;

        let first = f.controller.submit(CounterCall::Increment).await.unwrap();
        assert_eq!(first.status, WriteStatus::Success);
        f.provider.reject_next_send("user rejected");
        let second = f.controller.submit(CounterCall::Increment).await.unwrap();
        assert_eq!(second.status, WriteStatus::Failed);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(f.controller.refreshes_scheduled(), 1);
        assert_eq!(f.provider.read_count(), 2);
        assert_eq!(f.read.state().value, Some(U256::from(6u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_followers_refresh_after_success() {
        let provider = Arc::new(MockProvider::new(1));
        let binding = counter_binding(COUNTER_ADDRESS);
        let read = Arc::new(ReadChannel::new(
            provider.clone(),
            ReadQuery::contract(&binding, NUMBER_FN, &[]).unwrap(),
        ));
        let balance = Arc::new(ReadChannel::new(
            provider.clone(),
            ReadQuery::NativeBalance { owner: alloy_primitives::Address::repeat_byte(1) },
        ));
        balance.refresh().await;
        assert_eq!(balance.state().value, Some(U256::ZERO));

        let write =
            WriteChannel::new(provider.clone(), binding, timing(), WriteJournal::disabled());
        let controller = ReconciliationController::spawn_with_followers(
            read.clone(),
            vec![balance.clone()],
            write,
            &timing(),
            WriteJournal::disabled(),
        );

        provider.set_native_balance(U256::from(7u64));
        controller.submit(CounterCall::Increment).await.unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(balance.state().value, Some(U256::ZERO));

        sleep(Duration::from_secs(4)).await;
        assert_eq!(balance.state().value, Some(U256::from(7u64)));
        assert_eq!(read.state().value, Some(U256::from(2u64)));
    }
}
