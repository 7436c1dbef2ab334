//! Dashboard facade
//!
//! Owns the store and derived `watch` channels, the event loop task and one
//! runner task per topic. Readers clone the current snapshot and never block
//! a recompute.

use alloy_primitives::Address;
use std::collections::{BTreeMap, HashMap};
use futures::future::select_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::runner::{topic_channels, TopicRunner, Topics, Worker};
use super::topic::{routes, Topic, TopicState};
use crate::apy::{AvgApy, BoostApr, CampaignClassifier, CampaignRule, TotalApy};
use crate::balance::{balance_for, VaultBalance};
use crate::clock::Clock;
use crate::config::{Config, TopicDebounce};
use crate::derived::{Availability, DerivedState};
use crate::error::{EngineError, EngineResult};
use crate::filter::{FilterCriteria, FilterUpdate, FilteredVaults, RecomputeFlags};
use crate::store::{DashboardState, Slice, StoreEvent};
use crate::tvl::{total_tvl, TvlBreakdown};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub debounce: TopicDebounce,
    pub time_bucket_secs: u64,
    pub boost_like_campaigns: Vec<CampaignRule>,
    pub filters: FilterCriteria,
    /// Initial `now`, unix seconds
    pub now: i64,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            debounce: TopicDebounce::default(),
            time_bucket_secs: 60,
            boost_like_campaigns: vec![],
            filters: FilterCriteria::default(),
            now: 0,
        }
    }
}

impl DashboardOptions {
    pub fn from_config(config: &Config, now: i64) -> Self {
        Self {
            debounce: config.debounce,
            time_bucket_secs: config.time_bucket_secs,
            boost_like_campaigns: config.boost_like_campaigns.clone(),
            filters: config.initial_filters(),
            now,
        }
    }
}

// ============================================
// EVENT QUEUE
// ============================================

/// Cloneable handle sources use to deliver fetch completions
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<StoreEvent>,
    /// Sent but not yet applied
    pending: Arc<watch::Sender<usize>>,
}

impl EventSender {
    /// False once the dashboard has shut down
    pub fn send(&self, event: StoreEvent) -> bool {
        self.pending.send_modify(|n| *n += 1);
        if self.tx.send(event).is_err() {
            self.pending.send_modify(|n| *n -= 1);
            return false;
        }
        true
    }

    fn pending(&self) -> usize {
        *self.pending.borrow()
    }
}

/// Apply one event and trigger every topic a changed slice routes to
fn dispatch(
    store_tx: &watch::Sender<DashboardState>,
    topics: &Topics,
    event: StoreEvent,
) -> Vec<Slice> {
    let mut changed = Vec::new();
    store_tx.send_if_modified(|state| {
        changed = state.apply(event);
        !changed.is_empty()
    });

    let mut triggers: BTreeMap<Topic, RecomputeFlags> = BTreeMap::new();
    for slice in &changed {
        for (topic, flags) in routes(*slice) {
            *triggers.entry(*topic).or_default() |= *flags;
        }
    }
    for (topic, flags) in triggers {
        topics.get(topic).trigger(flags);
    }
    changed
}

async fn run_event_loop(
    mut rx: mpsc::UnboundedReceiver<StoreEvent>,
    store_tx: Arc<watch::Sender<DashboardState>>,
    topics: Topics,
    pending: Arc<watch::Sender<usize>>,
) {
    while let Some(event) = rx.recv().await {
        let name = event.name();
        let changed = dispatch(&store_tx, &topics, event);
        if changed.is_empty() {
            debug!("{} event changed nothing", name);
        }
        pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

// ============================================
// DASHBOARD
// ============================================

struct Inner {
    store_tx: Arc<watch::Sender<DashboardState>>,
    derived_tx: Arc<watch::Sender<DerivedState>>,
    topics: Topics,
    events: EventSender,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn abort_tasks(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Derived financial state of the whole dashboard. Cheap to clone.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

impl Dashboard {
    /// Spawn the event loop and the topic runners. Must be called inside a
    /// tokio runtime.
    pub fn start(options: DashboardOptions) -> Self {
        let state = DashboardState::new(options.now, options.time_bucket_secs, options.filters);
        let (store_tx, store_rx) = watch::channel(state);
        let store_tx = Arc::new(store_tx);
        let (derived_tx, _) = watch::channel(DerivedState::default());
        let derived_tx = Arc::new(derived_tx);

        let (topics, inboxes) = topic_channels();
        let classifier = CampaignClassifier::new(options.boost_like_campaigns);
        let mut tasks = Vec::with_capacity(Topic::ALL.len() + 1);

        for (topic, inbox) in Topic::ALL.into_iter().zip(inboxes) {
            let runner = TopicRunner {
                topic,
                debounce: options.debounce.for_topic(topic),
                inbox,
                worker: Worker::for_topic(topic, &classifier),
                store_rx: store_rx.clone(),
                derived_tx: Arc::clone(&derived_tx),
                topics: topics.clone(),
            };
            tasks.push(tokio::spawn(runner.run()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        tasks.push(tokio::spawn(run_event_loop(
            event_rx,
            Arc::clone(&store_tx),
            topics.clone(),
            Arc::clone(&pending),
        )));

        info!("🚀 Dashboard started with {} topics", Topic::ALL.len());
        Self {
            inner: Arc::new(Inner {
                store_tx,
                derived_tx,
                topics,
                events: EventSender {
                    tx: event_tx,
                    pending,
                },
                tasks: Mutex::new(tasks),
            }),
        }
    }

    /// Handle for sources delivering events
    pub fn events(&self) -> EventSender {
        self.inner.events.clone()
    }

    pub fn send(&self, event: StoreEvent) -> bool {
        self.inner.events.send(event)
    }

    pub fn update_filters(&self, update: FilterUpdate) -> bool {
        self.send(StoreEvent::FiltersChanged(update))
    }

    pub fn connect(&self, address: Option<Address>) -> bool {
        self.send(StoreEvent::AddressChanged(address))
    }

    /// Push a `Tick` from `clock` every `period`
    pub fn spawn_ticker(&self, clock: Arc<dyn Clock>, period: Duration) {
        let events = self.events();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !events.send(StoreEvent::Tick(clock.now())) {
                    return;
                }
            }
        });
        if let Ok(mut tasks) = self.inner.tasks.lock() {
            tasks.push(task);
        }
    }

    // ========== Settling ==========

    /// No event pending and every topic idle (or parked on its precondition)
    pub fn is_settled(&self) -> bool {
        self.inner.events.pending() == 0 && self.inner.topics.iter().all(|t| t.is_settled())
    }

    /// Resolve once everything queued so far has been applied and published.
    /// Re-checks on every pending-count or topic state change.
    pub async fn settled(&self) {
        let mut pending_rx = self.inner.events.pending.subscribe();
        let mut topic_rxs: Vec<_> = Topic::ALL.into_iter().map(|t| self.watch_topic(t)).collect();

        loop {
            // Mark everything seen before checking, so no change slips between
            let _ = pending_rx.borrow_and_update();
            for rx in topic_rxs.iter_mut() {
                let _ = rx.borrow_and_update();
            }
            if self.is_settled() {
                return;
            }

            let topic_changed = select_all(topic_rxs.iter_mut().map(|rx| Box::pin(rx.changed())));
            let closed = tokio::select! {
                res = pending_rx.changed() => res.is_err(),
                (res, _, _) = topic_changed => res.is_err(),
            };
            if closed {
                return;
            }
        }
    }

    pub fn topic_state(&self, topic: Topic) -> TopicState {
        self.inner.topics.get(topic).state()
    }

    pub fn topic_runs(&self, topic: Topic) -> u64 {
        self.inner.topics.get(topic).runs()
    }

    pub fn watch_topic(&self, topic: Topic) -> watch::Receiver<TopicState> {
        self.inner.topics.get(topic).subscribe()
    }

    // ========== Snapshots ==========

    pub fn state(&self) -> DashboardState {
        self.inner.store_tx.borrow().clone()
    }

    pub fn derived(&self) -> DerivedState {
        self.inner.derived_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DashboardState> {
        self.inner.store_tx.subscribe()
    }

    /// Last failure per topic
    pub fn errors(&self) -> HashMap<&'static str, EngineError> {
        self.inner.derived_tx.borrow().errors.clone()
    }

    // ========== Accessors ==========

    pub fn total_apy(&self, vault_id: &str) -> Availability<TotalApy> {
        self.inner.derived_tx.borrow().total_apy(vault_id).map(Clone::clone)
    }

    pub fn boost_apr(&self, boost_id: &str) -> Option<BoostApr> {
        self.inner.derived_tx.borrow().boost_apr(boost_id).cloned()
    }

    pub fn avg_apy(&self, vault_id: &str) -> Availability<AvgApy> {
        self.inner.derived_tx.borrow().avg_apy(vault_id).map(Clone::clone)
    }

    pub fn tvl(&self, vault_id: &str) -> Availability<TvlBreakdown> {
        self.inner.derived_tx.borrow().tvl(vault_id).map(Clone::clone)
    }

    /// Dashboard-wide TVL, each CLM position counted once
    pub fn total_tvl(&self) -> Availability<f64> {
        let table = self.inner.derived_tx.borrow().tvl.clone();
        match table {
            None => Availability::Loading,
            Some(table) => Availability::Ready(total_tvl(&self.state(), &table)),
        }
    }

    /// Connected wallet's balance; Loading until the published table belongs
    /// to the wallet that is connected now
    pub fn balance(&self, vault_id: &str) -> Availability<VaultBalance> {
        let connected = self.inner.store_tx.borrow().connected();
        self.inner.derived_tx.borrow().balance(connected, vault_id).map(Clone::clone)
    }

    /// Balance for any wallet, computed directly from the current store
    pub fn balance_for(
        &self,
        vault_id: &str,
        wallet: Option<Address>,
    ) -> EngineResult<Availability<VaultBalance>> {
        balance_for(&self.state(), vault_id, wallet)
    }

    pub fn filtered(&self) -> Option<Arc<FilteredVaults>> {
        self.inner.derived_tx.borrow().filtered.clone()
    }

    /// Stop every task. Later sends return false.
    pub fn shutdown(&self) {
        self.inner.abort_tasks();
        info!("Dashboard stopped");
    }
}
