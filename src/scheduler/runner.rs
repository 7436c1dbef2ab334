//! Per-topic actor
//!
//! Each topic is one tokio task reading a coalescing trigger channel:
//! debounce, wait for the precondition, run, publish, trigger downstream.
//! A trigger that lands while debouncing or waiting restarts the schedule
//! with the merged flags. A running pass is never interrupted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use super::topic::{Topic, TopicState};
use crate::apy::{avg_apy_table, ApyEngine, AvgApy, CampaignClassifier};
use crate::balance::BalanceEngine;
use crate::derived::{ApyTables, BalanceTable, DerivedState};
use crate::error::EngineResult;
use crate::filter::{recompute_filtered, FilterContext, FilteredVaults, RecomputeFlags};
use crate::store::{DashboardState, VaultId};
use crate::tvl::{tvl_table, TvlBreakdown};

// ============================================
// TRIGGER HANDLE
// ============================================

/// Sending side of one topic
#[derive(Clone)]
pub(crate) struct TopicHandle {
    pub topic: Topic,
    tx: mpsc::UnboundedSender<RecomputeFlags>,
    /// Triggers sent but not yet picked up by the runner
    queued: Arc<AtomicUsize>,
    status: Arc<watch::Sender<TopicState>>,
    runs: Arc<AtomicU64>,
}

impl TopicHandle {
    pub fn trigger(&self, flags: RecomputeFlags) {
        // Counted before the status flips so `is_settled` never sees a gap
        self.queued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(flags).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        self.status.send_if_modified(|state| {
            if *state == TopicState::Idle {
                *state = TopicState::Debouncing;
                true
            } else {
                false
            }
        });
    }

    pub fn state(&self) -> TopicState {
        *self.status.borrow()
    }

    /// Completed passes, failed ones included
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<TopicState> {
        self.status.subscribe()
    }

    /// Nothing queued, and either idle or parked on an unmet precondition
    pub fn is_settled(&self) -> bool {
        self.queued.load(Ordering::SeqCst) == 0
            && matches!(self.state(), TopicState::Idle | TopicState::Waiting)
    }
}

/// All topic handles, indexed by topic
#[derive(Clone)]
pub(crate) struct Topics {
    handles: Vec<TopicHandle>,
}

impl Topics {
    pub fn get(&self, topic: Topic) -> &TopicHandle {
        &self.handles[topic.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicHandle> {
        self.handles.iter()
    }
}

/// Receiving side of one topic, handed to its runner
pub(crate) struct TopicInbox {
    rx: mpsc::UnboundedReceiver<RecomputeFlags>,
    queued: Arc<AtomicUsize>,
    status: Arc<watch::Sender<TopicState>>,
    runs: Arc<AtomicU64>,
}

impl TopicInbox {
    async fn recv(&mut self) -> Option<RecomputeFlags> {
        let flags = self.rx.recv().await?;
        self.queued.fetch_sub(1, Ordering::SeqCst);
        Some(flags)
    }

    fn set(&self, next: TopicState) {
        self.status.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    /// Idle unless another trigger arrived meanwhile
    fn finish(&self) {
        let queued = &self.queued;
        self.status.send_if_modified(|state| {
            if queued.load(Ordering::SeqCst) == 0 {
                *state = TopicState::Idle;
                true
            } else {
                false
            }
        });
    }
}

/// Build the channel pair for every topic
pub(crate) fn topic_channels() -> (Topics, Vec<TopicInbox>) {
    let mut handles = Vec::with_capacity(Topic::ALL.len());
    let mut inboxes = Vec::with_capacity(Topic::ALL.len());
    for topic in Topic::ALL {
        let (tx, rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let (status, _) = watch::channel(TopicState::Idle);
        let status = Arc::new(status);
        let runs = Arc::new(AtomicU64::new(0));
        handles.push(TopicHandle {
            topic,
            tx,
            queued: Arc::clone(&queued),
            status: Arc::clone(&status),
            runs: Arc::clone(&runs),
        });
        inboxes.push(TopicInbox {
            rx,
            queued,
            status,
            runs,
        });
    }
    (Topics { handles }, inboxes)
}

// ============================================
// WORKERS
// ============================================

/// What a topic run produced
pub(crate) enum Publish {
    Apy(ApyTables),
    AvgApy(HashMap<VaultId, AvgApy>),
    Balances(BalanceTable),
    Tvl(HashMap<VaultId, TvlBreakdown>),
    Filtered(Arc<FilteredVaults>),
}

impl Publish {
    fn apply(self, derived: &mut DerivedState) {
        match self {
            Publish::Apy(tables) => derived.apy = Some(Arc::new(tables)),
            Publish::AvgApy(table) => derived.avg_apy = Some(Arc::new(table)),
            Publish::Balances(table) => derived.balances = Some(Arc::new(table)),
            Publish::Tvl(table) => derived.tvl = Some(Arc::new(table)),
            Publish::Filtered(filtered) => derived.filtered = Some(filtered),
        }
    }

    fn summary(&self) -> String {
        match self {
            Publish::Apy(tables) => format!(
                "{} vaults, {} active boosts",
                tables.totals.len(),
                tables.boost_aprs.len()
            ),
            Publish::AvgApy(table) => format!("{} vaults", table.len()),
            Publish::Balances(table) => match table.address {
                Some(address) => format!("{} vaults for {}", table.by_vault.len(), address),
                None => "no wallet".to_string(),
            },
            Publish::Tvl(table) => format!("{} vaults", table.len()),
            Publish::Filtered(filtered) => {
                format!("{}/{} vaults", filtered.sorted_ids.len(), filtered.total_count)
            }
        }
    }
}

/// Per-topic compute state; engines keep their memo across runs
pub(crate) enum Worker {
    TotalApy(ApyEngine),
    AvgApy,
    Balance(BalanceEngine),
    Tvl,
    Filters,
}

impl Worker {
    pub fn for_topic(topic: Topic, classifier: &CampaignClassifier) -> Self {
        match topic {
            Topic::TotalApy => Worker::TotalApy(ApyEngine::new(classifier.clone())),
            Topic::AvgApy => Worker::AvgApy,
            Topic::Balance => Worker::Balance(BalanceEngine::new()),
            Topic::Tvl => Worker::Tvl,
            Topic::Filters => Worker::Filters,
        }
    }

    /// `Ok(None)` when there is nothing to publish
    fn run(
        &mut self,
        state: &DashboardState,
        derived: &DerivedState,
        flags: RecomputeFlags,
    ) -> EngineResult<Option<Publish>> {
        let publish = match self {
            Worker::TotalApy(engine) => Publish::Apy(engine.compute(state)?),
            Worker::AvgApy => match &derived.apy {
                Some(apy) => Publish::AvgApy(avg_apy_table(state, apy)),
                None => return Ok(None),
            },
            Worker::Balance(engine) => Publish::Balances(engine.compute(state)?),
            Worker::Tvl => Publish::Tvl(tvl_table(state)),
            Worker::Filters => {
                let ctx = FilterContext::new(state, derived);
                Publish::Filtered(recompute_filtered(derived.filtered.as_ref(), &ctx, flags)?)
            }
        };
        Ok(Some(publish))
    }
}

// ============================================
// RUN LOOP
// ============================================

pub(crate) struct TopicRunner {
    pub topic: Topic,
    pub debounce: Duration,
    pub inbox: TopicInbox,
    pub worker: Worker,
    pub store_rx: watch::Receiver<DashboardState>,
    pub derived_tx: Arc<watch::Sender<DerivedState>>,
    pub topics: Topics,
}

enum Gate {
    Ready,
    Retriggered(RecomputeFlags),
    Closed,
}

impl TopicRunner {
    pub async fn run(mut self) {
        let mut derived_rx = self.derived_tx.subscribe();

        while let Some(mut flags) = self.inbox.recv().await {
            loop {
                self.inbox.set(TopicState::Debouncing);
                if !self.debounce(&mut flags).await {
                    return;
                }
                match self.wait_ready(&mut derived_rx).await {
                    Gate::Ready => break,
                    Gate::Retriggered(more) => flags |= more,
                    Gate::Closed => return,
                }
            }

            self.inbox.set(TopicState::Running);
            self.run_once(flags);
            self.inbox.runs.fetch_add(1, Ordering::SeqCst);
            self.inbox.finish();
        }
    }

    /// Sleep out the window; every trigger inside it restarts the window.
    /// False once the channel is closed.
    async fn debounce(&mut self, flags: &mut RecomputeFlags) -> bool {
        let sleep = tokio::time::sleep(self.debounce);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                msg = self.inbox.recv() => match msg {
                    Some(more) => {
                        *flags |= more;
                        sleep.as_mut().reset(tokio::time::Instant::now() + self.debounce);
                    }
                    None => return false,
                },
                _ = &mut sleep => return true,
            }
        }
    }

    async fn wait_ready(&mut self, derived_rx: &mut watch::Receiver<DerivedState>) -> Gate {
        loop {
            let ready = {
                let state = self.store_rx.borrow_and_update();
                let derived = derived_rx.borrow_and_update();
                self.topic.precondition(&state, &derived)
            };
            if ready {
                return Gate::Ready;
            }

            let was_waiting = *self.inbox.status.borrow() == TopicState::Waiting;
            if !was_waiting {
                debug!("{} waiting on its precondition", self.topic);
            }
            self.inbox.set(TopicState::Waiting);

            tokio::select! {
                msg = self.inbox.recv() => return match msg {
                    Some(flags) => Gate::Retriggered(flags),
                    None => Gate::Closed,
                },
                res = self.store_rx.changed() => {
                    if res.is_err() {
                        return Gate::Closed;
                    }
                }
                res = derived_rx.changed() => {
                    if res.is_err() {
                        return Gate::Closed;
                    }
                }
            }
        }
    }

    fn run_once(&mut self, flags: RecomputeFlags) {
        let state = self.store_rx.borrow().clone();
        let derived = self.derived_tx.borrow().clone();
        let started = Instant::now();
        let name = self.topic.name();

        match self.worker.run(&state, &derived, flags) {
            Ok(Some(publish)) => {
                let summary = publish.summary();
                self.derived_tx.send_modify(|derived| {
                    publish.apply(derived);
                    derived.errors.remove(name);
                });
                info!("📊 {} published: {} in {:?}", name, summary, started.elapsed());

                for (downstream, flags) in self.topic.downstream() {
                    self.topics.get(*downstream).trigger(*flags);
                }
            }
            Ok(None) => debug!("{} had nothing to publish", name),
            Err(e) => {
                error!("❌ {} recompute failed: {}", name, e);
                self.derived_tx.send_modify(|derived| {
                    derived.errors.insert(name, e);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_during_run_keeps_topic_busy() {
        let (topics, mut inboxes) = topic_channels();
        let handle = topics.get(Topic::Tvl).clone();
        let mut inbox = inboxes.remove(Topic::Tvl.index());

        handle.trigger(RecomputeFlags::DATA);
        assert_eq!(handle.state(), TopicState::Debouncing);
        assert_eq!(inbox.recv().await, Some(RecomputeFlags::DATA));
        inbox.set(TopicState::Running);

        // Lands mid-run: the pass finishes but the topic stays busy
        handle.trigger(RecomputeFlags::FILTERS);
        inbox.finish();
        assert_eq!(handle.state(), TopicState::Running);
        assert!(!handle.is_settled());

        assert_eq!(inbox.recv().await, Some(RecomputeFlags::FILTERS));
        inbox.finish();
        assert_eq!(handle.state(), TopicState::Idle);
        assert!(handle.is_settled());
    }

    #[tokio::test]
    async fn test_waiting_topic_counts_as_settled() {
        let (topics, mut inboxes) = topic_channels();
        let handle = topics.get(Topic::Balance).clone();
        let mut inbox = inboxes.remove(Topic::Balance.index());

        handle.trigger(RecomputeFlags::DATA);
        assert!(!handle.is_settled());
        inbox.recv().await;
        inbox.set(TopicState::Waiting);
        assert!(handle.is_settled());
    }
}
