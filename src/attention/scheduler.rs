//! Periodic attention maintenance.
//!
//! One tick runs diffusion, rent, forgetting and a focus refresh, in that
//! order. Ticks are serialized: a tick that arrives while another is running
//! waits for it to finish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::diffusion::{DiffusionReport, ImportanceDiffusion};
use super::forgetting::{ForgetReport, ForgettingAgent};
use super::rent::{RentCollector, RentReport};
use crate::error::{Error, Result};
use crate::store::AtomSpace;

/// Result of one maintenance tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// 1-based tick number.
    pub tick: u64,
    pub diffusion: DiffusionReport,
    pub rent: RentReport,
    pub forgotten: ForgetReport,
    pub focus_size: usize,
    pub sti_funds: i64,
}

#[derive(Debug)]
pub struct MaintenanceScheduler {
    space: Arc<AtomSpace>,
    diffusion: ImportanceDiffusion,
    rent: RentCollector,
    forgetting: ForgettingAgent,
    tick_lock: Mutex<()>,
    ticks: AtomicU64,
}

impl MaintenanceScheduler {
    pub fn new(space: Arc<AtomSpace>) -> Self {
        let diffusion = ImportanceDiffusion::new(space.attention().config());
        Self {
            space,
            diffusion,
            rent: RentCollector::new(),
            forgetting: ForgettingAgent::new(),
            tick_lock: Mutex::new(()),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn space(&self) -> &Arc<AtomSpace> {
        &self.space
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Run one maintenance pass.
    #[instrument(skip(self), fields(space = %self.space.id()))]
    pub fn tick(&self) -> Result<TickReport> {
        let _serial = self
            .tick_lock
            .lock()
            .map_err(|_| Error::poisoned("maintenance tick"))?;

        let diffusion = self.diffusion.run(&self.space)?;
        let rent = self.rent.run(self.space.attention())?;
        let forgotten = self.forgetting.run(&self.space)?;

        let bank = self.space.attention();
        bank.refresh_focus()?;
        let summary = bank.summary()?;

        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            tick,
            spread = diffusion.amount,
            rent = rent.sti_collected,
            forgotten = forgotten.removed.len(),
            funds = summary.sti_funds,
            "maintenance tick"
        );
        Ok(TickReport {
            tick,
            diffusion,
            rent,
            forgotten,
            focus_size: summary.focus_size,
            sti_funds: summary.sti_funds,
        })
    }

    /// Run ticks every `period` on the tokio runtime until shut down.
    ///
    /// Missed ticks are skipped rather than bunched up.
    #[cfg(feature = "tokio-runtime")]
    pub fn spawn(self: Arc<Self>, period: std::time::Duration) -> MaintenanceHandle {
        let (shutdown, mut rx) = tokio::sync::watch::channel(false);
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // Ticks take the table write lock; keep them off the async workers.
                        let scheduler = Arc::clone(&self);
                        match tokio::task::spawn_blocking(move || scheduler.tick()).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => tracing::error!(error = %e, "maintenance tick failed"),
                            Err(e) => tracing::error!(error = %e, "maintenance tick panicked"),
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            tracing::info!(space = %self.space.id(), "maintenance loop stopping");
                            break;
                        }
                    }
                }
            }
        });
        MaintenanceHandle { shutdown, join }
    }
}

/// Handle to a running maintenance loop.
#[cfg(feature = "tokio-runtime")]
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown: tokio::sync::watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "tokio-runtime")]
impl MaintenanceHandle {
    /// Signal the loop to stop and wait for the in-flight tick.
    pub async fn shutdown(self) -> Result<()> {
        // The loop also stops when the sender is dropped.
        let _ = self.shutdown.send(true);
        self.join
            .await
            .map_err(|e| Error::Internal(format!("maintenance task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomType;
    use crate::attention::AttentionConfig;

    fn space() -> Arc<AtomSpace> {
        Arc::new(
            AtomSpace::with_config(AttentionConfig {
                seed: Some(1),
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_tick_runs_every_stage() {
        let space = space();
        let a = space.add_node(AtomType::ConceptNode, "a", None).unwrap();
        let b = space.add_node(AtomType::ConceptNode, "b", None).unwrap();
        let ab = space.add_link(AtomType::ListLink, &[a, b], None).unwrap();
        space.stimulate(ab, 1_000).unwrap();

        let scheduler = MaintenanceScheduler::new(space.clone());
        let report = scheduler.tick().unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.diffusion.amount, 400);
        assert!(report.rent.sti_collected > 0);
        assert_eq!(report.focus_size, 3);
        assert_eq!(report.sti_funds, space.attention().sti_funds().unwrap());
        assert_eq!(scheduler.tick().unwrap().tick, 2);
    }

    #[test]
    fn test_economy_settles_back_to_target() {
        let space = space();
        for i in 0..10 {
            let h = space
                .add_node(AtomType::ConceptNode, format!("n{}", i), None)
                .unwrap();
            space.stimulate(h, 500).unwrap();
        }
        let scheduler = MaintenanceScheduler::new(space.clone());
        let mut last = space.attention().sti_funds().unwrap();
        for _ in 0..200 {
            let funds = scheduler.tick().unwrap().sti_funds;
            assert!(funds >= last);
            assert!(funds <= 10_000);
            last = funds;
        }
        assert_eq!(last, 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_ticks_and_stops() {
        let space = space();
        space.add_node(AtomType::ConceptNode, "a", None).unwrap();
        let scheduler = Arc::new(MaintenanceScheduler::new(space));

        let handle = scheduler
            .clone()
            .spawn(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(55)).await;
        handle.shutdown().await.unwrap();

        let ticks = scheduler.ticks();
        assert!(ticks >= 3, "ticks = {}", ticks);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(scheduler.ticks(), ticks);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawned_loop_leaves_workers_free() {
        let space = space();
        for i in 0..50 {
            space
                .add_node(AtomType::ConceptNode, &format!("n{}", i), None)
                .unwrap();
        }
        let scheduler = Arc::new(MaintenanceScheduler::new(Arc::clone(&space)));
        let handle = scheduler
            .clone()
            .spawn(std::time::Duration::from_millis(5));

        // Async readers keep making progress while ticks run.
        let mut reads = 0;
        for _ in 0..20 {
            let _ = space.size();
            reads += 1;
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        handle.shutdown().await.unwrap();

        assert_eq!(reads, 20);
        assert!(scheduler.ticks() >= 2, "ticks = {}", scheduler.ticks());
    }
}
