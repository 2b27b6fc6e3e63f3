use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use ps_cache::{HotSnapshotBuilder, ViewAccountant};
use ps_core::config::WritebackConfig;
use ps_core::db::Db;
use ps_core::ServiceResult;
use ps_store::batch;

/// Owns the periodic jobs. Each job runs its tick inline in its own loop,
/// so a job can never overlap itself; different jobs run freely in
/// parallel. Shutdown stops new ticks and joins in-flight runs.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// Subscribe to the scheduler's shutdown signal; consumer loops share it.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn spawn_job<F, Fut>(
        &mut self,
        name: &'static str,
        every: Duration,
        deadline: Duration,
        job: F,
    ) where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ServiceResult<()>> + Send + 'static,
    {
        let mut shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(job = name, period_secs = every.as_secs(), "job scheduled");

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        tracing::info!(job = name, "job loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        match tokio::time::timeout(deadline, job()).await {
                            Ok(Ok(())) => {
                                tracing::info!(
                                    job = name,
                                    elapsed_ms = started.elapsed().as_millis() as u64,
                                    "job run complete"
                                );
                            }
                            Ok(Err(err)) => {
                                tracing::error!(job = name, error = %err, "job run failed");
                            }
                            Err(_) => {
                                tracing::error!(
                                    job = name,
                                    deadline_secs = deadline.as_secs(),
                                    "job run exceeded deadline"
                                );
                            }
                        }
                    }
                }
            }
        });
        self.handles.push((name, handle));
    }

    /// Stop ticking and wait for in-flight runs, bounded by `grace`.
    pub async fn shutdown(self, grace: Duration) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        let join_all = async {
            for (name, handle) in self.handles {
                if let Err(err) = handle.await {
                    tracing::warn!(job = name, error = %err, "job task join failed");
                }
            }
        };
        tokio::time::timeout(grace, join_all)
            .await
            .map_err(|_| anyhow!("scheduler shutdown exceeded {}s", grace.as_secs()))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// One writeback cycle: harvest every counter from the KV store, then push
/// the counts into the posts table in bounded, concurrent batches.
pub async fn run_view_writeback(
    accountant: &ViewAccountant,
    db: &Db,
    config: &WritebackConfig,
) -> ServiceResult<()> {
    let counts = accountant.all_view_counts().await?;
    if counts.is_empty() {
        tracing::info!("writeback: no counters to sync");
        return Ok(());
    }
    batch::batch_update_view_counts(
        db.write(),
        &counts,
        config.batch_size,
        config.concurrency,
    )
    .await
}

/// Registers the two standard jobs: view-count writeback and hot-snapshot
/// refresh.
pub fn spawn_standard_jobs(
    scheduler: &mut Scheduler,
    accountant: ViewAccountant,
    builder: HotSnapshotBuilder,
    db: Db,
    writeback: WritebackConfig,
    snapshot_interval: Duration,
    snapshot_deadline: Duration,
) {
    let interval = writeback.interval;
    let deadline = writeback.deadline;
    scheduler.spawn_job("view_count_writeback", interval, deadline, move || {
        let accountant = accountant.clone();
        let db = db.clone();
        let config = writeback.clone();
        async move { run_view_writeback(&accountant, &db, &config).await }
    });

    let builder = std::sync::Arc::new(builder);
    scheduler.spawn_job(
        "hot_snapshot_refresh",
        snapshot_interval,
        snapshot_deadline,
        move || {
            let builder = builder.clone();
            async move { builder.run().await }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn jobs_fire_repeatedly_and_join_on_shutdown() {
        let mut scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        scheduler.spawn_job(
            "tick",
            Duration::from_millis(10),
            Duration::from_secs(1),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(65)).await;
        scheduler.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn a_job_never_overlaps_itself() {
        let mut scheduler = Scheduler::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicUsize::new(0));
        let gauge = in_flight.clone();
        let seen = overlapped.clone();

        scheduler.spawn_job(
            "slow",
            Duration::from_millis(5),
            Duration::from_secs(1),
            move || {
                let gauge = gauge.clone();
                let seen = seen.clone();
                async move {
                    if gauge.fetch_add(1, Ordering::SeqCst) > 0 {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    gauge.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(overlapped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deadline_overrun_does_not_kill_the_loop() {
        let mut scheduler = Scheduler::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        scheduler.spawn_job(
            "stuck",
            Duration::from_millis(10),
            Duration::from_millis(5),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(attempts.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn shutdown_with_no_jobs_is_immediate() {
        let scheduler = Scheduler::new();
        scheduler.shutdown(Duration::from_millis(50)).await.unwrap();
    }
}
