//! Background sweeper for stale sessions
//!
//! Owned by the process startup sequence. At most one sweep task runs per
//! process: `start()` on any instance is refused while another instance's
//! task is live, and `stop()` waits for the task to exit before releasing
//! the slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::services::SessionRegistry;

/// Set while any sweeper instance in this process owns a running task
static SWEEP_TASK_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Sweeper state shared between clones
#[derive(Clone)]
pub struct SessionSweeper {
    /// Whether the sweep task is running
    running: Arc<RwLock<bool>>,
    /// Task handle and its shutdown signal, one pair per run
    task: Arc<Mutex<Option<(JoinHandle<()>, Arc<Notify>)>>>,
    registry: Arc<SessionRegistry>,
    interval: Duration,
    stale_threshold: Duration,
}

impl SessionSweeper {
    pub fn new(registry: Arc<SessionRegistry>, config: &SessionConfig) -> Self {
        Self::with_timing(
            registry,
            Duration::from_secs(config.sweep_interval_secs),
            Duration::from_secs(config.stale_threshold_secs),
        )
    }

    pub fn with_timing(
        registry: Arc<SessionRegistry>,
        interval: Duration,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            running: Arc::new(RwLock::new(false)),
            task: Arc::new(Mutex::new(None)),
            registry,
            interval,
            stale_threshold,
        }
    }

    /// Check if the sweeper is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Spawn the sweep task. Returns `false` if this or any other sweeper in
    /// the process is already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        {
            let mut running = self.running.write().await;
            if *running {
                debug!("Session sweeper already running");
                return false;
            }
            if SWEEP_TASK_ACTIVE
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                warn!("Another session sweeper is already running in this process");
                return false;
            }
            *running = true;
        }

        let shutdown = Arc::new(Notify::new());
        let state = self.clone();
        let signal = shutdown.clone();
        let handle = tokio::spawn(async move {
            sweep_task(state, signal).await;
        });
        *task = Some((handle, shutdown));

        info!(
            "Session sweeper started (interval: {}s, stale threshold: {}s)",
            self.interval.as_secs(),
            self.stale_threshold.as_secs()
        );
        true
    }

    /// Stop the sweep task and wait for it to exit
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        if let Some((handle, shutdown)) = task.take() {
            shutdown.notify_one();
            if let Err(e) = handle.await {
                error!("Session sweeper task ended abnormally: {}", e);
            }
        }
        SWEEP_TASK_ACTIVE.store(false, Ordering::SeqCst);
        info!("Session sweeper stopped");
    }

    /// Run one sweep immediately
    pub async fn sweep_once(&self) -> u64 {
        match self.registry.sweep_stale(self.stale_threshold).await {
            Ok(removed) => removed,
            Err(e) => {
                error!("Stale session sweep failed: {}", e);
                0
            }
        }
    }
}

async fn sweep_task(state: SessionSweeper, shutdown: Arc<Notify>) {
    let mut interval_timer = interval(state.interval);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    interval_timer.tick().await;

    loop {
        tokio::select! {
            _ = interval_timer.tick() => {}
            _ = shutdown.notified() => {
                debug!("Session sweep task stopping");
                break;
            }
        }

        if !*state.running.read().await {
            break;
        }

        state.sweep_once().await;
    }
}
