//! Cooperative tick scheduler.
//!
//! A single [`HeartBeat`] drives all periodic work in the process: it
//! wakes once per second, increments a monotonic tick counter, and
//! launches every registered task whose interval divides the current
//! count. Tasks run as independent tokio tasks so a slow or failing
//! task never delays the tick or its peers.

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use sirocco_core::config::HeartbeatSettings;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Errors reported by the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Task interval must be at least one tick.
    #[error("[Scheduler] Invalid task interval: {interval} (must be >= 1)")]
    InvalidInterval {
        /// The rejected interval.
        interval: u64,
    },
}

/// Handle identifying a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

type TaskFuture = BoxFuture<'static, sirocco_core::Result<()>>;
type TaskCallback = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct ScheduledTask {
    interval: u64,
    callback: TaskCallback,
}

/// Tick scheduler driving periodic work.
///
/// # Example
///
/// ```rust,ignore
/// let hb = Arc::new(HeartBeat::new());
/// hb.register(10, || async { /* liveness check */ Ok(()) })?;
/// hb.start();
/// ```
pub struct HeartBeat {
    count: AtomicU64,
    running: AtomicBool,
    tick_interval: Duration,
    print_interval: u64,
    broadcast_interval: u64,
    next_id: AtomicU64,
    // BTreeMap keyed by registration id: tasks due on the same tick
    // launch in registration order.
    tasks: RwLock<BTreeMap<u64, ScheduledTask>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for HeartBeat {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartBeat {
    /// Creates a scheduler with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_settings(&HeartbeatSettings::default())
    }

    /// Creates a scheduler from configuration.
    #[must_use]
    pub fn from_settings(settings: &HeartbeatSettings) -> Self {
        Self {
            count: AtomicU64::new(0),
            running: AtomicBool::new(false),
            tick_interval: Duration::from_secs(1),
            print_interval: settings.interval,
            broadcast_interval: settings.broadcast,
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(BTreeMap::new()),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the tick period. Intended for tests.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Registers a periodic task.
    ///
    /// The task fires whenever `interval` divides the tick count, so an
    /// interval of 10 means every 10 seconds.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidInterval` if `interval` is zero.
    pub fn register<F, Fut>(&self, interval: u64, callback: F) -> Result<TaskId, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = sirocco_core::Result<()>> + Send + 'static,
    {
        if interval == 0 {
            return Err(SchedulerError::InvalidInterval { interval });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: TaskCallback = Arc::new(move || Box::pin(callback()));
        self.tasks
            .write()
            .insert(id, ScheduledTask { interval, callback });

        debug!(task_id = id, interval, "registered scheduled task");
        Ok(TaskId(id))
    }

    /// Removes a task. Returns false if the id is unknown.
    pub fn unregister(&self, id: TaskId) -> bool {
        let removed = self.tasks.write().remove(&id.0).is_some();
        if removed {
            debug!(task_id = id.0, "unregistered scheduled task");
        }
        removed
    }

    /// Returns the number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// Removes all registered tasks.
    pub fn clear_tasks(&self) {
        self.tasks.write().clear();
    }

    /// Returns the current tick count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Returns true if the tick loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts the tick loop.
    ///
    /// Resets the tick count to zero. Calling this on a running
    /// scheduler logs a warning and does nothing.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("heartbeat already running");
            return;
        }
        self.count.store(0, Ordering::Release);

        let hb = Arc::clone(self);
        tokio::spawn(async move {
            hb.run_loop().await;
        });
        info!(tick_ms = self.tick_interval.as_millis() as u64, "heartbeat started");
    }

    /// Stops the tick loop. Registered tasks are kept and fire again
    /// after a restart.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("heartbeat stopped");
        }
    }

    async fn run_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        // the first tick of a tokio interval completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.tick();
        }
    }

    /// Advances one tick and launches the tasks that are due.
    fn tick(&self) {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;

        if self.print_interval > 0 && count % self.print_interval == 0 {
            info!(count, "heartbeat tick");
        }

        let due: Vec<(u64, TaskCallback)> = {
            let tasks = self.tasks.read();
            tasks
                .iter()
                .filter(|(_, task)| count % task.interval == 0)
                .map(|(id, task)| (*id, Arc::clone(&task.callback)))
                .collect()
        };

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|handle| !handle.is_finished());

        for (id, callback) in due {
            let handle = tokio::spawn(async move {
                if let Err(e) = callback().await {
                    error!(task_id = id, error = %e, "scheduled task failed");
                }
            });
            in_flight.push(handle);
        }
        drop(in_flight);

        if self.broadcast_interval > 0 && count % self.broadcast_interval == 0 {
            // TODO: publish the status snapshot once a notification
            // transport lands; for now it only surfaces in the log.
            debug!(count, "status broadcast");
        }
    }

    /// Waits for every task launched so far to finish.
    ///
    /// Tick processing itself never waits on tasks; this exists so
    /// tests can assert on task side effects deterministically.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduled task panicked");
            }
        }
    }
}

impl fmt::Debug for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartBeat")
            .field("count", &self.count())
            .field("running", &self.is_running())
            .field("tick_interval", &self.tick_interval)
            .field("tasks", &self.task_count())
            .finish()
    }
}
