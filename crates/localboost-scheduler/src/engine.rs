//! Job scheduler — one driver task that owns every armed schedule.
//! A min-heap orders deadlines so the loop sleeps until the earliest one
//! instead of polling; commands arrive over an mpsc mailbox. Firings run in
//! spawned tasks and report back, so a slow publish never blocks the loop.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use localboost_core::error::{LocalBoostError, Result};
use localboost_core::types::ScheduleTemplate;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::recurrence::next_fire_time;

/// Observable state of one schedule inside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Not armed and not running.
    Idle,
    /// Waiting for its next occurrence.
    Armed { at: DateTime<Utc> },
    /// A publish run is in flight right now.
    Firing,
}

/// One schedule as seen from outside the driver, for status listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub name: String,
    pub state: JobState,
}

/// Handle to the driver task. Cheap to clone; every method is a message
/// into the mailbox.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Arm (or re-arm) a schedule. Replaces any standing deadline; an
    /// in-flight run finishes but will not re-arm itself.
    pub async fn arm(&self, template: ScheduleTemplate) -> Result<()> {
        self.send(Command::Arm { template }).await
    }

    /// Drop a schedule's deadline. A run already in flight completes;
    /// nothing fires afterwards.
    pub async fn cancel(&self, id: Uuid) -> Result<()> {
        self.send(Command::Cancel { id }).await
    }

    /// Run a schedule immediately, without touching its standing deadline.
    pub async fn fire_now(&self, template: ScheduleTemplate) -> Result<()> {
        self.send(Command::FireNow { template }).await
    }

    /// Current state of one schedule. Unknown ids are `Idle`.
    pub async fn query(&self, id: Uuid) -> Result<JobState> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Query { id, reply }).await?;
        rx.await
            .map_err(|_| LocalBoostError::Internal("scheduler dropped the reply".into()))
    }

    /// All known schedules and their states, sorted by name.
    pub async fn list(&self) -> Result<Vec<JobView>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::List { reply }).await?;
        rx.await
            .map_err(|_| LocalBoostError::Internal("scheduler dropped the reply".into()))
    }

    /// Stop the driver loop. In-flight runs complete on the runtime.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| LocalBoostError::Internal("job scheduler is not running".into()))
    }
}

enum Command {
    Arm { template: ScheduleTemplate },
    Cancel { id: Uuid },
    FireNow { template: ScheduleTemplate },
    Query { id: Uuid, reply: oneshot::Sender<JobState> },
    List { reply: oneshot::Sender<Vec<JobView>> },
    Shutdown,
}

/// Completion report from a spawned firing task.
struct FiringDone {
    template_id: Uuid,
    scheduled_for: DateTime<Utc>,
    epoch: u64,
}

/// A firing the state table has committed to; the driver spawns it.
struct LaunchedFiring {
    template: ScheduleTemplate,
    scheduled_for: DateTime<Utc>,
    epoch: u64,
}

/// Min-heap entry. Entries are never removed on cancel — the epoch check at
/// pop time discards stale ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    fire_at: DateTime<Utc>,
    template_id: Uuid,
    epoch: u64,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest on top.
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.template_id.cmp(&self.template_id))
            .then_with(|| other.epoch.cmp(&self.epoch))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Job {
    template: ScheduleTemplate,
    /// Bumped on every arm/cancel. A completion whose epoch no longer
    /// matches belongs to a replaced program and must not re-arm.
    epoch: u64,
    armed_at: Option<DateTime<Utc>>,
    firing: Option<FiringState>,
}

impl Job {
    fn idle(template: ScheduleTemplate) -> Self {
        Self {
            template,
            epoch: 0,
            armed_at: None,
            firing: None,
        }
    }
}

struct FiringState {
    scheduled_for: DateTime<Utc>,
    epoch: u64,
    /// A deadline that arrived while this run was in flight. Runs
    /// immediately after completion — deferred, never dropped, never
    /// stacked (a second overlap just overwrites the slot).
    deferred: Option<DateTime<Utc>>,
}

/// The driver's state table. Pure transitions over explicit instants, so
/// every path is testable without a runtime.
struct DriverState {
    jobs: HashMap<Uuid, Job>,
    heap: BinaryHeap<HeapEntry>,
    tz: Tz,
}

impl DriverState {
    fn new(tz: Tz) -> Self {
        Self {
            jobs: HashMap::new(),
            heap: BinaryHeap::new(),
            tz,
        }
    }

    fn arm(&mut self, template: ScheduleTemplate, now: DateTime<Utc>) {
        let id = template.id;
        let Some(next) = next_fire_time(&template, now, self.tz) else {
            tracing::error!(
                "❌ Schedule '{}' has unusable time_of_day '{}' — not arming",
                template.name,
                template.time_of_day
            );
            self.cancel(id);
            return;
        };
        let job = self.jobs.entry(id).or_insert_with(|| Job::idle(template.clone()));
        job.template = template;
        job.epoch += 1;
        job.armed_at = Some(next);
        if let Some(f) = job.firing.as_mut() {
            f.deferred = None;
        }
        self.heap.push(HeapEntry {
            fire_at: next,
            template_id: id,
            epoch: job.epoch,
        });
        tracing::info!("📅 Armed '{}' for {}", job.template.name, next);
    }

    fn cancel(&mut self, id: Uuid) {
        let Some(job) = self.jobs.get_mut(&id) else {
            return;
        };
        job.epoch += 1;
        job.armed_at = None;
        if let Some(f) = job.firing.as_mut() {
            // Let the in-flight run finish; the bumped epoch blocks its re-arm.
            f.deferred = None;
            tracing::info!("📅 Disarmed '{}' mid-run; current publish completes", job.template.name);
        } else {
            tracing::info!("📅 Disarmed '{}'", job.template.name);
            self.jobs.remove(&id);
        }
    }

    /// Earliest live deadline, discarding stale heap entries on the way.
    fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        while let Some(top) = self.heap.peek() {
            let live = self
                .jobs
                .get(&top.template_id)
                .is_some_and(|j| j.epoch == top.epoch && j.armed_at == Some(top.fire_at));
            if live {
                return Some(top.fire_at);
            }
            self.heap.pop();
        }
        None
    }

    /// Take one due schedule and mark it firing. A due deadline on a
    /// template that is already running goes into its deferred slot
    /// instead of starting a second concurrent run.
    fn pop_due(&mut self, now: DateTime<Utc>) -> Option<LaunchedFiring> {
        loop {
            let top = self.heap.peek()?;
            if top.fire_at > now {
                return None;
            }
            let entry = self.heap.pop()?;
            let Some(job) = self.jobs.get_mut(&entry.template_id) else {
                continue;
            };
            if job.epoch != entry.epoch || job.armed_at != Some(entry.fire_at) {
                continue;
            }
            job.armed_at = None;
            if let Some(f) = job.firing.as_mut() {
                f.deferred = Some(entry.fire_at);
                tracing::warn!(
                    "⚠️ '{}' is still publishing; occurrence {} deferred",
                    job.template.name,
                    entry.fire_at
                );
                continue;
            }
            job.firing = Some(FiringState {
                scheduled_for: entry.fire_at,
                epoch: job.epoch,
                deferred: None,
            });
            return Some(LaunchedFiring {
                template: job.template.clone(),
                scheduled_for: entry.fire_at,
                epoch: job.epoch,
            });
        }
    }

    /// Start an immediate run. The standing deadline is left alone — if it
    /// arrives mid-run it defers like any other overlap.
    fn fire_now(
        &mut self,
        template: ScheduleTemplate,
        now: DateTime<Utc>,
    ) -> Option<LaunchedFiring> {
        let id = template.id;
        let job = self.jobs.entry(id).or_insert_with(|| Job::idle(template.clone()));
        job.template = template;
        if job.firing.is_some() {
            tracing::warn!("⚠️ '{}' is already publishing; manual fire ignored", job.template.name);
            return None;
        }
        job.firing = Some(FiringState {
            scheduled_for: now,
            epoch: job.epoch,
            deferred: None,
        });
        tracing::info!("🔔 Manual fire of '{}'", job.template.name);
        Some(LaunchedFiring {
            template: job.template.clone(),
            scheduled_for: now,
            epoch: job.epoch,
        })
    }

    /// Absorb a completion. May hand back a deferred occurrence to run
    /// right away; otherwise re-arms from the occurrence the finished run
    /// was scheduled for, so long runs never drift the cadence.
    fn firing_done(&mut self, done: FiringDone) -> Option<LaunchedFiring> {
        let Some(job) = self.jobs.get_mut(&done.template_id) else {
            return None;
        };
        let Some(finished) = job.firing.take() else {
            return None;
        };

        if let Some(slot) = finished.deferred {
            job.firing = Some(FiringState {
                scheduled_for: slot,
                epoch: job.epoch,
                deferred: None,
            });
            tracing::info!("🔔 Running deferred occurrence {} of '{}'", slot, job.template.name);
            return Some(LaunchedFiring {
                template: job.template.clone(),
                scheduled_for: slot,
                epoch: job.epoch,
            });
        }

        let current = finished.epoch == job.epoch;
        if current && job.armed_at.is_none() && job.template.active {
            match next_fire_time(&job.template, finished.scheduled_for, self.tz) {
                Some(next) => {
                    job.armed_at = Some(next);
                    self.heap.push(HeapEntry {
                        fire_at: next,
                        template_id: done.template_id,
                        epoch: job.epoch,
                    });
                    tracing::debug!("📅 Re-armed '{}' for {}", job.template.name, next);
                }
                None => {
                    tracing::error!(
                        "❌ Could not compute the next occurrence for '{}'",
                        job.template.name
                    );
                }
            }
        }

        if job.firing.is_none() && job.armed_at.is_none() {
            self.jobs.remove(&done.template_id);
        }
        None
    }

    fn state_of(&self, id: Uuid) -> JobState {
        match self.jobs.get(&id) {
            Some(job) if job.firing.is_some() => JobState::Firing,
            Some(job) => match job.armed_at {
                Some(at) => JobState::Armed { at },
                None => JobState::Idle,
            },
            None => JobState::Idle,
        }
    }

    fn views(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self
            .jobs
            .values()
            .map(|job| JobView {
                id: job.template.id,
                name: job.template.name.clone(),
                state: self.state_of(job.template.id),
            })
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }
}

/// Spawn the driver loop as a background tokio task.
///
/// `on_fire` runs once per firing in its own task, with the template and
/// the occurrence instant it was scheduled for. It must swallow its own
/// failures; the driver only cares that it finished.
pub fn spawn_job_scheduler<F, Fut>(tz: Tz, on_fire: F) -> SchedulerHandle
where
    F: Fn(ScheduleTemplate, DateTime<Utc>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);
    let (done_tx, mut done_rx) = mpsc::channel::<FiringDone>(64);
    let on_fire = Arc::new(on_fire);

    tokio::spawn(async move {
        tracing::info!("⏰ Job scheduler started (tz: {tz})");
        let mut state = DriverState::new(tz);

        let launch = move |firing: LaunchedFiring,
                           on_fire: Arc<F>,
                           done_tx: mpsc::Sender<FiringDone>| {
            tokio::spawn(async move {
                let template_id = firing.template.id;
                tracing::info!("🔔 Schedule fired: '{}' ({})", firing.template.name, template_id);
                on_fire(firing.template, firing.scheduled_for).await;
                let _ = done_tx
                    .send(FiringDone {
                        template_id,
                        scheduled_for: firing.scheduled_for,
                        epoch: firing.epoch,
                    })
                    .await;
            });
        };

        loop {
            let deadline = state.next_deadline();
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Arm { template }) => state.arm(template, Utc::now()),
                    Some(Command::Cancel { id }) => state.cancel(id),
                    Some(Command::FireNow { template }) => {
                        if let Some(firing) = state.fire_now(template, Utc::now()) {
                            launch(firing, on_fire.clone(), done_tx.clone());
                        }
                    }
                    Some(Command::Query { id, reply }) => {
                        let _ = reply.send(state.state_of(id));
                    }
                    Some(Command::List { reply }) => {
                        let _ = reply.send(state.views());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                done = done_rx.recv() => {
                    if let Some(done) = done
                        && let Some(firing) = state.firing_done(done)
                    {
                        launch(firing, on_fire.clone(), done_tx.clone());
                    }
                }
                _ = sleep_until(deadline) => {
                    let now = Utc::now();
                    while let Some(firing) = state.pop_due(now) {
                        launch(firing, on_fire.clone(), done_tx.clone());
                    }
                }
            }
        }
        tracing::info!("⏰ Job scheduler stopped");
    });

    SchedulerHandle { tx: cmd_tx }
}

/// Sleep until a UTC instant; pend forever when there is no deadline so
/// the select loop only wakes on commands.
async fn sleep_until(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(at) => {
            let wait = (at - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending::<()>().await,
    }
}
