//! Named timer jobs with replace-on-reschedule semantics.
//!
//! The registry owns at most one running timer per job name. Scheduling a name
//! that is already registered aborts the previous timer and arms the new one
//! under the same lock, so two timers for one name never coexist.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jiff::{ToSpan, Zoned};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::model::ResetTime;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fires every period, first one period from now.
    Every(Duration),
    /// Fires daily at a local wall-clock time.
    DailyAt(ResetTime),
}

impl Cadence {
    fn first_delay(&self, now: &Zoned) -> Result<Duration> {
        match self {
            Cadence::Every(period) => Ok(*period),
            Cadence::DailyAt(at) => delay_until(*at, now),
        }
    }

    fn period(&self) -> Duration {
        match self {
            Cadence::Every(period) => *period,
            Cadence::DailyAt(_) => DAY,
        }
    }
}

/// Time from `now` until the next occurrence of `at` in `now`'s time zone.
///
/// A time equal to `now` counts as already passed.
pub fn delay_until(at: ResetTime, now: &Zoned) -> Result<Duration> {
    let internal = |err: jiff::Error| Error::Internal(format!("computing next {}: {}", at, err));

    let today = now
        .date()
        .at(at.hour, at.minute, 0, 0)
        .to_zoned(now.time_zone().clone())
        .map_err(internal)?;
    let next = if today > *now {
        today
    } else {
        today.checked_add(1.day()).map_err(internal)?
    };

    Ok(next.duration_since(now).unsigned_abs())
}

pub struct JobRegistry {
    runtime: Handle,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobRegistry {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Registry bound to the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Arms `job` under `name`, replacing any timer registered for it.
    ///
    /// Each run happens on the blocking pool; a run that panics is logged
    /// and the timer keeps going.
    pub fn schedule<F>(&self, name: &str, cadence: Cadence, job: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let period = cadence.period();
        if period.is_zero() {
            return Err(Error::InvalidInput(format!(
                "job {} needs a non-zero period",
                name
            )));
        }
        let first = cadence.first_delay(&Zoned::now())?;

        let mut jobs = self.jobs.lock();
        if let Some(previous) = jobs.remove(name) {
            info!(job = name, "replacing existing timer");
            previous.abort();
        }

        let job = Arc::new(job);
        let job_name = name.to_string();
        let handle = self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!(job = %job_name, "running scheduled job");
                let run = Arc::clone(&job);
                if let Err(err) = tokio::task::spawn_blocking(move || run()).await {
                    error!(job = %job_name, error = %err, "scheduled job failed");
                }
            }
        });
        jobs.insert(name.to_string(), handle);
        info!(job = name, first_in_secs = first.as_secs(), "job scheduled");

        Ok(())
    }

    /// Stops and forgets the timer for `name`. Returns whether one existed.
    pub fn cancel(&self, name: &str) -> bool {
        match self.jobs.lock().remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.jobs.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        for (_, handle) in self.jobs.get_mut().drain() {
            handle.abort();
        }
    }
}
