//! Serialization of reconciliation passes
//!
//! Change events may arrive while a pass is still writing the descriptor. The
//! scheduler runs at most one pass at a time and remembers at most one rerun.

use std::sync::Mutex;
use std::time::Instant;
use tracing::{Level, debug, warn};

use crate::log_timing;
use crate::project::ProjectError;

/// Result of a trigger request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// This caller ran the pass, `passes` times in a row
    Ran { passes: usize },
    /// Another caller is running a pass and will run once more afterwards
    Queued,
}

#[derive(Debug, Default)]
struct SchedulerState {
    running: bool,
    pending: bool,
}

/// Runs a pass without ever overlapping two executions
pub struct PassScheduler<P>
where
    P: Fn() -> Result<(), ProjectError> + Send + Sync,
{
    pass: P,
    state: Mutex<SchedulerState>,
}

impl<P> PassScheduler<P>
where
    P: Fn() -> Result<(), ProjectError> + Send + Sync,
{
    pub fn new(pass: P) -> Self {
        Self {
            pass,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Request a pass
    ///
    /// Runs the pass on the calling thread if none is running. Otherwise marks a
    /// rerun as pending and returns immediately; any number of requests during
    /// one pass collapse into a single rerun. A queued rerun still runs when the
    /// pass before it fails; only the error of the last pass is returned.
    pub fn trigger(&self) -> Result<TriggerOutcome, ProjectError> {
        {
            let mut state = self.lock_state();
            if state.running {
                state.pending = true;
                debug!("Pass already running, rerun queued");
                return Ok(TriggerOutcome::Queued);
            }
            state.running = true;
        }

        let mut passes = 0;
        loop {
            let started = Instant::now();
            let result = (self.pass)();
            passes += 1;
            log_timing!(Level::DEBUG, "reconciliation_pass", started.elapsed());

            let mut state = self.lock_state();
            if state.pending {
                if let Err(e) = result {
                    warn!("Pass failed, running queued rerun: {}", e);
                }
                state.pending = false;
                continue;
            }
            state.running = false;
            return result.map(|()| TriggerOutcome::Ran { passes });
        }
    }

    #[allow(dead_code)]
    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
