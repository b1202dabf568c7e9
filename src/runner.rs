//! Background execution of simulation runs.
//!
//! Each run executes on its own named OS thread with no shared mutable
//! state between runs. Pollers read cloned snapshots through an
//! `RwLock` only the run thread writes; cancellation is a flag observed
//! at tick boundaries, never mid-tick.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use uuid::Uuid;

use crate::domain::error::SimError;
use crate::domain::simulation::{RunSummary, Simulation, SimulationConfig, TickRecord};
use crate::ports::price_port::PricePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Complete,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Complete | RunStatus::Stopped | RunStatus::Failed
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// State the run thread writes and pollers read. Writes are whole
/// records behind the lock, so even a poisoned lock holds consistent
/// state.
#[derive(Debug)]
struct RunState {
    status: RunStatus,
    ticks: Vec<TickRecord>,
    total_steps: usize,
    summary: Option<RunSummary>,
    error: Option<String>,
}

/// Cloned view of one run at poll time; tolerates being a tick stale.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub id: Uuid,
    pub status: RunStatus,
    pub ticks: Vec<TickRecord>,
    /// Ticks executed over total steps, in `[0, 1]`.
    pub progress: f64,
    /// Present once the run is `Complete` or `Stopped` with >= 1 tick.
    pub summary: Option<RunSummary>,
    /// Panic text when the run `Failed`.
    pub error: Option<String>,
}

struct RunHandle {
    state: Arc<RwLock<RunState>>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Owns every live run, keyed by generated ID. Constructed by the
/// hosting shell and injected; never ambient state.
pub struct RunRegistry {
    runs: Mutex<HashMap<Uuid, RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a named background thread driving one simulation run and
    /// return its fresh ID.
    pub fn create(
        &self,
        config: SimulationConfig,
        provider: Arc<dyn PricePort + Send + Sync>,
    ) -> Result<Uuid, SimError> {
        let id = Uuid::new_v4();
        let total_steps = config.frequency.total_steps(config.duration_days);

        let state = Arc::new(RwLock::new(RunState {
            status: RunStatus::Pending,
            ticks: Vec::new(),
            total_steps,
            summary: None,
            error: None,
        }));
        let cancel = Arc::new(AtomicBool::new(false));

        let thread_state = Arc::clone(&state);
        let thread_cancel = Arc::clone(&cancel);
        let thread = thread::Builder::new()
            .name(format!("portsim-run-{id}"))
            .spawn(move || run_loop(config, provider, thread_state, thread_cancel))?;

        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.insert(
            id,
            RunHandle {
                state,
                cancel,
                thread: Some(thread),
            },
        );
        Ok(id)
    }

    pub fn snapshot(&self, id: Uuid) -> Option<RunSnapshot> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let handle = runs.get(&id)?;
        let state = handle.state.read().unwrap_or_else(|e| e.into_inner());

        let progress = if state.total_steps == 0 {
            1.0
        } else {
            state.ticks.len() as f64 / state.total_steps as f64
        };
        Some(RunSnapshot {
            id,
            status: state.status,
            ticks: state.ticks.clone(),
            progress,
            summary: state.summary.clone(),
            error: state.error.clone(),
        })
    }

    /// Request cancellation; the run stops at its next tick boundary
    /// with its tick log and summary intact. `false` for unknown IDs.
    pub fn cancel(&self, id: Uuid) -> bool {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        match runs.get(&id) {
            Some(handle) => {
                handle.cancel.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Drop a run from the registry. A still-running thread is asked to
    /// cancel and detaches; it winds down at its next boundary check,
    /// unobserved. `false` for unknown IDs.
    pub fn remove(&self, id: Uuid) -> bool {
        let handle = {
            let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
            runs.remove(&id)
        };
        match handle {
            Some(mut handle) => {
                handle.cancel.store(true, Ordering::Relaxed);
                if let Some(thread) = handle.thread.take() {
                    if thread.is_finished() {
                        let _ = thread.join();
                    }
                }
                true
            }
            None => false,
        }
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn run_loop(
    config: SimulationConfig,
    provider: Arc<dyn PricePort + Send + Sync>,
    state: Arc<RwLock<RunState>>,
    cancel: Arc<AtomicBool>,
) {
    let mut sim = Simulation::new(config, &*provider);

    {
        let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
        guard.status = RunStatus::Running;
    }

    loop {
        if cancel.load(Ordering::Relaxed) {
            finish(&state, &sim, RunStatus::Stopped);
            return;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| sim.step())) {
            Ok(Some(tick)) => {
                let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
                guard.ticks.push(tick);
            }
            Ok(None) => {
                finish(&state, &sim, RunStatus::Complete);
                return;
            }
            Err(payload) => {
                let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
                guard.status = RunStatus::Failed;
                guard.error = Some(panic_message(payload));
                return;
            }
        }
    }
}

/// Terminal transition keeping every accumulated tick and computing the
/// final summary from them.
fn finish(state: &RwLock<RunState>, sim: &Simulation<'_>, status: RunStatus) {
    let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
    let summary = sim.summary(&guard.ticks);
    guard.summary = summary;
    guard.status = status;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
