use parking_lot::RwLock;
use sched_core::{CancelFlag, OptimizationRequest, OptimizationResult, Progress, Solver};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum JobStatus {
    Queued,
    #[serde(rename_all = "camelCase")]
    Running {
        generation: u32,
        progress_percent: f64,
        best_fitness: f64,
    },
    Completed {
        results: Vec<OptimizationResult>,
    },
    Failed {
        message: String,
    },
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

struct Entry {
    status: JobStatus,
    cancel: CancelFlag,
}

/// Runs optimization requests on tokio's blocking pool and keeps their
/// status in memory. Nothing survives the process.
pub struct InMemJobs<S: Solver> {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    solver: Arc<S>,
}

impl<S: Solver> Clone for InMemJobs<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            solver: self.solver.clone(),
        }
    }
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self {
            inner: Default::default(),
            solver: Arc::new(solver),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, request: OptimizationRequest) -> JobId {
        let (id, cancel) = self.insert();
        let this = self.clone();
        let id_for_task = id.clone();
        tokio::task::spawn_blocking(move || this.run(&id_for_task, &request, &cancel));
        JobId(id)
    }

    fn insert(&self) -> (String, CancelFlag) {
        let id = Uuid::new_v4().to_string();
        let cancel = CancelFlag::new();
        self.inner.write().insert(
            id.clone(),
            Entry {
                status: JobStatus::Queued,
                cancel: cancel.clone(),
            },
        );
        (id, cancel)
    }

    fn run(&self, id: &str, request: &OptimizationRequest, cancel: &CancelFlag) {
        let map = &self.inner;
        if cancel.is_cancelled() {
            info!(job = %id, "job cancelled before start");
            set_status(map, id, JobStatus::Cancelled);
            return;
        }
        set_status(
            map,
            id,
            JobStatus::Running {
                generation: 0,
                progress_percent: 0.0,
                best_fitness: 0.0,
            },
        );

        let mut sink = |p: Progress| {
            set_status(
                map,
                id,
                JobStatus::Running {
                    generation: p.generation,
                    progress_percent: p.progress_percent,
                    best_fitness: p.best_fitness,
                },
            )
        };
        match self.solver.solve(request, &mut sink, cancel) {
            Ok(results) => {
                info!(job = %id, results = results.len(), "job completed");
                set_status(map, id, JobStatus::Completed { results });
            }
            Err(e) => {
                error!(job = %id, error = %e, "job failed");
                set_status(
                    map,
                    id,
                    JobStatus::Failed {
                        message: e.to_string(),
                    },
                );
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.inner.read().get(id).map(|e| e.status.clone())
    }

    /// Asks a queued or running job to stop. Returns false for unknown or
    /// already finished jobs.
    pub fn cancel(&self, id: &str) -> bool {
        let guard = self.inner.read();
        match guard.get(id) {
            Some(e) if !e.status.is_finished() => {
                e.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drops a finished job and hands back its final status. Queued and
    /// running jobs stay put.
    pub fn remove(&self, id: &str) -> Option<JobStatus> {
        let mut guard = self.inner.write();
        if !guard.get(id)?.status.is_finished() {
            return None;
        }
        guard.remove(id).map(|e| e.status)
    }
}

fn set_status(map: &RwLock<HashMap<String, Entry>>, id: &str, status: JobStatus) {
    if let Some(e) = map.write().get_mut(id) {
        e.status = status;
    }
}
