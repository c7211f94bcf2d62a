use rand::Rng;
use sched_core::{Evaluation, Evaluator};
use types::{ScheduleId, ScheduledSession};
use uuid::Builder;

/// One candidate timetable: the chromosome the search evolves.
///
/// Session `i` always belongs to the same course in every schedule of a run,
/// which is what makes index-aligned crossover preserve per-course counts.
#[derive(Clone, Debug)]
pub struct Schedule {
    id: ScheduleId,
    generation: u32,
    sessions: Vec<ScheduledSession>,
    evaluation: Option<Evaluation>,
}

impl Schedule {
    pub fn new<R: Rng>(generation: u32, sessions: Vec<ScheduledSession>, rng: &mut R) -> Self {
        let id = Builder::from_random_bytes(rng.gen()).into_uuid();
        Self {
            id: ScheduleId(id.to_string()),
            generation,
            sessions,
            evaluation: None,
        }
    }

    pub fn id(&self) -> &ScheduleId {
        &self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn sessions(&self) -> &[ScheduledSession] {
        &self.sessions
    }

    /// Any write access invalidates the cached evaluation.
    pub fn sessions_mut(&mut self) -> &mut [ScheduledSession] {
        self.evaluation = None;
        &mut self.sessions
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn fitness(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.fitness)
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluation.is_some()
    }

    pub fn evaluate(&mut self, evaluator: &Evaluator<'_>) {
        self.evaluation = Some(evaluator.evaluate(&self.sessions));
    }

    /// Same assignment at every index, regardless of id or generation.
    pub fn same_timetable(&self, other: &Schedule) -> bool {
        self.sessions == other.sessions
    }
}

/// Fittest first; unevaluated schedules sink to the end.
pub fn sort_by_fitness(population: &mut [Schedule]) {
    population.sort_by(|a, b| {
        let fa = a.fitness().unwrap_or(f64::NEG_INFINITY);
        let fb = b.fitness().unwrap_or(f64::NEG_INFINITY);
        fb.total_cmp(&fa)
    });
}
