//! Evolutionary timetable search.
//!
//! A run builds a random population over a [`SearchSpace`], then alternates
//! evaluation and evolution (tournament selection, index-aligned crossover,
//! single-gene perturbation, elitism) until a generation, time, fitness or
//! cancellation budget is reached. The final generation is ranked into a
//! handful of distinct, labelled timetables.

pub mod engine;
pub mod operators;
pub mod ranker;
pub mod schedule;
pub mod space;

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::{
    CancelFlag, OptimizationRequest, OptimizationResult, ProgressSink, SolveError, Solver,
};
use tracing::info;

pub use engine::{Optimizer, RunOutcome};
pub use schedule::Schedule;
pub use space::SearchSpace;

#[derive(Clone, Copy, Debug, Default)]
pub struct GaSolver;

impl GaSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for GaSolver {
    fn solve(
        &self,
        request: &OptimizationRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<Vec<OptimizationResult>, SolveError> {
        let mut config = request.config.clone();
        let seed = *config.seed.get_or_insert_with(rand::random);
        info!(seed, "seeding search");

        let optimizer = Optimizer::new(&request.resources, &config)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let outcome = optimizer.run(&mut rng, progress, cancel);

        Ok(match &outcome.shortage {
            Some(reason) => vec![ranker::shortage_result(reason, &outcome.details)],
            None => ranker::rank(&outcome.population, config.result_count, &outcome.details),
        })
    }
}
