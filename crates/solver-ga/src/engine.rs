use std::time::{Duration, Instant};

use rand::Rng;
use rayon::prelude::*;
use sched_core::{validate_config, CancelFlag, ConfigError, Evaluator, ProgressSink};
use tracing::{debug, info, warn};
use types::{GenerationDetails, OptimizationConfig, Progress, ResourceBundle, StopReason};

use crate::operators::{crossover, mutate, tournament};
use crate::schedule::{sort_by_fitness, Schedule};
use crate::space::SearchSpace;

/// What a run leaves behind: the final generation, fittest first.
#[derive(Debug)]
pub struct RunOutcome {
    pub population: Vec<Schedule>,
    pub details: GenerationDetails,
    /// Set when the bundle could not support any search.
    pub shortage: Option<String>,
}

pub struct Optimizer<'a> {
    config: &'a OptimizationConfig,
    space: SearchSpace<'a>,
    evaluator: Evaluator<'a>,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        bundle: &'a ResourceBundle,
        config: &'a OptimizationConfig,
    ) -> Result<Self, ConfigError> {
        validate_config(config)?;
        Ok(Self {
            config,
            space: SearchSpace::new(bundle),
            evaluator: Evaluator::new(bundle, config),
        })
    }

    pub fn space(&self) -> &SearchSpace<'a> {
        &self.space
    }

    pub fn run<R: Rng>(
        &self,
        rng: &mut R,
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> RunOutcome {
        let started = Instant::now();

        if let Some(reason) = self.space.shortage() {
            warn!(%reason, "resource shortage, skipping search");
            return RunOutcome {
                population: Vec::new(),
                details: GenerationDetails {
                    total_generations: 0,
                    convergence_generation: 0,
                    final_fitness: 0.0,
                    stop_reason: StopReason::ResourceShortage,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    seed: self.config.seed,
                },
                shortage: Some(reason),
            };
        }

        let cfg = self.config;
        info!(
            courses = self.space.courses().len(),
            sessions = self.space.session_count(),
            population = cfg.population_size,
            generations = cfg.generations,
            "starting search"
        );
        let mut population = self.space.initial_population(cfg.population_size, rng);

        let mut generation = 0u32;
        let mut best_so_far = f64::NEG_INFINITY;
        let mut convergence = 0u32;
        let stop = loop {
            self.evaluate(&mut population);
            sort_by_fitness(&mut population);

            let best = population[0].fitness().unwrap_or(0.0);
            if best > best_so_far {
                best_so_far = best;
                convergence = generation;
            }
            progress.report(Progress {
                progress_percent: (generation as f64 / cfg.generations as f64 * 100.0).min(100.0),
                generation,
                best_fitness: best,
            });
            debug!(generation, best, "generation evaluated");

            if let Some(reason) = self.should_stop(generation, best, started, cancel) {
                break reason;
            }

            population = self.next_generation(&population, generation + 1, rng);
            generation += 1;
        };

        let final_fitness = population[0].fitness().unwrap_or(0.0);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            generations = generation,
            final_fitness,
            elapsed_ms,
            stop = ?stop,
            "search finished"
        );
        RunOutcome {
            population,
            details: GenerationDetails {
                total_generations: generation,
                convergence_generation: convergence,
                final_fitness,
                stop_reason: stop,
                elapsed_ms,
                seed: cfg.seed,
            },
            shortage: None,
        }
    }

    /// Scores every member that has no evaluation yet; elites keep theirs.
    fn evaluate(&self, population: &mut [Schedule]) {
        let ev = &self.evaluator;
        if self.config.parallel_evaluation {
            population
                .par_iter_mut()
                .filter(|s| !s.is_evaluated())
                .for_each(|s| s.evaluate(ev));
        } else {
            population
                .iter_mut()
                .filter(|s| !s.is_evaluated())
                .for_each(|s| s.evaluate(ev));
        }
    }

    /// Polled once per generation boundary, never mid-generation.
    fn should_stop(
        &self,
        generation: u32,
        best: f64,
        started: Instant,
        cancel: &CancelFlag,
    ) -> Option<StopReason> {
        if cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if self.config.target_fitness.is_some_and(|t| best >= t) {
            return Some(StopReason::TargetFitness);
        }
        if generation >= self.config.generations {
            return Some(StopReason::MaxGenerations);
        }
        if started.elapsed() > Duration::from_millis(self.config.max_runtime_ms) {
            return Some(StopReason::TimeLimit);
        }
        None
    }

    /// `current` must be evaluated and sorted fittest first.
    fn next_generation<R: Rng>(
        &self,
        current: &[Schedule],
        generation: u32,
        rng: &mut R,
    ) -> Vec<Schedule> {
        let cfg = self.config;
        let size = cfg.population_size;
        let elites = elite_count(size, cfg.elitism_rate).min(current.len());

        let mut next: Vec<Schedule> = Vec::with_capacity(size);
        next.extend(current[..elites].iter().cloned());
        while next.len() < size {
            let a = tournament(current, cfg.tournament_size, rng);
            let b = tournament(current, cfg.tournament_size, rng);
            let mut child = crossover(
                a,
                b,
                cfg.crossover_rate,
                cfg.crossover_fraction,
                generation,
                rng,
            );
            mutate(
                &mut child,
                &self.space,
                cfg.mutation_rate,
                cfg.mutation_fraction,
                rng,
            );
            next.push(child);
        }
        next
    }
}

/// At least one elite survives so the best fitness never regresses.
pub fn elite_count(population_size: usize, elitism_rate: f64) -> usize {
    ((population_size as f64 * elitism_rate).round() as usize).clamp(1, population_size.max(1))
}
