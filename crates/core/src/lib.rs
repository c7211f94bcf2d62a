pub mod fitness;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

pub use fitness::{Evaluation, Evaluator};
pub use types::{
    Constraint, ConstraintKind, Course, Instructor, OptimizationConfig, OptimizationRequest,
    OptimizationResult, Progress, ResourceBundle, Room, ScheduledSession, TimeSlot,
};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("populationSize must be positive")]
    PopulationSize,
    #[error("generations must be positive")]
    Generations,
    #[error("{name} must lie in [0, 1], got {value}")]
    Rate { name: &'static str, value: f64 },
    #[error("{name} must lie in (0, 1], got {value}")]
    Fraction { name: &'static str, value: f64 },
    #[error("tournamentSize must be positive")]
    TournamentSize,
    #[error("maxRuntimeMs must be positive")]
    MaxRuntime,
    #[error("workingDays must be positive")]
    WorkingDays,
    #[error("resultCount must be positive")]
    ResultCount,
    #[error("penalty weight {name} must be finite and non-negative, got {value}")]
    Penalty { name: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid resource bundle: {0}")]
    Msg(String),
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Rejects configurations that would make the search degenerate.
pub fn validate_config(cfg: &OptimizationConfig) -> Result<(), ConfigError> {
    if cfg.population_size == 0 {
        return Err(ConfigError::PopulationSize);
    }
    if cfg.generations == 0 {
        return Err(ConfigError::Generations);
    }
    let rates = [
        ("crossoverRate", cfg.crossover_rate),
        ("mutationRate", cfg.mutation_rate),
        ("elitismRate", cfg.elitism_rate),
        ("targetFitness", cfg.target_fitness.unwrap_or(0.0)),
    ];
    for (name, value) in rates {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Rate { name, value });
        }
    }
    let fractions = [
        ("crossoverFraction", cfg.crossover_fraction),
        ("mutationFraction", cfg.mutation_fraction),
    ];
    for (name, value) in fractions {
        if !(value > 0.0 && value <= 1.0) {
            return Err(ConfigError::Fraction { name, value });
        }
    }
    if cfg.tournament_size == 0 {
        return Err(ConfigError::TournamentSize);
    }
    if cfg.max_runtime_ms == 0 {
        return Err(ConfigError::MaxRuntime);
    }
    if cfg.working_days == 0 {
        return Err(ConfigError::WorkingDays);
    }
    if cfg.result_count == 0 {
        return Err(ConfigError::ResultCount);
    }
    let p = &cfg.penalties;
    let weights = [
        ("conflict", p.conflict),
        ("workloadPerHour", p.workload_per_hour),
        ("capacityPerStudent", p.capacity_per_student),
        ("normalization", p.normalization),
    ];
    for (name, value) in weights {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ConfigError::Penalty { name, value });
        }
    }
    Ok(())
}

/// Courses with at least one instructor from their own department.
pub fn schedulable_courses(bundle: &ResourceBundle) -> impl Iterator<Item = &Course> {
    let departments: HashSet<&str> = bundle
        .instructors
        .iter()
        .map(|i| i.department.0.as_str())
        .collect();
    bundle
        .courses
        .iter()
        .filter(move |c| departments.contains(c.department.0.as_str()))
}

/// Data-quality report for a bundle. The optimizer does not require a clean
/// report; it skips what it cannot schedule.
pub fn validate_bundle(bundle: &ResourceBundle) -> Result<(), ValidationError> {
    let mut errors: Vec<String> = Vec::new();

    fn chk_unique<I: ToString>(name: &str, ids: impl Iterator<Item = I>, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name} id: {s}"));
            }
        }
    }
    chk_unique("course", bundle.courses.iter().map(|x| &x.id), &mut errors);
    chk_unique("instructor", bundle.instructors.iter().map(|x| &x.id), &mut errors);
    chk_unique("room", bundle.rooms.iter().map(|x| &x.id), &mut errors);
    chk_unique("time slot", bundle.time_slots.iter().map(|x| &x.id), &mut errors);
    chk_unique("constraint", bundle.constraints.iter().map(|x| &x.id), &mut errors);

    for t in &bundle.time_slots {
        match (types::parse_clock(&t.start), types::parse_clock(&t.end)) {
            (Some(s), Some(e)) if e <= s => {
                errors.push(format!("time slot {} ends before it starts", t.id));
            }
            (Some(_), Some(_)) => {}
            _ => errors.push(format!("time slot {} has malformed start/end", t.id)),
        }
        if t.duration_minutes == 0 {
            errors.push(format!("time slot {} has zero duration", t.id));
        }
    }

    for r in &bundle.rooms {
        if r.capacity == 0 {
            errors.push(format!("room {} has zero capacity", r.id));
        }
    }

    let departments: HashSet<&str> = bundle
        .instructors
        .iter()
        .map(|i| i.department.0.as_str())
        .collect();
    for c in &bundle.courses {
        if c.credits == 0 {
            errors.push(format!("course {} has credits=0", c.id));
        }
        if !departments.contains(c.department.0.as_str()) {
            errors.push(format!(
                "course {} is unschedulable: no instructor in department {}",
                c.id, c.department
            ));
        }
    }

    let instructors: HashSet<&str> = bundle.instructors.iter().map(|i| i.id.0.as_str()).collect();
    let slots: HashSet<&str> = bundle.time_slots.iter().map(|t| t.id.0.as_str()).collect();
    for k in &bundle.constraints {
        if !(k.weight.is_finite() && k.weight >= 0.0) {
            errors.push(format!("constraint {} has invalid weight {}", k.id, k.weight));
        }
        match &k.kind {
            ConstraintKind::InstructorAvailability {
                instructor_id,
                unavailable_slots,
            } => {
                if !instructors.contains(instructor_id.0.as_str()) {
                    errors.push(format!(
                        "constraint {} references missing instructor {}",
                        k.id, instructor_id
                    ));
                }
                for s in unavailable_slots {
                    if !slots.contains(s.0.as_str()) {
                        errors.push(format!(
                            "constraint {} references missing time slot {}",
                            k.id, s
                        ));
                    }
                }
            }
            ConstraintKind::LunchBreak { start, end } => {
                if types::parse_clock(start).is_none() || types::parse_clock(end).is_none() {
                    errors.push(format!("constraint {} has malformed lunch window", k.id));
                }
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Msg(errors.join("; ")))
    }
}

/// Receives one observation per generation. Must not influence the search.
pub trait ProgressSink {
    fn report(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressSink for F {
    fn report(&mut self, progress: Progress) {
        self(progress)
    }
}

/// Sink for callers that do not watch progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: Progress) {}
}

/// Cooperative stop signal polled at generation boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub trait Solver: Send + Sync + 'static {
    fn solve(
        &self,
        request: &OptimizationRequest,
        progress: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<Vec<OptimizationResult>, SolveError>;
}
