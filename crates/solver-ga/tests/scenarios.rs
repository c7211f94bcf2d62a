use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sched_core::{CancelFlag, ConfigError, Evaluator, NoProgress, SolveError, Solver};
use serde_json::json;
use solver_ga::{GaSolver, Optimizer, SearchSpace};
use types::{
    OptimizationConfig, OptimizationRequest, Progress, ResourceBundle, ResultStatus, StopReason,
    ViolationKind,
};

fn slots(n: usize) -> serde_json::Value {
    let days = ["mon", "tue", "wed", "thu", "fri"];
    (0..n)
        .map(|k| {
            json!({
                "id": format!("t{k}"),
                "day": days[k % days.len()],
                "start": format!("{:02}:00", 8 + k / days.len()),
                "end": format!("{:02}:00", 9 + k / days.len()),
                "durationMinutes": 60
            })
        })
        .collect()
}

fn request(resources: serde_json::Value, config: OptimizationConfig) -> OptimizationRequest {
    OptimizationRequest {
        config,
        resources: serde_json::from_value(resources).unwrap(),
    }
}

fn small_config(population: usize, generations: u32) -> OptimizationConfig {
    OptimizationConfig {
        population_size: population,
        generations,
        seed: Some(2024),
        ..OptimizationConfig::default()
    }
}

#[test]
fn trivial_feasible_case_is_conflict_free() {
    let req = request(
        json!({
            "courses": [{"id": "c1", "department": "D", "credits": 1, "maxStudents": 25}],
            "instructors": [{"id": "i1", "department": "D", "maxHoursPerWeek": 40}],
            "rooms": [{"id": "r1", "capacity": 30}, {"id": "r2", "capacity": 40}],
            "timeSlots": slots(4)
        }),
        small_config(10, 5),
    );
    let results = GaSolver::new()
        .solve(&req, &mut NoProgress, &CancelFlag::new())
        .unwrap();
    assert!(!results.is_empty() && results.len() <= 5);
    let best = &results[0];
    assert_eq!(best.conflicts, 0);
    assert!(matches!(best.status, ResultStatus::Optimal | ResultStatus::Good));
    assert_eq!(best.schedule.len(), 1);
    assert_eq!(best.name, "Optimized Timetable 1");
}

#[test]
fn forced_conflict_survives_any_number_of_generations() {
    let req = request(
        json!({
            "courses": [
                {"id": "c1", "department": "D", "credits": 1, "maxStudents": 10},
                {"id": "c2", "department": "D", "credits": 1, "maxStudents": 10}
            ],
            "instructors": [{"id": "i1", "department": "D", "maxHoursPerWeek": 40}],
            "rooms": [{"id": "r1", "capacity": 30}],
            "timeSlots": slots(1)
        }),
        OptimizationConfig {
            target_fitness: None,
            ..small_config(8, 20)
        },
    );
    let results = GaSolver::new()
        .solve(&req, &mut NoProgress, &CancelFlag::new())
        .unwrap();
    assert!(!results.is_empty());
    for r in &results {
        assert!(r.conflicts >= 1);
        assert!(r
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::ScheduleConflict));
    }
    assert_eq!(results[0].generation_details.total_generations, 20);
    assert_eq!(
        results[0].generation_details.stop_reason,
        StopReason::MaxGenerations
    );
}

#[test]
fn workload_overflow_is_penalised() {
    let bundle: ResourceBundle = serde_json::from_value(json!({
        "courses": [{"id": "c1", "department": "D", "credits": 5, "maxStudents": 10}],
        "instructors": [{"id": "i1", "department": "D", "maxHoursPerWeek": 1}],
        "rooms": [{"id": "r1", "capacity": 30}],
        "timeSlots": slots(5)
    }))
    .unwrap();
    let config = OptimizationConfig::default();
    let space = SearchSpace::new(&bundle);
    let evaluator = Evaluator::new(&bundle, &config);
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    for mut s in space.initial_population(10, &mut rng) {
        assert_eq!(s.sessions().len(), 5);
        assert!(s.sessions().iter().all(|x| x.instructor_id.0 == "i1"));
        s.evaluate(&evaluator);
        let e = s.evaluation().unwrap();
        let overflow = e
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::WorkloadExceeded)
            .expect("workload violation");
        assert!(overflow.penalty >= 20);
    }
}

#[test]
fn zero_rooms_short_circuits_without_generations() {
    let req = request(
        json!({
            "courses": [{"id": "c1", "department": "D", "credits": 2, "maxStudents": 10}],
            "instructors": [{"id": "i1", "department": "D", "maxHoursPerWeek": 40}],
            "rooms": [],
            "timeSlots": slots(3)
        }),
        small_config(10, 5),
    );
    let mut calls = 0;
    let mut sink = |_: Progress| calls += 1;
    let results = GaSolver::new()
        .solve(&req, &mut sink, &CancelFlag::new())
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ResultStatus::Infeasible);
    assert_eq!(results[0].generation_details.total_generations, 0);
    assert_eq!(
        results[0].generation_details.stop_reason,
        StopReason::ResourceShortage
    );
    assert_eq!(results[0].violations[0].kind, ViolationKind::ResourceShortage);
    assert_eq!(calls, 0);
}

#[test]
fn invalid_config_is_rejected_before_search() {
    let req = request(
        json!({"courses": [], "instructors": [], "rooms": [], "timeSlots": []}),
        small_config(0, 5),
    );
    let err = GaSolver::new()
        .solve(&req, &mut NoProgress, &CancelFlag::new())
        .unwrap_err();
    assert!(matches!(err, SolveError::Config(ConfigError::PopulationSize)));
}

fn busy_bundle() -> serde_json::Value {
    json!({
        "courses": [
            {"id": "alg", "department": "cs", "credits": 3, "maxStudents": 60},
            {"id": "os", "department": "cs", "credits": 4, "maxStudents": 45},
            {"id": "db", "department": "cs", "credits": 3, "maxStudents": 35},
            {"id": "calc", "department": "math", "credits": 4, "maxStudents": 80},
            {"id": "stats", "department": "math", "credits": 3, "maxStudents": 30}
        ],
        "instructors": [
            {"id": "ada", "department": "cs", "maxHoursPerWeek": 6},
            {"id": "linus", "department": "cs", "maxHoursPerWeek": 6},
            {"id": "emmy", "department": "math", "maxHoursPerWeek": 5}
        ],
        "rooms": [
            {"id": "hall", "capacity": 90},
            {"id": "lab", "capacity": 40},
            {"id": "small", "capacity": 25}
        ],
        "timeSlots": slots(6)
    })
}

#[test]
fn best_fitness_never_regresses() {
    let req = request(
        busy_bundle(),
        OptimizationConfig {
            target_fitness: None,
            ..small_config(30, 40)
        },
    );
    let mut history = Vec::new();
    let mut sink = |p: Progress| history.push((p.generation, p.best_fitness));
    GaSolver::new()
        .solve(&req, &mut sink, &CancelFlag::new())
        .unwrap();
    assert_eq!(history.len(), 41);
    for (g, w) in history.windows(2).enumerate() {
        assert_eq!(w[0].0, g as u32);
        assert!(w[1].1 >= w[0].1, "generation {} regressed", w[1].0);
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let req = request(busy_bundle(), small_config(20, 15));
    let run = || {
        GaSolver::new()
            .solve(&req, &mut NoProgress, &CancelFlag::new())
            .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.score, y.score);
        assert_eq!(x.schedule, y.schedule);
    }
    assert_eq!(a[0].generation_details.seed, Some(2024));
}

#[test]
fn results_are_distinct_sorted_and_labelled() {
    let req = request(busy_bundle(), small_config(40, 10));
    let results = GaSolver::new()
        .solve(&req, &mut NoProgress, &CancelFlag::new())
        .unwrap();
    assert!(results.len() <= 5);
    for (n, r) in results.iter().enumerate() {
        assert_eq!(r.name, format!("Optimized Timetable {}", n + 1));
        assert!(r.utilization <= 100 && r.faculty_workload <= 100);
        assert_eq!(r.status, ResultStatus::classify(r.score, r.conflicts));
        assert_eq!(r.schedule.len(), 3 + 4 + 3 + 4 + 3);
    }
    for (i, a) in results.iter().enumerate() {
        for b in &results[i + 1..] {
            assert_ne!(a.schedule, b.schedule);
            assert!(a.score >= b.score);
        }
    }
}

#[test]
fn time_budget_ends_the_run_early() {
    let bundle: ResourceBundle = serde_json::from_value(busy_bundle()).unwrap();
    let config = OptimizationConfig {
        max_runtime_ms: 1,
        generations: 1_000_000,
        target_fitness: None,
        ..small_config(20, 1)
    };
    let optimizer = Optimizer::new(&bundle, &config).unwrap();
    let out = optimizer.run(
        &mut ChaCha8Rng::seed_from_u64(1),
        &mut NoProgress,
        &CancelFlag::new(),
    );
    assert_eq!(out.details.stop_reason, StopReason::TimeLimit);
    assert!(out.details.total_generations < config.generations);
}

#[test]
fn convergence_generation_marks_last_strict_improvement() {
    let req = request(
        busy_bundle(),
        OptimizationConfig {
            target_fitness: None,
            ..small_config(12, 30)
        },
    );
    let mut history = Vec::new();
    let mut sink = |p: Progress| history.push((p.generation, p.best_fitness));
    let results = GaSolver::new()
        .solve(&req, &mut sink, &CancelFlag::new())
        .unwrap();

    let mut best = f64::NEG_INFINITY;
    let mut expected = 0;
    for &(generation, fitness) in &history {
        if fitness > best {
            best = fitness;
            expected = generation;
        }
    }
    let details = &results[0].generation_details;
    assert_eq!(details.convergence_generation, expected);
    assert_eq!(details.final_fitness, best);
    assert_eq!(details.final_fitness, history.last().unwrap().1);
}

#[test]
fn cancelling_mid_run_still_returns_ranked_results() {
    let req = request(
        busy_bundle(),
        OptimizationConfig {
            target_fitness: None,
            ..small_config(10, 50)
        },
    );
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let mut seen = Vec::new();
    let mut sink = |p: Progress| {
        seen.push(p.generation);
        if p.generation == 3 {
            flag.cancel();
        }
    };
    let results = GaSolver::new().solve(&req, &mut sink, &cancel).unwrap();
    assert_eq!(seen, vec![0, 1, 2, 3]);
    assert!(!results.is_empty());
    for r in &results {
        assert_eq!(r.generation_details.stop_reason, StopReason::Cancelled);
        assert_eq!(r.generation_details.total_generations, 3);
    }
}
