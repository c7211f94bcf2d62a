use serde_json::json;
use types::{
    ConstraintViolation, GenerationDetails, OptimizationResult, ResultStatus, ScheduleId,
    Severity, ViolationKind,
};

use crate::schedule::Schedule;

/// Turns a final population (fittest first) into at most `count` distinct
/// labelled results. Unevaluated members are never reported.
pub fn rank(
    population: &[Schedule],
    count: usize,
    details: &GenerationDetails,
) -> Vec<OptimizationResult> {
    let mut picked: Vec<&Schedule> = Vec::new();
    for s in population {
        if picked.len() == count {
            break;
        }
        if !s.is_evaluated() || picked.iter().any(|p| p.same_timetable(s)) {
            continue;
        }
        picked.push(s);
    }

    picked
        .into_iter()
        .enumerate()
        .filter_map(|(n, s)| {
            let e = s.evaluation()?;
            Some(OptimizationResult {
                id: s.id().clone(),
                name: format!("Optimized Timetable {}", n + 1),
                score: e.score,
                conflicts: e.conflicts,
                utilization: e.utilization,
                faculty_workload: e.avg_workload.round().clamp(0.0, 100.0) as u32,
                status: ResultStatus::classify(e.score, e.conflicts),
                schedule: s.sessions().to_vec(),
                violations: e.violations.clone(),
                generation_details: details.clone(),
            })
        })
        .collect()
}

/// The single synthetic answer for a bundle that cannot be scheduled at all.
pub fn shortage_result(reason: &str, details: &GenerationDetails) -> OptimizationResult {
    OptimizationResult {
        id: ScheduleId("resource-shortage".into()),
        name: "Optimized Timetable 1".into(),
        score: 0,
        conflicts: 0,
        utilization: 0,
        faculty_workload: 0,
        status: ResultStatus::Infeasible,
        schedule: Vec::new(),
        violations: vec![ConstraintViolation {
            kind: ViolationKind::ResourceShortage,
            severity: Severity::Hard,
            penalty: 0,
            message: reason.to_string(),
            details: json!({}),
        }],
        generation_details: details.clone(),
    }
}
