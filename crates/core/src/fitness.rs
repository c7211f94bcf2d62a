use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::json;
use types::{
    parse_clock, ConstraintKind, ConstraintViolation, OptimizationConfig, PenaltyWeights,
    ResourceBundle, ScheduledSession, Severity, ViolationKind,
};

use crate::schedulable_courses;

/// Derived quality figures of one candidate timetable.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub fitness: f64,
    pub score: u32,
    pub conflicts: u32,
    pub utilization: u32,
    /// Mean instructor load in percent of their weekly maximum.
    pub avg_workload: f64,
    pub total_penalty: i64,
    pub hard_violations: u32,
    pub soft_violations: u32,
    pub violations: Vec<ConstraintViolation>,
}

enum SoftRule<'a> {
    Unavailable {
        weight: f64,
        instructor: &'a str,
        slots: HashSet<&'a str>,
    },
    Lunch {
        weight: f64,
        start: u32,
        end: u32,
    },
}

/// Scores sessions against one resource bundle.
///
/// Built once per run and shared read-only by every evaluation, so it can be
/// handed to worker threads as `&Evaluator`.
pub struct Evaluator<'a> {
    penalties: PenaltyWeights,
    course_count: usize,
    grid_cells: usize,
    room_capacity: HashMap<&'a str, u32>,
    max_hours: Vec<(&'a str, f64)>,
    soft: Vec<SoftRule<'a>>,
    unenforced: Vec<ConstraintViolation>,
}

impl<'a> Evaluator<'a> {
    pub fn new(bundle: &'a ResourceBundle, config: &OptimizationConfig) -> Self {
        let room_capacity = bundle
            .rooms
            .iter()
            .map(|r| (r.id.0.as_str(), r.capacity))
            .collect();
        let max_hours = bundle
            .instructors
            .iter()
            .map(|i| (i.id.0.as_str(), i.max_hours_per_week as f64))
            .collect();

        let mut soft = Vec::new();
        let mut unenforced = Vec::new();
        for c in bundle.constraints.iter().filter(|c| c.enabled) {
            match &c.kind {
                k if k.is_built_in() => {}
                ConstraintKind::InstructorAvailability {
                    instructor_id,
                    unavailable_slots,
                } => soft.push(SoftRule::Unavailable {
                    weight: soft_weight(c.weight),
                    instructor: instructor_id.0.as_str(),
                    slots: unavailable_slots.iter().map(|s| s.0.as_str()).collect(),
                }),
                ConstraintKind::LunchBreak { start, end } => {
                    // Malformed windows are reported by validate_bundle; here they never match.
                    if let (Some(start), Some(end)) = (parse_clock(start), parse_clock(end)) {
                        soft.push(SoftRule::Lunch {
                            weight: soft_weight(c.weight),
                            start,
                            end,
                        });
                    }
                }
                ConstraintKind::Custom { kind, params } => unenforced.push(ConstraintViolation {
                    kind: ViolationKind::Unenforced,
                    severity: Severity::Info,
                    penalty: 0,
                    message: format!("constraint {} ({kind}) is not interpreted", c.id),
                    details: json!({ "constraintId": c.id, "kind": kind, "params": params }),
                }),
                _ => {}
            }
        }

        Self {
            penalties: config.penalties.clone(),
            course_count: schedulable_courses(bundle).count(),
            grid_cells: bundle.rooms.len()
                * bundle.time_slots.len()
                * config.working_days as usize,
            room_capacity,
            max_hours,
            soft,
            unenforced,
        }
    }

    pub fn evaluate(&self, sessions: &[ScheduledSession]) -> Evaluation {
        let mut violations = Vec::new();

        let conflicts = self.detect_conflicts(sessions, &mut violations);
        let avg_workload = self.check_workload(sessions, &mut violations);
        self.check_capacity(sessions, &mut violations);
        self.check_soft(sessions, &mut violations);
        violations.extend(self.unenforced.iter().cloned());

        let total_penalty = violations
            .iter()
            .fold(0i64, |acc, v| acc.saturating_add(v.penalty));
        let baseline = self.course_count as f64 * self.penalties.normalization;
        let fitness = if baseline > 0.0 {
            (1.0 - total_penalty as f64 / baseline).clamp(0.0, 1.0)
        } else if total_penalty == 0 {
            1.0
        } else {
            0.0
        };

        let occupied: HashSet<(&str, &str)> = sessions
            .iter()
            .map(|s| (s.room_id.0.as_str(), s.time_slot_id.0.as_str()))
            .collect();
        let utilization = if self.grid_cells == 0 {
            0
        } else {
            ((occupied.len() as f64 / self.grid_cells as f64) * 100.0)
                .round()
                .min(100.0) as u32
        };

        let hard_violations = violations
            .iter()
            .filter(|v| v.severity == Severity::Hard)
            .count() as u32;
        let soft_violations = violations
            .iter()
            .filter(|v| v.severity == Severity::Soft)
            .count() as u32;

        Evaluation {
            fitness,
            score: (fitness * 100.0).round() as u32,
            conflicts,
            utilization,
            avg_workload,
            total_penalty,
            hard_violations,
            soft_violations,
            violations,
        }
    }

    /// Each unordered pair sharing day and slot plus a room or an instructor
    /// counts once.
    fn detect_conflicts(
        &self,
        sessions: &[ScheduledSession],
        out: &mut Vec<ConstraintViolation>,
    ) -> u32 {
        let mut conflicts = 0u32;
        for (i, a) in sessions.iter().enumerate() {
            for b in &sessions[i + 1..] {
                if a.day != b.day || a.time_slot_id != b.time_slot_id {
                    continue;
                }
                let same_room = a.room_id == b.room_id;
                let same_instructor = a.instructor_id == b.instructor_id;
                if !(same_room || same_instructor) {
                    continue;
                }
                conflicts += 1;
                let what = match (same_room, same_instructor) {
                    (true, true) => "room and instructor",
                    (true, false) => "room",
                    _ => "instructor",
                };
                out.push(ConstraintViolation {
                    kind: ViolationKind::ScheduleConflict,
                    severity: Severity::Hard,
                    penalty: self.penalties.conflict.round() as i64,
                    message: format!(
                        "{what} double-booked in slot {}: {} and {}",
                        a.time_slot_id, a.course_id, b.course_id
                    ),
                    details: json!({
                        "timeSlotId": a.time_slot_id,
                        "courses": [a.course_id, b.course_id],
                        "roomId": same_room.then(|| &a.room_id),
                        "instructorId": same_instructor.then(|| &a.instructor_id),
                    }),
                });
            }
        }
        conflicts
    }

    fn check_workload(
        &self,
        sessions: &[ScheduledSession],
        out: &mut Vec<ConstraintViolation>,
    ) -> f64 {
        let mut hours: HashMap<&str, f64> = HashMap::new();
        for s in sessions {
            *hours.entry(s.instructor_id.0.as_str()).or_default() += s.hours();
        }

        let mut load_sum = 0.0;
        let mut counted = 0usize;
        for &(id, max) in &self.max_hours {
            let assigned = hours.get(id).copied().unwrap_or(0.0);
            if max > 0.0 {
                load_sum += assigned / max * 100.0;
                counted += 1;
            }
            if assigned > max {
                let excess = assigned - max;
                out.push(ConstraintViolation {
                    kind: ViolationKind::WorkloadExceeded,
                    severity: Severity::Hard,
                    penalty: (excess * self.penalties.workload_per_hour).round() as i64,
                    message: format!(
                        "instructor {id} assigned {assigned:.1}h, limit {max:.0}h"
                    ),
                    details: json!({
                        "instructorId": id,
                        "assignedHours": assigned,
                        "maxHours": max,
                    }),
                });
            }
        }
        if counted == 0 {
            0.0
        } else {
            load_sum / counted as f64
        }
    }

    fn check_capacity(&self, sessions: &[ScheduledSession], out: &mut Vec<ConstraintViolation>) {
        for s in sessions {
            let Some(&capacity) = self.room_capacity.get(s.room_id.0.as_str()) else {
                continue;
            };
            if s.students <= capacity {
                continue;
            }
            let excess = s.students - capacity;
            out.push(ConstraintViolation {
                kind: ViolationKind::CapacityExceeded,
                severity: Severity::Hard,
                penalty: (excess as f64 * self.penalties.capacity_per_student).round() as i64,
                message: format!(
                    "course {} has {} students, room {} seats {}",
                    s.course_id, s.students, s.room_id, capacity
                ),
                details: json!({
                    "courseId": s.course_id,
                    "roomId": s.room_id,
                    "students": s.students,
                    "capacity": capacity,
                }),
            });
        }
    }

    fn check_soft(&self, sessions: &[ScheduledSession], out: &mut Vec<ConstraintViolation>) {
        for rule in &self.soft {
            for s in sessions {
                match rule {
                    SoftRule::Unavailable {
                        weight,
                        instructor,
                        slots,
                    } => {
                        if s.instructor_id.0 != *instructor
                            || !slots.contains(s.time_slot_id.0.as_str())
                        {
                            continue;
                        }
                        out.push(ConstraintViolation {
                            kind: ViolationKind::InstructorUnavailable,
                            severity: Severity::Soft,
                            penalty: weight.round() as i64,
                            message: format!(
                                "instructor {instructor} is unavailable in slot {}",
                                s.time_slot_id
                            ),
                            details: json!({
                                "instructorId": instructor,
                                "timeSlotId": s.time_slot_id,
                                "courseId": s.course_id,
                            }),
                        });
                    }
                    SoftRule::Lunch { weight, start, end } => {
                        let (Some(s0), Some(s1)) = (parse_clock(&s.start), parse_clock(&s.end))
                        else {
                            continue;
                        };
                        if s0 >= *end || s1 <= *start {
                            continue;
                        }
                        out.push(ConstraintViolation {
                            kind: ViolationKind::LunchBreak,
                            severity: Severity::Soft,
                            penalty: weight.round() as i64,
                            message: format!(
                                "course {} overlaps the lunch break in slot {}",
                                s.course_id, s.time_slot_id
                            ),
                            details: json!({
                                "courseId": s.course_id,
                                "timeSlotId": s.time_slot_id,
                            }),
                        });
                    }
                }
            }
        }
    }
}

/// Negative or non-finite weights never reward a schedule.
fn soft_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}
