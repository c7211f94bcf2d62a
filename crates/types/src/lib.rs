use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}
id_newtype!(CourseId);
id_newtype!(InstructorId);
id_newtype!(RoomId);
id_newtype!(TimeSlotId);
id_newtype!(DepartmentId);
id_newtype!(ConstraintId);
id_newtype!(ScheduleId);

/// Sessions per course are capped regardless of credit count.
pub const MAX_SESSIONS_PER_COURSE: u32 = 5;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

/// Parses `HH:MM` into minutes after midnight.
pub fn parse_clock(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    #[serde(default)]
    pub name: String,
    pub department: DepartmentId,
    pub credits: u32,
    pub max_students: u32,
    /// Students actually enrolled; defaults to `max_students` when absent.
    #[serde(default)]
    pub enrolled: Option<u32>,
    #[serde(default = "default_section")]
    pub section: String,
}

fn default_section() -> String {
    "A".into()
}

impl Course {
    pub fn required_sessions(&self) -> u32 {
        self.credits.min(MAX_SESSIONS_PER_COURSE)
    }

    pub fn students(&self) -> u32 {
        self.enrolled.unwrap_or(self.max_students)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub id: InstructorId,
    #[serde(default)]
    pub name: String,
    pub department: DepartmentId,
    pub max_hours_per_week: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub building: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub day: DayOfWeek,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
    pub duration_minutes: u32,
}

impl TimeSlot {
    pub fn hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hard,
    Soft,
    Info,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConstraintKind {
    RoomCapacity,
    InstructorWorkload,
    NoRoomDoubleBooking,
    NoInstructorDoubleBooking,
    #[serde(rename_all = "camelCase")]
    InstructorAvailability {
        instructor_id: InstructorId,
        #[serde(default)]
        unavailable_slots: Vec<TimeSlotId>,
    },
    LunchBreak {
        start: String,
        end: String,
    },
    Custom {
        kind: String,
        #[serde(default)]
        params: serde_json::Map<String, serde_json::Value>,
    },
}

impl ConstraintKind {
    /// The four rules the evaluator always enforces.
    pub fn is_built_in(&self) -> bool {
        matches!(
            self,
            Self::RoomCapacity
                | Self::InstructorWorkload
                | Self::NoRoomDoubleBooking
                | Self::NoInstructorDoubleBooking
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub id: ConstraintId,
    #[serde(default)]
    pub name: String,
    pub severity: Severity,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

fn default_weight() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

/// One course session pinned to an instructor, a room and a time slot.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSession {
    pub course_id: CourseId,
    pub instructor_id: InstructorId,
    pub room_id: RoomId,
    pub time_slot_id: TimeSlotId,
    pub day: DayOfWeek,
    pub start: String,
    pub end: String,
    pub duration_minutes: u32,
    pub students: u32,
    pub section: String,
}

impl ScheduledSession {
    /// Moves the session to `slot`, keeping the derived timing fields in step.
    pub fn assign_slot(&mut self, slot: &TimeSlot) {
        self.time_slot_id = slot.id.clone();
        self.day = slot.day;
        self.start = slot.start.clone();
        self.end = slot.end.clone();
        self.duration_minutes = slot.duration_minutes;
    }

    pub fn hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBundle {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub instructors: Vec<Instructor>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PenaltyWeights {
    pub conflict: f64,
    pub workload_per_hour: f64,
    pub capacity_per_student: f64,
    /// Per-course penalty baseline in the fitness denominator.
    pub normalization: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            conflict: 10.0,
            workload_per_hour: 5.0,
            capacity_per_student: 2.0,
            normalization: 10.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizationConfig {
    pub population_size: usize,
    pub generations: u32,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub elitism_rate: f64,
    pub max_runtime_ms: u64,
    pub target_fitness: Option<f64>,
    pub tournament_size: usize,
    /// Share of session indices taken from the second parent.
    pub crossover_fraction: f64,
    /// Share of sessions perturbed when mutation fires.
    pub mutation_fraction: f64,
    pub result_count: usize,
    pub working_days: u32,
    pub parallel_evaluation: bool,
    pub seed: Option<u64>,
    pub penalties: PenaltyWeights,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            elitism_rate: 0.1,
            max_runtime_ms: 30_000,
            target_fitness: Some(0.9),
            tournament_size: 3,
            crossover_fraction: 0.3,
            mutation_fraction: 0.1,
            result_count: 5,
            working_days: 5,
            parallel_evaluation: true,
            seed: None,
            penalties: PenaltyWeights::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    #[serde(default)]
    pub config: OptimizationConfig,
    pub resources: ResourceBundle,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    ScheduleConflict,
    WorkloadExceeded,
    CapacityExceeded,
    InstructorUnavailable,
    LunchBreak,
    Unenforced,
    ResourceShortage,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub penalty: i64,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Optimal,
    Good,
    Acceptable,
    Infeasible,
}

impl ResultStatus {
    /// First matching band wins.
    pub fn classify(score: u32, conflicts: u32) -> Self {
        if score >= 85 && conflicts == 0 {
            Self::Optimal
        } else if score >= 70 && conflicts <= 3 {
            Self::Good
        } else if score >= 55 && conflicts <= 7 {
            Self::Acceptable
        } else {
            Self::Infeasible
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    MaxGenerations,
    TargetFitness,
    TimeLimit,
    Cancelled,
    ResourceShortage,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDetails {
    pub total_generations: u32,
    pub convergence_generation: u32,
    pub final_fitness: f64,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub id: ScheduleId,
    pub name: String,
    pub score: u32,
    pub conflicts: u32,
    pub utilization: u32,
    pub faculty_workload: u32,
    pub status: ResultStatus,
    pub schedule: Vec<ScheduledSession>,
    pub violations: Vec<ConstraintViolation>,
    pub generation_details: GenerationDetails,
}

/// One observation per generation, reported to the caller's progress sink.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub progress_percent: f64,
    pub generation: u32,
    pub best_fitness: f64,
}
