use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use types::{Course, Instructor, ResourceBundle, Room, ScheduledSession, TimeSlot};

use crate::schedule::Schedule;

/// Read-only index over a resource bundle: what each gene may take.
pub struct SearchSpace<'a> {
    bundle: &'a ResourceBundle,
    courses: Vec<&'a Course>,
    course_by_id: HashMap<&'a str, &'a Course>,
    pool: HashMap<&'a str, Vec<&'a Instructor>>,
}

impl<'a> SearchSpace<'a> {
    pub fn new(bundle: &'a ResourceBundle) -> Self {
        let mut pool: HashMap<&str, Vec<&Instructor>> = HashMap::new();
        for i in &bundle.instructors {
            pool.entry(i.department.0.as_str()).or_default().push(i);
        }
        let courses: Vec<&Course> = sched_core::schedulable_courses(bundle).collect();
        let course_by_id = courses.iter().map(|&c| (c.id.0.as_str(), c)).collect();
        Self {
            bundle,
            courses,
            course_by_id,
            pool,
        }
    }

    /// Describes why no search can run, if that is the case.
    pub fn shortage(&self) -> Option<String> {
        let b = self.bundle;
        let mut missing = Vec::new();
        if b.courses.is_empty() {
            missing.push("courses");
        }
        if b.instructors.is_empty() {
            missing.push("instructors");
        } else if !b.courses.is_empty() && self.courses.is_empty() {
            missing.push("eligible instructors");
        }
        if b.rooms.is_empty() {
            missing.push("rooms");
        }
        if b.time_slots.is_empty() {
            missing.push("time slots");
        }
        (!missing.is_empty()).then(|| format!("no {} available", missing.join(", ")))
    }

    /// Courses that contribute sessions, in gene order.
    pub fn courses(&self) -> &[&'a Course] {
        &self.courses
    }

    pub fn session_count(&self) -> usize {
        self.courses
            .iter()
            .map(|c| c.required_sessions() as usize)
            .sum()
    }

    pub fn random_room<R: Rng>(&self, rng: &mut R) -> Option<&'a Room> {
        self.bundle.rooms.choose(rng)
    }

    pub fn random_slot<R: Rng>(&self, rng: &mut R) -> Option<&'a TimeSlot> {
        self.bundle.time_slots.choose(rng)
    }

    /// Any instructor from the course's own department.
    pub fn random_instructor<R: Rng>(
        &self,
        course_id: &str,
        rng: &mut R,
    ) -> Option<&'a Instructor> {
        let course = self.course_by_id.get(course_id)?;
        self.pool
            .get(course.department.0.as_str())?
            .choose(rng)
            .copied()
    }

    /// Uniformly random assignment of every required session. Infeasible
    /// combinations are left for the evaluator to penalise.
    pub fn random_schedule<R: Rng>(&self, generation: u32, rng: &mut R) -> Schedule {
        let mut sessions = Vec::with_capacity(self.session_count());
        for course in &self.courses {
            for _ in 0..course.required_sessions() {
                let (Some(instructor), Some(room), Some(slot)) = (
                    self.random_instructor(&course.id.0, rng),
                    self.random_room(rng),
                    self.random_slot(rng),
                ) else {
                    continue;
                };
                let mut session = ScheduledSession {
                    course_id: course.id.clone(),
                    instructor_id: instructor.id.clone(),
                    room_id: room.id.clone(),
                    time_slot_id: slot.id.clone(),
                    day: slot.day,
                    start: String::new(),
                    end: String::new(),
                    duration_minutes: 0,
                    students: course.students(),
                    section: course.section.clone(),
                };
                session.assign_slot(slot);
                sessions.push(session);
            }
        }
        Schedule::new(generation, sessions, rng)
    }

    pub fn initial_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Schedule> {
        (0..size).map(|_| self.random_schedule(0, rng)).collect()
    }
}
