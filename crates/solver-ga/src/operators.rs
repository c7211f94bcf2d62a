//! Selection, crossover and mutation over [`Schedule`]s.
//!
//! Every operator writes into freshly owned session vectors; parents are
//! only ever read.

use rand::seq::index;
use rand::Rng;

use crate::schedule::Schedule;
use crate::space::SearchSpace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Perturbation {
    TimeSlot,
    Room,
    Instructor,
}

impl Perturbation {
    fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..3) {
            0 => Self::TimeSlot,
            1 => Self::Room,
            _ => Self::Instructor,
        }
    }
}

/// Number of genes touched when an operator fires on `len` sessions.
fn share(len: usize, fraction: f64) -> usize {
    ((len as f64 * fraction).round() as usize).clamp(1, len)
}

/// Fittest of `k` distinct members drawn uniformly. `population` must be
/// non-empty.
pub fn tournament<'p, R: Rng>(population: &'p [Schedule], k: usize, rng: &mut R) -> &'p Schedule {
    let k = k.clamp(1, population.len());
    let mut best: Option<&Schedule> = None;
    for i in index::sample(rng, population.len(), k).iter() {
        let c = &population[i];
        let fc = c.fitness().unwrap_or(f64::NEG_INFINITY);
        if best.map_or(true, |b| fc > b.fitness().unwrap_or(f64::NEG_INFINITY)) {
            best = Some(c);
        }
    }
    best.unwrap_or(&population[0])
}

/// Index-aligned uniform crossover. With probability `rate` the child is `a`
/// with a random `fraction` of its positions taken from `b`; otherwise it is a
/// plain copy of `a`. The child always gets a fresh id.
pub fn crossover<R: Rng>(
    a: &Schedule,
    b: &Schedule,
    rate: f64,
    fraction: f64,
    generation: u32,
    rng: &mut R,
) -> Schedule {
    let mut sessions = a.sessions().to_vec();
    let len = sessions.len();
    if rng.gen_bool(rate) && len > 0 && b.sessions().len() == len {
        for i in index::sample(rng, len, share(len, fraction)).iter() {
            sessions[i] = b.sessions()[i].clone();
        }
    }
    Schedule::new(generation, sessions, rng)
}

/// With probability `rate`, perturbs a random `fraction` of the sessions.
/// Returns whether anything was touched.
pub fn mutate<R: Rng>(
    child: &mut Schedule,
    space: &SearchSpace<'_>,
    rate: f64,
    fraction: f64,
    rng: &mut R,
) -> bool {
    let len = child.sessions().len();
    if len == 0 || !rng.gen_bool(rate) {
        return false;
    }
    let picks = index::sample(rng, len, share(len, fraction));
    let sessions = child.sessions_mut();
    for i in picks.iter() {
        let session = &mut sessions[i];
        match Perturbation::random(rng) {
            Perturbation::TimeSlot => {
                if let Some(slot) = space.random_slot(rng) {
                    session.assign_slot(slot);
                }
            }
            Perturbation::Room => {
                if let Some(room) = space.random_room(rng) {
                    session.room_id = room.id.clone();
                }
            }
            Perturbation::Instructor => {
                if let Some(instructor) = space.random_instructor(&session.course_id.0, rng) {
                    session.instructor_id = instructor.id.clone();
                }
            }
        }
    }
    true
}
