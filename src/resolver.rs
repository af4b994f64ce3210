//! Iteration policy shared by the particle and rigid-body contact resolvers.
//!
//! Each iteration scans the whole batch, picks the contact with the most
//! negative separating velocity among those still closing or still
//! penetrating, and resolves only that one. Resolving a contact can disturb
//! its neighbours, so the batch is rescanned every time. The loop ends when
//! nothing qualifies or the iteration budget runs out.

use crate::math::{REAL_MAX, Real};
use log::debug;

/// How far a contact may be from consistent before it is worth resolving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Contacts separating slower than `-velocity` qualify.
    pub velocity: Real,
    /// Contacts penetrating deeper than `position` qualify.
    pub position: Real,
}

impl Tolerance {
    /// Any closing velocity or any penetration qualifies.
    pub const EXACT: Tolerance = Tolerance {
        velocity: 0.0,
        position: 0.0,
    };

    #[inline]
    pub fn qualifies(&self, separating_velocity: Real, penetration: Real) -> bool {
        separating_velocity < -self.velocity || penetration > self.position
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::EXACT
    }
}

/// A batch of contacts together with whatever they act on.
pub trait ContactBatch {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current separating velocity of contact `index`; negative means
    /// closing.
    fn separating_velocity(&self, index: usize) -> Real;

    /// Current penetration of contact `index`.
    fn penetration(&self, index: usize) -> Real;

    /// Resolve velocity and interpenetration of contact `index`.
    fn resolve(&mut self, index: usize, duration: Real);
}

/// Index of the contact to resolve next, or `None` if the batch is
/// consistent within `tolerance`.
pub fn worst_contact<B: ContactBatch + ?Sized>(batch: &B, tolerance: &Tolerance) -> Option<usize> {
    let mut max = REAL_MAX;
    let mut worst = None;
    for index in 0..batch.len() {
        let separating_velocity = batch.separating_velocity(index);
        if separating_velocity < max
            && tolerance.qualifies(separating_velocity, batch.penetration(index))
        {
            max = separating_velocity;
            worst = Some(index);
        }
    }
    worst
}

/// Run the worst-first loop for at most `iterations` resolutions. Returns
/// the number of iterations used.
pub fn resolve_worst_first<B: ContactBatch + ?Sized>(
    batch: &mut B,
    iterations: u32,
    tolerance: &Tolerance,
    duration: Real,
) -> u32 {
    let mut used = 0;
    while used < iterations {
        let Some(index) = worst_contact(batch, tolerance) else {
            return used;
        };
        batch.resolve(index, duration);
        used += 1;
    }

    if worst_contact(batch, tolerance).is_some() {
        debug!(
            "contact resolver: budget of {} iterations exhausted with {} contacts, batch left inconsistent",
            iterations,
            batch.len()
        );
    }
    used
}
