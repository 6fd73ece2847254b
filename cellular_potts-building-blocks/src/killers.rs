use cellular_potts_concepts::{CellState, DeathError, Killer};

use serde::{Deserialize, Serialize};

/// Removes every cell whose centroid lies on the positive side of a plane.
///
/// A cell is marked for removal when
/// $(\vec{c} - \vec{p})\cdot\vec{n} > 0$
/// where $\vec{c}$ is the cell centroid, $\vec{p}$ a point on the plane and
/// $\vec{n}$ its outward normal. In one dimension this is a threshold, in two
/// dimensions a line.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneBasedKiller<const D: usize> {
    /// A point on the plane.
    pub point: [f64; D],
    /// Outward normal of the plane. Cells on this side are removed.
    pub normal: [f64; D],
}

impl<const D: usize> PlaneBasedKiller<D> {
    /// Constructs the killer from a point on the plane and its outward normal.
    pub fn new(point: [f64; D], normal: [f64; D]) -> Self {
        Self { point, normal }
    }
}

impl<const D: usize> Killer<D> for PlaneBasedKiller<D> {
    fn should_kill(&self, cell: &CellState<D>) -> Result<bool, DeathError> {
        let signed_distance: f64 = cell
            .centroid
            .iter()
            .zip(self.point.iter())
            .zip(self.normal.iter())
            .map(|((c, p), n)| (c - p) * n)
            .sum();
        Ok(signed_distance > 0.0)
    }
}

/// Removes cells which have been apoptotic for longer than a fixed duration.
///
/// This acts as a hard upper bound on the length of the death program,
/// independently of the per-cell duration recorded at apoptosis onset.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TimedApoptosisKiller {
    /// Maximum time a cell may remain apoptotic before forced removal.
    pub maximum_duration: f64,
}

impl TimedApoptosisKiller {
    /// Constructs the killer with the given maximum apoptosis duration.
    pub fn new(maximum_duration: f64) -> Self {
        Self { maximum_duration }
    }
}

impl<const D: usize> Killer<D> for TimedApoptosisKiller {
    fn should_kill(&self, cell: &CellState<D>) -> Result<bool, DeathError> {
        match cell.apoptosis {
            Some(info) => Ok(cell.time - info.started_at > self.maximum_duration),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellular_potts_concepts::ApoptosisInfo;

    fn state(centroid: [f64; 2]) -> CellState<2> {
        CellState {
            centroid,
            age: 1.0,
            time: 2.0,
            labelled: false,
            apoptosis: None,
        }
    }

    #[test]
    fn plane_killer_removes_only_positive_side() {
        let killer = PlaneBasedKiller::new([4.0, 0.0], [1.0, 0.0]);
        assert!(killer.should_kill(&state([5.0, 3.0])).unwrap());
        assert!(!killer.should_kill(&state([3.0, 3.0])).unwrap());
        assert!(!killer.should_kill(&state([4.0, 3.0])).unwrap());
    }

    #[test]
    fn timed_apoptosis_killer_checks_elapsed_time() {
        let killer = TimedApoptosisKiller::new(0.5);
        let mut cell = state([0.0, 0.0]);
        assert!(!Killer::<2>::should_kill(&killer, &cell).unwrap());
        cell.apoptosis = Some(ApoptosisInfo {
            started_at: 1.8,
            duration: 0.25,
        });
        assert!(!Killer::<2>::should_kill(&killer, &cell).unwrap());
        cell.apoptosis = Some(ApoptosisInfo {
            started_at: 1.0,
            duration: 0.25,
        });
        assert!(Killer::<2>::should_kill(&killer, &cell).unwrap());
    }
}
