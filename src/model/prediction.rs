use serde::{Deserialize, Serialize};

/// Output of one potential evaluation on one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub energy: f64,
    pub forces: Vec<[f64; 3]>,
}

impl Prediction {
    pub fn new(energy: f64, forces: Vec<[f64; 3]>) -> Self {
        Self { energy, forces }
    }

    /// Largest per-atom force magnitude, `0.0` when there are no forces.
    pub fn max_force(&self) -> f64 {
        max_norm(&self.forces)
    }
}

fn max_norm(forces: &[[f64; 3]]) -> f64 {
    forces
        .iter()
        .map(|f| (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt())
        .fold(0.0, f64::max)
}

/// Ordered predictions of one ensemble member over the whole evaluation
/// set, stored as two parallel sequences.
///
/// This is the artifact handed from the runner to the aggregator. Index
/// `i` of `energy` and `forces` always refers to structure `i` of the
/// evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberResult {
    pub ensemble: String,
    pub member: String,
    pub energy: Vec<f64>,
    pub forces: Vec<Vec<[f64; 3]>>,
}

impl MemberResult {
    pub fn new(ensemble: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            ensemble: ensemble.into(),
            member: member.into(),
            energy: Vec::new(),
            forces: Vec::new(),
        }
    }

    pub fn with_capacity(ensemble: impl Into<String>, member: impl Into<String>, n: usize) -> Self {
        Self {
            ensemble: ensemble.into(),
            member: member.into(),
            energy: Vec::with_capacity(n),
            forces: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, prediction: Prediction) {
        self.energy.push(prediction.energy);
        self.forces.push(prediction.forces);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }

    /// Both parallel sequences have one entry per structure.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.energy.len() == self.forces.len()
    }

    pub fn max_forces(&self) -> Vec<f64> {
        self.forces.iter().map(|f| max_norm(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_force_picks_largest_magnitude() {
        let p = Prediction::new(0.0, vec![[3.0, 4.0, 0.0], [0.0, 0.0, -6.0], [1.0, 1.0, 1.0]]);
        assert_eq!(p.max_force(), 6.0);
        assert_eq!(Prediction::new(1.0, Vec::new()).max_force(), 0.0);
    }

    #[test]
    fn push_keeps_sequences_parallel() {
        let mut r = MemberResult::new("deep", "0");
        assert!(r.is_empty());
        r.push(Prediction::new(-1.5, vec![[0.0, 0.0, 1.0]]));
        r.push(Prediction::new(-2.5, vec![]));
        assert_eq!(r.len(), 2);
        assert!(r.is_consistent());
        assert_eq!(r.max_forces(), vec![1.0, 0.0]);
    }
}
