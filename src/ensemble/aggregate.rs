//! Ensemble aggregation: per-point spread across members.
//!
//! For one ensemble and one property the aggregator
//!
//! 1. loads the `N` member result sequences and checks they all have the
//!    same length `L`,
//! 2. for energies, subtracts from every member its own minimum over the
//!    `L` points (one scalar offset per member),
//! 3. takes the mean and the *population* variance (divisor `N`) across
//!    members at every point,
//! 4. reduces the per-point standard deviations to their arithmetic mean.
//!
//! The reduction is a pure function of its inputs. Summation always runs
//! in member order, so repeated runs are bit-identical.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::config::{EnsembleConfig, MIN_MEMBERS, Property};
use super::error::Error;
use crate::io;
use crate::model::prediction::MemberResult;

/// Per-point and summary statistics of one ensemble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleSummary {
    pub ensemble: String,
    pub property: Property,
    pub members: usize,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub std: Vec<f64>,
    /// Arithmetic mean of `std` over all points.
    pub mean_std: f64,
}

impl EnsembleSummary {
    #[inline]
    pub fn len(&self) -> usize {
        self.std.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.std.is_empty()
    }

    pub fn max_std(&self) -> f64 {
        self.std.iter().copied().fold(0.0, f64::max)
    }

    /// Index of the first point with the largest spread, if any.
    pub fn most_uncertain(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &s) in self.std.iter().enumerate() {
            if best.is_none_or(|(_, b)| s > b) {
                best = Some((i, s));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Subtracts the minimum of `values` from every entry.
///
/// The entry (or entries) holding the minimum become exactly zero.
pub fn baseline_correct(values: &[f64]) -> Vec<f64> {
    let offset = values.iter().copied().fold(f64::INFINITY, f64::min);
    values.iter().map(|v| v - offset).collect()
}

/// Mean, population variance and standard deviation at every point.
///
/// `columns[m][i]` is the value of member `m` at point `i`. All columns
/// must have the same length; the caller checks alignment.
fn point_statistics(columns: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = columns.len() as f64;
    let len = columns.first().map_or(0, Vec::len);

    let mut mean = Vec::with_capacity(len);
    let mut variance = Vec::with_capacity(len);
    let mut std = Vec::with_capacity(len);

    for i in 0..len {
        let mu = columns.iter().map(|c| c[i]).sum::<f64>() / n;
        let var = columns
            .iter()
            .map(|c| {
                let d = c[i] - mu;
                d * d
            })
            .sum::<f64>()
            / n;
        mean.push(mu);
        variance.push(var);
        std.push(var.sqrt());
    }

    (mean, variance, std)
}

/// Aggregates already-loaded member results.
///
/// `expected_len`, when known, is the size of the evaluation set; every
/// member must match it. Otherwise the first member sets the length.
pub fn aggregate(
    ensemble: &str,
    property: Property,
    members: &[MemberResult],
    expected_len: Option<usize>,
) -> Result<EnsembleSummary, Error> {
    if members.len() < MIN_MEMBERS {
        return Err(Error::config(format!(
            "ensemble '{ensemble}' needs at least {MIN_MEMBERS} members to estimate a spread, got {}",
            members.len()
        )));
    }

    let expected = expected_len.unwrap_or_else(|| members[0].len());
    for member in members {
        if member.len() != expected || !member.is_consistent() {
            let found = if member.len() != expected {
                member.len()
            } else {
                member.forces.len()
            };
            return Err(Error::alignment(&member.member, expected, found));
        }
    }
    if expected == 0 {
        return Err(Error::config(format!(
            "ensemble '{ensemble}' has no predictions to aggregate"
        )));
    }

    let columns: Vec<Vec<f64>> = members
        .iter()
        .map(|m| {
            let raw = property.values(m);
            if property.baseline_corrected() {
                baseline_correct(&raw)
            } else {
                raw
            }
        })
        .collect();

    let (mean, variance, std) = point_statistics(&columns);
    let mean_std = std.iter().sum::<f64>() / std.len() as f64;

    info!(
        ensemble,
        property = %property,
        members = members.len(),
        points = std.len(),
        mean_std,
        "Aggregated ensemble"
    );

    Ok(EnsembleSummary {
        ensemble: ensemble.to_string(),
        property,
        members: members.len(),
        mean,
        variance,
        std,
        mean_std,
    })
}

/// Loads every member's persisted predictions from `dir`, in configured
/// order.
pub fn load_members(config: &EnsembleConfig, dir: &Path) -> Result<Vec<MemberResult>, Error> {
    config
        .members
        .iter()
        .map(|spec| {
            let result = io::load_member_result(dir, &config.name, &spec.id).map_err(|source| {
                Error::Predictions {
                    member: spec.id.clone(),
                    path: io::artifact_path(dir, &config.name, &spec.id),
                    source,
                }
            })?;
            debug!(
                ensemble = %config.name,
                member = %spec.id,
                points = result.len(),
                "Loaded member predictions"
            );
            Ok(result)
        })
        .collect()
}

/// Loads and aggregates one configured ensemble from its persisted
/// predictions.
pub fn aggregate_ensemble(
    config: &EnsembleConfig,
    dir: &Path,
    expected_len: Option<usize>,
) -> Result<EnsembleSummary, Error> {
    config.validate()?;
    let members = load_members(config, dir)?;
    aggregate(&config.name, config.property, &members, expected_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::config::MemberSpec;
    use crate::ensemble::error::ErrorKind;
    use crate::model::prediction::Prediction;

    fn member(id: &str, energies: &[f64]) -> MemberResult {
        let mut r = MemberResult::new("deep", id);
        for &e in energies {
            r.push(Prediction::new(e, vec![[0.0; 3]]));
        }
        r
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn baseline_correction_anchors_each_member_at_its_minimum() {
        assert_eq!(baseline_correct(&[5.0, 3.0, 7.0]), vec![2.0, 0.0, 4.0]);
        assert!(baseline_correct(&[]).is_empty());
    }

    #[test]
    fn uses_population_variance() {
        // At point 0 the corrected values are 1, 2, 3; point 1 anchors every member.
        let members = [
            member("0", &[1.0, 0.0]),
            member("1", &[2.0, 0.0]),
            member("2", &[3.0, 0.0]),
        ];
        let s = aggregate("deep", Property::Energy, &members, None).unwrap();

        assert!(close(s.mean[0], 2.0));
        assert!(close(s.variance[0], 2.0 / 3.0));
        assert!(close(s.std[0], (2.0f64 / 3.0).sqrt()));
        assert!((s.std[0] - 0.816_496_580_927_726).abs() < 1e-12);
        assert_eq!(s.std[1], 0.0);
    }

    #[test]
    fn offset_is_per_member_not_global() {
        // Same shape, different absolute reference: no spread at all.
        let members = [
            member("0", &[-100.0, -99.5, -98.0]),
            member("1", &[-7.0, -6.5, -5.0]),
            member("2", &[3.0, 3.5, 5.0]),
        ];
        let s = aggregate("deep", Property::Energy, &members, None).unwrap();
        assert!(s.std.iter().all(|&v| v == 0.0));
        assert_eq!(s.mean_std, 0.0);
        assert_eq!(s.mean, vec![0.0, 0.5, 2.0]);
    }

    #[test]
    fn identical_members_have_zero_spread() {
        let e = [1.5, -2.25, 0.125, 9.0];
        let members = [member("0", &e), member("1", &e)];
        let s = aggregate("deep", Property::Energy, &members, Some(4)).unwrap();
        assert_eq!(s.len(), 4);
        assert!(s.std.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn outputs_have_one_entry_per_point_and_non_negative_std() {
        let members = [
            member("0", &[0.3, -1.2, 4.4, 2.0, 0.0]),
            member("1", &[1.3, 0.2, -4.4, 2.5, 0.1]),
            member("2", &[-0.7, 3.2, 1.4, 2.0, 9.0]),
        ];
        let s = aggregate("deep", Property::Energy, &members, None).unwrap();
        assert_eq!(s.mean.len(), 5);
        assert_eq!(s.variance.len(), 5);
        assert_eq!(s.std.len(), 5);
        assert!(s.std.iter().all(|&v| v >= 0.0));
        assert_eq!(s.members, 3);
    }

    #[test]
    fn unequal_lengths_are_an_alignment_error() {
        let members = [member("0", &[0.0; 10]), member("1", &[0.0; 9])];
        let err = aggregate("deep", Property::Energy, &members, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Alignment);
        assert!(matches!(
            err,
            Error::Alignment { ref member, expected: 10, found: 9 } if member == "1"
        ));
    }

    #[test]
    fn length_must_match_the_evaluation_set() {
        let members = [member("0", &[0.0; 3]), member("1", &[0.0; 3])];
        let err = aggregate("deep", Property::Energy, &members, Some(4)).unwrap_err();
        assert!(matches!(err, Error::Alignment { expected: 4, found: 3, .. }));
    }

    #[test]
    fn inconsistent_member_is_an_alignment_error() {
        let mut broken = member("1", &[0.0, 1.0]);
        broken.forces.pop();
        let members = [member("0", &[0.0, 1.0]), broken];
        let err = aggregate("deep", Property::Energy, &members, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Alignment);
    }

    #[test]
    fn fewer_than_two_members_is_a_config_error() {
        let err = aggregate("deep", Property::Energy, &[member("0", &[1.0])], None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = aggregate("deep", Property::Energy, &[], None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn empty_predictions_are_rejected() {
        let members = [member("0", &[]), member("1", &[])];
        let err = aggregate("deep", Property::Energy, &members, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    /// Five members over 100 points. Member `m` predicts
    /// `c_m + 10·i + k_m·g(i)` with `k = [-2, -1, 0, 1, 2]` and
    /// `g(i) = 0.01·(i mod 4)`. Every member's minimum sits at `i = 0`, so
    /// after correction the spread at `i` is `g(i)·popstd(k) = g(i)·√2` and
    /// the mean over the 100 points is `0.015·√2`.
    fn regression_members() -> Vec<MemberResult> {
        let offsets = [-1042.5, -1040.0, -998.75, -1100.125, -1011.0];
        let slopes = [-2.0, -1.0, 0.0, 1.0, 2.0];
        (0..5)
            .map(|m| {
                let energies: Vec<f64> = (0..100)
                    .map(|i| {
                        let g = 0.01 * (i % 4) as f64;
                        offsets[m] + 10.0 * i as f64 + slopes[m] * g
                    })
                    .collect();
                member(&m.to_string(), &energies)
            })
            .collect()
    }

    #[test]
    fn five_member_regression_fixture() {
        let members = regression_members();
        let s = aggregate("deep", Property::Energy, &members, Some(100)).unwrap();

        assert_eq!(s.len(), 100);
        let expected = 0.015 * 2f64.sqrt();
        assert!(
            (s.mean_std - expected).abs() < 1e-9,
            "mean_std {} vs {expected}",
            s.mean_std
        );
        for i in 0..100 {
            let g = 0.01 * (i % 4) as f64;
            assert!((s.std[i] - g * 2f64.sqrt()).abs() < 1e-9, "point {i}");
            assert!((s.mean[i] - 10.0 * i as f64).abs() < 1e-9, "point {i}");
        }
        assert_eq!(s.most_uncertain().map(|i| i % 4), Some(3));
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let members = regression_members();
        let a = aggregate("deep", Property::Energy, &members, None).unwrap();
        let b = aggregate("deep", Property::Energy, &members, None).unwrap();

        assert_eq!(a.mean_std.to_bits(), b.mean_std.to_bits());
        for (x, y) in a.std.iter().zip(&b.std) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        for (x, y) in a.variance.iter().zip(&b.variance) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        for (x, y) in a.mean.iter().zip(&b.mean) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn max_force_uses_raw_values() {
        let mut a = MemberResult::new("deep", "0");
        a.push(Prediction::new(0.0, vec![[3.0, 4.0, 0.0]]));
        a.push(Prediction::new(0.0, vec![[1.0, 0.0, 0.0]]));
        let mut b = MemberResult::new("deep", "1");
        b.push(Prediction::new(0.0, vec![[0.0, 0.0, 7.0]]));
        b.push(Prediction::new(0.0, vec![[0.0, 3.0, 0.0]]));

        let s = aggregate("deep", Property::MaxForce, &[a, b], None).unwrap();
        assert_eq!(s.mean, vec![6.0, 2.0]);
        assert_eq!(s.std, vec![1.0, 1.0]);
        assert_eq!(s.mean_std, 1.0);
    }

    #[test]
    fn aggregates_persisted_members_and_reports_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let members = regression_members();
        for m in &members {
            io::save_member_result(dir.path(), m).unwrap();
        }

        let specs: Vec<_> = (0..5)
            .map(|m| MemberSpec::new(m.to_string(), format!("model_{m}.toml")))
            .collect();
        let config = EnsembleConfig::new("deep", specs.clone(), "unused.xyz");

        let from_disk = aggregate_ensemble(&config, dir.path(), Some(100)).unwrap();
        let in_memory = aggregate("deep", Property::Energy, &members, Some(100)).unwrap();
        assert_eq!(from_disk, in_memory);

        let mut extra = specs;
        extra.push(MemberSpec::new("5", "model_5.toml"));
        let config = EnsembleConfig::new("deep", extra, "unused.xyz");
        let err = aggregate_ensemble(&config, dir.path(), None).unwrap_err();
        assert!(matches!(err, Error::Predictions { ref member, .. } if member == "5"));
        assert_eq!(err.kind(), ErrorKind::Load);
    }
}
