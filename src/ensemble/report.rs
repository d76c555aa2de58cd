//! Reporting of aggregated ensembles.
//!
//! A [`ComparisonRow`] is the one-line result of an ensemble: its mean σ
//! and, when configured, the published reference it is checked against.
//! Rows are handed to a [`Reporter`] sink; the library ships a tracing sink
//! and a JSON sink, front ends add their own.

use std::io::{self, Write};

use serde::Serialize;
use tracing::{info, warn};

use super::aggregate::EnsembleSummary;
use super::config::Property;

/// Summary line of one aggregated ensemble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub ensemble: String,
    pub property: Property,
    pub members: usize,
    pub points: usize,
    pub mean_std: f64,
    pub max_std: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<f64>,
}

impl ComparisonRow {
    pub fn from_summary(summary: &EnsembleSummary, reference: Option<f64>) -> Self {
        Self {
            ensemble: summary.ensemble.clone(),
            property: summary.property,
            members: summary.members,
            points: summary.len(),
            mean_std: summary.mean_std,
            max_std: summary.max_std(),
            reference,
        }
    }

    /// `mean_std - reference`, when a reference is set.
    pub fn deviation(&self) -> Option<f64> {
        self.reference.map(|r| self.mean_std - r)
    }

    /// Deviation relative to the reference, when the reference is non-zero.
    pub fn relative_deviation(&self) -> Option<f64> {
        match self.reference {
            Some(r) if r != 0.0 => Some((self.mean_std - r) / r),
            _ => None,
        }
    }

    /// Whether the value reproduces the reference within `tolerance`
    /// (relative). Rows without a reference always agree.
    pub fn agrees(&self, tolerance: f64) -> bool {
        match (self.reference, self.relative_deviation()) {
            (None, _) => true,
            (Some(_), Some(rel)) => rel.abs() <= tolerance,
            (Some(_), None) => self.mean_std == 0.0,
        }
    }
}

/// A sink for comparison rows.
pub trait Reporter {
    fn emit(&mut self, row: &ComparisonRow) -> io::Result<()>;

    /// Called once after the last row.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Emits every row as a structured tracing event.
#[derive(Debug, Clone, Copy)]
pub struct LogReporter {
    /// Relative tolerance above which a reference mismatch is a warning.
    pub tolerance: f64,
}

impl Default for LogReporter {
    fn default() -> Self {
        Self { tolerance: 0.05 }
    }
}

impl Reporter for LogReporter {
    fn emit(&mut self, row: &ComparisonRow) -> io::Result<()> {
        if row.agrees(self.tolerance) {
            info!(
                ensemble = %row.ensemble,
                property = %row.property,
                members = row.members,
                points = row.points,
                mean_std = row.mean_std,
                reference = ?row.reference,
                "Ensemble spread"
            );
        } else {
            warn!(
                ensemble = %row.ensemble,
                mean_std = row.mean_std,
                reference = ?row.reference,
                deviation = ?row.deviation(),
                "Ensemble spread differs from reference"
            );
        }
        Ok(())
    }
}

/// Collects rows and writes them as one JSON array on [`Reporter::finish`].
pub struct JsonReporter<W: Write> {
    writer: W,
    rows: Vec<ComparisonRow>,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            rows: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn emit(&mut self, row: &ComparisonRow) -> io::Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, &self.rows)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }
}

#[derive(Serialize)]
struct PointRecord {
    index: usize,
    mean: f64,
    variance: f64,
    std: f64,
}

/// Writes the per-point statistics of `summary` as CSV with the header
/// `index,mean,variance,std`.
pub fn write_points_csv<W: Write>(summary: &EnsembleSummary, writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for (index, ((&mean, &variance), &std)) in summary
        .mean
        .iter()
        .zip(&summary.variance)
        .zip(&summary.std)
        .enumerate()
    {
        out.serialize(PointRecord {
            index,
            mean,
            variance,
            std,
        })?;
    }
    out.flush()?;
    Ok(())
}

/// One bucket of a [`histogram`]; `lo` inclusive, `hi` exclusive except
/// for the last bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Equal-width histogram of the finite entries of `values`.
///
/// Returns no buckets for empty input and a single bucket when every value
/// is the same.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bucket> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        return vec![Bucket {
            lo,
            hi,
            count: finite.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut buckets: Vec<Bucket> = (0..bins)
        .map(|b| Bucket {
            lo: lo + width * b as f64,
            hi: if b + 1 == bins {
                hi
            } else {
                lo + width * (b + 1) as f64
            },
            count: 0,
        })
        .collect();

    for v in finite {
        let b = (((v - lo) / width) as usize).min(bins - 1);
        buckets[b].count += 1;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> EnsembleSummary {
        EnsembleSummary {
            ensemble: "deep".into(),
            property: Property::Energy,
            members: 3,
            mean: vec![0.0, 1.5],
            variance: vec![0.0, 0.25],
            std: vec![0.0, 0.5],
            mean_std: 0.25,
        }
    }

    #[test]
    fn row_deviation_against_reference() {
        let row = ComparisonRow::from_summary(&summary(), Some(0.2));
        assert_eq!(row.points, 2);
        assert_eq!(row.max_std, 0.5);
        assert!((row.deviation().unwrap() - 0.05).abs() < 1e-12);
        assert!((row.relative_deviation().unwrap() - 0.25).abs() < 1e-12);
        assert!(!row.agrees(0.1));
        assert!(row.agrees(0.3));

        let free = ComparisonRow::from_summary(&summary(), None);
        assert_eq!(free.deviation(), None);
        assert!(free.agrees(0.0));
    }

    #[test]
    fn json_reporter_writes_all_rows_on_finish() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter
            .emit(&ComparisonRow::from_summary(&summary(), Some(0.2)))
            .unwrap();
        reporter
            .emit(&ComparisonRow::from_summary(&summary(), None))
            .unwrap();
        reporter.finish().unwrap();

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ensemble"], "deep");
        assert_eq!(rows[0]["property"], "energy");
        assert_eq!(rows[0]["mean_std"], 0.25);
        assert_eq!(rows[0]["reference"], 0.2);
        assert!(rows[1].get("reference").is_none());
    }

    #[test]
    fn points_csv_has_one_line_per_point() {
        let mut out = Vec::new();
        write_points_csv(&summary(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, ["index,mean,variance,std", "0,0.0,0.0,0.0", "1,1.5,0.25,0.5"]);
    }

    #[test]
    fn points_csv_keeps_full_precision() {
        let mut s = summary();
        s.mean[1] = 0.1 + 0.2;
        s.std[1] = -1.234_567_890_123_456_7e-13;

        let mut out = Vec::new();
        write_points_csv(&s, &mut out).unwrap();
        let mut reader = csv::Reader::from_reader(out.as_slice());
        let rows: Vec<(usize, f64, f64, f64)> =
            reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].0, 1);
        assert_eq!(rows[1].1.to_bits(), (0.1f64 + 0.2).to_bits());
        assert_eq!(rows[1].3.to_bits(), s.std[1].to_bits());
    }

    #[test]
    fn histogram_buckets_cover_the_range() {
        let values = [0.0, 0.1, 0.2, 0.3, 0.4, 1.0];
        let h = histogram(&values, 4);
        assert_eq!(h.len(), 4);
        assert_eq!(h[0].lo, 0.0);
        assert_eq!(h[3].hi, 1.0);
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 6);
        assert_eq!(h[0].count, 3);
        assert_eq!(h[3].count, 1);
    }

    #[test]
    fn histogram_degenerate_inputs() {
        assert!(histogram(&[], 5).is_empty());
        assert!(histogram(&[1.0], 0).is_empty());
        let flat = histogram(&[0.0, 0.0, f64::NAN], 5);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].count, 2);
    }
}
