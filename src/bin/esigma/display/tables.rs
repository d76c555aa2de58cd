use std::io::{self, Write};

use ensemble_sigma::ensemble::{ComparisonRow, Reporter, histogram};
use ensemble_sigma::{EnsembleConfig, EnsembleSummary, Structure};

use crate::util::text::{format_signed, format_value, truncate};

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

pub fn print_ensemble_info(
    out: &mut impl Write,
    config: &EnsembleConfig,
    structures: &[Structure],
) {
    let members: Vec<&str> = config.member_ids().collect();
    let file = config
        .structures
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();

    let mut rows = vec![
        ("Members", format!("{} ({})", members.len(), members.join(", "))),
        ("Structures", format!("{} from {file}", structures.len())),
    ];
    if let Some(first) = structures.first() {
        let periodic = if first.is_periodic() { ", periodic" } else { "" };
        rows.push(("First frame", format!("{}{periodic}", first.formula())));
    }
    rows.push(("Force offset", config.force_offset.to_string()));
    rows.push(("Property", config.property.to_string()));

    print_kv_table(out, &format!("Ensemble '{}'", config.name), &rows);
}

pub fn print_summary(out: &mut impl Write, summary: &EnsembleSummary, reference: Option<f64>) {
    let unit = summary.property.unit();

    let mut rows = vec![
        ("Property", summary.property.to_string()),
        ("Members", summary.members.to_string()),
        ("Structures", summary.len().to_string()),
        ("Mean σ", format!("{} {unit}", format_value(summary.mean_std))),
        ("Max σ", format!("{} {unit}", format_value(summary.max_std()))),
    ];
    if let Some(i) = summary.most_uncertain() {
        rows.push(("Most uncertain", format!("structure {i}")));
    }
    if let Some(r) = reference {
        rows.push(("Reference σ", format!("{} {unit}", format_value(r))));
        rows.push((
            "Δ",
            format!("{} {unit}", format_signed(summary.mean_std - r)),
        ));
    }

    print_kv_table(out, &format!("Ensemble '{}'", summary.ensemble), &rows);
}

pub fn print_histogram(out: &mut impl Write, summary: &EnsembleSummary, bins: usize) {
    let buckets = histogram(&summary.std, bins);
    if buckets.is_empty() {
        return;
    }

    let data: Vec<(String, usize)> = buckets
        .iter()
        .map(|b| (format!("{:.2e}–{:.2e}", b.lo, b.hi), b.count))
        .collect();

    print_distribution_table(
        out,
        &format!("σ Distribution, {}", summary.property.unit()),
        "σ range",
        &data,
        summary.len(),
    );
}

fn print_distribution_table(
    out: &mut impl Write,
    title: &str,
    label: &str,
    data: &[(String, usize)],
    total: usize,
) {
    let name_w = 19usize;
    let count_w = 6usize;
    let sep_overhead = 6;
    let dist_w = SAFE_TABLE_WIDTH.saturating_sub(name_w + count_w + sep_overhead);
    let max_bar_width = dist_w.saturating_sub(8).min(20);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{name_line}┬{count_line}┬{dist_line}┐",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
        INDENT, label, "Count", "Distribution",
    );
    let _ = writeln!(
        out,
        "{}├{name_line}┼{count_line}┼{dist_line}┤",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );

    for (name, count) in data {
        let pct = (*count as f64 / total.max(1) as f64) * 100.0;
        let bar = make_bar(pct, max_bar_width);
        let dist_cell = format!("{}  {:>5.1}%", bar, pct);
        let _ = writeln!(
            out,
            "{}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            INDENT,
            truncate(name, name_w),
            count,
            dist_cell,
        );
    }

    let _ = writeln!(
        out,
        "{}└{name_line}┴{count_line}┴{dist_line}┘",
        INDENT,
        name_line = "─".repeat(name_w + 2),
        count_line = "─".repeat(count_w + 2),
        dist_line = "─".repeat(dist_w + 2)
    );
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 16usize;
    let sep_overhead = 6;
    let val_w = SAFE_TABLE_WIDTH.saturating_sub(key_w + sep_overhead);

    let _ = writeln!(
        out,
        "{}┌─ {} ─┐",
        INDENT,
        truncate(title, SAFE_TABLE_WIDTH - 6)
    );
    let _ = writeln!(
        out,
        "{}┌{k_line}┬{v_line}┐",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
    let _ = writeln!(
        out,
        "{}│ {:<key_w$} │ {:>val_w$} │",
        INDENT, "Metric", "Value",
    );
    let _ = writeln!(
        out,
        "{}├{k_line}┼{v_line}┤",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );

    for (key, val) in rows {
        let _ = writeln!(
            out,
            "{}│ {:<key_w$} │ {:>val_w$} │",
            INDENT,
            truncate(key, key_w),
            truncate(val, val_w),
        );
    }

    let _ = writeln!(
        out,
        "{}└{k_line}┴{v_line}┘",
        INDENT,
        k_line = "─".repeat(key_w + 2),
        v_line = "─".repeat(val_w + 2)
    );
}

fn make_bar(pct: f64, max_width: usize) -> String {
    let filled = ((pct / 100.0) * max_width as f64).round() as usize;
    let empty = max_width.saturating_sub(filled);
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// Side-by-side comparison of ensembles, written on [`Reporter::finish`].
pub struct TableReporter<W: Write> {
    out: W,
    rows: Vec<ComparisonRow>,
}

impl<W: Write> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows: Vec::new(),
        }
    }
}

impl<W: Write> Reporter for TableReporter<W> {
    fn emit(&mut self, row: &ComparisonRow) -> io::Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let Some(first) = self.rows.first() else {
            return Ok(());
        };
        let sigma_header = if self.rows.iter().all(|r| r.property == first.property) {
            format!("Mean σ, {}", first.property.unit())
        } else {
            "Mean σ".to_string()
        };

        let (name_w, val_w) = (16usize, 12usize);
        let line = |l: &str, m: &str, r: &str| {
            format!(
                "{INDENT}{l}{}{m}{}{m}{}{m}{}{r}",
                "─".repeat(name_w + 2),
                "─".repeat(val_w + 2),
                "─".repeat(val_w + 2),
                "─".repeat(val_w + 2),
            )
        };

        writeln!(self.out, "{INDENT}┌─ Ensemble Comparison ─┐")?;
        writeln!(self.out, "{}", line("┌", "┬", "┐"))?;
        writeln!(
            self.out,
            "{INDENT}│ {:<name_w$} │ {:>val_w$} │ {:>val_w$} │ {:>val_w$} │",
            "Ensemble", sigma_header, "Reference", "Δ",
        )?;
        writeln!(self.out, "{}", line("├", "┼", "┤"))?;

        for row in &self.rows {
            let reference = row.reference.map_or_else(|| "–".to_string(), format_value);
            let delta = row.deviation().map_or_else(|| "–".to_string(), format_signed);
            writeln!(
                self.out,
                "{INDENT}│ {:<name_w$} │ {:>val_w$} │ {:>val_w$} │ {:>val_w$} │",
                truncate(&row.ensemble, name_w),
                format_value(row.mean_std),
                reference,
                delta,
            )?;
        }

        writeln!(self.out, "{}", line("└", "┴", "┘"))?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_sigma::Property;

    fn row(name: &str, mean_std: f64, reference: Option<f64>) -> ComparisonRow {
        ComparisonRow {
            ensemble: name.to_string(),
            property: Property::Energy,
            members: 5,
            points: 100,
            mean_std,
            max_std: mean_std * 2.0,
            reference,
        }
    }

    #[test]
    fn comparison_table_lists_every_row() {
        let mut reporter = TableReporter::new(Vec::new());
        reporter.emit(&row("bootstrapped", 0.0125, Some(0.0123))).unwrap();
        reporter.emit(&row("deep", 0.02, None)).unwrap();
        reporter.finish().unwrap();

        let text = String::from_utf8(reporter.out).unwrap();
        assert!(text.contains("Mean σ, eV"));
        assert!(text.contains("bootstrapped"));
        assert!(text.contains("0.012500"));
        assert!(text.contains("+0.000200"));
        let deep = text.lines().find(|l| l.contains("deep")).unwrap();
        assert_eq!(deep.matches('–').count(), 2);
    }

    #[test]
    fn empty_comparison_prints_nothing() {
        let mut reporter = TableReporter::new(Vec::new());
        reporter.finish().unwrap();
        assert!(reporter.out.is_empty());
    }
}
