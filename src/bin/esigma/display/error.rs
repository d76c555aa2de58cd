use std::io::{self, Write};

use anyhow::Error;

use ensemble_sigma::EnsembleError;
use ensemble_sigma::io::{Error as IoError, Format};
use ensemble_sigma::potential::Error as PotentialError;

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    let msg = err.to_string();
    for line in wrap(&msg, 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 59) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    let hints = HintCollector::collect(err);
    if !hints.is_empty() {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

#[derive(Default)]
struct HintCollector {
    hints: Vec<String>,
    has_typed_hints: bool,
}

impl HintCollector {
    /// Hints for the outermost typed error of each library module found
    /// in the chain, falling back to message matching.
    fn collect(err: &Error) -> Vec<String> {
        let mut collector = Self::default();

        if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<EnsembleError>()) {
            collector.collect_ensemble_hints(e);
        }
        if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<PotentialError>()) {
            collector.collect_potential_hints(e);
        }
        if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<IoError>()) {
            collector.collect_io_hints(e);
        }

        if !collector.has_typed_hints {
            collector.collect_fallback_hints(err);
        }

        collector.hints
    }

    fn add(&mut self, hint: impl Into<String>) {
        self.hints.push(hint.into());
    }

    fn mark_typed(&mut self) {
        self.has_typed_hints = true;
    }

    fn collect_ensemble_hints(&mut self, err: &EnsembleError) {
        self.mark_typed();

        match err {
            EnsembleError::ConfigRead { .. } => {
                self.add("Pass the study file with -c/--config (default: study.toml)");
            }

            EnsembleError::ConfigParse { .. } => {
                self.add("The study file is not valid TOML or has unknown keys");
                self.add("Known keys: output_dir, structures, force_offset, property, [[ensemble]]");
                self.add("Each [[ensemble]] needs a name and members = [{ id, model }, ...]");
            }

            EnsembleError::Structures { .. } => {
                self.add("The evaluation set must be an XYZ or extended XYZ file");
            }

            EnsembleError::Model { member, .. } => {
                self.add(format!("Check the model path of member '{}' in the study file", member));
                self.add("Relative model paths are resolved against the study file's directory");
            }

            EnsembleError::Predictions { .. } => {
                self.add("Run `esigma infer` for this ensemble before aggregating");
                self.add("Or point --output-dir at the directory holding the artifacts");
            }

            EnsembleError::Persist { .. } | EnsembleError::Clear { .. } => {
                self.add("Check that the output directory is writable");
            }

            EnsembleError::Inference { member, index, .. } => {
                self.add(format!("Member '{}' could not evaluate structure {}", member, index));
                self.add("Inspect that frame of the evaluation set (frames count from 0)");
            }

            EnsembleError::Alignment { member, expected, found } => {
                self.add(format!(
                    "Member '{}' holds {} predictions where {} were expected",
                    member, found, expected
                ));
                self.add("Artifacts from different evaluation sets are mixed");
                self.add("Rerun `esigma infer` for this ensemble");
            }

            EnsembleError::Config(msg) => {
                self.collect_config_hints(msg);
            }

            EnsembleError::ThreadPool { .. } => {
                self.add("Try fewer workers with --jobs");
            }
        }
    }

    fn collect_config_hints(&mut self, msg: &str) {
        let msg_lower = msg.to_lowercase();

        if msg_lower.contains("at least") {
            self.add("A spread needs at least two members per ensemble");
        } else if msg_lower.contains("force offset") {
            self.add("Lower --force-offset or force_offset in the study file");
            self.add("The offset may not exceed the atom count of any structure");
        } else if msg_lower.contains("unknown ensemble") {
            self.add("Select ensembles with -e/--ensemble using names from the study file");
        } else if msg_lower.contains("property") {
            self.add("Supported properties: energy, max-force");
        } else if msg_lower.contains("more than once") {
            self.add("Ensemble names and member ids must be unique");
        } else if msg_lower.contains("no structures") {
            self.add("The evaluation set is empty; check the structures file");
        }
    }

    fn collect_potential_hints(&mut self, err: &PotentialError) {
        self.mark_typed();

        match err {
            PotentialError::Io(source) => {
                self.collect_std_io_hints(source);
            }

            PotentialError::ModelParse(_) => {
                self.add("Model file has invalid TOML or unknown keys");
                self.add("Expected: cutoff, shift, reference_energies, [[pairs]]");
            }

            PotentialError::InvalidModel(_) => {
                self.add("Model parameters must be finite; cutoff and widths positive");
            }

            PotentialError::MissingPair { a, b } => {
                self.add(format!(
                    "Add a pairs entry with elements = [\"{}\", \"{}\"] to the model",
                    a, b
                ));
            }

            PotentialError::MissingReference(element) => {
                self.add(format!("Add {} to the model's reference_energies", element));
            }

            PotentialError::Overlap { i, j, .. } => {
                self.add(format!("Atoms {} and {} coincide (or with a periodic image)", i, j));
                self.add("Check the coordinates and the Lattice of that frame");
            }

            PotentialError::InvalidCell(_) => {
                self.add("The Lattice vectors of a frame are degenerate");
            }

            PotentialError::Backend(_) => {
                self.add("The inference backend returned unusable output");
            }
        }
    }

    fn collect_io_hints(&mut self, err: &IoError) {
        self.mark_typed();

        match err {
            IoError::Io { source } => {
                self.collect_std_io_hints(source);
            }

            IoError::Parse { format, line, .. } => {
                self.add(format!(
                    "Parser encountered an issue near line {} in {} format",
                    line, format
                ));
                self.add("Inspect the file around that line for malformed entries");
                self.add_format_specific_parse_hints(*format);
            }

            IoError::Json(_) => {
                self.add("The prediction artifact is not valid JSON; it may be truncated");
                self.add("Rerun `esigma infer` to regenerate it");
            }

            IoError::Artifact { .. } => {
                self.add("The artifact does not match the ensemble or member asked for");
                self.add("Do not rename artifact files; rerun `esigma infer` instead");
            }
        }
    }

    fn collect_std_io_hints(&mut self, source: &std::io::Error) {
        use std::io::ErrorKind;

        match source.kind() {
            ErrorKind::NotFound => {
                self.add("File or directory not found");
                self.add("Check the path spelling and ensure the file exists");
            }

            ErrorKind::PermissionDenied => {
                self.add("Permission denied accessing the file");
                self.add("Check file permissions with `ls -la`");
            }

            ErrorKind::InvalidData => {
                self.add("File contains invalid or corrupt data");
                self.add("Verify the file is not truncated or corrupted");
            }

            ErrorKind::WriteZero => {
                self.add("Failed to write data (disk full?)");
                self.add("Check available disk space");
            }

            _ => {
                self.add("I/O operation failed");
                self.add("Check file path, permissions, and disk space");
            }
        }
    }

    fn add_format_specific_parse_hints(&mut self, format: Format) {
        match format {
            Format::Xyz => {
                self.add("XYZ: each frame is a count line, a comment line, then one line per atom");
            }

            Format::ExtXyz => {
                self.add("extXYZ: Lattice needs 9 numbers; pbc needs 1 or 3 of T/F");
                self.add("extXYZ: Properties must name species (or Z) and pos columns");
            }
        }
    }

    fn collect_fallback_hints(&mut self, err: &Error) {
        let msg = error_chain_text(err);

        if msg.contains("no such file") || msg.contains("not found") {
            self.add("Check that the file path is correct");
            self.add("Verify the file exists and is readable");
            return;
        }

        if msg.contains("permission denied") {
            self.add("Check file permissions with `ls -la`");
            self.add("Ensure you have the required access rights");
        }
    }
}

fn error_chain_text(err: &Error) -> String {
    err.chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}
