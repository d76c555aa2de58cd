//! Persisted per-member prediction artifacts.
//!
//! One JSON document per `(ensemble, member)` pair, stored at
//! `<dir>/<ensemble>/<member>.json`. The document carries its own key so a
//! misplaced file is caught on load instead of silently aggregated.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::Error;
use crate::model::prediction::MemberResult;

pub fn artifact_path(dir: &Path, ensemble: &str, member: &str) -> PathBuf {
    dir.join(ensemble).join(format!("{member}.json"))
}

pub fn write_member_result<W: Write>(mut writer: W, result: &MemberResult) -> Result<(), Error> {
    serde_json::to_writer(&mut writer, result)?;
    writer.flush()?;
    Ok(())
}

pub fn read_member_result<R: Read>(reader: R) -> Result<MemberResult, Error> {
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `result` to its keyed location under `dir`, creating the
/// ensemble directory as needed. Returns the artifact path.
pub fn save_member_result(dir: &Path, result: &MemberResult) -> Result<PathBuf, Error> {
    let path = artifact_path(dir, &result.ensemble, &result.member);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // A partially written artifact never carries the real name.
    let staging = path.with_extension("json.partial");
    write_member_result(BufWriter::new(File::create(&staging)?), result)?;
    fs::rename(&staging, &path)?;

    debug!(
        ensemble = %result.ensemble,
        member = %result.member,
        points = result.len(),
        path = %path.display(),
        "Wrote prediction artifact"
    );
    Ok(path)
}

/// Removes every artifact (finished or staged) stored for `ensemble` under
/// `dir`, so a new run never sits next to predictions of an older one.
/// Returns the number of files removed; a missing directory removes none.
pub fn clear_ensemble_artifacts(dir: &Path, ensemble: &str) -> Result<usize, Error> {
    let ensemble_dir = dir.join(ensemble);
    let entries = match fs::read_dir(&ensemble_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if path.is_file() && (name.ends_with(".json") || name.ends_with(".json.partial")) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }

    if removed > 0 {
        debug!(ensemble, removed, dir = %ensemble_dir.display(), "Removed old prediction artifacts");
    }
    Ok(removed)
}

/// Loads the artifact for `(ensemble, member)` and checks that it is the
/// one asked for and that its two sequences are parallel.
pub fn load_member_result(dir: &Path, ensemble: &str, member: &str) -> Result<MemberResult, Error> {
    let path = artifact_path(dir, ensemble, member);
    let result = read_member_result(BufReader::new(File::open(&path)?))?;

    if result.ensemble != ensemble || result.member != member {
        return Err(Error::artifact(
            &path,
            format!(
                "holds ensemble '{}' member '{}', expected ensemble '{ensemble}' member '{member}'",
                result.ensemble, result.member
            ),
        ));
    }
    if !result.is_consistent() {
        return Err(Error::artifact(
            &path,
            format!(
                "{} energies but {} force arrays",
                result.energy.len(),
                result.forces.len()
            ),
        ));
    }

    Ok(result)
}
