//! Study configuration.
//!
//! A study is a set of ensembles evaluated on a shared structure file.
//! It is read from TOML:
//!
//! ```toml
//! output_dir = "predictions"
//! structures = "test.extxyz"
//! force_offset = 64
//! property = "energy"
//!
//! [[ensemble]]
//! name = "bootstrapped"
//! reference_sigma = 0.0123
//! members = [
//!   { id = "0", model = "models/boot_0.toml" },
//!   { id = "1", model = "models/boot_1.toml" },
//! ]
//! ```
//!
//! `structures`, `force_offset` and `property` may also be set per
//! ensemble, overriding the study-level value. Relative paths are resolved
//! against the directory of the configuration file.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::Error;
use crate::model::prediction::MemberResult;

/// Smallest ensemble for which a spread is defined.
pub const MIN_MEMBERS: usize = 2;

/// Scalar-per-structure quantity the spread is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Property {
    /// Total energy, baseline-corrected per member before comparison.
    #[default]
    Energy,
    /// Largest per-atom force magnitude over the retained force slice.
    MaxForce,
}

impl Property {
    /// Whether each member's values are shifted by that member's minimum
    /// before the per-point statistics are taken.
    pub fn baseline_corrected(&self) -> bool {
        matches!(self, Property::Energy)
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Property::Energy => "eV",
            Property::MaxForce => "eV/Å",
        }
    }

    /// The raw per-structure values of this property for one member.
    pub fn values(&self, result: &MemberResult) -> Vec<f64> {
        match self {
            Property::Energy => result.energy.clone(),
            Property::MaxForce => result.max_forces(),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Energy => write!(f, "energy"),
            Property::MaxForce => write!(f, "max-force"),
        }
    }
}

impl FromStr for Property {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "energy" => Ok(Property::Energy),
            "max-force" | "max_force" | "fmax" => Ok(Property::MaxForce),
            _ => Err(Error::config(format!(
                "unsupported property selector '{s}' (expected 'energy' or 'max-force')"
            ))),
        }
    }
}

/// One ensemble member: an identifier and its model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberSpec {
    pub id: String,
    pub model: PathBuf,
}

impl MemberSpec {
    pub fn new(id: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }
}

/// Everything needed to run and aggregate one ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleConfig {
    pub name: String,
    /// Members in aggregation order.
    pub members: Vec<MemberSpec>,
    /// Evaluation set shared by every member.
    pub structures: PathBuf,
    /// Atoms with a lower index are dropped from the persisted forces.
    pub force_offset: usize,
    pub property: Property,
    /// Previously published mean σ to compare against.
    pub reference_sigma: Option<f64>,
}

impl EnsembleConfig {
    pub fn new(
        name: impl Into<String>,
        members: Vec<MemberSpec>,
        structures: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            members,
            structures: structures.into(),
            force_offset: 0,
            property: Property::default(),
            reference_sigma: None,
        }
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.id.as_str())
    }

    pub fn validate(&self) -> Result<(), Error> {
        check_identifier("ensemble name", &self.name)?;

        if self.members.len() < MIN_MEMBERS {
            return Err(Error::config(format!(
                "ensemble '{}' has {} member(s); at least {MIN_MEMBERS} are required",
                self.name,
                self.members.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.members.len());
        for member in &self.members {
            check_identifier("member id", &member.id)?;
            if !seen.insert(member.id.as_str()) {
                return Err(Error::config(format!(
                    "ensemble '{}' lists member '{}' more than once",
                    self.name, member.id
                )));
            }
        }

        if let Some(reference) = self.reference_sigma {
            if !(reference.is_finite() && reference >= 0.0) {
                return Err(Error::config(format!(
                    "ensemble '{}' has an invalid reference_sigma {reference}",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

/// Names and ids become path components of the prediction artifacts.
fn check_identifier(what: &str, value: &str) -> Result<(), Error> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{what} '{value}' must be non-empty and use only letters, digits, '-', '_' or '.'"
        )))
    }
}

/// A validated set of ensembles plus the directory their predictions live in.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyConfig {
    pub output_dir: PathBuf,
    pub ensembles: Vec<EnsembleConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StudyFile {
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    structures: Option<PathBuf>,
    force_offset: Option<usize>,
    property: Option<String>,
    #[serde(default, rename = "ensemble")]
    ensembles: Vec<EnsembleFile>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("predictions")
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnsembleFile {
    name: String,
    members: Vec<MemberSpec>,
    structures: Option<PathBuf>,
    force_offset: Option<usize>,
    property: Option<String>,
    reference_sigma: Option<f64>,
}

impl StudyConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file: StudyFile = toml::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_file(file, base)
    }

    /// Parses a study from TOML text, resolving relative paths against `base`.
    pub fn from_toml_str(text: &str, base: &Path) -> Result<Self, Error> {
        let file: StudyFile = toml::from_str(text).map_err(|source| Error::ConfigParse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_file(file, base)
    }

    fn from_file(file: StudyFile, base: &Path) -> Result<Self, Error> {
        let default_property: Option<Property> =
            file.property.as_deref().map(str::parse).transpose()?;

        let mut ensembles = Vec::with_capacity(file.ensembles.len());
        for raw in file.ensembles {
            let structures = raw
                .structures
                .or_else(|| file.structures.clone())
                .ok_or_else(|| {
                    Error::config(format!(
                        "ensemble '{}' has no structures file and no study-level default is set",
                        raw.name
                    ))
                })?;
            let property = match raw.property.as_deref() {
                Some(p) => p.parse()?,
                None => default_property.unwrap_or_default(),
            };

            ensembles.push(EnsembleConfig {
                members: raw
                    .members
                    .into_iter()
                    .map(|m| MemberSpec::new(m.id, resolve(base, m.model)))
                    .collect(),
                name: raw.name,
                structures: resolve(base, structures),
                force_offset: raw.force_offset.or(file.force_offset).unwrap_or(0),
                property,
                reference_sigma: raw.reference_sigma,
            });
        }

        let study = Self {
            output_dir: resolve(base, file.output_dir),
            ensembles,
        };
        study.validate()?;
        Ok(study)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.ensembles.is_empty() {
            return Err(Error::config("study defines no [[ensemble]] entries"));
        }

        let mut names = HashSet::with_capacity(self.ensembles.len());
        for ensemble in &self.ensembles {
            ensemble.validate()?;
            if !names.insert(ensemble.name.as_str()) {
                return Err(Error::config(format!(
                    "ensemble '{}' is defined more than once",
                    ensemble.name
                )));
            }
        }
        Ok(())
    }

    pub fn ensemble(&self, name: &str) -> Result<&EnsembleConfig, Error> {
        self.ensembles.iter().find(|e| e.name == name).ok_or_else(|| {
            let known: Vec<_> = self.ensembles.iter().map(|e| e.name.as_str()).collect();
            Error::config(format!(
                "unknown ensemble '{name}' (defined: {})",
                known.join(", ")
            ))
        })
    }

    /// The named ensembles in the given order, or every ensemble when
    /// `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&EnsembleConfig>, Error> {
        if names.is_empty() {
            return Ok(self.ensembles.iter().collect());
        }
        names.iter().map(|n| self.ensemble(n)).collect()
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
