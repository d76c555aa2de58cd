use anyhow::{Context, Result};

use ensemble_sigma::{Property, StudyConfig};

use crate::cli::{PropertyArg, StudyOptions};

/// Loads the study file and applies the command-line overrides.
pub fn load_study(opts: &StudyOptions) -> Result<StudyConfig> {
    let mut study = StudyConfig::load(&opts.config)
        .with_context(|| format!("Cannot use study '{}'", opts.config.display()))?;
    apply_overrides(&mut study, opts);
    Ok(study)
}

fn apply_overrides(study: &mut StudyConfig, opts: &StudyOptions) {
    if let Some(dir) = &opts.output_dir {
        study.output_dir = dir.clone();
    }
    for ensemble in &mut study.ensembles {
        if let Some(offset) = opts.force_offset {
            ensemble.force_offset = offset;
        }
        if let Some(p) = opts.property {
            ensemble.property = property(p);
        }
    }
}

fn property(arg: PropertyArg) -> Property {
    match arg {
        PropertyArg::Energy => Property::Energy,
        PropertyArg::MaxForce => Property::MaxForce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    const STUDY: &str = r#"
structures = "eval.xyz"
force_offset = 8

[[ensemble]]
name = "boot"
members = [{ id = "0", model = "a.toml" }, { id = "1", model = "b.toml" }]

[[ensemble]]
name = "deep"
property = "max-force"
members = [{ id = "0", model = "c.toml" }, { id = "1", model = "d.toml" }]
"#;

    fn options() -> StudyOptions {
        StudyOptions {
            config: PathBuf::from("study.toml"),
            ensembles: Vec::new(),
            output_dir: None,
            force_offset: None,
            property: None,
        }
    }

    #[test]
    fn no_overrides_keep_file_values() {
        let mut study = StudyConfig::from_toml_str(STUDY, Path::new("/s")).unwrap();
        apply_overrides(&mut study, &options());
        assert_eq!(study.output_dir, PathBuf::from("/s/predictions"));
        assert_eq!(study.ensembles[0].force_offset, 8);
        assert_eq!(study.ensembles[1].property, Property::MaxForce);
    }

    #[test]
    fn overrides_apply_to_every_ensemble() {
        let mut study = StudyConfig::from_toml_str(STUDY, Path::new("/s")).unwrap();
        let opts = StudyOptions {
            output_dir: Some(PathBuf::from("elsewhere")),
            force_offset: Some(0),
            property: Some(PropertyArg::Energy),
            ..options()
        };
        apply_overrides(&mut study, &opts);

        assert_eq!(study.output_dir, PathBuf::from("elsewhere"));
        for ensemble in &study.ensembles {
            assert_eq!(ensemble.force_offset, 0);
            assert_eq!(ensemble.property, Property::Energy);
        }
    }
}
