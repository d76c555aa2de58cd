use std::path::{Path, PathBuf};

/// `dir/points.csv` with label `deep` becomes `dir/points-deep.csv`.
pub fn with_label(path: &Path, label: &str) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{label}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{label}"),
    };
    path.with_file_name(name)
}
