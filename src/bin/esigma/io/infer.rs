use std::path::Path;

use ensemble_sigma::io::Format;

/// Structure format implied by the file extension, if recognised.
pub fn structure_format(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "xyz" => Some(Format::Xyz),
        "extxyz" | "exyz" => Some(Format::ExtXyz),
        _ => None,
    }
}
