use crate::io::{Format, error::Error, util};
use crate::model::{
    structure::{Atom, Structure},
    types::Element,
};
use std::io::BufRead;

/// Column layout of the per-atom lines of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    species: usize,
    pos: usize,
    width: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            species: 0,
            pos: 1,
            width: 4,
        }
    }
}

#[derive(Debug, Default)]
struct Header {
    lattice: Option<[[f64; 3]; 3]>,
    pbc: Option<[bool; 3]>,
    columns: Columns,
    /// Any of the extended keys was present.
    extended: bool,
}

impl Header {
    fn format(&self) -> Format {
        if self.extended {
            Format::ExtXyz
        } else {
            Format::Xyz
        }
    }
}

pub fn read_all<R: BufRead>(reader: R) -> Result<Vec<Structure>, Error> {
    let lines = reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|content| (i + 1, content)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut frames = Vec::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        let (count_ln, count_line) = &lines[cursor];
        if count_line.trim().is_empty() {
            cursor += 1;
            continue;
        }

        let atom_count = count_line.trim().parse::<usize>().map_err(|_| {
            Error::parse(
                Format::ExtXyz,
                *count_ln,
                format!("expected an atom count, found '{}'", count_line.trim()),
            )
        })?;

        let (comment_ln, comment) = lines.get(cursor + 1).ok_or_else(|| {
            Error::parse(
                Format::ExtXyz,
                *count_ln,
                "frame ended before its comment line",
            )
        })?;
        let header = parse_header(comment, *comment_ln)?;

        let atom_start = cursor + 2;
        let atom_lines = atom_start
            .checked_add(atom_count)
            .and_then(|end| lines.get(atom_start..end))
            .ok_or_else(|| {
                Error::parse(
                    header.format(),
                    lines.last().map(|(ln, _)| *ln).unwrap_or(*count_ln),
                    format!("frame declares {atom_count} atoms but the file ends early"),
                )
            })?;
        let atoms = parse_atoms(atom_lines, header.columns, header.format())?;

        let mut structure = Structure::new(atoms);
        match (header.lattice, header.pbc) {
            (Some(cell), pbc) => structure = structure.with_cell(cell, pbc.unwrap_or([true; 3])),
            (None, Some(pbc)) if pbc.iter().any(|&p| p) => {
                return Err(Error::parse(
                    Format::ExtXyz,
                    *comment_ln,
                    "periodic boundary conditions requested without a Lattice",
                ));
            }
            (None, _) => {}
        }

        frames.push(structure);
        cursor = atom_start + atom_count;
    }

    Ok(frames)
}

fn parse_header(comment: &str, line_no: usize) -> Result<Header, Error> {
    let pairs = match util::split_key_values(comment) {
        Ok(pairs) => pairs,
        Err(details) if looks_extended(comment) => {
            return Err(Error::parse(Format::ExtXyz, line_no, details));
        }
        // Free-form comment of a plain XYZ file.
        Err(_) => return Ok(Header::default()),
    };

    let mut header = Header::default();
    for (key, value) in &pairs {
        if key.eq_ignore_ascii_case("lattice") {
            header.lattice = Some(parse_lattice(value, line_no)?);
        } else if key.eq_ignore_ascii_case("pbc") {
            header.pbc = Some(parse_pbc(value, line_no)?);
        } else if key.eq_ignore_ascii_case("properties") {
            header.columns = parse_properties(value, line_no)?;
        } else {
            continue;
        }
        header.extended = true;
    }

    Ok(header)
}

fn looks_extended(comment: &str) -> bool {
    let lower = comment.to_ascii_lowercase();
    lower.contains("lattice=") || lower.contains("properties=")
}

fn parse_lattice(value: &str, line_no: usize) -> Result<[[f64; 3]; 3], Error> {
    let numbers = value
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::parse(Format::ExtXyz, line_no, "non-numeric Lattice entry"))?;

    if numbers.len() != 9 {
        return Err(Error::parse(
            Format::ExtXyz,
            line_no,
            format!("Lattice must have 9 components, found {}", numbers.len()),
        ));
    }

    let mut cell = [[0.0; 3]; 3];
    for (i, row) in cell.iter_mut().enumerate() {
        row.copy_from_slice(&numbers[3 * i..3 * i + 3]);
    }
    Ok(cell)
}

fn parse_pbc(value: &str, line_no: usize) -> Result<[bool; 3], Error> {
    let flags = value
        .split_whitespace()
        .map(util::parse_flag)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::parse(Format::ExtXyz, line_no, "invalid pbc flag"))?;

    match flags.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        [all] => Ok([*all; 3]),
        _ => Err(Error::parse(
            Format::ExtXyz,
            line_no,
            "pbc must have 1 or 3 flags",
        )),
    }
}

fn parse_properties(value: &str, line_no: usize) -> Result<Columns, Error> {
    let fields: Vec<&str> = value.split(':').collect();
    if fields.len() % 3 != 0 {
        return Err(Error::parse(
            Format::ExtXyz,
            line_no,
            "Properties must be name:type:count triples",
        ));
    }

    let mut species = None;
    let mut atomic_number = None;
    let mut pos = None;
    let mut column = 0;

    for triple in fields.chunks(3) {
        let (name, kind, count) = (triple[0], triple[1], triple[2]);
        let count = count.parse::<usize>().map_err(|_| {
            Error::parse(
                Format::ExtXyz,
                line_no,
                format!("invalid column count for property '{name}'"),
            )
        })?;

        match (name, kind, count) {
            ("species", "S", 1) => species = Some(column),
            ("Z", "I", 1) => atomic_number = Some(column),
            ("pos", "R", 3) => pos = Some(column),
            ("species" | "pos", _, _) => {
                return Err(Error::parse(
                    Format::ExtXyz,
                    line_no,
                    format!("unexpected layout {kind}:{count} for property '{name}'"),
                ));
            }
            _ => {}
        }
        column += count;
    }

    let species = species.or(atomic_number).ok_or_else(|| {
        Error::parse(Format::ExtXyz, line_no, "Properties lack a species column")
    })?;
    let pos = pos
        .ok_or_else(|| Error::parse(Format::ExtXyz, line_no, "Properties lack a pos column"))?;

    Ok(Columns {
        species,
        pos,
        width: column,
    })
}

fn parse_atoms(
    lines: &[(usize, String)],
    columns: Columns,
    format: Format,
) -> Result<Vec<Atom>, Error> {
    let mut atoms = Vec::with_capacity(lines.len());
    for (ln, raw) in lines {
        let tokens: Vec<_> = raw.split_whitespace().collect();
        if tokens.len() < columns.width {
            return Err(Error::parse(
                format,
                *ln,
                format!(
                    "atom line has {} columns, expected at least {}",
                    tokens.len(),
                    columns.width
                ),
            ));
        }

        let element = Element::guess(tokens[columns.species]).ok_or_else(|| {
            Error::parse(
                format,
                *ln,
                format!("unknown species '{}'", tokens[columns.species]),
            )
        })?;

        let mut position = [0.0; 3];
        for (axis, slot) in position.iter_mut().enumerate() {
            *slot = tokens[columns.pos + axis].parse::<f64>().map_err(|_| {
                Error::parse(
                    format,
                    *ln,
                    format!("invalid {} coordinate in atom line", ["x", "y", "z"][axis]),
                )
            })?;
        }

        atoms.push(Atom::new(element, position));
    }
    Ok(atoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TWO_FRAMES: &str = "\
3
Lattice=\"10.0 0.0 0.0 0.0 10.0 0.0 0.0 0.0 12.0\" Properties=species:S:1:pos:R:3:forces:R:3 energy=-14.2 pbc=\"T T F\"
O 0.0 0.0 0.0 0.1 0.0 0.0
H 0.96 0.0 0.0 -0.05 0.0 0.0
H -0.24 0.93 0.0 -0.05 0.0 0.0

2
Properties=forces:R:3:pos:R:3:Z:I:1
0.0 0.0 0.0 1.0 2.0 3.0 6
0.0 0.0 0.0 1.0 2.0 4.2 8
";

    fn read(text: &str) -> Result<Vec<Structure>, Error> {
        read_all(Cursor::new(text))
    }

    #[test]
    fn reads_frames_in_order_with_cell_and_pbc() {
        let frames = read(TWO_FRAMES).unwrap();
        assert_eq!(frames.len(), 2);

        let first = &frames[0];
        assert_eq!(first.atom_count(), 3);
        assert_eq!(first.atoms[0].element, Element::O);
        assert_eq!(first.atoms[1].position, [0.96, 0.0, 0.0]);
        assert_eq!(
            first.cell,
            Some([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 12.0]])
        );
        assert_eq!(first.pbc, [true, true, false]);

        let second = &frames[1];
        assert_eq!(second.cell, None);
        assert!(!second.is_periodic());
        assert_eq!(second.atoms[0].element, Element::C);
        assert_eq!(second.atoms[1].element, Element::O);
        assert_eq!(second.atoms[1].position, [1.0, 2.0, 4.2]);
    }

    #[test]
    fn lattice_without_pbc_defaults_to_fully_periodic() {
        let text = "1\nLattice=\"3 0 0 0 3 0 0 0 3\"\nCu 0 0 0\n";
        let frames = read(text).unwrap();
        assert_eq!(frames[0].pbc, [true; 3]);
        assert!(frames[0].is_periodic());
    }

    #[test]
    fn plain_xyz_comment_is_ignored() {
        let text = "2\nwater dimer fragment, don't \"parse me\n O 0 0 0\nH 0 0 1\n";
        let frames = read(text).unwrap();
        assert_eq!(frames[0].atom_count(), 2);
        assert_eq!(frames[0].cell, None);
    }

    #[test]
    fn truncated_frame_reports_last_line() {
        let text = "3\ncomment\nO 0 0 0\nH 0 0 1\n";
        let err = read(text).unwrap_err();
        match err {
            Error::Parse { line, details, .. } => {
                assert_eq!(line, 4);
                assert!(details.contains("3 atoms"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_atom_count_is_a_parse_error() {
        let err = read("18446744073709551615\ncomment\nH 0 0 0\n").unwrap_err();
        match err {
            Error::Parse { line, details, .. } => {
                assert_eq!(line, 3);
                assert!(details.contains("18446744073709551615 atoms"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_count_line_is_rejected_with_line_number() {
        let err = read("1\nx\nH 0 0 0\nnot-a-count\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 4, .. }));
    }

    #[test]
    fn malformed_lattice_is_rejected() {
        let err = read("1\nLattice=\"1 0 0 0 1 0\"\nH 0 0 0\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn pbc_without_lattice_is_rejected() {
        let err = read("1\npbc=\"T T T\"\nH 0 0 0\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn unknown_species_is_rejected() {
        let err = read("1\n\nQq 0 0 0\n").unwrap_err();
        match err {
            Error::Parse { line, details, .. } => {
                assert_eq!(line, 3);
                assert!(details.contains("Qq"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_atom_line_is_rejected() {
        let text = "1\nProperties=species:S:1:pos:R:3:forces:R:3\nH 0 0 0\n";
        let err = read(text).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, .. }));
    }
}
