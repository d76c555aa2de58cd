//! Built-in pair potential backend.
//!
//! A model artifact is a TOML document:
//!
//! ```toml
//! name = "boot_0"
//! cutoff = 6.0
//! shift = true
//!
//! [reference_energies]
//! O = -432.1
//! H = -13.6
//!
//! [[pairs]]
//! elements = ["O", "H"]
//! form = "lennard-jones"
//! sigma = 2.1
//! epsilon = 0.005
//! ```
//!
//! The total energy is the sum of per-element reference energies plus all
//! pair terms within `cutoff`, including periodic images. With `shift`
//! enabled every pair term is offset so it vanishes at the cutoff.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::cell::{Lattice, dot};
use super::error::Error;
use super::{Potential, PotentialLoader};
use crate::model::prediction::Prediction;
use crate::model::structure::Structure;
use crate::model::types::Element;

const MIN_SEPARATION: f64 = 1e-8;

/// Functional form of one element-pair interaction, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "form", rename_all = "kebab-case")]
pub enum PairForm {
    /// `4ε[(σ/r)¹² − (σ/r)⁶]`
    LennardJones { sigma: f64, epsilon: f64 },
    /// Buckingham form `A·exp(−B·r) − C/r⁶`
    Exponential6 { a: f64, b: f64, c: f64 },
    /// `D₀[(1 − e^{−α(r−r₀)})² − 1]`
    Morse { d0: f64, r0: f64, alpha: f64 },
}

impl PairForm {
    /// Pair energy and its radial derivative `dφ/dr` at separation `r`.
    pub fn eval(&self, r: f64) -> (f64, f64) {
        match *self {
            PairForm::LennardJones { sigma, epsilon } => {
                let sr6 = (sigma / r).powi(6);
                let energy = 4.0 * epsilon * (sr6 * sr6 - sr6);
                let de_dr = -24.0 * epsilon * (2.0 * sr6 * sr6 - sr6) / r;
                (energy, de_dr)
            }
            PairForm::Exponential6 { a, b, c } => {
                let rep = a * (-b * r).exp();
                let r6 = r.powi(6);
                (rep - c / r6, -b * rep + 6.0 * c / (r6 * r))
            }
            PairForm::Morse { d0, r0, alpha } => {
                let x = (-alpha * (r - r0)).exp();
                (d0 * (x * x - 2.0 * x), 2.0 * alpha * d0 * x * (1.0 - x))
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        let ok = match *self {
            PairForm::LennardJones { sigma, epsilon } => sigma > 0.0 && epsilon >= 0.0,
            PairForm::Exponential6 { a, b, c } => a >= 0.0 && b > 0.0 && c >= 0.0,
            PairForm::Morse { d0, r0, alpha } => d0 >= 0.0 && r0 > 0.0 && alpha > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(format!("parameters out of range: {self:?}"))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFile {
    name: Option<String>,
    cutoff: f64,
    #[serde(default = "default_shift")]
    shift: bool,
    reference_energies: HashMap<String, f64>,
    #[serde(default)]
    pairs: Vec<PairEntry>,
}

fn default_shift() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PairEntry {
    elements: [String; 2],
    #[serde(flatten)]
    form: PairForm,
}

#[derive(Debug, Clone)]
pub struct PairPotential {
    name: String,
    cutoff: f64,
    shift: bool,
    references: HashMap<Element, f64>,
    pairs: HashMap<(Element, Element), PairForm>,
}

fn pair_key(a: Element, b: Element) -> (Element, Element) {
    if a <= b { (a, b) } else { (b, a) }
}

impl PairPotential {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let file: ModelFile = toml::from_str(text)?;

        if !(file.cutoff.is_finite() && file.cutoff > 0.0) {
            return Err(Error::InvalidModel(format!(
                "cutoff must be positive, got {}",
                file.cutoff
            )));
        }

        let mut references = HashMap::with_capacity(file.reference_energies.len());
        for (symbol, energy) in &file.reference_energies {
            let element = parse_element(symbol)?;
            if !energy.is_finite() {
                return Err(Error::InvalidModel(format!(
                    "reference energy of {element} is not finite"
                )));
            }
            references.insert(element, *energy);
        }

        let mut pairs = HashMap::with_capacity(file.pairs.len());
        for entry in &file.pairs {
            let a = parse_element(&entry.elements[0])?;
            let b = parse_element(&entry.elements[1])?;
            entry
                .form
                .validate()
                .map_err(|e| Error::InvalidModel(format!("{a}-{b}: {e}")))?;
            if pairs.insert(pair_key(a, b), entry.form).is_some() {
                return Err(Error::InvalidModel(format!(
                    "pair {a}-{b} is defined more than once"
                )));
            }
        }

        Ok(Self {
            name: file.name.unwrap_or_else(|| "pair-potential".to_string()),
            cutoff: file.cutoff,
            shift: file.shift,
            references,
            pairs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Resolves the per-atom kinds of `structure` into a dense table of
    /// pair terms, failing on any element the model does not cover.
    fn resolve(&self, structure: &Structure) -> Result<Resolved, Error> {
        let mut species: Vec<Element> = structure.atoms.iter().map(|a| a.element).collect();
        species.sort_unstable();
        species.dedup();

        let mut reference_sum = 0.0;
        let mut kinds = Vec::with_capacity(structure.atom_count());
        for atom in &structure.atoms {
            let reference = self
                .references
                .get(&atom.element)
                .ok_or(Error::MissingReference(atom.element))?;
            reference_sum += reference;
            // `species` holds every element of the structure.
            kinds.push(species.binary_search(&atom.element).unwrap_or_default());
        }

        let mut table = Vec::with_capacity(species.len() * species.len());
        for &a in &species {
            for &b in &species {
                let form = *self
                    .pairs
                    .get(&pair_key(a, b))
                    .ok_or(Error::MissingPair { a, b })?;
                let offset = if self.shift {
                    form.eval(self.cutoff).0
                } else {
                    0.0
                };
                table.push((form, offset));
            }
        }

        Ok(Resolved {
            width: species.len(),
            kinds,
            table,
            reference_sum,
        })
    }
}

struct Resolved {
    width: usize,
    kinds: Vec<usize>,
    table: Vec<(PairForm, f64)>,
    reference_sum: f64,
}

impl Resolved {
    fn term(&self, i: usize, j: usize) -> (PairForm, f64) {
        self.table[self.kinds[i] * self.width + self.kinds[j]]
    }
}

fn parse_element(symbol: &str) -> Result<Element, Error> {
    symbol
        .parse()
        .map_err(|e| Error::InvalidModel(format!("{e}")))
}

impl Potential for PairPotential {
    fn evaluate(&self, structure: &Structure) -> Result<Prediction, Error> {
        let resolved = self.resolve(structure)?;
        let mut positions = structure.positions();
        let translations = match Lattice::of(structure)? {
            Some(lattice) => {
                for p in positions.iter_mut() {
                    *p = lattice.wrap(*p);
                }
                lattice.translations(self.cutoff)
            }
            None => vec![[0.0; 3]],
        };

        let n = positions.len();
        let cutoff_sq = self.cutoff * self.cutoff;

        let mut energy = resolved.reference_sum;
        let mut forces = vec![[0.0; 3]; n];

        for i in 0..n {
            for j in i..n {
                let (form, offset) = resolved.term(i, j);
                for t in &translations {
                    let self_image = i == j;
                    if self_image && *t == [0.0; 3] {
                        continue;
                    }

                    let d = [
                        positions[j][0] + t[0] - positions[i][0],
                        positions[j][1] + t[1] - positions[i][1],
                        positions[j][2] + t[2] - positions[i][2],
                    ];
                    let r_sq = dot(d, d);
                    if r_sq >= cutoff_sq {
                        continue;
                    }

                    let r = r_sq.sqrt();
                    if r < MIN_SEPARATION {
                        return Err(Error::Overlap { i, j, distance: r });
                    }

                    let (phi, de_dr) = form.eval(r);
                    if self_image {
                        // Each image pair is visited from both sides.
                        energy += 0.5 * (phi - offset);
                        continue;
                    }

                    energy += phi - offset;
                    let g = de_dr / r;
                    for k in 0..3 {
                        forces[i][k] += g * d[k];
                        forces[j][k] -= g * d[k];
                    }
                }
            }
        }

        Ok(Prediction::new(energy, forces))
    }
}

/// Loads [`PairPotential`] model artifacts from TOML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairPotentialLoader;

impl PotentialLoader for PairPotentialLoader {
    type Potential = PairPotential;

    fn load(&self, path: &Path) -> Result<PairPotential, Error> {
        let text = std::fs::read_to_string(path)?;
        let potential = PairPotential::from_toml(&text)?;
        debug!(
            model = %potential.name,
            path = %path.display(),
            pairs = potential.pairs.len(),
            cutoff = potential.cutoff,
            "Loaded pair potential"
        );
        Ok(potential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::structure::Atom;

    const MODEL: &str = r#"
name = "test"
cutoff = 5.0
shift = false

[reference_energies]
O = -10.0
H = -1.0

[[pairs]]
elements = ["O", "H"]
form = "morse"
d0 = 2.0
r0 = 1.0
alpha = 1.5

[[pairs]]
elements = ["H", "H"]
form = "lennard-jones"
sigma = 1.2
epsilon = 0.1

[[pairs]]
elements = ["O", "O"]
form = "exponential6"
a = 500.0
b = 3.0
c = 20.0
"#;

    fn model() -> PairPotential {
        PairPotential::from_toml(MODEL).unwrap()
    }

    fn cluster() -> Structure {
        Structure::new(vec![
            Atom::new(Element::O, [0.0, 0.0, 0.0]),
            Atom::new(Element::H, [0.95, 0.1, 0.0]),
            Atom::new(Element::H, [-0.3, 0.9, 0.05]),
            Atom::new(Element::O, [2.8, 0.2, -0.1]),
        ])
    }

    fn lj_model(cutoff: f64, shift: bool) -> PairPotential {
        PairPotential::from_toml(&format!(
            r#"
cutoff = {cutoff:?}
shift = {shift}
reference_energies = {{ Ar = 0.0 }}
pairs = [{{ elements = ["Ar", "Ar"], form = "lennard-jones", sigma = 1.0, epsilon = 1.0 }}]
"#
        ))
        .unwrap()
    }

    #[test]
    fn parses_all_forms() {
        let m = model();
        assert_eq!(m.name(), "test");
        assert_eq!(m.cutoff(), 5.0);
        assert_eq!(
            m.pairs[&pair_key(Element::H, Element::O)],
            PairForm::Morse {
                d0: 2.0,
                r0: 1.0,
                alpha: 1.5
            }
        );
        assert!(matches!(
            m.pairs[&pair_key(Element::O, Element::O)],
            PairForm::Exponential6 { .. }
        ));
    }

    #[test]
    fn lennard_jones_dimer_at_minimum() {
        let m = lj_model(3.0, false);
        let r_min = 2f64.powf(1.0 / 6.0);
        let dimer = Structure::new(vec![
            Atom::new(Element::Ar, [0.0, 0.0, 0.0]),
            Atom::new(Element::Ar, [r_min, 0.0, 0.0]),
        ]);

        let p = m.evaluate(&dimer).unwrap();
        assert!((p.energy + 1.0).abs() < 1e-12);
        for f in &p.forces {
            for c in f {
                assert!(c.abs() < 1e-10);
            }
        }
    }

    #[test]
    fn shift_zeroes_energy_at_cutoff() {
        let shifted = lj_model(2.5, true);
        let unshifted = lj_model(2.5, false);
        let dimer = Structure::new(vec![
            Atom::new(Element::Ar, [0.0, 0.0, 0.0]),
            Atom::new(Element::Ar, [1.3, 0.0, 0.0]),
        ]);

        let e_s = shifted.evaluate(&dimer).unwrap();
        let e_u = unshifted.evaluate(&dimer).unwrap();
        let tail = PairForm::LennardJones {
            sigma: 1.0,
            epsilon: 1.0,
        }
        .eval(2.5)
        .0;
        assert!((e_u.energy - e_s.energy - tail).abs() < 1e-14);
        assert_eq!(e_s.forces, e_u.forces);
    }

    #[test]
    fn reference_energies_are_summed() {
        let p = model().evaluate(&Structure::new(vec![Atom::new(Element::O, [0.0; 3])])).unwrap();
        assert_eq!(p.energy, -10.0);
        assert_eq!(p.forces, vec![[0.0; 3]]);
    }

    #[test]
    fn forces_match_finite_differences() {
        let m = model();
        let base = cluster();
        let analytic = m.evaluate(&base).unwrap();
        let h = 1e-6;

        for atom in 0..base.atom_count() {
            for axis in 0..3 {
                let mut plus = base.clone();
                plus.atoms[atom].position[axis] += h;
                let mut minus = base.clone();
                minus.atoms[atom].position[axis] -= h;

                let numeric = -(m.evaluate(&plus).unwrap().energy
                    - m.evaluate(&minus).unwrap().energy)
                    / (2.0 * h);
                let exact = analytic.forces[atom][axis];
                assert!(
                    (numeric - exact).abs() < 1e-5 * (1.0 + exact.abs()),
                    "atom {atom} axis {axis}: numeric {numeric} vs analytic {exact}"
                );
            }
        }
    }

    #[test]
    fn forces_sum_to_zero() {
        let p = model().evaluate(&cluster()).unwrap();
        for axis in 0..3 {
            let total: f64 = p.forces.iter().map(|f| f[axis]).sum();
            assert!(total.abs() < 1e-10);
        }
    }

    #[test]
    fn single_atom_interacts_with_its_images() {
        let m = lj_model(3.5, false);
        let s = Structure::new(vec![Atom::new(Element::Ar, [0.5, 0.5, 0.5])])
            .with_cell([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]], [true; 3]);

        let p = m.evaluate(&s).unwrap();
        // Six face neighbours at 3.0 Å; edge neighbours at 4.24 Å are beyond the cutoff.
        let phi = PairForm::LennardJones {
            sigma: 1.0,
            epsilon: 1.0,
        }
        .eval(3.0)
        .0;
        assert!((p.energy - 3.0 * phi).abs() < 1e-14);
        assert!(p.forces[0].iter().all(|c| c.abs() < 1e-14));
    }

    #[test]
    fn periodic_energy_is_translation_invariant() {
        let m = lj_model(2.5, true);
        let cell = [[4.0, 0.0, 0.0], [1.0, 4.0, 0.0], [0.0, 0.0, 5.0]];
        let s = Structure::new(vec![
            Atom::new(Element::Ar, [0.2, 0.3, 0.1]),
            Atom::new(Element::Ar, [3.6, 0.4, 0.2]),
            Atom::new(Element::Ar, [1.5, 3.7, 4.8]),
        ])
        .with_cell(cell, [true; 3]);

        let mut moved = s.clone();
        for k in 0..3 {
            moved.atoms[1].position[k] -= cell[0][k];
            moved.atoms[2].position[k] -= cell[1][k] + cell[2][k];
        }

        let a = m.evaluate(&s).unwrap();
        let b = m.evaluate(&moved).unwrap();
        assert!((a.energy - b.energy).abs() < 1e-12);
        for (fa, fb) in a.forces.iter().zip(&b.forces) {
            for k in 0..3 {
                assert!((fa[k] - fb[k]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn missing_pair_and_reference_are_reported() {
        let m = model();
        let with_c = Structure::new(vec![Atom::new(Element::C, [0.0; 3])]);
        assert!(matches!(
            m.evaluate(&with_c),
            Err(Error::MissingReference(Element::C))
        ));

        let no_hh = PairPotential::from_toml(
            r#"
cutoff = 3.0
reference_energies = { H = -1.0 }
"#,
        )
        .unwrap();
        let h2 = Structure::new(vec![
            Atom::new(Element::H, [0.0; 3]),
            Atom::new(Element::H, [0.74, 0.0, 0.0]),
        ]);
        assert!(matches!(
            no_hh.evaluate(&h2),
            Err(Error::MissingPair {
                a: Element::H,
                b: Element::H
            })
        ));
    }

    #[test]
    fn overlapping_atoms_are_rejected() {
        let m = lj_model(2.0, false);
        let s = Structure::new(vec![
            Atom::new(Element::Ar, [1.0, 1.0, 1.0]),
            Atom::new(Element::Ar, [1.0, 1.0, 1.0]),
        ]);
        assert!(matches!(
            m.evaluate(&s),
            Err(Error::Overlap { i: 0, j: 1, .. })
        ));
    }

    #[test]
    fn invalid_models_are_rejected() {
        let bad_cutoff = "cutoff = -1.0\nreference_energies = {}\n";
        assert!(matches!(
            PairPotential::from_toml(bad_cutoff),
            Err(Error::InvalidModel(_))
        ));

        let bad_form = r#"
cutoff = 3.0
reference_energies = {}
pairs = [{ elements = ["H", "H"], form = "harmonic", k = 1.0 }]
"#;
        assert!(matches!(
            PairPotential::from_toml(bad_form),
            Err(Error::ModelParse(_))
        ));

        let duplicate = r#"
cutoff = 3.0
reference_energies = {}
pairs = [
  { elements = ["H", "O"], form = "lennard-jones", sigma = 1.0, epsilon = 0.1 },
  { elements = ["O", "H"], form = "lennard-jones", sigma = 1.0, epsilon = 0.2 },
]
"#;
        assert!(matches!(
            PairPotential::from_toml(duplicate),
            Err(Error::InvalidModel(_))
        ));

        let negative_sigma = r#"
cutoff = 3.0
reference_energies = {}
pairs = [{ elements = ["H", "H"], form = "lennard-jones", sigma = -1.0, epsilon = 0.1 }]
"#;
        assert!(matches!(
            PairPotential::from_toml(negative_sigma),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn loader_reads_artifact_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("member.toml");
        std::fs::write(&path, MODEL).unwrap();

        let loaded = PairPotentialLoader.load(&path).unwrap();
        assert_eq!(loaded.name(), "test");

        let missing = PairPotentialLoader.load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
