use super::types::Element;

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub element: Element,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: Element, position: [f64; 3]) -> Self {
        Self { element, position }
    }
}

/// One atomic configuration of the evaluation set.
///
/// `cell` holds the three lattice vectors as rows. `pbc` flags which of
/// them are periodic; a structure without a cell is never periodic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub atoms: Vec<Atom>,
    pub cell: Option<[[f64; 3]; 3]>,
    pub pbc: [bool; 3],
}

impl Structure {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self {
            atoms,
            cell: None,
            pbc: [false; 3],
        }
    }

    pub fn with_cell(mut self, cell: [[f64; 3]; 3], pbc: [bool; 3]) -> Self {
        self.cell = Some(cell);
        self.pbc = pbc;
        self
    }

    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.cell.is_some() && self.pbc.iter().any(|&p| p)
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Chemical formula in Hill order (C, H, then alphabetical).
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;

        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.element.symbol()).or_insert(0) += 1;
        }

        let mut out = String::new();
        let mut push = |sym: &str, n: usize| {
            out.push_str(sym);
            if n > 1 {
                out.push_str(&n.to_string());
            }
        };

        if let Some(c) = counts.remove("C") {
            push("C", c);
            if let Some(h) = counts.remove("H") {
                push("H", h);
            }
        }
        for (sym, n) in counts {
            push(sym, n);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Structure {
        Structure::new(vec![
            Atom::new(Element::O, [0.0, 0.0, 0.0]),
            Atom::new(Element::H, [0.96, 0.0, 0.0]),
            Atom::new(Element::H, [-0.24, 0.93, 0.0]),
        ])
    }

    #[test]
    fn cell_without_periodic_axes_is_not_periodic() {
        let s = water().with_cell([[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]], [false; 3]);
        assert!(!s.is_periodic());
        let s = s.with_cell([[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]], [true, true, false]);
        assert!(s.is_periodic());
    }

    #[test]
    fn formula_uses_hill_order() {
        assert_eq!(water().formula(), "H2O");

        let mut methanol = water();
        methanol.atoms.push(Atom::new(Element::C, [1.0, 1.0, 1.0]));
        methanol.atoms.push(Atom::new(Element::H, [2.0, 1.0, 1.0]));
        assert_eq!(methanol.formula(), "CH3O");
    }
}
