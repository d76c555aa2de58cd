//! Periodic image enumeration for triclinic cells.

use super::error::Error;
use crate::model::structure::Structure;

/// Lattice vectors (rows) together with the periodic axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    vectors: [[f64; 3]; 3],
    pbc: [bool; 3],
}

impl Lattice {
    /// Returns `None` for structures without any periodic axis.
    pub fn of(structure: &Structure) -> Result<Option<Self>, Error> {
        match structure.cell {
            Some(vectors) if structure.is_periodic() => {
                Self::new(vectors, structure.pbc).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn new(vectors: [[f64; 3]; 3], pbc: [bool; 3]) -> Result<Self, Error> {
        let lattice = Self { vectors, pbc };
        let volume = lattice.volume();
        if !volume.is_finite() || volume.abs() < 1e-12 {
            return Err(Error::InvalidCell(format!(
                "lattice vectors are degenerate (volume {volume:.3e} Å³)"
            )));
        }
        Ok(lattice)
    }

    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.vectors;
        dot(a, cross(b, c))
    }

    /// Distance between opposite faces of the cell along each axis.
    pub fn widths(&self) -> [f64; 3] {
        let [a, b, c] = self.vectors;
        let volume = self.volume().abs();
        [
            volume / norm(cross(b, c)),
            volume / norm(cross(c, a)),
            volume / norm(cross(a, b)),
        ]
    }

    /// Maps `position` back into the cell along the periodic axes.
    pub fn wrap(&self, position: [f64; 3]) -> [f64; 3] {
        let [a, b, c] = self.vectors;
        let volume = self.volume();
        let fractional = [
            dot(position, cross(b, c)) / volume,
            dot(position, cross(c, a)) / volume,
            dot(position, cross(a, b)) / volume,
        ];

        let mut wrapped = position;
        for axis in 0..3 {
            if !self.pbc[axis] {
                continue;
            }
            let shift = fractional[axis].floor();
            for (k, slot) in wrapped.iter_mut().enumerate() {
                *slot -= shift * self.vectors[axis][k];
            }
        }
        wrapped
    }

    /// All lattice translations that can bring an image within `cutoff`
    /// of any atom inside the cell, including the zero translation.
    /// Positions must be wrapped first.
    pub fn translations(&self, cutoff: f64) -> Vec<[f64; 3]> {
        let widths = self.widths();
        let mut reach = [0i32; 3];
        for axis in 0..3 {
            if self.pbc[axis] {
                reach[axis] = (cutoff / widths[axis]).ceil() as i32;
            }
        }

        let mut out = Vec::new();
        for na in -reach[0]..=reach[0] {
            for nb in -reach[1]..=reach[1] {
                for nc in -reach[2]..=reach[2] {
                    let mut t = [0.0; 3];
                    for (k, slot) in t.iter_mut().enumerate() {
                        *slot = f64::from(na) * self.vectors[0][k]
                            + f64::from(nb) * self.vectors[1][k]
                            + f64::from(nc) * self.vectors[2][k];
                    }
                    out.push(t);
                }
            }
        }
        out
    }
}

pub(super) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}
