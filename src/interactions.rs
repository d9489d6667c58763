//! Attraction matrix for species-based particle forces.
//!
//! The attraction matrix defines how strongly each species is pulled toward
//! (or pushed away from) every other species. This is the heart of "particle
//! life": complex emergent behavior arises from a small K×K table.
//!
//! Entry `(i, j)` is the coefficient applied when a species-`i` particle is
//! influenced by a species-`j` particle:
//! - `> 0`: attraction (pulls toward)
//! - `< 0`: repulsion (pushes away)
//! - `= 0`: ignore (only the short-range repulsion acts)
//!
//! [`AttractionMatrix`] is the plain value the core consumes. The tuning
//! surface edits one through a [`MatrixController`], which adds the editing
//! rules of an interactive panel: a value range, a symmetry toggle and a
//! seeded random source.
//!
//! # Example
//!
//! ```ignore
//! let mut controller = MatrixController::new(3);
//! controller.set(0, 1, 1.0);   // species 0 chases species 1 (and back, symmetry is on)
//! controller.randomize();
//! sim.tuning().set_matrix(controller.matrix().clone());
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::MatrixShapeError;

/// Seed of the controller's random source.
pub const MATRIX_SEED: u64 = 12345;
/// Default editing range of the tuning surface.
pub const DEFAULT_RANGE: (f32, f32) = (-3.0, 3.0);

/// Row-major K×K table of species coefficients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr")]
pub struct AttractionMatrix {
    /// Flattened matrix: `[self_species * species + other_species]`.
    values: Vec<f32>,
    /// Number of species (K).
    species: usize,
}

impl AttractionMatrix {
    /// Create a zero-filled matrix for `species` species (at least one).
    pub fn new(species: usize) -> Self {
        let species = species.max(1);
        Self {
            values: vec![0.0; species * species],
            species,
        }
    }

    /// Build a matrix from row-major values.
    ///
    /// Returns `None` when `values.len()` is not a non-zero perfect square.
    pub fn from_row_major(values: Vec<f32>) -> Option<Self> {
        let species = (values.len() as f64).sqrt().round() as usize;
        if species == 0 || species * species != values.len() {
            return None;
        }
        Some(Self { values, species })
    }

    /// Build a matrix from nested rows; every row must have `rows.len()` entries.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Option<Self> {
        let species = rows.len();
        if rows.iter().any(|r| r.as_ref().len() != species) {
            return None;
        }
        Self::from_row_major(rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect())
    }

    /// Number of species (K).
    pub fn species(&self) -> usize {
        self.species
    }

    /// Coefficient applied when `self_species` is influenced by `other_species`.
    ///
    /// Out-of-range species read as zero.
    #[inline]
    pub fn get(&self, self_species: usize, other_species: usize) -> f32 {
        if self_species < self.species && other_species < self.species {
            self.values[self_species * self.species + other_species]
        } else {
            0.0
        }
    }

    /// Set a single entry. Out-of-range species are ignored.
    pub fn set(&mut self, self_species: usize, other_species: usize, value: f32) {
        if self_species < self.species && other_species < self.species {
            self.values[self_species * self.species + other_species] = value;
        }
    }

    /// Set `(a, b)` and `(b, a)` to the same value.
    pub fn set_symmetric(&mut self, a: usize, b: usize, value: f32) {
        self.set(a, b, value);
        self.set(b, a, value);
    }

    /// Fill with uniform random values in `[min, max]`.
    ///
    /// When `symmetric` is set, only the upper triangle (diagonal included)
    /// is drawn and mirrored onto the lower one.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R, min: f32, max: f32, symmetric: bool) {
        let (lo, hi) = ordered(min, max);
        let k = self.species;
        for i in 0..k {
            let start = if symmetric { i } else { 0 };
            for j in start..k {
                let v = sample(rng, lo, hi);
                self.values[i * k + j] = v;
                if symmetric {
                    self.values[j * k + i] = v;
                }
            }
        }
    }

    /// Fill every entry with `value`.
    pub fn reset_all(&mut self, value: f32) {
        self.values.fill(value);
    }

    /// Copy the upper triangle onto the lower one.
    pub fn symmetrize(&mut self) {
        let k = self.species;
        for i in 0..k {
            for j in (i + 1)..k {
                self.values[j * k + i] = self.values[i * k + j];
            }
        }
    }

    /// Whether `(i, j)` equals `(j, i)` within `tolerance` for every pair.
    pub fn is_symmetric(&self, tolerance: f32) -> bool {
        let k = self.species;
        (0..k).all(|i| ((i + 1)..k).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= tolerance))
    }

    /// Raw row-major data, e.g. for GPU upload.
    pub fn data(&self) -> &[f32] {
        &self.values
    }

    /// One row: how species `self_species` reacts to every species.
    pub fn row(&self, self_species: usize) -> &[f32] {
        let k = self.species;
        let start = self_species.min(k - 1) * k;
        &self.values[start..start + k]
    }
}

impl Default for AttractionMatrix {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Unchecked serialized form.
#[derive(Deserialize)]
struct MatrixRepr {
    values: Vec<f32>,
    species: usize,
}

impl TryFrom<MatrixRepr> for AttractionMatrix {
    type Error = MatrixShapeError;

    fn try_from(repr: MatrixRepr) -> Result<Self, Self::Error> {
        let len = repr.values.len();
        match Self::from_row_major(repr.values) {
            Some(matrix) if matrix.species == repr.species => Ok(matrix),
            _ => Err(MatrixShapeError {
                species: repr.species,
                len,
            }),
        }
    }
}

/// Editing rules of the matrix panel.
///
/// Manual edits are clamped into the configured range and mirrored across
/// the diagonal while symmetry is enabled. The controller owns a working
/// matrix; hand [`matrix`](Self::matrix) to the simulation to publish it.
#[derive(Clone, Debug)]
pub struct MatrixController {
    matrix: AttractionMatrix,
    min: f32,
    max: f32,
    symmetric: bool,
    rng: StdRng,
}

impl MatrixController {
    /// Controller over a zero matrix with the default range and symmetry on.
    pub fn new(species: usize) -> Self {
        Self::from_matrix(AttractionMatrix::new(species))
    }

    pub fn from_matrix(matrix: AttractionMatrix) -> Self {
        Self {
            matrix,
            min: DEFAULT_RANGE.0,
            max: DEFAULT_RANGE.1,
            symmetric: true,
            rng: StdRng::seed_from_u64(MATRIX_SEED),
        }
    }

    /// Reseed the random source.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn matrix(&self) -> &AttractionMatrix {
        &self.matrix
    }

    /// Swap in a whole matrix, unclamped. Symmetry mode is switched off when
    /// the new matrix is not symmetric.
    pub fn replace(&mut self, matrix: AttractionMatrix) {
        self.matrix = matrix;
        if self.symmetric && !self.matrix.is_symmetric(0.0) {
            self.symmetric = false;
        }
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Set the editing range; reversed bounds are swapped.
    pub fn set_range(&mut self, min: f32, max: f32) {
        (self.min, self.max) = ordered(min, max);
    }

    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Toggle symmetry. Enabling it mirrors the upper triangle immediately.
    pub fn set_symmetric(&mut self, symmetric: bool) {
        self.symmetric = symmetric;
        if symmetric {
            self.matrix.symmetrize();
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.matrix.get(i, j)
    }

    /// Set one entry, clamped into the range and mirrored when symmetric.
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        let value = value.clamp(self.min, self.max);
        if self.symmetric {
            self.matrix.set_symmetric(i, j, value);
        } else {
            self.matrix.set(i, j, value);
        }
    }

    /// Fill with random values from the configured range.
    pub fn randomize(&mut self) {
        let (min, max, symmetric) = (self.min, self.max, self.symmetric);
        self.matrix.randomize(&mut self.rng, min, max, symmetric);
    }

    /// Fill every entry with `value`.
    pub fn reset_all(&mut self, value: f32) {
        self.matrix.reset_all(value);
    }

    /// Replace the matrix with a zero matrix for a new species count.
    pub fn resize(&mut self, species: usize) {
        self.matrix = AttractionMatrix::new(species);
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    lo + rng.gen::<f32>() * (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matrix_is_zero() {
        let m = AttractionMatrix::new(4);
        assert_eq!(m.species(), 4);
        assert_eq!(m.data().len(), 16);
        assert!(m.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zero_species_becomes_one() {
        assert_eq!(AttractionMatrix::new(0).species(), 1);
    }

    #[test]
    fn test_row_major_layout() {
        let m = AttractionMatrix::from_rows(&[[0.0, 1.0], [2.0, 3.0]]).unwrap();
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 2.0);
        assert_eq!(m.row(1), &[2.0, 3.0]);
    }

    #[test]
    fn test_from_row_major_rejects_non_square() {
        assert!(AttractionMatrix::from_row_major(vec![1.0, 2.0, 3.0]).is_none());
        assert!(AttractionMatrix::from_row_major(Vec::new()).is_none());
        assert!(AttractionMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_none());
    }

    #[test]
    fn test_json_shape_is_checked() {
        let m = AttractionMatrix::from_rows(&[[0.0, 1.0], [-1.0, 0.5]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: AttractionMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        for bad in [
            r#"{"values":[],"species":2}"#,
            r#"{"values":[1.0,2.0,3.0],"species":1}"#,
            r#"{"values":[1.0,2.0,3.0,4.0],"species":3}"#,
        ] {
            let err = serde_json::from_str::<AttractionMatrix>(bad).unwrap_err();
            assert!(err.to_string().contains("expected"), "{bad}: {err}");
        }
    }

    #[test]
    fn test_out_of_range_access_is_ignored() {
        let mut m = AttractionMatrix::new(2);
        m.set(5, 0, 9.0);
        assert_eq!(m.get(5, 0), 0.0);
        assert!(m.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_symmetric_randomize_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(7);
        for k in 1..8 {
            let mut m = AttractionMatrix::new(k);
            m.randomize(&mut rng, -1.0, 1.0, true);
            assert!(m.is_symmetric(0.0), "K={k}");
            assert!(m.data().iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_asymmetric_randomize_fills_both_triangles() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = AttractionMatrix::new(6);
        m.randomize(&mut rng, 0.5, 2.0, false);
        assert!(!m.is_symmetric(1e-6));
        assert!(m.data().iter().all(|v| (0.5..=2.0).contains(v)));
    }

    #[test]
    fn test_reset_all() {
        let mut m = AttractionMatrix::new(3);
        m.reset_all(0.25);
        assert!(m.data().iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_controller_clamps_and_mirrors() {
        let mut c = MatrixController::new(3);
        c.set(0, 2, 10.0);
        assert_eq!(c.get(0, 2), DEFAULT_RANGE.1);
        assert_eq!(c.get(2, 0), DEFAULT_RANGE.1);
    }

    #[test]
    fn test_controller_without_symmetry_edits_one_entry() {
        let mut c = MatrixController::new(3);
        c.set_symmetric(false);
        c.set(1, 2, 0.5);
        assert_eq!(c.get(1, 2), 0.5);
        assert_eq!(c.get(2, 1), 0.0);
    }

    #[test]
    fn test_enabling_symmetry_mirrors_upper_triangle() {
        let mut c = MatrixController::new(3);
        c.set_symmetric(false);
        c.set(0, 1, 1.0);
        c.set(1, 0, -1.0);
        c.set_symmetric(true);
        assert_eq!(c.get(1, 0), 1.0);
        assert!(c.matrix().is_symmetric(0.0));
    }

    #[test]
    fn test_controller_randomize_respects_range_and_symmetry() {
        let mut c = MatrixController::new(5);
        c.set_range(2.0, -2.0);
        assert_eq!(c.range(), (-2.0, 2.0));
        c.randomize();
        assert!(c.matrix().is_symmetric(0.0));
        assert!(c.matrix().data().iter().all(|v| (-2.0..=2.0).contains(v)));
    }

    #[test]
    fn test_controller_seed_is_reproducible() {
        let mut a = MatrixController::new(4);
        let mut b = MatrixController::new(4);
        a.randomize();
        b.randomize();
        assert_eq!(a.matrix(), b.matrix());
    }
}
