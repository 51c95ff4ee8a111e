//! Cosine similarity between embedding vectors.
//!
//! Accumulation happens in `f64` so that a vector compared with itself yields
//! exactly `1.0` and symmetric pairs give bit-identical results.

/// Returns `None` when the lengths differ. A zero vector is similar to nothing
/// (score `0.0`).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    Some(NormedVector::new(a).similarity(&NormedVector::new(b)))
}

/// A vector with its squared norm computed once, for repeated pair scoring.
#[derive(Debug, Clone, Copy)]
pub struct NormedVector<'a> {
    values: &'a [f32],
    norm_sq: f64,
}

impl<'a> NormedVector<'a> {
    pub fn new(values: &'a [f32]) -> Self {
        let norm_sq = values.iter().map(|x| (*x as f64) * (*x as f64)).sum();
        Self { values, norm_sq }
    }

    pub fn is_zero(&self) -> bool {
        self.norm_sq == 0.0
    }

    pub fn similarity(&self, other: &NormedVector<'_>) -> f64 {
        if self.is_zero() || other.is_zero() {
            return 0.0;
        }
        if std::ptr::eq(self.values, other.values) {
            return 1.0;
        }

        let dot: f64 = self
            .values
            .iter()
            .zip(other.values)
            .map(|(x, y)| (*x as f64) * (*y as f64))
            .sum();

        // u·u == ‖u‖² bit-for-bit, so identical vectors land on exactly 1.0.
        (dot / (self.norm_sq * other.norm_sq).sqrt()).clamp(-1.0, 1.0)
    }
}
