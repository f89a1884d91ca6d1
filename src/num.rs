//! Utilities for numerics.

use std::cmp::Ordering;

/// Applies the standard sigmoid/logistic function to the input.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// An `f32` that implements [`Ord`] according to the IEEE 754 totalOrder predicate.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn total_order_sorts_nan_last() {
        let mut v = vec![TotalF32(1.0), TotalF32(f32::NAN), TotalF32(-3.0)];
        v.sort();
        assert_eq!(v[0].0, -3.0);
        assert_eq!(v[1].0, 1.0);
        assert!(v[2].0.is_nan());
    }
}
