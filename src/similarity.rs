// src/similarity.rs
//! Jaccard coefficient over token sets.

use crate::tokenize::TokenSet;

/// `|A ∩ B| / |A ∪ B|`, in `[0, 1]`.
///
/// Membership is tested from the smaller set into the larger one; the value is
/// symmetric either way. Two empty sets score `0.0` (no shared evidence), never NaN.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let inter = small.iter().filter(|t| large.contains(*t)).count();
    let union = a.len() + b.len() - inter;
    if union == 0 {
        return 0.0;
    }
    inter as f64 / union as f64
}
