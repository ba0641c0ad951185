//! Flat-vector helpers shared by the solver and the line search

/// Dot product of two vectors
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(&a, &b)| a * b).sum()
}

/// Euclidean norm of a vector
#[inline]
pub fn norm(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

/// In-place `y += alpha * x`
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// Returns `base + alpha * direction` as a fresh vector
#[inline]
pub fn offset(base: &[f64], alpha: f64, direction: &[f64]) -> Vec<f64> {
    base.iter()
        .zip(direction.iter())
        .map(|(&b, &d)| b + alpha * d)
        .collect()
}

/// Returns `x * scale` as a fresh vector
#[inline]
pub fn scaled(x: &[f64], scale: f64) -> Vec<f64> {
    x.iter().map(|&v| v * scale).collect()
}

/// True when every component is finite
#[inline]
pub fn all_finite(x: &[f64]) -> bool {
    x.iter().all(|v| v.is_finite())
}
