//! Quality metrics for a single fraction.
//!
//! * GBM measures balance: how far per-level run counts stray from the
//!   counts a perfectly balanced fraction would have.
//! * J2 measures orthogonality through pairwise run coincidences.
//! * VIFs measure multicollinearity between factor columns.

use nalgebra::DVector;

use crate::error::{DesignError, Result};
use crate::fraction_matrix::FractionMatrix;
use crate::linalg::{correlation_matrix, diag_vector, invert};

/// Sum over factors and levels of `(observed - rows / levels[j])^2`.
/// Zero for a perfectly balanced fraction.
pub fn balance_gbm(fraction: &FractionMatrix, levels: &[usize]) -> f64 {
    let rows = fraction.rows() as f64;
    let mut gbm = 0.0;
    for (j, column) in fraction.as_matrix().column_iter().enumerate() {
        let n_levels = levels[j];
        let expected = rows / n_levels as f64;
        let mut counts = vec![0usize; n_levels + 1];
        for &level in column.iter() {
            if level <= n_levels {
                counts[level] += 1;
            }
        }
        gbm += counts[1..]
            .iter()
            .map(|&c| (c as f64 - expected).powi(2))
            .sum::<f64>();
    }
    gbm
}

/// Sum over unordered run pairs of the squared number of matching factors.
pub fn orthogonality_j2(fraction: &FractionMatrix) -> f64 {
    let rows = fraction.rows();
    let mut j2 = 0.0;
    for i in 0..rows {
        for k in (i + 1)..rows {
            let matches = (0..fraction.factors())
                .filter(|&j| fraction.get(i, j) == fraction.get(k, j))
                .count();
            j2 += (matches * matches) as f64;
        }
    }
    j2
}

/// Diagonal of the inverted correlation matrix of the fraction's columns.
///
/// Fails with [`DesignError::SingularCorrelation`] when the correlation
/// matrix cannot be inverted, including when a column has no variance.
pub fn variance_inflation(fraction: &FractionMatrix) -> Result<DVector<f64>> {
    let corr = correlation_matrix(&fraction.to_f64());
    let inverse = invert(&corr).ok_or(DesignError::SingularCorrelation)?;
    Ok(diag_vector(&inverse))
}
