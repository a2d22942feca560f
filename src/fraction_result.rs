use nalgebra::DVector;

use crate::fraction_matrix::FractionMatrix;

/// One generated fraction together with its quality metrics.
///
/// # Fields
///
/// * `index` - 1-based position of the fraction in its generation request
/// * `start` - 1-based run of the full design the fraction starts at
/// * `gbm` - balance metric, 0 when perfectly balanced
/// * `j2` - orthogonality metric, lower is more orthogonal
/// * `vifs` - variance inflation factor of each factor column
/// * `fraction` - the runs themselves
#[derive(Debug, Clone, PartialEq)]
pub struct FractionResult {
    pub index: usize,
    pub start: usize,
    pub gbm: f64,
    pub j2: f64,
    pub vifs: DVector<f64>,
    pub fraction: FractionMatrix,
}

impl FractionResult {
    pub fn max_vif(&self) -> f64 {
        self.vifs.iter().copied().fold(0.0, f64::max)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Fraction {} (start {}) - GBM: {:.4}, J2: {:.4}, Max VIF: {:.4}",
            self.index,
            self.start,
            self.gbm,
            self.j2,
            self.max_vif()
        )
    }
}
