use std::fmt;
use std::ops::Deref;

use crate::error::{DesignError, Result};
use crate::linalg::calculate_lcm;

/// Hard ceiling on the number of factors in a design.
pub const MAX_FACTORS: usize = 9;

/// Ordered level counts, one per factor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesignSpec {
    levels: Vec<usize>,
}

impl DesignSpec {
    pub fn new(levels: Vec<usize>) -> Result<Self> {
        if levels.is_empty() || levels.len() > MAX_FACTORS {
            return Err(DesignError::invalid_design(
                &levels,
                format!("a design needs 1..={MAX_FACTORS} factors, got {}", levels.len()),
            ));
        }
        if let Some(pos) = levels.iter().position(|&l| l == 0) {
            return Err(DesignError::invalid_design(
                &levels,
                format!("factor {} has zero levels", pos + 1),
            ));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    pub fn factors(&self) -> usize {
        self.levels.len()
    }
}

impl Deref for DesignSpec {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.levels
    }
}

impl TryFrom<Vec<usize>> for DesignSpec {
    type Error = DesignError;

    fn try_from(levels: Vec<usize>) -> Result<Self> {
        Self::new(levels)
    }
}

impl fmt::Display for DesignSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.levels.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Scalar metrics derived from a level-count vector.
///
/// * `tr` - total run count of the full design (product of levels)
/// * `factors` - number of factors
/// * `lcm` - least common multiple of the levels
/// * `gl` - degrees of freedom, `factors + 2`
/// * `sf_min` - minimum feasible fraction size, `max(gl, max(levels))`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignParameters {
    pub tr: usize,
    pub factors: usize,
    pub lcm: usize,
    pub gl: usize,
    pub sf_min: usize,
}

impl DesignParameters {
    /// A design generates cyclic fractions only when every run is distinct,
    /// which holds exactly when `tr == lcm`.
    pub fn is_valid_for_generation(&self) -> bool {
        self.factors <= MAX_FACTORS && self.tr == self.lcm
    }
}

impl fmt::Display for DesignParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TR: {}, factors: {}, LCM: {}, GL: {}, SF min: {}",
            self.tr, self.factors, self.lcm, self.gl, self.sf_min
        )
    }
}

pub fn total_runs(levels: &[usize]) -> Result<usize> {
    levels.iter().try_fold(1usize, |acc, &l| {
        acc.checked_mul(l)
            .ok_or_else(|| DesignError::invalid_design(levels, "total run count overflows"))
    })
}

pub fn calculate_parameters(levels: &[usize]) -> Result<DesignParameters> {
    if let Some(pos) = levels.iter().position(|&l| l == 0) {
        return Err(DesignError::invalid_design(
            levels,
            format!("factor {} has zero levels", pos + 1),
        ));
    }
    let tr = total_runs(levels)?;
    let lcm = calculate_lcm(levels)?;
    let factors = levels.len();
    let gl = factors + 2;
    let max_level = levels.iter().copied().max().unwrap_or(0);
    Ok(DesignParameters {
        tr,
        factors,
        lcm,
        gl,
        sf_min: gl.max(max_level),
    })
}

pub fn validate_design(levels: &[usize]) -> bool {
    if levels.is_empty() || levels.len() > MAX_FACTORS {
        return false;
    }
    calculate_parameters(levels).is_ok_and(|p| p.is_valid_for_generation())
}

pub fn validate_fraction_size(levels: &[usize], size: usize) -> bool {
    calculate_parameters(levels).is_ok_and(|p| size >= p.sf_min && size < p.tr)
}

/// Checks design and fraction size, returning the parameters on success.
pub fn check_design(levels: &[usize], size: usize) -> Result<DesignParameters> {
    if levels.is_empty() || levels.len() > MAX_FACTORS {
        return Err(DesignError::invalid_design(
            levels,
            format!("a design needs 1..={MAX_FACTORS} factors, got {}", levels.len()),
        ));
    }
    let params = calculate_parameters(levels)?;
    if params.tr != params.lcm {
        return Err(DesignError::invalid_design(
            levels,
            format!("TR ({}) differs from LCM ({})", params.tr, params.lcm),
        ));
    }
    if size < params.sf_min || size >= params.tr {
        return Err(DesignError::FractionSizeOutOfRange {
            size,
            min: params.sf_min,
            max: params.tr,
        });
    }
    Ok(params)
}
