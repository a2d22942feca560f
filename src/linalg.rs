use nalgebra::{DMatrix, DVector};

use crate::error::{DesignError, Result};

/// Pivots with a smaller magnitude than this are treated as zero.
pub const PIVOT_TOL: f64 = 1.0e-10;

pub fn gcd(mut a: usize, mut b: usize) -> usize {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Zero when either argument is zero.
pub fn lcm(a: usize, b: usize) -> usize {
    if a == 0 || b == 0 {
        return 0;
    }
    // divide first to keep the intermediate small
    (a / gcd(a, b)) * b
}

/// Least common multiple of all entries, folded left to right. Every entry
/// must be positive.
pub fn calculate_lcm(numbers: &[usize]) -> Result<usize> {
    let (first, rest) = numbers
        .split_first()
        .ok_or_else(|| DesignError::invalid_argument("cannot take the LCM of an empty list"))?;
    if numbers.contains(&0) {
        return Err(DesignError::invalid_argument("cannot take the LCM of a list containing 0"));
    }
    Ok(rest.iter().fold(*first, |acc, &x| lcm(acc, x)))
}

/// Binomial coefficient via the multiplicative recurrence. Zero when `k` is
/// outside `0..=n`.
pub fn n_choose_k(n: i64, k: i64) -> u64 {
    if k < 0 || k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: u64 = 1;
    for i in 0..k {
        result = result * (n - i) as u64 / (i + 1) as u64;
    }
    result
}

/// Pearson correlation matrix of the columns of `m`.
///
/// The diagonal is always 1. A column with zero variance has no defined
/// correlation, so every off-diagonal entry involving it is `NaN`; callers
/// must check for that before comparing.
pub fn correlation_matrix(m: &DMatrix<f64>) -> DMatrix<f64> {
    let rows = m.nrows() as f64;
    let cols = m.ncols();

    let means: Vec<f64> = m.column_iter().map(|c| c.mean()).collect();
    let std_devs: Vec<f64> = m
        .column_iter()
        .zip(means.iter())
        .map(|(c, &mean)| (c.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / rows).sqrt())
        .collect();

    let mut corr = DMatrix::<f64>::identity(cols, cols);
    for i in 0..cols {
        for j in (i + 1)..cols {
            let value = if std_devs[i] == 0.0 || std_devs[j] == 0.0 {
                f64::NAN
            } else {
                let covariance: f64 = m
                    .column(i)
                    .iter()
                    .zip(m.column(j).iter())
                    .map(|(a, b)| (a - means[i]) * (b - means[j]))
                    .sum();
                covariance / (rows * std_devs[i] * std_devs[j])
            };
            corr[(i, j)] = value;
            corr[(j, i)] = value;
        }
    }
    corr
}

/// Gauss-Jordan inversion with partial pivoting on `[M | I]`.
///
/// Returns `None` when a pivot falls below [`PIVOT_TOL`] in magnitude, which
/// includes any `NaN` entry reaching the pivot position.
pub fn invert(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    let mut augmented = DMatrix::<f64>::zeros(n, 2 * n);
    augmented.view_mut((0, 0), (n, n)).copy_from(m);
    augmented.view_mut((0, n), (n, n)).fill_with_identity();

    for i in 0..n {
        let pivot_row = find_pivot_row(&augmented, i);
        if pivot_row != i {
            augmented.swap_rows(i, pivot_row);
        }

        let pivot = augmented[(i, i)];
        if pivot.is_nan() || pivot.abs() < PIVOT_TOL {
            return None;
        }
        augmented.row_mut(i).scale_mut(1.0 / pivot);

        let pivot_values = augmented.row(i).clone_owned();
        for k in 0..n {
            if k != i {
                let factor = augmented[(k, i)];
                let mut row = augmented.row_mut(k);
                row -= &pivot_values * factor;
            }
        }
    }

    Some(augmented.columns(n, n).into_owned())
}

fn find_pivot_row(matrix: &DMatrix<f64>, col: usize) -> usize {
    let mut max_row = col;
    let mut max_val = matrix[(col, col)].abs();
    for k in (col + 1)..matrix.nrows() {
        let val = matrix[(k, col)].abs();
        if val > max_val {
            max_val = val;
            max_row = k;
        }
    }
    max_row
}

/// Zero every entry strictly above the main diagonal.
pub fn lower_triangular(m: &DMatrix<f64>) -> DMatrix<f64> {
    m.lower_triangle()
}

pub fn diag_matrix(v: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_diagonal(v)
}

pub fn diag_vector(m: &DMatrix<f64>) -> DVector<f64> {
    m.diagonal()
}

/// Index of the first largest element. Ties resolve to the lowest index.
pub fn arg_max(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            None => best = Some((i, v)),
            Some((_, b)) if v > b => best = Some((i, v)),
            _ => {}
        }
    }
    best.map(|(i, _)| i)
}

/// Largest element, or 0 for an empty slice.
pub fn max_or_zero(values: &[f64]) -> f64 {
    arg_max(values).map_or(0.0, |i| values[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_gcd_lcm_identity() {
        for a in 1..20 {
            for b in 1..20 {
                assert_eq!(lcm(a, b) * gcd(a, b), a * b);
            }
        }
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(lcm(4, 6), 12);
        assert_eq!(lcm(0, 0), 0);
        assert_eq!(lcm(0, 5), 0);
    }

    #[test]
    fn test_calculate_lcm() {
        assert_eq!(calculate_lcm(&[4]).unwrap(), 4);
        assert_eq!(calculate_lcm(&[2, 3, 5]).unwrap(), 30);
        assert_eq!(calculate_lcm(&[2, 4]).unwrap(), 4);
        assert!(matches!(calculate_lcm(&[]), Err(DesignError::InvalidArgument(_))));
        assert!(matches!(calculate_lcm(&[0, 0]), Err(DesignError::InvalidArgument(_))));
        assert!(matches!(calculate_lcm(&[3, 0]), Err(DesignError::InvalidArgument(_))));
    }

    #[test]
    fn test_n_choose_k() {
        assert_eq!(n_choose_k(5, 2), 10);
        assert_eq!(n_choose_k(9, 3), 84);
        assert_eq!(n_choose_k(4, 0), 1);
        assert_eq!(n_choose_k(4, 4), 1);
        assert_eq!(n_choose_k(2, 3), 0);
        assert_eq!(n_choose_k(3, -1), 0);
    }

    #[test]
    fn test_correlation_matrix() {
        let m = dmatrix![
            1.0, 2.0, 1.0;
            2.0, 4.0, 1.0;
            3.0, 6.0, 2.0;
            4.0, 8.0, 2.0;
        ];
        let corr = correlation_matrix(&m);
        assert_relative_eq!(corr[(0, 0)], 1.0);
        assert_relative_eq!(corr[(0, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(corr[(1, 0)], corr[(0, 1)]);
        assert_relative_eq!(corr[(0, 2)], 0.894_427_190_999_915_8, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_matrix_zero_variance_is_nan() {
        let m = dmatrix![
            1.0, 3.0;
            2.0, 3.0;
            3.0, 3.0;
        ];
        let corr = correlation_matrix(&m);
        assert!(corr[(0, 1)].is_nan());
        assert!(corr[(1, 0)].is_nan());
        assert_eq!(corr[(1, 1)], 1.0);
    }

    #[test]
    fn test_invert() {
        let m = dmatrix![
            4.0, 7.0;
            2.0, 6.0;
        ];
        let inv = invert(&m).unwrap();
        let expected = dmatrix![
            0.6, -0.7;
            -0.2, 0.4;
        ];
        assert_relative_eq!(inv, expected, epsilon = 1e-12);
        assert_relative_eq!(&m * &inv, DMatrix::identity(2, 2), epsilon = 1e-12);
    }

    #[test]
    fn test_invert_needs_pivoting() {
        let m = dmatrix![
            0.0, 1.0;
            1.0, 0.0;
        ];
        let inv = invert(&m).unwrap();
        assert_relative_eq!(inv, m, epsilon = 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let m = dmatrix![
            1.0, 2.0;
            2.0, 4.0;
        ];
        assert!(invert(&m).is_none());

        let with_nan = dmatrix![
            1.0, f64::NAN;
            f64::NAN, 1.0;
        ];
        assert!(invert(&with_nan).is_none());
    }

    #[test]
    fn test_triangular_and_diag() {
        let m = dmatrix![
            1.0, 2.0, 3.0;
            4.0, 5.0, 6.0;
            7.0, 8.0, 9.0;
        ];
        let t = lower_triangular(&m);
        assert_eq!(t, dmatrix![1.0, 0.0, 0.0; 4.0, 5.0, 0.0; 7.0, 8.0, 9.0]);
        assert_eq!(diag_vector(&m), dvector![1.0, 5.0, 9.0]);
        assert_eq!(diag_matrix(&dvector![1.0, 2.0]), dmatrix![1.0, 0.0; 0.0, 2.0]);
    }

    #[test]
    fn test_arg_max_first_occurrence() {
        assert_eq!(arg_max(&[0.2, 0.7, 0.7, 0.1]), Some(1));
        assert_eq!(arg_max(&[]), None);
        assert_eq!(max_or_zero(&[]), 0.0);
        assert_eq!(max_or_zero(&[0.0, 0.3]), 0.3);
    }
}
