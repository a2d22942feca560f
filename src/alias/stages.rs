//! The individual stages of alias resolution.
//!
//! Each stage takes the previous stage's matrix by reference and returns a
//! fresh matrix, so every intermediate snapshot can be inspected and tested
//! on its own. Rows and columns are indexed by effect in [`EffectLayout`]
//! order. Apart from `t`, the correlation-derived matrices hold absolute
//! values only, so "has a non-zero entry" and "has a positive entry" agree.

use std::ops::Range;

use nalgebra::DMatrix;

use super::labels::EffectLayout;
use crate::linalg::{arg_max, max_or_zero};

/// Share of the largest off-diagonal correlation below which correlations
/// are ignored.
pub const WEIGHTING_FACTOR: f64 = 0.5;

/// Absolute correlations below this are rounded to zero.
pub const ZERO_TOL: f64 = 1.0e-4;

/// Weights this close to 1 are identity artifacts.
pub const TIE_TOL: f64 = 1.0e-4;

/// Main-effect correlations at or above this abort the resolution. A true
/// correlation never exceeds 1 in magnitude, so this only trips on
/// degenerate input.
pub const STRONG_CORRELATION: f64 = 1.5;

/// Which block a row's strongest surviving correlation falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCategory {
    Unclassified,
    MainEffect,
    TwoWay,
    ThreeWay,
}

/// Model matrix: normalized main effects, then 2-way and 3-way products.
///
/// Factor `j` is mapped linearly by `1 - 2 (max_j - x) / (max_j - 1)`, where
/// `max_j` is the largest level observed in that column.
pub fn model_matrix(fraction: &DMatrix<f64>, layout: &EffectLayout) -> DMatrix<f64> {
    let rows = fraction.nrows();
    let maxima: Vec<f64> = fraction.column_iter().map(|c| c.max()).collect();
    let normalized = DMatrix::from_fn(rows, layout.main, |i, j| {
        1.0 - (2.0 * (maxima[j] - fraction[(i, j)])) / (maxima[j] - 1.0)
    });

    let groups = layout.factor_groups();
    DMatrix::from_fn(rows, groups.len(), |i, c| {
        groups[c].iter().map(|&f| normalized[(i, f)]).product()
    })
}

/// Limit value: `WEIGHTING_FACTOR` times the largest off-diagonal `|t|`.
/// `NaN` entries are skipped.
pub fn limit_value(t: &DMatrix<f64>) -> f64 {
    let mut max_corr: f64 = 0.0;
    for j in 0..t.ncols() {
        for (i, v) in t.column(j).iter().enumerate() {
            if i != j && v.abs() > max_corr {
                max_corr = v.abs();
            }
        }
    }
    max_corr * WEIGHTING_FACTOR
}

/// `|t|` with tiny and undefined correlations set to exactly zero.
pub fn weight_matrix(t: &DMatrix<f64>) -> DMatrix<f64> {
    t.map(|v| {
        let w = v.abs();
        if w.is_nan() || w < ZERO_TOL {
            0.0
        } else {
            w
        }
    })
}

/// First pair of main effects `(row, col)` whose weight reaches
/// [`STRONG_CORRELATION`], scanning column by column.
pub fn strong_main_correlation(w: &DMatrix<f64>, layout: &EffectLayout) -> Option<(usize, usize, f64)> {
    let me = layout.main;
    for col in 0..me.saturating_sub(1) {
        for row in (col + 1)..me {
            if w[(row, col)].abs() >= STRONG_CORRELATION {
                return Some((row, col, w[(row, col)]));
            }
        }
    }
    None
}

/// Keeps only weights at or above `vl`, dropping the diagonal and
/// near-1 identity artifacts.
pub fn threshold_weights(w: &DMatrix<f64>, vl: f64) -> DMatrix<f64> {
    DMatrix::from_fn(w.nrows(), w.ncols(), |v, i| {
        let value = w[(v, i)];
        if i == v || (value - 1.0).abs() < TIE_TOL || value < vl {
            0.0
        } else {
            value
        }
    })
}

pub fn has_confounding(rev_w: &DMatrix<f64>) -> bool {
    rev_w.iter().any(|&v| v > 0.0)
}

/// Categorises every row by the first block, in main / 2-way order, that
/// holds a surviving correlation. Rows whose only survivors are 3-way stay
/// unclassified until [`classify_three_way_rows`].
pub fn classify_rows(rev_w: &DMatrix<f64>, layout: &EffectLayout) -> Vec<RowCategory> {
    (0..rev_w.nrows())
        .map(|r| {
            if !row_has_positive(rev_w, r, 0..layout.total()) {
                RowCategory::Unclassified
            } else if row_has_positive(rev_w, r, layout.main_range()) {
                RowCategory::MainEffect
            } else if row_has_positive(rev_w, r, layout.two_way_range()) {
                RowCategory::TwoWay
            } else {
                RowCategory::Unclassified
            }
        })
        .collect()
}

/// First pass: each higher-order row aliased to a main effect keeps only its
/// strongest main-effect correlation, and its own column is cleared.
pub fn resolve_main_effect_rows(
    d: &DMatrix<f64>,
    categories: &[RowCategory],
    layout: &EffectLayout,
) -> DMatrix<f64> {
    let mut out = d.clone();
    for fx in layout.higher_order_range() {
        if categories[fx] != RowCategory::MainEffect {
            continue;
        }
        let mut block = row_values(&out, fx, layout.main_range());
        if isolate_max(&mut block) {
            set_row_values(&mut out, fx, 0, &block);
            for c in layout.higher_order_range() {
                out[(fx, c)] = 0.0;
            }
            out.column_mut(fx).fill(0.0);
        }
    }
    out
}

/// Second pass: rows aliased within the 2-way block keep only their
/// strongest 2-way correlation; everything else in the row is cleared.
pub fn resolve_two_way_rows(
    d: &DMatrix<f64>,
    categories: &[RowCategory],
    layout: &EffectLayout,
) -> DMatrix<f64> {
    let mut out = d.clone();
    for vx in layout.higher_order_range() {
        if categories[vx] != RowCategory::TwoWay {
            continue;
        }
        let mut block = row_values(&out, vx, layout.two_way_range());
        if isolate_max(&mut block) {
            out.row_mut(vx).fill(0.0);
            set_row_values(&mut out, vx, layout.main, &block);
            out.column_mut(vx).fill(0.0);
        }
    }
    out
}

/// 3-way rows whose main and 2-way blocks are now empty but whose 3-way
/// block is not are moved into [`RowCategory::ThreeWay`].
pub fn classify_three_way_rows(
    d: &DMatrix<f64>,
    categories: &[RowCategory],
    layout: &EffectLayout,
) -> Vec<RowCategory> {
    let mut out = categories.to_vec();
    if layout.three_way == 0 {
        return out;
    }
    let lower = 0..layout.main + layout.two_way;
    for gk in layout.three_way_range() {
        if !row_has_positive(d, gk, lower.clone()) && row_has_positive(d, gk, layout.three_way_range()) {
            out[gk] = RowCategory::ThreeWay;
        }
    }
    out
}

/// Third pass: 3-way rows keep only their strongest 3-way correlation.
pub fn resolve_three_way_rows(
    d: &DMatrix<f64>,
    categories: &[RowCategory],
    layout: &EffectLayout,
) -> DMatrix<f64> {
    let mut out = d.clone();
    for vxx in layout.three_way_range() {
        if categories[vxx] != RowCategory::ThreeWay {
            continue;
        }
        let mut block = row_values(&out, vxx, layout.three_way_range());
        if isolate_max(&mut block) {
            set_row_values(&mut out, vxx, layout.main + layout.two_way, &block);
            out.column_mut(vxx).fill(0.0);
        }
    }
    out
}

/// `w` with its (unit) diagonal removed.
pub fn unresolved_weights(w: &DMatrix<f64>) -> DMatrix<f64> {
    let mut ud = w.clone();
    for i in 0..ud.nrows().min(ud.ncols()) {
        if (ud[(i, i)] - 1.0).abs() < TIE_TOL {
            ud[(i, i)] = 0.0;
        }
    }
    ud
}

/// Higher-order rows left unresolved in `d` fall back to their raw weights
/// from `ud`; resolved rows keep `d`. Main-effect rows start empty.
pub fn fallback_rows(d: &DMatrix<f64>, ud: &DMatrix<f64>, layout: &EffectLayout) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(d.nrows(), d.ncols());
    for f in layout.higher_order_range() {
        let source = if row_has_positive(d, f, 0..d.ncols()) { d } else { ud };
        out.set_row(f, &source.row(f));
    }
    out
}

/// Clears every higher-order row whose effect already appears as an alias
/// target in `reference`.
pub fn clear_alias_target_rows(
    m: &DMatrix<f64>,
    reference: &DMatrix<f64>,
    layout: &EffectLayout,
) -> DMatrix<f64> {
    let mut out = m.clone();
    for ff in layout.higher_order_range() {
        if reference.column(ff).iter().any(|&v| v > 0.0) {
            out.row_mut(ff).fill(0.0);
        }
    }
    out
}

/// Rows aliased to a main effect in `d` are helpers. An unmarked
/// higher-order row drops any cell pointing at a helper, and becomes a
/// helper itself the first time it keeps one, which breaks alias chains.
pub fn propagate_helpers(ml: &DMatrix<f64>, d: &DMatrix<f64>, layout: &EffectLayout) -> DMatrix<f64> {
    let mut mz = ml.clone();
    let mut helper: Vec<bool> = (0..mz.nrows())
        .map(|r| row_has_positive(d, r, layout.main_range()))
        .collect();

    for ee in layout.higher_order_range() {
        if helper[ee] {
            continue;
        }
        for uu in layout.higher_order_range() {
            if mz[(ee, uu)] != 0.0 {
                if helper[uu] {
                    mz[(ee, uu)] = 0.0;
                } else {
                    helper[ee] = true;
                }
            }
        }
    }
    mz
}

/// Keeps at most one entry per row: the first maximum.
pub fn keep_row_maxima(mz: &DMatrix<f64>) -> DMatrix<f64> {
    let mut mx = mz.clone();
    for r in 0..mx.nrows() {
        let mut row = row_values(&mx, r, 0..mx.ncols());
        if isolate_max(&mut row) {
            set_row_values(&mut mx, r, 0, &row);
        }
    }
    mx
}

/// Sets the diagonal of every main effect, and of every higher-order effect
/// that is itself an alias target. If some effect still has an empty row,
/// empty higher-order rows get a unit diagonal so no effect is left out.
pub fn mark_estimable(ch: &DMatrix<f64>, layout: &EffectLayout) -> DMatrix<f64> {
    let mut out = ch.clone();
    for ss in layout.main_range() {
        out[(ss, ss)] = 1.0;
    }
    for sss in layout.higher_order_range() {
        if out.column(sss).iter().any(|&v| v > 0.0) {
            out[(sss, sss)] = 1.0;
        }
    }

    let rows_with_alias = (0..out.nrows())
        .filter(|&r| row_has_positive(&out, r, 0..out.ncols()))
        .count();
    if rows_with_alias < layout.total() {
        for yy in layout.higher_order_range() {
            if !row_has_positive(&out, yy, 0..out.ncols()) {
                out[(yy, yy)] = 1.0;
            }
        }
    }
    out
}

/// Copies the signed correlation from `t` wherever its magnitude equals the
/// resolved entry of `ch`; zero elsewhere.
pub fn restore_signs(t: &DMatrix<f64>, ch: &DMatrix<f64>) -> DMatrix<f64> {
    t.zip_map(ch, |tv, cv| if tv.abs() == cv.abs() { tv } else { 0.0 })
}

/// Zeroes every element except the first maximum, so later ties lose.
/// Returns false, leaving the slice untouched, when the maximum is zero.
pub fn isolate_max(values: &mut [f64]) -> bool {
    let Some(h) = arg_max(values) else {
        return false;
    };
    if values[h] == 0.0 {
        return false;
    }
    for (c, v) in values.iter_mut().enumerate() {
        if c != h {
            *v = 0.0;
        }
    }
    true
}

fn row_values(m: &DMatrix<f64>, row: usize, cols: Range<usize>) -> Vec<f64> {
    cols.map(|c| m[(row, c)]).collect()
}

fn set_row_values(m: &mut DMatrix<f64>, row: usize, start: usize, values: &[f64]) {
    for (k, &v) in values.iter().enumerate() {
        m[(row, start + k)] = v;
    }
}

fn row_has_positive(m: &DMatrix<f64>, row: usize, cols: Range<usize>) -> bool {
    max_or_zero(&row_values(m, row, cols)) != 0.0
}
