//! Alias structure resolution.
//!
//! Given a fraction, builds the model matrix of main effects, 2-way and
//! 3-way interactions, correlates every pair of effects and reduces the
//! correlation pattern to one alias chain per estimable effect. The stages
//! live in [`stages`]; [`resolve_alias_structure`] runs them in order.

pub mod labels;
pub mod stages;
pub mod structure;

use log::{debug, info, warn};
use pretty_print_nalgebra::*;

use crate::design::MAX_FACTORS;
use crate::error::{DesignError, Result};
use crate::fraction_matrix::FractionMatrix;
use crate::linalg::{correlation_matrix, lower_triangular};

pub use labels::{EffectLayout, EFFECT_LETTERS};
pub use stages::RowCategory;
pub use structure::{AliasPair, AliasStructure};

use stages::*;

/// Fewest factors with an interaction to resolve.
pub const MIN_FACTORS: usize = 2;

/// Resolves the alias structure of `fraction`.
///
/// Levels are read from the matrix itself, so any fraction with 2 to 9
/// factor columns is accepted, generated or not. A fraction without
/// confounding above the limit value resolves to the identity structure.
pub fn resolve_alias_structure(fraction: &FractionMatrix) -> Result<AliasStructure> {
    let n = fraction.factors();
    if fraction.is_empty() {
        return Err(DesignError::invalid_argument("fraction has no runs"));
    }
    if !(MIN_FACTORS..=MAX_FACTORS).contains(&n) {
        return Err(DesignError::UnsupportedFactorCount(n));
    }

    let layout = EffectLayout::new(n);
    let effects = layout.labels();

    let model = model_matrix(&fraction.to_f64(), &layout);
    let t = lower_triangular(&correlation_matrix(&model));
    let vl = limit_value(&t);
    let w = weight_matrix(&t);
    debug!("limit value {:.4} over {} effects", vl, layout.total());

    if let Some((row, col, value)) = strong_main_correlation(&w, &layout) {
        warn!("main effects {} and {} correlate at {:.4}", effects[col], effects[row], value);
        return Err(DesignError::StrongMainEffectCorrelation {
            first: effects[col].clone(),
            second: effects[row].clone(),
            value,
        });
    }

    let rev_w = threshold_weights(&w, vl);
    if !has_confounding(&rev_w) {
        info!("no confounding above {:.4}; every effect is estimable", vl);
        return Ok(AliasStructure::identity(effects, n));
    }

    let categories = classify_rows(&rev_w, &layout);
    let d = resolve_main_effect_rows(&rev_w, &categories, &layout);
    let d = resolve_two_way_rows(&d, &categories, &layout);
    let categories = classify_three_way_rows(&d, &categories, &layout);
    let d = resolve_three_way_rows(&d, &categories, &layout);

    let ud = unresolved_weights(&w);
    let mfl = fallback_rows(&d, &ud, &layout);
    let ml = clear_alias_target_rows(&mfl, &d, &layout);
    let mz = propagate_helpers(&ml, &d, &layout);
    let mx = keep_row_maxima(&mz);
    let ch = clear_alias_target_rows(&mx, &mx, &layout);
    let ch = mark_estimable(&ch, &layout);
    let signed = restore_signs(&t, &ch);
    debug!("resolved alias matrix: {}", pretty_print!(&signed));

    let structure = AliasStructure::new(signed, effects, n);
    info!(
        "resolved alias structure: {} chains, {} with aliases",
        structure.alias_map().len(),
        structure.alias_count()
    );
    Ok(structure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{build_main_effects_matrix, build_reflex_matrix, extract_fraction};
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    fn generated_fraction(levels: &[usize], size: usize, start: usize) -> FractionMatrix {
        let base = build_main_effects_matrix(levels).unwrap();
        let reflex = build_reflex_matrix(&base, size);
        extract_fraction(&reflex, start - 1, size)
    }

    #[test]
    fn test_full_factorial_is_orthogonal() {
        let fraction = FractionMatrix::from_matrix(dmatrix![
            1usize, 1, 1;
            2, 1, 1;
            1, 2, 1;
            2, 2, 1;
            1, 1, 2;
            2, 1, 2;
            1, 2, 2;
            2, 2, 2;
        ]);
        let s = resolve_alias_structure(&fraction).unwrap();
        assert_eq!(s.effects().len(), 7);
        assert_eq!(s.alias_map().len(), 7);
        assert!(s.is_orthogonal());
        assert_eq!(s.matrix(), &nalgebra::DMatrix::identity(7, 7));
    }

    #[test]
    fn test_half_fraction_resolves_to_identity() {
        let fraction = FractionMatrix::from_matrix(dmatrix![
            1usize, 1, 1;
            2, 2, 1;
            2, 1, 2;
            1, 2, 2;
        ]);
        let s = resolve_alias_structure(&fraction).unwrap();
        assert!(s.is_orthogonal());
        assert_eq!(s.alias_map().len(), 7);
    }

    #[test]
    fn test_two_factor_fraction() {
        let s = resolve_alias_structure(&generated_fraction(&[2, 3], 4, 1)).unwrap();
        assert_eq!(s.effects(), &["A", "B", "AB"]);
        assert_eq!(s.aliases_of("A").unwrap().len(), 1);
        assert!(s.aliases_of("AB").is_none());

        let b = s.aliases_of("B").unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0], AliasPair { coefficient: 1.0, effect: "B".into() });
        assert_eq!(b[1].effect, "AB");
        assert_relative_eq!(b[1].coefficient, -5.0 / 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mixed_level_fraction() {
        let s = resolve_alias_structure(&generated_fraction(&[2, 3, 5], 6, 1)).unwrap();
        for (i, effect) in ["A", "B", "C"].iter().enumerate() {
            assert_eq!(s.matrix()[(i, i)], 1.0);
            assert_eq!(s.aliases_of(effect).unwrap()[0].effect, *effect);
        }

        let a = s.aliases_of("A").unwrap();
        assert_eq!(a[1].effect, "BC");
        assert_relative_eq!(a[1].coefficient, -0.6868028197, epsilon = 1e-8);

        let c: Vec<&str> = s.aliases_of("C").unwrap().iter().map(|p| p.effect.as_str()).collect();
        assert_eq!(c, vec!["C", "AB", "ABC"]);
        assert_relative_eq!(s.aliases_of("C").unwrap()[2].coefficient, 0.6643638388, epsilon = 1e-8);

        assert_eq!(s.alias_count(), 3);
        // every effect shows up somewhere
        for effect in s.effects() {
            let seen = s
                .alias_map()
                .values()
                .flatten()
                .any(|p| &p.effect == effect);
            assert!(seen, "{effect} missing");
        }
    }

    #[test]
    fn test_rejects_unsupported_shapes() {
        let one = FractionMatrix::from_matrix(dmatrix![1usize; 2]);
        assert_eq!(resolve_alias_structure(&one), Err(DesignError::UnsupportedFactorCount(1)));

        let ten = FractionMatrix::from_matrix(nalgebra::DMatrix::from_element(4, 10, 1usize));
        assert_eq!(resolve_alias_structure(&ten), Err(DesignError::UnsupportedFactorCount(10)));

        let empty = FractionMatrix::default();
        assert!(matches!(
            resolve_alias_structure(&empty),
            Err(DesignError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_constant_column_does_not_fail() {
        let fraction = FractionMatrix::from_matrix(dmatrix![
            1usize, 1, 2;
            2, 1, 2;
            1, 2, 2;
            2, 2, 2;
        ]);
        let s = resolve_alias_structure(&fraction).unwrap();
        assert!(s.is_orthogonal());
        assert_eq!(s.matrix()[(2, 2)], 1.0);
    }
}
