use derive_builder::Builder;
use log::{debug, info};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::Rng;

use crate::design::{check_design, total_runs, DesignParameters, DesignSpec};
use crate::error::{DesignError, Result};
use crate::fraction_matrix::FractionMatrix;
use crate::fraction_result::FractionResult;
use crate::metrics::{balance_gbm, orthogonality_j2, variance_inflation};
use crate::random_source::{unique_random_ints, RandomSource};

/// How the start runs of the fractions are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSelection {
    /// `count` distinct starts drawn uniformly from `1..=tr`.
    Random { count: usize },
    /// Caller-supplied 1-based starts, used in the given order.
    Custom(Vec<usize>),
}

/// Everything needed to generate a batch of fractions.
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(error = "DesignError"))]
pub struct GenerationRequest {
    pub levels: DesignSpec,

    pub fraction_size: usize,

    pub selection: StartSelection,

    /// Seed for random starts; `None` draws from system entropy.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

/// Column `j` cycles `1..=levels[j]` down all `tr` runs.
///
/// When the levels are pairwise coprime (`tr == lcm`) every run is a distinct
/// level combination, so the matrix is a full factorial in cyclic order.
pub fn build_main_effects_matrix(levels: &[usize]) -> Result<DMatrix<usize>> {
    if levels.iter().any(|&l| l == 0) {
        return Err(DesignError::invalid_design(levels, "every factor needs at least one level"));
    }
    let tr = total_runs(levels)?;
    Ok(DMatrix::from_fn(tr, levels.len(), |row, col| row % levels[col] + 1))
}

/// Appends the first `fraction_size - 1` runs of `base` to its end, so any
/// window of `fraction_size` runs starting at `0..tr` is a plain slice.
pub fn build_reflex_matrix(base: &DMatrix<usize>, fraction_size: usize) -> DMatrix<usize> {
    let tr = base.nrows();
    let extra = fraction_size.saturating_sub(1).min(tr);
    let mut reflex = base.clone().resize_vertically(tr + extra, 0);
    reflex.view_mut((tr, 0), (extra, base.ncols())).copy_from(&base.rows(0, extra));
    reflex
}

/// Contiguous slice of `fraction_size` runs beginning at 0-based `start_row`.
pub fn extract_fraction(reflex: &DMatrix<usize>, start_row: usize, fraction_size: usize) -> FractionMatrix {
    FractionMatrix::from_matrix(reflex.rows(start_row, fraction_size).into_owned())
}

/// The unscored fraction of `fraction_size` runs at 1-based `start`.
pub fn fraction_at(levels: &[usize], fraction_size: usize, start: usize) -> Result<FractionMatrix> {
    let params = check_design(levels, fraction_size)?;
    if start < 1 || start > params.tr {
        return Err(DesignError::StartOutOfRange { start, max: params.tr });
    }
    let base = build_main_effects_matrix(levels)?;
    let reflex = build_reflex_matrix(&base, fraction_size);
    Ok(extract_fraction(&reflex, start - 1, fraction_size))
}

/// Scores one fraction.
pub fn score_fraction(
    levels: &[usize],
    index: usize,
    start: usize,
    fraction: FractionMatrix,
) -> Result<FractionResult> {
    let gbm = balance_gbm(&fraction, levels);
    let j2 = orthogonality_j2(&fraction);
    let vifs = variance_inflation(&fraction)?;
    Ok(FractionResult { index, start, gbm, j2, vifs, fraction })
}

/// Generates and scores fractions of a design.
///
/// The random source is injected so runs can be reproduced.
pub struct FractionGenerator<R: Rng = StdRng> {
    rng: R,
}

impl FractionGenerator<StdRng> {
    pub fn from_source(source: RandomSource) -> Self {
        Self::new(source.rng())
    }
}

impl<R: Rng> FractionGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws `count` distinct starts in `1..=tr` and scores the fraction at
    /// each. Results are numbered `1..=count` in draw order.
    pub fn generate_random_fractions(
        &mut self,
        levels: &[usize],
        fraction_size: usize,
        count: usize,
    ) -> Result<Vec<FractionResult>> {
        let params = check_design(levels, fraction_size)?;
        if count == 0 || count > params.tr {
            return Err(DesignError::FractionCountOutOfRange { count, max: params.tr });
        }

        let starts: Vec<usize> = unique_random_ints(&mut self.rng, 1, params.tr as i64, count)?
            .into_iter()
            .map(|s| s as usize)
            .collect();
        debug!("random starts: {:?}", starts);

        fractions_from_starts(levels, fraction_size, &params, &starts)
    }

    /// Scores the fraction at each caller-supplied 1-based start.
    pub fn generate_custom_fractions(
        &self,
        levels: &[usize],
        fraction_size: usize,
        starts: &[usize],
    ) -> Result<Vec<FractionResult>> {
        let params = check_design(levels, fraction_size)?;
        if let Some(&start) = starts.iter().find(|&&s| s < 1 || s > params.tr) {
            return Err(DesignError::StartOutOfRange { start, max: params.tr });
        }
        fractions_from_starts(levels, fraction_size, &params, starts)
    }

    pub fn run(&mut self, request: &GenerationRequest) -> Result<Vec<FractionResult>> {
        match &request.selection {
            StartSelection::Random { count } => {
                self.generate_random_fractions(&request.levels, request.fraction_size, *count)
            }
            StartSelection::Custom(starts) => {
                self.generate_custom_fractions(&request.levels, request.fraction_size, starts)
            }
        }
    }
}

fn fractions_from_starts(
    levels: &[usize],
    fraction_size: usize,
    params: &DesignParameters,
    starts: &[usize],
) -> Result<Vec<FractionResult>> {
    let base = build_main_effects_matrix(levels)?;
    let reflex = build_reflex_matrix(&base, fraction_size);

    let results = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let fraction = extract_fraction(&reflex, start - 1, fraction_size);
            debug!("fraction {} (start {}): {}", i + 1, start, fraction.pretty());
            score_fraction(levels, i + 1, start, fraction)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "generated {} fractions of size {} from a {}-run design",
        results.len(),
        fraction_size,
        params.tr
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;
    use rand::SeedableRng;

    fn seeded_generator() -> FractionGenerator {
        FractionGenerator::new(StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_build_main_effects_matrix() {
        let m = build_main_effects_matrix(&[2, 3]).unwrap();
        assert_eq!(m.nrows(), 6);
        assert_eq!(m.column(0).iter().copied().collect::<Vec<_>>(), vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(m.column(1).iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_main_effects_rows_distinct_when_coprime() {
        let m = build_main_effects_matrix(&[2, 3, 5]).unwrap();
        let mut rows: Vec<Vec<usize>> = m.row_iter().map(|r| r.iter().copied().collect()).collect();
        rows.sort();
        rows.dedup();
        assert_eq!(rows.len(), 30);
    }

    #[test]
    fn test_build_reflex_matrix() {
        let base = build_main_effects_matrix(&[2, 3]).unwrap();
        let reflex = build_reflex_matrix(&base, 4);
        assert_eq!(reflex.nrows(), 9);
        assert_eq!(reflex.rows(6, 3).into_owned(), base.rows(0, 3).into_owned());
    }

    #[test]
    fn test_extract_fraction_wraps_through_reflex() {
        let base = build_main_effects_matrix(&[2, 3]).unwrap();
        let reflex = build_reflex_matrix(&base, 4);
        let fraction = extract_fraction(&reflex, 5, 4);
        assert_eq!(
            fraction.as_matrix(),
            &dmatrix![2usize, 3; 1, 1; 2, 2; 1, 3]
        );
    }

    #[test]
    fn test_fraction_at() {
        let fraction = fraction_at(&[2, 3], 4, 6).unwrap();
        assert_eq!(fraction.as_matrix(), &dmatrix![2usize, 3; 1, 1; 2, 2; 1, 3]);

        let scored = seeded_generator().generate_custom_fractions(&[2, 3], 4, &[6]).unwrap();
        assert_eq!(scored[0].fraction, fraction);

        assert_eq!(
            fraction_at(&[2, 3], 4, 7),
            Err(DesignError::StartOutOfRange { start: 7, max: 6 })
        );
        assert!(matches!(fraction_at(&[0, 0], 4, 1), Err(DesignError::InvalidDesign { .. })));
    }

    #[test]
    fn test_generate_random_fractions_shape() {
        let mut generator = seeded_generator();
        let results = generator.generate_random_fractions(&[2, 3, 5], 6, 8).unwrap();
        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.index, i + 1);
            assert_eq!(result.fraction.rows(), 6);
            assert_eq!(result.fraction.factors(), 3);
            assert_eq!(result.vifs.len(), 3);
            assert!((1..=30).contains(&result.start));
        }
        let mut starts: Vec<_> = results.iter().map(|r| r.start).collect();
        starts.sort_unstable();
        starts.dedup();
        assert_eq!(starts.len(), 8);
    }

    #[test]
    fn test_generate_random_fractions_reproducible() {
        let a = seeded_generator().generate_random_fractions(&[2, 3, 5], 6, 4).unwrap();
        let b = seeded_generator().generate_random_fractions(&[2, 3, 5], 6, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_random_fractions_validation() {
        let mut generator = seeded_generator();
        assert!(matches!(
            generator.generate_random_fractions(&[2, 4], 5, 1),
            Err(DesignError::InvalidDesign { .. })
        ));
        assert!(matches!(
            generator.generate_random_fractions(&[2, 3], 6, 1),
            Err(DesignError::FractionSizeOutOfRange { .. })
        ));
        assert_eq!(
            generator.generate_random_fractions(&[2, 3], 4, 7),
            Err(DesignError::FractionCountOutOfRange { count: 7, max: 6 })
        );
        assert!(generator.generate_random_fractions(&[2, 3], 4, 0).is_err());
    }

    #[test]
    fn test_generate_custom_fractions() {
        let generator = seeded_generator();
        let results = generator.generate_custom_fractions(&[2, 3], 4, &[6, 1]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].start, 6);
        assert_eq!(results[0].fraction.as_matrix(), &dmatrix![2usize, 3; 1, 1; 2, 2; 1, 3]);
        assert_eq!(results[1].index, 2);

        assert_eq!(
            generator.generate_custom_fractions(&[2, 3], 4, &[1, 7]),
            Err(DesignError::StartOutOfRange { start: 7, max: 6 })
        );
        assert!(generator.generate_custom_fractions(&[2, 3], 4, &[0]).is_err());
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequestBuilder::default()
            .levels(DesignSpec::new(vec![2, 3, 5]).unwrap())
            .fraction_size(6)
            .selection(StartSelection::Random { count: 3 })
            .seed(1)
            .build()
            .unwrap();
        assert_eq!(request.seed, Some(1));

        let mut generator = FractionGenerator::from_source(RandomSource::from_seed(request.seed));
        assert_eq!(generator.run(&request).unwrap().len(), 3);

        let missing = GenerationRequestBuilder::default().fraction_size(6).build();
        assert!(matches!(missing, Err(DesignError::InvalidArgument(_))));
    }
}
