pub mod alias;
pub mod design;
pub mod error;
pub mod fraction_matrix;
pub mod fraction_result;
pub mod generator;
pub mod linalg;
pub mod metrics;
pub mod random_source;

pub use alias::{resolve_alias_structure, AliasPair, AliasStructure};
pub use design::{calculate_parameters, DesignParameters, DesignSpec};
pub use error::{DesignError, Result};
pub use fraction_matrix::FractionMatrix;
pub use fraction_result::FractionResult;
pub use generator::{FractionGenerator, GenerationRequest, GenerationRequestBuilder, StartSelection};
pub use random_source::RandomSource;

/// Generates and scores the fractions described by `request`.
///
/// # Arguments
///
/// * `request` - Levels, fraction size, how starts are chosen and an optional seed
///
/// # Returns
///
/// One `FractionResult` per start, numbered from 1 in selection order.
///
/// # Errors
///
/// Returns a validation error if the design, size, count or a start is out
/// of range, and `DesignError::SingularCorrelation` if any fraction's VIFs
/// cannot be computed.
pub fn generate_fractions(request: &GenerationRequest) -> Result<Vec<FractionResult>> {
    let mut generator = FractionGenerator::from_source(RandomSource::from_seed(request.seed));
    generator.run(request)
}

/// Parses a comma-separated list of 1-based starts.
///
/// Brackets and whitespace are ignored, so `"[1, 5, 9]"` and `"1,5,9"`
/// are the same list.
pub fn parse_starts(text: &str) -> Result<Vec<usize>> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '[' && *c != ']')
        .collect();
    if cleaned.is_empty() {
        return Err(DesignError::invalid_argument("no starts given"));
    }
    cleaned
        .split(',')
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| DesignError::invalid_argument(format!("`{s}` is not a valid start")))
        })
        .collect()
}
