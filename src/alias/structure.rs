use std::collections::HashMap;
use std::fmt;

use nalgebra::DMatrix;

/// One term of an alias chain: `coefficient * effect`.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasPair {
    pub coefficient: f64,
    pub effect: String,
}

impl fmt::Display for AliasPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.4} {}", self.coefficient, self.effect)
    }
}

/// Confounding structure of a fraction.
///
/// `matrix[(i, j)]` is the signed correlation with which effect `i` is
/// aliased to effect `j`. The alias map holds, for every effect whose column
/// has a non-zero entry, the `(coefficient, effect)` pairs of that column.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasStructure {
    matrix: DMatrix<f64>,
    effects: Vec<String>,
    principal_effect_count: usize,
    alias_map: HashMap<String, Vec<AliasPair>>,
}

impl AliasStructure {
    pub fn new(matrix: DMatrix<f64>, effects: Vec<String>, principal_effect_count: usize) -> Self {
        let mut alias_map = HashMap::new();
        for (x, effect) in effects.iter().enumerate() {
            let pairs: Vec<AliasPair> = matrix
                .column(x)
                .iter()
                .enumerate()
                .filter(|(_, c)| **c != 0.0)
                .map(|(xx, &c)| AliasPair { coefficient: c, effect: effects[xx].clone() })
                .collect();
            if !pairs.is_empty() {
                alias_map.insert(effect.clone(), pairs);
            }
        }
        Self { matrix, effects, principal_effect_count, alias_map }
    }

    /// Every effect aliased only with itself.
    pub fn identity(effects: Vec<String>, principal_effect_count: usize) -> Self {
        let l = effects.len();
        Self::new(DMatrix::identity(l, l), effects, principal_effect_count)
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn effects(&self) -> &[String] {
        &self.effects
    }

    pub fn principal_effect_count(&self) -> usize {
        self.principal_effect_count
    }

    pub fn alias_map(&self) -> &HashMap<String, Vec<AliasPair>> {
        &self.alias_map
    }

    pub fn aliases_of(&self, effect: &str) -> Option<&[AliasPair]> {
        self.alias_map.get(effect).map(Vec::as_slice)
    }

    /// Alias chains in effect order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AliasPair])> {
        self.effects
            .iter()
            .filter_map(|e| self.aliases_of(e).map(|pairs| (e.as_str(), pairs)))
    }

    /// True when no effect is aliased with anything but itself.
    pub fn is_orthogonal(&self) -> bool {
        self.alias_map.values().all(|pairs| pairs.len() <= 1)
    }

    /// Number of effects with more than one term in their chain.
    pub fn alias_count(&self) -> usize {
        self.alias_map.values().filter(|pairs| pairs.len() > 1).count()
    }
}

impl fmt::Display for AliasStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (effect, pairs) in self.iter() {
            let terms: Vec<String> = pairs.iter().map(ToString::to_string).collect();
            writeln!(f, "{effect} = {}", terms.join(" + "))?;
        }
        Ok(())
    }
}
