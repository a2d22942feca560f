use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DesignError, Result};

/// Where a generator draws its randomness from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RandomSource {
    #[default]
    Entropy,
    Seeded(u64),
}

impl RandomSource {
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or(RandomSource::Entropy, RandomSource::Seeded)
    }

    pub fn rng(&self) -> StdRng {
        match self {
            RandomSource::Entropy => StdRng::from_entropy(),
            RandomSource::Seeded(seed) => StdRng::seed_from_u64(*seed),
        }
    }
}

/// Draws `count` distinct integers uniformly from `[min, max]`.
///
/// When more than half the range is requested a partial Fisher-Yates shuffle
/// over the whole pool is used; otherwise values are drawn with rejection
/// against a used-set.
pub fn unique_random_ints<R: Rng + ?Sized>(
    rng: &mut R,
    min: i64,
    max: i64,
    count: usize,
) -> Result<Vec<i64>> {
    let range = max
        .checked_sub(min)
        .and_then(|d| d.checked_add(1))
        .and_then(|r| usize::try_from(r.max(0)).ok())
        .ok_or_else(|| {
            DesignError::invalid_argument(format!("range [{min}, {max}] is too wide to sample"))
        })?;
    if count > range {
        return Err(DesignError::invalid_argument(format!(
            "cannot draw {count} unique values from [{min}, {max}]"
        )));
    }

    let mut result = Vec::with_capacity(count);
    if count as f64 > range as f64 * 0.5 {
        let mut pool: Vec<i64> = (min..=max).collect();
        for i in 0..count {
            let j = rng.gen_range(i..range);
            pool.swap(i, j);
            result.push(pool[i]);
        }
    } else {
        let mut used = HashSet::with_capacity(count);
        while result.len() < count {
            let num = rng.gen_range(min..=max);
            if used.insert(num) {
                result.push(num);
            }
        }
    }
    Ok(result)
}
