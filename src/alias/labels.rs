use std::ops::Range;

use crate::linalg::n_choose_k;

/// Factor letters. `I` is skipped so it cannot be mistaken for the identity.
pub const EFFECT_LETTERS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J'];

/// Sizes of the three effect blocks of a model with `main` factors:
/// main effects, then 2-way interactions, then 3-way interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectLayout {
    pub main: usize,
    pub two_way: usize,
    pub three_way: usize,
}

impl EffectLayout {
    pub fn new(factors: usize) -> Self {
        let n = factors as i64;
        Self {
            main: factors,
            two_way: n_choose_k(n, 2) as usize,
            three_way: if factors > 2 { n_choose_k(n, 3) as usize } else { 0 },
        }
    }

    pub fn total(&self) -> usize {
        self.main + self.two_way + self.three_way
    }

    pub fn main_range(&self) -> Range<usize> {
        0..self.main
    }

    pub fn two_way_range(&self) -> Range<usize> {
        self.main..self.main + self.two_way
    }

    pub fn three_way_range(&self) -> Range<usize> {
        self.main + self.two_way..self.total()
    }

    /// Everything after the main effects.
    pub fn higher_order_range(&self) -> Range<usize> {
        self.main..self.total()
    }

    /// Factor indices making up each effect, in model column order.
    pub fn factor_groups(&self) -> Vec<Vec<usize>> {
        let n = self.main;
        let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                groups.push(vec![i, j]);
            }
        }
        if self.three_way > 0 {
            for i in 0..n {
                for j in (i + 1)..n {
                    for k in (j + 1)..n {
                        groups.push(vec![i, j, k]);
                    }
                }
            }
        }
        groups
    }

    pub fn labels(&self) -> Vec<String> {
        self.factor_groups()
            .iter()
            .map(|g| g.iter().map(|&f| EFFECT_LETTERS[f]).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        let two = EffectLayout::new(2);
        assert_eq!((two.main, two.two_way, two.three_way), (2, 1, 0));
        assert_eq!(two.total(), 3);

        let four = EffectLayout::new(4);
        assert_eq!(four.total(), 4 + 6 + 4);
        assert_eq!(four.two_way_range(), 4..10);
        assert_eq!(four.three_way_range(), 10..14);

        assert_eq!(EffectLayout::new(9).total(), 9 + 36 + 84);
    }

    #[test]
    fn test_labels() {
        assert_eq!(EffectLayout::new(2).labels(), vec!["A", "B", "AB"]);
        assert_eq!(
            EffectLayout::new(3).labels(),
            vec!["A", "B", "C", "AB", "AC", "BC", "ABC"]
        );
        let nine = EffectLayout::new(9).labels();
        assert_eq!(nine[8], "J");
        assert!(!nine.iter().any(|l| l.contains('I')));
        assert_eq!(nine.last().map(String::as_str), Some("GHJ"));
    }
}
