#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination<K> {
    pub survivors: Vec<K>,
    pub eliminated: Vec<K>,
}

/// Splits contestants into survivors and the ones sharing the lowest score.
///
/// Nobody is eliminated when every contestant has the same score. Input
/// order is preserved on both sides.
#[must_use]
pub fn eliminate_lowest<K: Clone>(scores: &[(K, u32)]) -> Elimination<K> {
    let min = scores.iter().map(|(_, score)| *score).min();
    let max = scores.iter().map(|(_, score)| *score).max();

    let (Some(min), Some(max)) = (min, max) else {
        return Elimination {
            survivors: vec![],
            eliminated: vec![],
        };
    };

    if min == max {
        return Elimination {
            survivors: scores.iter().map(|(key, _)| key.clone()).collect(),
            eliminated: vec![],
        };
    }

    let (eliminated, survivors): (Vec<_>, Vec<_>) =
        scores.iter().partition(|(_, score)| *score == min);

    Elimination {
        survivors: survivors.into_iter().map(|(key, _)| key.clone()).collect(),
        eliminated: eliminated.into_iter().map(|(key, _)| key.clone()).collect(),
    }
}
