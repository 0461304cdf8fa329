use rand::prelude::SliceRandom;
use rand::Rng;

/// How many times a shuffle is retried when it lands on the original order.
pub const MAX_SHUFFLE_ATTEMPTS: usize = 10;

/// Shuffles `items` in place, retrying a bounded number of times to avoid
/// handing back the order it started with.
///
/// Returns `true` iff the order changed. Sequences of zero or one element,
/// and sequences whose elements are all equal, are left as they are.
pub fn shuffle<T: Clone + PartialEq>(items: &mut [T], rng: &mut impl Rng) -> bool {
    if items.len() <= 1 {
        return false;
    }
    let original = items.to_vec();
    for _ in 0..MAX_SHUFFLE_ATTEMPTS {
        items.shuffle(rng);
        if items != original.as_slice() {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for len in 0..12 {
            let original: Vec<String> = (0..len).map(|i| format!("P{}", i % 4)).collect();
            let mut items = original.clone();
            shuffle(&mut items, &mut rng);

            let mut a = original.clone();
            let mut b = items.clone();
            a.sort();
            b.sort();
            assert_eq!(a, b, "shuffle of length {} lost or invented elements", len);
        }
    }

    #[test]
    fn short_sequences_are_unchanged() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let mut empty: Vec<String> = vec![];
        assert!(!shuffle(&mut empty, &mut rng));

        let mut single = names(&["Ann"]);
        assert!(!shuffle(&mut single, &mut rng));
        assert_eq!(single, names(&["Ann"]));
    }

    #[test]
    fn distinct_elements_change_order() {
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let original = names(&["Ann", "Bob", "Cam", "Dan"]);
            let mut items = original.clone();
            assert!(shuffle(&mut items, &mut rng));
            assert_ne!(items, original);
        }
    }

    #[test]
    fn identical_elements_give_up_after_bounded_attempts() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut items = names(&["Wolf", "Wolf", "Wolf"]);
        assert!(!shuffle(&mut items, &mut rng));
        assert_eq!(items, names(&["Wolf", "Wolf", "Wolf"]));
    }

    #[test]
    fn same_seed_same_order() {
        let original = names(&["Ann", "Bob", "Cam", "Dan", "Eve"]);

        let mut a = original.clone();
        shuffle(&mut a, &mut ChaCha8Rng::seed_from_u64(11));
        let mut b = original.clone();
        shuffle(&mut b, &mut ChaCha8Rng::seed_from_u64(11));

        assert_eq!(a, b);
    }

    #[test]
    fn reshuffling_starts_from_current_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut items = names(&["Ann", "Bob", "Cam", "Dan"]);
        shuffle(&mut items, &mut rng);
        let first = items.clone();
        assert!(shuffle(&mut items, &mut rng));
        assert_ne!(items, first);
    }
}
