//! Priority resolution between overlapping POI memberships.
//!
//! When the device is within several POIs at once, exactly one of them is
//! reported as the current POI. The rule:
//!
//! 1. Lower weight wins.
//! 2. At equal weight, the smaller (or equal) radius wins.
//!
//! Rule 2 is deliberately not symmetric: with equal weight and radius, both
//! `has_priority(a, b)` and `has_priority(b, a)` are true. Folding a list with
//! [`fold_current`] therefore hands exact ties to the last candidate folded in.

use std::cmp::Ordering;

use crate::poi::PointOfInterest;

/// Returns `true` if `a` should be preferred over `b` as the current POI.
#[must_use]
pub fn has_priority(a: &PointOfInterest, b: &PointOfInterest) -> bool {
    match a.weight().cmp(&b.weight()) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => a.radius() <= b.radius(),
    }
}

/// Fold one candidate against the running incumbent.
///
/// The candidate replaces the incumbent when there is none or when the
/// candidate has priority over it.
#[must_use]
pub fn fold_current(
    incumbent: Option<PointOfInterest>,
    candidate: &PointOfInterest,
) -> Option<PointOfInterest> {
    match incumbent {
        Some(current) if !has_priority(candidate, &current) => Some(current),
        _ => Some(candidate.clone()),
    }
}

/// Fold every candidate into `incumbent`, returning the winner.
pub fn resolve_from<'a, I>(incumbent: Option<PointOfInterest>, candidates: I) -> Option<PointOfInterest>
where
    I: IntoIterator<Item = &'a PointOfInterest>,
{
    candidates.into_iter().fold(incumbent, fold_current)
}

/// Select the highest-priority POI from `candidates`; `None` when empty.
pub fn resolve<'a, I>(candidates: I) -> Option<PointOfInterest>
where
    I: IntoIterator<Item = &'a PointOfInterest>,
{
    resolve_from(None, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(id: &str, weight: i64, radius: i64) -> PointOfInterest {
        PointOfInterest::new(id, id).with_weight(weight).with_radius(radius)
    }

    #[test]
    fn test_lower_weight_wins() {
        let light = poi("light", 1, 500);
        let heavy = poi("heavy", 2, 10);
        assert!(has_priority(&light, &heavy));
        assert!(!has_priority(&heavy, &light));
    }

    #[test]
    fn test_weight_is_transitive() {
        let a = poi("a", 1, 100);
        let b = poi("b", 2, 100);
        let c = poi("c", 3, 100);
        assert!(has_priority(&a, &b));
        assert!(has_priority(&b, &c));
        assert!(has_priority(&a, &c));
        assert_eq!(resolve([&c, &b, &a]).unwrap().identifier(), "a");
    }

    #[test]
    fn test_equal_weight_smaller_radius_wins() {
        let small = poi("small", 5, 50);
        let large = poi("large", 5, 100);
        assert!(has_priority(&small, &large));
        assert!(!has_priority(&large, &small));

        assert_eq!(resolve([&small, &large]).unwrap().identifier(), "small");
        assert_eq!(resolve([&large, &small]).unwrap().identifier(), "small");
    }

    #[test]
    fn test_exact_tie_is_true_both_ways() {
        let first = poi("first", 5, 100);
        let second = poi("second", 5, 100);
        assert!(has_priority(&first, &second));
        assert!(has_priority(&second, &first));
    }

    #[test]
    fn test_exact_ties_resolve_to_last_folded() {
        let first = poi("first", 5, 100);
        let second = poi("second", 5, 100);
        let third = poi("third", 5, 100);
        assert_eq!(
            resolve([&first, &second, &third]).unwrap().identifier(),
            "third"
        );
    }

    #[test]
    fn test_resolve_empty_is_none() {
        assert!(resolve(std::iter::empty()).is_none());
    }

    #[test]
    fn test_incumbent_kept_against_weaker_candidate() {
        let incumbent = poi("incumbent", 1, 100);
        let challenger = poi("challenger", 3, 10);
        let winner = resolve_from(Some(incumbent), [&challenger]).unwrap();
        assert_eq!(winner.identifier(), "incumbent");
    }
}
