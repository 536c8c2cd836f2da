use crate::aggregate::{display_order, CategoryAggregate};
use crate::schema::OTHER_CATEGORY;
use log::debug;
use serde::Serialize;
use std::collections::BTreeSet;

/// Result of folding a category dimension down to its largest members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopNReduction {
    /// Relabeled aggregate: kept categories plus at most one OTHER bucket.
    pub aggregate: CategoryAggregate,
    /// Kept categories in rank order.
    pub kept: Vec<String>,
    /// Categories folded into OTHER, alphabetical.
    pub folded: Vec<String>,
}

impl TopNReduction {
    /// Output categories in display order (alphabetical, OTHER last).
    pub fn display_categories(&self) -> Vec<String> {
        display_order(self.aggregate.categories())
    }
}

/// Categories ranked by total descending, ties broken by name ascending.
///
/// An existing OTHER bucket never competes for a top slot.
pub fn rank_categories(aggregate: &CategoryAggregate) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = aggregate
        .category_totals()
        .into_iter()
        .filter(|(category, _)| *category != OTHER_CATEGORY)
        .map(|(category, total)| (category.to_string(), total))
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

pub fn reduce_to_top_n(aggregate: &CategoryAggregate, n: usize) -> TopNReduction {
    let ranked = rank_categories(aggregate);
    let kept: Vec<String> = ranked.iter().take(n).map(|(c, _)| c.clone()).collect();
    let kept_set: BTreeSet<&str> = kept.iter().map(String::as_str).collect();

    let mut reduced = CategoryAggregate::new();
    let mut folded: BTreeSet<String> = BTreeSet::new();

    for (period, category, value) in aggregate.iter() {
        if kept_set.contains(category) {
            reduced.add(*period, category, value);
        } else {
            if category != OTHER_CATEGORY {
                folded.insert(category.to_string());
            }
            reduced.add(*period, OTHER_CATEGORY, value);
        }
    }

    debug!(
        "Top-{} reduction kept {} categor(ies), folded {} into {}",
        n,
        kept.len(),
        folded.len(),
        OTHER_CATEGORY
    );

    TopNReduction {
        aggregate: reduced,
        kept,
        folded: folded.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodKey;

    fn key(label: &str) -> PeriodKey {
        label.parse().unwrap()
    }

    fn example_aggregate() -> CategoryAggregate {
        let mut aggregate = CategoryAggregate::new();
        aggregate.add(key("2020"), "A", 30.0);
        aggregate.add(key("2021"), "A", 20.0);
        aggregate.add(key("2020"), "B", 30.0);
        aggregate.add(key("2021"), "C", 10.0);
        aggregate.add(key("2020"), "E", 5.0);
        aggregate.add(key("2021"), "D", 2.0);
        aggregate.add(key("2020"), "D", 3.0);
        aggregate
    }

    #[test]
    fn test_rank_breaks_ties_by_name() {
        let ranked = rank_categories(&example_aggregate());
        let names: Vec<&str> = ranked.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_top_three_folds_tied_tail_into_other() {
        let reduction = reduce_to_top_n(&example_aggregate(), 3);
        assert_eq!(reduction.kept, vec!["A", "B", "C"]);
        assert_eq!(reduction.folded, vec!["D", "E"]);

        let totals = reduction.aggregate.category_totals();
        assert_eq!(totals[OTHER_CATEGORY], 10.0);
        assert_eq!(reduction.aggregate.get(&key("2020"), OTHER_CATEGORY), 8.0);
        assert_eq!(reduction.aggregate.get(&key("2021"), OTHER_CATEGORY), 2.0);
        assert_eq!(reduction.display_categories(), vec!["A", "B", "C", "OTHER"]);
    }

    #[test]
    fn test_top_four_keeps_alphabetically_first_of_tie() {
        let reduction = reduce_to_top_n(&example_aggregate(), 4);
        assert_eq!(reduction.kept, vec!["A", "B", "C", "D"]);
        assert_eq!(reduction.folded, vec!["E"]);
    }

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let aggregate = example_aggregate();
        for n in 0..7 {
            let reduction = reduce_to_top_n(&aggregate, n);
            for category in aggregate.categories() {
                let in_top = reduction.kept.iter().any(|c| c == category);
                let in_other = reduction.folded.iter().any(|c| c == category);
                assert!(in_top ^ in_other, "{} must be in exactly one bucket", category);
            }
            let before: f64 = aggregate.category_totals().values().sum();
            let after: f64 = reduction.aggregate.category_totals().values().sum();
            assert!((before - after).abs() < 1e-9);
        }
    }

    #[test]
    fn test_no_other_bucket_when_nothing_folds() {
        let reduction = reduce_to_top_n(&example_aggregate(), 7);
        assert!(reduction.folded.is_empty());
        assert!(!reduction.aggregate.categories().contains(OTHER_CATEGORY));
    }

    #[test]
    fn test_existing_other_label_is_merged_not_ranked() {
        let mut aggregate = CategoryAggregate::new();
        aggregate.add(key("2020"), OTHER_CATEGORY, 1000.0);
        aggregate.add(key("2020"), "Health", 10.0);
        aggregate.add(key("2020"), "Water", 5.0);

        let reduction = reduce_to_top_n(&aggregate, 1);
        assert_eq!(reduction.kept, vec!["Health"]);
        assert_eq!(reduction.folded, vec!["Water"]);
        assert_eq!(reduction.aggregate.get(&key("2020"), OTHER_CATEGORY), 1005.0);
    }
}
