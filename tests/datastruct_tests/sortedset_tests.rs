//! Sorted Set Tests
//!
//! Tests for membership, ranks, rank and score ranges, and bulk removal.

use embedkv::datastruct::{Element, ScoreBorder, SortedSet};

fn set_of(pairs: &[(&str, f64)]) -> SortedSet {
    let mut set = SortedSet::new();
    for &(member, score) in pairs {
        set.add(member, score);
    }
    set
}

fn members(elements: &[Element]) -> Vec<&str> {
    elements.iter().map(member_str).collect()
}

fn member_str(element: &Element) -> &str {
    std::str::from_utf8(&element.member).unwrap()
}

// =============================================================================
// Membership Tests
// =============================================================================

#[test]
fn test_add_reports_new_members_only() {
    let mut set = SortedSet::new();
    assert!(set.add("a", 1.0));
    assert!(!set.add("a", 1.0));
    assert!(!set.add("a", 5.0));
    assert_eq!(set.len(), 1);
    assert_eq!(set.get("a"), Some(5.0));
}

#[test]
fn test_binary_members_stay_distinct() {
    let mut set = SortedSet::new();
    assert!(set.add(b"\xff", 1.0));
    assert!(set.add(b"\xfe", 2.0));
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(b"\xff"), Some(1.0));
    assert_eq!(set.get(b"\xfe"), Some(2.0));
    assert_eq!(set.get_rank(b"\xfe", false), Some(1));
    assert!(set.remove(b"\xff"));
    assert!(set.contains(b"\xfe"));
}

#[test]
fn test_rescore_moves_member() {
    let mut set = set_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
    set.add("a", 10.0);
    let order: Vec<&str> = set.iter().map(member_str).collect();
    assert_eq!(order, vec!["b", "c", "a"]);
}

#[test]
fn test_remove_keeps_map_and_index_in_sync() {
    let mut set = set_of(&[("a", 1.0), ("b", 2.0)]);
    assert!(set.remove("a"));
    assert!(!set.remove("a"));
    assert!(!set.contains("a"));
    assert_eq!(set.len(), 1);
    assert_eq!(set.iter().count(), 1);
}

// =============================================================================
// Rank Tests
// =============================================================================

#[test]
fn test_rank_orders_by_score_then_member() {
    let set = set_of(&[("b", 1.0), ("a", 1.0), ("c", 0.5)]);
    assert_eq!(set.get_rank("c", false), Some(0));
    assert_eq!(set.get_rank("a", false), Some(1));
    assert_eq!(set.get_rank("b", false), Some(2));
    assert_eq!(set.get_rank("b", true), Some(0));
    assert_eq!(set.get_rank("c", true), Some(2));
    assert_eq!(set.get_rank("missing", false), None);
}

#[test]
fn test_ranks_stay_consistent_through_many_mutations() {
    let mut set = SortedSet::new();
    for i in 0..500 {
        set.add(&format!("m{:03}", i), f64::from((i * 37) % 101));
    }
    for i in (0..500).step_by(7) {
        set.remove(&format!("m{:03}", i));
    }
    let ordered: Vec<Element> = set.iter().cloned().collect();
    assert_eq!(ordered.len(), set.len());
    for (rank, element) in ordered.iter().enumerate() {
        assert_eq!(set.get_rank(&element.member, false), Some(rank));
        assert_eq!(set.get_rank(&element.member, true), Some(set.len() - 1 - rank));
    }
    for pair in ordered.windows(2) {
        let (x, y) = (&pair[0], &pair[1]);
        assert!(x.score < y.score || (x.score == y.score && x.member < y.member));
    }
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_range_by_rank_both_directions() {
    let set = set_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
    assert_eq!(members(&set.range(1, 3, false).unwrap()), vec!["b", "c"]);
    assert_eq!(members(&set.range(0, 2, true).unwrap()), vec!["d", "c"]);
    assert!(set.range(0, 5, false).is_err());
}

#[test]
fn test_count_with_borders() {
    let set = set_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
    assert_eq!(set.count(&ScoreBorder::NEG_INF, &ScoreBorder::POS_INF), 4);
    assert_eq!(set.count(&ScoreBorder::inclusive(2.0), &ScoreBorder::inclusive(3.0)), 2);
    assert_eq!(set.count(&ScoreBorder::exclusive(2.0), &ScoreBorder::inclusive(3.0)), 1);
    assert_eq!(set.count(&ScoreBorder::exclusive(2.0), &ScoreBorder::exclusive(3.0)), 0);
    assert_eq!(set.count(&ScoreBorder::inclusive(5.0), &ScoreBorder::POS_INF), 0);
}

#[test]
fn test_range_by_score_offset_and_limit() {
    let set = set_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]);
    let all = set.range_by_score(&ScoreBorder::NEG_INF, &ScoreBorder::POS_INF, 0, -1, false);
    assert_eq!(members(&all), vec!["a", "b", "c", "d", "e"]);

    let page = set.range_by_score(&ScoreBorder::inclusive(2.0), &ScoreBorder::POS_INF, 1, 2, false);
    assert_eq!(members(&page), vec!["c", "d"]);

    let desc = set.range_by_score(&ScoreBorder::NEG_INF, &ScoreBorder::exclusive(4.0), 0, -1, true);
    assert_eq!(members(&desc), vec!["c", "b", "a"]);

    let past_end = set.range_by_score(&ScoreBorder::NEG_INF, &ScoreBorder::POS_INF, 10, -1, false);
    assert!(past_end.is_empty());

    let none = set.range_by_score(&ScoreBorder::NEG_INF, &ScoreBorder::POS_INF, 0, 0, false);
    assert!(none.is_empty());
}

#[test]
fn test_score_border_parsing() {
    assert_eq!(ScoreBorder::parse("1.5").unwrap(), ScoreBorder::inclusive(1.5));
    assert_eq!(ScoreBorder::parse("(2").unwrap(), ScoreBorder::exclusive(2.0));
    assert_eq!(ScoreBorder::parse("-inf").unwrap().value, f64::NEG_INFINITY);
    assert_eq!(ScoreBorder::parse("+inf").unwrap().value, f64::INFINITY);
    assert!(ScoreBorder::parse("abc").is_err());
    assert!(ScoreBorder::parse("nan").is_err());
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_pop_min_and_max() {
    let mut set = set_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
    let low = set.pop_min(2);
    assert_eq!(members(&low), vec!["a", "b"]);
    assert_eq!(low[0].score, 1.0);

    let high = set.pop_max(5);
    assert_eq!(members(&high), vec!["d", "c"]);
    assert!(set.is_empty());
    assert!(set.pop_min(1).is_empty());
}

#[test]
fn test_remove_by_score_and_rank() {
    let mut set = set_of(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]);
    assert_eq!(set.remove_by_score(&ScoreBorder::inclusive(2.0), &ScoreBorder::exclusive(4.0)), 2);
    assert!(!set.contains("b"));
    assert!(!set.contains("c"));

    // remaining a, d, e; drop ranks [1, 3)
    assert_eq!(set.remove_by_rank(1, 3), 2);
    assert_eq!(set.iter().map(member_str).collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(set.len(), 1);
}
