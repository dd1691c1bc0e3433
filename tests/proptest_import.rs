//! Property-based tests using proptest
//!
//! These tests verify import id parsing and tag conversion using
//! randomized inputs.

use harness_provider::resource::import::{ImportError, ImportLayout};
use harness_provider::resource::tags::{expand_tags, flatten_tags};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

/// One non-empty path segment without separators
fn arb_segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_.-]{1,20}"
}

fn arb_segments(range: std::ops::Range<usize>) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_segment(), range)
}

/// Tag maps whose keys survive the `key:value` round trip
fn arb_tags() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z][a-z_]{0,10}", "[a-zA-Z0-9:/._-]{0,16}", 0..10)
}

proptest! {
    #[test]
    fn multi_level_accepts_one_to_three_segments(segments in arb_segments(1..4)) {
        let raw = segments.join("/");
        let parsed = ImportLayout::MultiLevel.parse(&raw).unwrap();

        prop_assert_eq!(&parsed.id, segments.last().unwrap());
        prop_assert_eq!(&parsed.attributes["identifier"], &json!(segments.last().unwrap()));
        if segments.len() > 1 {
            prop_assert_eq!(&parsed.attributes["org_id"], &json!(segments[0]));
        } else {
            prop_assert!(!parsed.attributes.contains_key("org_id"));
        }
    }

    #[test]
    fn multi_level_rejects_longer_ids(segments in arb_segments(4..9)) {
        let raw = segments.join("/");
        let err = ImportLayout::MultiLevel.parse(&raw).unwrap_err();
        let is_count = matches!(err, ImportError::SegmentCount { got, .. } if got == segments.len());
        prop_assert!(is_count);
    }

    #[test]
    fn project_level_needs_exactly_three(segments in arb_segments(1..8)) {
        let raw = segments.join("/");
        let result = ImportLayout::ProjectLevel.parse(&raw);
        prop_assert_eq!(result.is_ok(), segments.len() == 3);
        if let Err(err) = result {
            prop_assert!(err.to_string().contains("org_id/project_id/identifier"));
        }
    }

    #[test]
    fn tagged_form_matches_positional(org in arb_segment(), project in arb_segment(), id in arb_segment()) {
        let positional = ImportLayout::ProjectLevel
            .parse(&format!("{}/{}/{}", org, project, id))
            .unwrap();
        let tagged = ImportLayout::ProjectLevel
            .parse(&format!("org_id={},project_id={},identifier={}", org, project, id))
            .unwrap();
        let aliased = ImportLayout::ProjectLevel
            .parse(&format!("id={}/project_id={}/org_id={}", id, project, org))
            .unwrap();

        prop_assert_eq!(&positional, &tagged);
        prop_assert_eq!(&positional, &aliased);
    }

    #[test]
    fn tagged_form_rejects_unknown_keys(id in arb_segment(), key in "[a-z]{3,8}_x") {
        let raw = format!("identifier={},{}=v", id, key);
        let err = ImportLayout::MultiLevel.parse(&raw).unwrap_err();
        let is_unknown = matches!(err, ImportError::UnknownKey { .. });
        prop_assert!(is_unknown);
    }

    #[test]
    fn token_id_is_last_segment(segments in arb_segments(4..7)) {
        let parsed = ImportLayout::Token.parse(&segments.join("/")).unwrap();
        let n = segments.len();
        prop_assert_eq!(&parsed.id, &segments[n - 1]);
        prop_assert_eq!(&parsed.attributes["apikey_type"], &json!(segments[n - 2]));
        prop_assert_eq!(&parsed.attributes["apikey_id"], &json!(segments[n - 3]));
        prop_assert_eq!(&parsed.attributes["parent_id"], &json!(segments[n - 4]));
    }

    #[test]
    fn api_key_id_precedes_type(segments in arb_segments(3..6)) {
        let parsed = ImportLayout::ApiKey.parse(&segments.join("/")).unwrap();
        let n = segments.len();
        prop_assert_eq!(&parsed.id, &segments[n - 2]);
        prop_assert_eq!(&parsed.attributes["apikey_type"], &json!(segments[n - 1]));
    }

    #[test]
    fn empty_segment_is_rejected(segments in arb_segments(2..4), hole in 0usize..3) {
        let mut segments = segments;
        let hole = hole % segments.len();
        segments[hole] = String::new();
        let err = ImportLayout::MultiLevel.parse(&segments.join("/")).unwrap_err();
        let is_empty = matches!(err, ImportError::EmptySegment { position, .. } if position == hole + 1);
        prop_assert!(is_empty);
    }

    #[test]
    fn tags_round_trip(tags in arb_tags()) {
        let flat = flatten_tags(&tags);
        prop_assert_eq!(expand_tags(&flat), tags);
    }

    #[test]
    fn flattened_tags_are_sorted(tags in arb_tags()) {
        let flat = flatten_tags(&tags);
        let mut sorted = flat.clone();
        sorted.sort();
        prop_assert_eq!(flat, sorted);
    }

    #[test]
    fn bare_tags_expand_to_empty_values(keys in prop::collection::btree_set("[a-z]{1,8}", 0..8)) {
        let keys: Vec<String> = keys.into_iter().collect();
        let expanded = expand_tags(&keys);
        prop_assert_eq!(expanded.len(), keys.len());
        prop_assert!(expanded.values().all(|v| v.is_empty()));
    }
}
