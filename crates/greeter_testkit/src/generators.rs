//! Property-based generators.

use proptest::prelude::*;

/// Non-empty names, including spaces and non-ASCII letters.
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-zÀ-ÿ][A-Za-zÀ-ÿ .'-]{0,31}"
}

/// Greetings, possibly empty.
pub fn greeting_strategy() -> impl Strategy<Value = String> {
    "[A-Za-zÀ-ÿ ,!]{0,40}"
}

/// Distinct names, at most `max` of them.
pub fn distinct_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set(name_strategy(), 1..=max.max(1))
        .prop_map(|set| set.into_iter().collect())
}
