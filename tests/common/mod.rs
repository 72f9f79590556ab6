#![allow(dead_code)]

use sparsetree::{EnumParentsOptions, EnumSubTreeOptions, SparseTree, TokenComparison};

pub fn separated_tree() -> SparseTree<&'static str> {
    SparseTree::new(Some('/'), None, TokenComparison::OrdinalIgnoreCase).expect("valid separator")
}

pub fn fixed_tree() -> SparseTree<&'static str> {
    SparseTree::new(None, Some(4), TokenComparison::OrdinalIgnoreCase).expect("valid element length")
}

pub fn add_all(tree: &mut SparseTree<&'static str>, entries: &[(&str, &'static str)]) {
    for &(token, value) in entries {
        tree.add(token, value).unwrap_or_else(|err| panic!("add {}: {}", token, err));
    }
}

pub fn subtree_tokens<T>(
    tree: &SparseTree<T>,
    token: Option<&str>,
    options: EnumSubTreeOptions,
    depth: usize,
) -> Vec<String> {
    tree.enum_sub_tree(token, options, depth)
        .expect("enumerable token")
        .map(|node| node.token.into_owned())
        .collect()
}

pub fn parent_tokens<T>(tree: &SparseTree<T>, token: &str, options: EnumParentsOptions) -> Vec<String> {
    tree.enum_parents(token, options)
        .expect("enumerable token")
        .map(|node| node.token.into_owned())
        .collect()
}

/// `no_children_below` of every parent, checking it agrees with `has_children`
pub fn no_children_below(tree: &SparseTree<&'static str>, token: &str) -> Vec<Option<String>> {
    tree.enum_parents(token, EnumParentsOptions::INCLUDE_ADDITIONAL_DATA)
        .expect("enumerable token")
        .map(|node| {
            let below = node.no_children_below.as_deref().map(str::to_string);
            assert!(
                node.has_children || below.as_deref().is_some_and(|b| b.eq_ignore_ascii_case(&node.token)),
                "{} has no children but no_children_below is {:?}",
                node.token,
                below
            );
            below
        })
        .collect()
}

/// Element-wise comparison ignoring ASCII case
pub fn assert_tokens_eq(actual: &[String], expected: &[&str]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "length mismatch\nexpected: {:?}\nactual:   {:?}",
        expected,
        actual
    );

    for (actual_token, expected_token) in actual.iter().zip(expected) {
        assert!(
            actual_token.eq_ignore_ascii_case(expected_token),
            "expected {:?}\nactual:   {:?}",
            expected,
            actual
        );
    }
}
