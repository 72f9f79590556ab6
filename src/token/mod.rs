//! Token splitting and comparison
//!
//! A token is a full hierarchical path such as `$/A/B/C`. Each tree fixes one
//! splitting policy at construction:
//! - Separated: elements are delimited by a single character
//! - Fixed length: every N characters form one element
//!
//! Elements are compared with a [`TokenComparison`], ordinal and
//! case-insensitive by default.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::SparseTreeError;

/// One split segment of a token, shared between a node and its descendants.
pub type Element = Arc<str>;

/// How tokens are split into elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Variable-length elements separated by a single character.
    Separator(char),

    /// Elements of exactly this many characters, no separator.
    FixedLength(usize),
}

impl TokenPolicy {
    /// Validate and build a policy from the two optional construction inputs.
    ///
    /// Exactly one of them must be supplied, and a fixed length must be positive.
    pub fn from_parts(
        separator: Option<char>,
        fixed_element_length: Option<usize>,
    ) -> Result<Self, SparseTreeError> {
        match (separator, fixed_element_length) {
            (Some(separator), None) if separator != '\0' => Ok(TokenPolicy::Separator(separator)),
            (None, Some(length)) if length > 0 => Ok(TokenPolicy::FixedLength(length)),
            _ => Err(SparseTreeError::InvalidSplitPolicy),
        }
    }
}

/// Ordering applied to individual elements (and to whole tokens in
/// [`Tokenizer::is_sub_item`])
#[derive(Debug, Clone, Copy, Default)]
pub enum TokenComparison {
    /// Plain `str` ordering.
    Ordinal,

    /// Ordinal ordering after folding each character to upper then lower case.
    #[default]
    OrdinalIgnoreCase,

    /// Caller-supplied ordering.
    Custom(fn(&str, &str) -> Ordering),
}

impl TokenComparison {
    /// Compare two strings under this ordering
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            TokenComparison::Ordinal => a.cmp(b),
            TokenComparison::OrdinalIgnoreCase => compare_ignore_case(a, b),
            TokenComparison::Custom(compare) => compare(a, b),
        }
    }
}

fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    let mut left = a.chars();
    let mut right = b.chars();

    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => {
                if x == y {
                    continue;
                }
                let (ux, uy) = (fold_upper(x), fold_upper(y));
                if ux == uy {
                    continue;
                }
                let (lx, ly) = (fold_lower(ux), fold_lower(uy));
                if lx != ly {
                    return lx.cmp(&ly);
                }
            }
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Single-character upper-case mapping; multi-character expansions keep `c`.
#[inline]
fn fold_upper(c: char) -> char {
    let mut mapped = c.to_uppercase();
    match (mapped.next(), mapped.next()) {
        (Some(upper), None) => upper,
        _ => c,
    }
}

#[inline]
fn fold_lower(c: char) -> char {
    let mut mapped = c.to_lowercase();
    match (mapped.next(), mapped.next()) {
        (Some(lower), None) => lower,
        _ => c,
    }
}

/// Splitting policy plus element ordering for one tree
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    policy: TokenPolicy,
    comparison: TokenComparison,
}

impl Tokenizer {
    /// Create a tokenizer
    pub fn new(policy: TokenPolicy, comparison: TokenComparison) -> Self {
        Self { policy, comparison }
    }

    /// Splitting policy
    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Element ordering
    pub fn comparison(&self) -> TokenComparison {
        self.comparison
    }

    /// Compare two elements
    #[inline]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.comparison.compare(a, b)
    }

    /// Strip trailing separators. Under fixed-length splitting the token is
    /// returned unchanged, but it must hold at least one full element.
    pub fn canonicalize<'t>(&self, token: &'t str) -> Result<&'t str, SparseTreeError> {
        match self.policy {
            TokenPolicy::Separator(separator) => Ok(token.trim_end_matches(separator)),
            TokenPolicy::FixedLength(length) => {
                if token.chars().take(length).count() < length {
                    return Err(SparseTreeError::EmptyToken);
                }
                Ok(token)
            }
        }
    }

    /// Split a canonical token into elements.
    ///
    /// The empty separated token yields a single empty element, which keeps it
    /// distinct from the tree root (zero elements).
    pub fn split(&self, token: &str) -> Vec<Element> {
        match self.policy {
            TokenPolicy::Separator(separator) => token.split(separator).map(Element::from).collect(),
            TokenPolicy::FixedLength(length) => {
                let mut elements = Vec::with_capacity(token.len() / length);
                let mut start = 0;
                let mut chars = 0;

                for (offset, c) in token.char_indices() {
                    chars += 1;
                    if chars == length {
                        let end = offset + c.len_utf8();
                        elements.push(Element::from(&token[start..end]));
                        start = end;
                        chars = 0;
                    }
                }

                elements
            }
        }
    }

    /// Canonicalize then split.
    pub(crate) fn tokenize<'t>(
        &self,
        token: &'t str,
    ) -> Result<(&'t str, Vec<Element>), SparseTreeError> {
        let canonical = self.canonicalize(token)?;
        Ok((canonical, self.split(canonical)))
    }

    /// Whether `item` equals `parent` or lies below it.
    ///
    /// Purely textual: the state of any tree is not consulted. A separated
    /// parent only matches whole elements, so `$/A/BC` is not below `$/A/B`.
    pub fn is_sub_item(&self, item: &str, parent: &str) -> bool {
        let Some(prefix) = item.get(..parent.len()) else {
            return false;
        };

        if self.compare(parent, prefix) != Ordering::Equal {
            return false;
        }

        match self.policy {
            TokenPolicy::FixedLength(_) => true,
            TokenPolicy::Separator(separator) => {
                item.len() == parent.len()
                    || parent.ends_with(separator)
                    || item[parent.len()..].starts_with(separator)
            }
        }
    }

    /// The prefix of `token` made of its first `count` elements.
    ///
    /// `count` must not exceed the number of elements in `token`.
    pub fn partial_token<'t>(&self, token: &'t str, count: usize) -> &'t str {
        if count == 0 {
            return "";
        }

        match self.policy {
            TokenPolicy::Separator(separator) => match token.match_indices(separator).nth(count - 1) {
                Some((offset, _)) => &token[..offset],
                None => token,
            },
            TokenPolicy::FixedLength(length) => match token.char_indices().nth(count * length) {
                Some((offset, _)) => &token[..offset],
                None => token,
            },
        }
    }

    /// Element-wise comparison of `left[start..end]` against `right[start..end]`.
    ///
    /// When one side runs out before `end`, the shorter element list orders
    /// first; equal-length lists compare equal.
    pub(crate) fn compare_by_elements(
        &self,
        left: &[Element],
        right: &[Element],
        start: usize,
        end: usize,
    ) -> Ordering {
        let last = left.len().min(right.len()).min(end);
        let mut index = start;

        while index < last {
            match self.compare(&left[index], &right[index]) {
                Ordering::Equal => index += 1,
                unequal => return unequal,
            }
        }

        if index == end {
            return Ordering::Equal;
        }

        left.len().cmp(&right.len())
    }

    /// Number of equal elements shared by `x` and `y` starting at `start`.
    pub(crate) fn common_element_count(&self, x: &[Element], y: &[Element], start: usize) -> usize {
        let length = x.len().min(y.len());
        if start >= length {
            return 0;
        }

        x[start..length]
            .iter()
            .zip(&y[start..length])
            .take_while(|(a, b)| self.compare(a, b) == Ordering::Equal)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separated() -> Tokenizer {
        Tokenizer::new(TokenPolicy::Separator('/'), TokenComparison::OrdinalIgnoreCase)
    }

    fn elements(parts: &[&str]) -> Vec<Element> {
        parts.iter().map(|p| Element::from(*p)).collect()
    }

    #[test]
    fn test_policy_requires_exactly_one_split_rule() {
        assert!(TokenPolicy::from_parts(None, None).is_err());
        assert!(TokenPolicy::from_parts(None, Some(0)).is_err());
        assert!(TokenPolicy::from_parts(Some('\0'), None).is_err());
        assert!(TokenPolicy::from_parts(Some('/'), Some(4)).is_err());
        assert_eq!(
            TokenPolicy::from_parts(Some('/'), None).unwrap(),
            TokenPolicy::Separator('/')
        );
        assert_eq!(
            TokenPolicy::from_parts(None, Some(4)).unwrap(),
            TokenPolicy::FixedLength(4)
        );
    }

    #[test]
    fn test_ignore_case_ordering() {
        let cmp = TokenComparison::OrdinalIgnoreCase;
        assert_eq!(cmp.compare("bear", "BEAR"), Ordering::Equal);
        assert_eq!(cmp.compare("a", "B"), Ordering::Less);
        assert_eq!(cmp.compare("Zephyr", "c"), Ordering::Greater);
        assert_eq!(cmp.compare("ab", "AB c"), Ordering::Less);
        assert_eq!(TokenComparison::Ordinal.compare("a", "B"), Ordering::Greater);
    }

    #[test]
    fn test_split_separated_keeps_leading_empty_element() {
        let tokenizer = separated();
        let (canonical, parts) = tokenizer.tokenize("/$/BASE/").unwrap();
        assert_eq!(canonical, "/$/BASE");
        assert_eq!(parts, elements(&["", "$", "BASE"]));

        let (canonical, parts) = tokenizer.tokenize("///").unwrap();
        assert_eq!(canonical, "");
        assert_eq!(parts, elements(&[""]));
    }

    #[test]
    fn test_split_fixed_length() {
        let tokenizer = Tokenizer::new(TokenPolicy::FixedLength(4), TokenComparison::Ordinal);
        assert_eq!(
            tokenizer.split("BASESUB1SUB2"),
            elements(&["BASE", "SUB1", "SUB2"])
        );
        assert_eq!(tokenizer.split("BASESU"), elements(&["BASE"]));
        assert!(matches!(
            tokenizer.canonicalize(""),
            Err(SparseTreeError::EmptyToken)
        ));
        assert!(matches!(
            tokenizer.canonicalize("BAS"),
            Err(SparseTreeError::EmptyToken)
        ));
    }

    #[test]
    fn test_partial_token() {
        let tokenizer = separated();
        assert_eq!(tokenizer.partial_token("/$/BASE/SUB1", 0), "");
        assert_eq!(tokenizer.partial_token("/$/BASE/SUB1", 1), "");
        assert_eq!(tokenizer.partial_token("/$/BASE/SUB1", 2), "/$");
        assert_eq!(tokenizer.partial_token("/$/BASE/SUB1", 4), "/$/BASE/SUB1");

        let fixed = Tokenizer::new(TokenPolicy::FixedLength(4), TokenComparison::Ordinal);
        assert_eq!(fixed.partial_token("BASESUB1SUB2", 2), "BASESUB1");
        assert_eq!(fixed.partial_token("BASESUB1SUB2", 3), "BASESUB1SUB2");
    }

    #[test]
    fn test_compare_by_elements() {
        let tokenizer = separated();
        let short = elements(&["$", "A"]);
        let long = elements(&["$", "a", "B"]);

        // `long` extends `short` over the first two elements
        assert_eq!(tokenizer.compare_by_elements(&short, &long, 0, 2), Ordering::Equal);
        // Past the shorter list the lengths decide
        assert_eq!(tokenizer.compare_by_elements(&short, &long, 0, 3), Ordering::Less);
        assert_eq!(tokenizer.compare_by_elements(&long, &short, 0, 3), Ordering::Greater);
        assert_eq!(
            tokenizer.compare_by_elements(&elements(&["$", "Z"]), &long, 0, 3),
            Ordering::Greater
        );
    }

    #[test]
    fn test_common_element_count() {
        let tokenizer = separated();
        let x = elements(&["$", "A", "B", "C"]);
        let y = elements(&["$", "a", "b", "Y"]);
        assert_eq!(tokenizer.common_element_count(&x, &y, 0), 3);
        assert_eq!(tokenizer.common_element_count(&x, &y, 2), 1);
        assert_eq!(tokenizer.common_element_count(&x, &y, 4), 0);
    }
}
