//! Derivation path templates
//!
//! A template is a BIP32 path string where up to three segments are axis tokens that get
//! enumerated: `M` (outer), `N` (middle) and `O` (innermost, mandatory), e.g.
//! `m/44'/60'/M'/N/O`. A token only counts when it is a whole path segment, optionally
//! followed by the hardening quote.

use crate::core::errors::ScanError;
use crate::crypto::derivation::HARDENED_OFFSET;
use regex::Regex;
use std::fmt;
use std::ops::Range;

pub const OUTER_TOKEN: &str = "M";
pub const MIDDLE_TOKEN: &str = "N";
pub const INNER_TOKEN: &str = "O";

pub const DEFAULT_TEMPLATE: &str = "m/44'/60'/M'/N/O";
pub const DEFAULT_START: u32 = 0;
pub const DEFAULT_OUTER_COUNT: u32 = 1;
pub const DEFAULT_MIDDLE_COUNT: u32 = 1;
pub const DEFAULT_INNER_COUNT: u32 = 100;

/// Axis indices stay below the hardened offset; hardening is written with the `'` marker.
pub const INDEX_LIMIT: u32 = HARDENED_OFFSET;

/// `true` iff `token` occurs as an isolated segment of `template`.
pub fn validate_required_axis(template: &str, token: &str) -> bool {
    let pattern = format!(r"/{}'?(/|$)", regex::escape(token));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(template),
        Err(_) => false,
    }
}

/// Start index and number of iterations for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub start: u32,
    pub count: u32,
}

impl AxisRange {
    pub fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }

    /// The indices covered by this range. Saturates at `u32::MAX`.
    pub fn indices(&self) -> Range<u32> {
        self.start..self.start.saturating_add(self.count)
    }

    /// Number of indices actually covered, i.e. `count` clipped at `u32::MAX`.
    pub fn len(&self) -> u32 {
        self.count.min(u32::MAX - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when every index is a non-hardened child number.
    pub fn within_index_limit(&self) -> bool {
        self.start as u64 + self.count as u64 <= INDEX_LIMIT as u64
    }
}

/// Describes one enumerable axis of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSpec {
    pub token: String,
    pub range: AxisRange,
    pub required: bool,
}

impl AxisSpec {
    pub fn optional(token: &str, range: AxisRange) -> Self {
        Self { token: token.to_string(), range, required: false }
    }

    pub fn required(token: &str, range: AxisRange) -> Self {
        Self { token: token.to_string(), range, required: true }
    }
}

/// The standard three-axis layout: outer `M`, middle `N`, innermost `O`.
pub fn standard_axes(outer: AxisRange, middle: AxisRange, inner: AxisRange) -> Vec<AxisSpec> {
    vec![
        AxisSpec::optional(OUTER_TOKEN, outer),
        AxisSpec::optional(MIDDLE_TOKEN, middle),
        AxisSpec::required(INNER_TOKEN, inner),
    ]
}

/// The validated result of matching a template against its axis descriptors.
///
/// `prefix_axes` holds the present non-innermost axes in outer-major order. Axes that
/// are absent from the template are dropped and their counts ignored.
#[derive(Debug, Clone)]
pub struct AxisPlan {
    pub template: PathTemplate,
    pub prefix_axes: Vec<AxisSpec>,
    pub innermost: AxisSpec,
}

impl AxisPlan {
    /// Number of path-prefixes the expander will yield.
    pub fn prefix_count(&self) -> u64 {
        self.prefix_axes.iter().map(|a| a.range.len() as u64).product()
    }

    /// Total number of addresses the plan covers.
    pub fn address_count(&self) -> u64 {
        self.prefix_count() * self.innermost.range.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
}

impl PathTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into().trim().to_string() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_axis(&self, token: &str) -> bool {
        validate_required_axis(&self.raw, token)
    }

    /// Validates the template against `axes`, the last descriptor being the innermost axis.
    ///
    /// Presence of every required axis, and always of the innermost one, is checked
    /// first, so a template missing its innermost token fails with `InvalidTemplate`
    /// whatever counts were supplied. Present axes must then have a non-zero count and
    /// stay below [`INDEX_LIMIT`].
    pub fn plan(&self, axes: &[AxisSpec]) -> Result<AxisPlan, ScanError> {
        let (innermost, prefix) = axes
            .split_last()
            .ok_or_else(|| ScanError::InvalidTemplate("No axes configured".to_string()))?;

        for axis in prefix.iter().filter(|a| a.required).chain([innermost]) {
            if !self.has_axis(&axis.token) {
                return Err(ScanError::InvalidTemplate(format!(
                    "Missing {} index component",
                    axis.token
                )));
            }
        }

        if innermost.range.count == 0 {
            return Err(ScanError::InvalidAxisCount { axis: innermost.token.clone() });
        }
        check_index_limit(innermost)?;

        let mut prefix_axes = Vec::with_capacity(prefix.len());
        for axis in prefix {
            if !self.has_axis(&axis.token) {
                continue;
            }
            if axis.range.count == 0 {
                return Err(ScanError::InvalidAxisCount { axis: axis.token.clone() });
            }
            check_index_limit(axis)?;
            prefix_axes.push(axis.clone());
        }

        Ok(AxisPlan { template: self.clone(), prefix_axes, innermost: innermost.clone() })
    }
}

fn check_index_limit(axis: &AxisSpec) -> Result<(), ScanError> {
    if axis.range.within_index_limit() {
        return Ok(());
    }
    Err(ScanError::InvalidTemplate(format!(
        "{} indices must stay below {} (requested {} from {})",
        axis.token, INDEX_LIMIT, axis.range.count, axis.range.start
    )))
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Replaces every segment equal to `token` (or `token'`) with `value`, keeping the marker.
pub fn substitute_axis(path: &str, token: &str, value: u32) -> String {
    let hardened = format!("{}'", token);
    path.split('/')
        .map(|segment| {
            if segment == token {
                value.to_string()
            } else if segment == hardened {
                format!("{}'", value)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a path-prefix into its parent path when `token` is its last, non-hardened segment.
///
/// Returns `None` when the innermost axis cannot be derived from a parent public key.
pub fn split_leaf<'a>(prefix: &'a str, token: &str) -> Option<&'a str> {
    let (parent, leaf) = prefix.rsplit_once('/')?;
    if leaf != token || parent.is_empty() || parent.split('/').any(|s| s == token || s == format!("{}'", token)) {
        return None;
    }
    Some(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ranges(o: u32, m: u32, n: u32) -> Vec<AxisSpec> {
        standard_axes(AxisRange::new(0, m), AxisRange::new(0, n), AxisRange::new(0, o))
    }

    #[test_case("m/44'/60'/M'/N'/O", "O", true ; "innermost at end")]
    #[test_case("m/44'/60'/M'/N'/O'", "O", true ; "hardened at end")]
    #[test_case("m/44'/60'/M'/N'/O", "M", true ; "hardened in middle")]
    #[test_case("m/44'/60'/M/0/O", "M", true ; "plain in middle")]
    #[test_case("m/44'/60'/MO/0", "O", false ; "embedded in segment")]
    #[test_case("m/44'/60'/0'/0", "O", false ; "absent")]
    #[test_case("m/44'/60'/O1", "O", false ; "prefix of segment")]
    fn test_validate_required_axis(template: &str, token: &str, expected: bool) {
        assert_eq!(validate_required_axis(template, token), expected);
    }

    #[test]
    fn test_missing_innermost_regardless_of_counts() {
        let template = PathTemplate::new("m/44'/60'/M'/N'");
        for (o, m, n) in [(1, 1, 1), (0, 1, 1), (0, 0, 0), (5, 0, 2)] {
            let err = template.plan(&ranges(o, m, n)).unwrap_err();
            assert!(matches!(err, ScanError::InvalidTemplate(_)));
            assert_eq!(err.to_string(), "Missing O index component");
        }
    }

    #[test_case(0, 1, 1, "O" ; "innermost zero")]
    #[test_case(1, 0, 1, "M" ; "outer zero")]
    #[test_case(1, 1, 0, "N" ; "middle zero")]
    fn test_zero_count_on_present_axis(o: u32, m: u32, n: u32, axis: &str) {
        let template = PathTemplate::new("m/44'/60'/M'/N'/O");
        let err = template.plan(&ranges(o, m, n)).unwrap_err();
        assert_eq!(err.to_string(), format!("Invalid {} count", axis));
    }

    #[test]
    fn test_absent_axis_count_ignored() {
        let plan = PathTemplate::new("m/44'/60'/N'/O").plan(&ranges(1, 0, 1)).unwrap();
        assert_eq!(plan.prefix_axes.len(), 1);
        assert_eq!(plan.prefix_axes[0].token, "N");

        let plan = PathTemplate::new("m/44'/60'/M'/O").plan(&ranges(1, 3, 0)).unwrap();
        assert_eq!(plan.prefix_axes.len(), 1);
        assert_eq!(plan.prefix_count(), 3);
    }

    #[test]
    fn test_plan_counts() {
        let axes = standard_axes(AxisRange::new(0, 2), AxisRange::new(5, 3), AxisRange::new(0, 10));
        let plan = PathTemplate::new(DEFAULT_TEMPLATE).plan(&axes).unwrap();
        assert_eq!(plan.prefix_count(), 6);
        assert_eq!(plan.address_count(), 60);
    }

    #[test]
    fn test_substitute_axis() {
        assert_eq!(substitute_axis("m/44'/60'/M'/M/O", "M", 7), "m/44'/60'/7'/7/O");
        assert_eq!(substitute_axis("m/44'/60'/MO/O", "M", 7), "m/44'/60'/MO/O");
    }

    #[test]
    fn test_split_leaf() {
        assert_eq!(split_leaf("m/44'/60'/0'/0/O", "O"), Some("m/44'/60'/0'/0"));
        assert_eq!(split_leaf("m/44'/60'/0'/O'", "O"), None);
        assert_eq!(split_leaf("m/44'/60'/O/0", "O"), None);
        assert_eq!(split_leaf("m/44'/60'/O/O", "O"), None);
    }

    #[test]
    fn test_axis_range_indices() {
        assert_eq!(AxisRange::new(3, 2).indices().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(AxisRange::new(u32::MAX, 5).indices().count(), 0);
        assert_eq!(AxisRange::new(u32::MAX - 1, 3).len(), 1);
        assert!(AxisRange::new(u32::MAX, 5).is_empty());
    }

    #[test_case(0, 0x8000_0000, true ; "whole non-hardened space")]
    #[test_case(0x7fff_ffff, 1, true ; "last index")]
    #[test_case(0x7fff_ffff, 2, false ; "one past the limit")]
    #[test_case(0x8000_0000, 1, false ; "hardened start")]
    #[test_case(u32::MAX - 1, 3, false ; "past u32 max")]
    fn test_within_index_limit(start: u32, count: u32, expected: bool) {
        assert_eq!(AxisRange::new(start, count).within_index_limit(), expected);
    }

    #[test]
    fn test_ranges_past_index_limit_rejected() {
        let template = PathTemplate::new(DEFAULT_TEMPLATE);
        let big = AxisRange::new(u32::MAX - 1, 3);
        let ok = AxisRange::new(0, 1);

        for (axes, token) in [
            (standard_axes(big, ok, ok), "M"),
            (standard_axes(ok, big, ok), "N"),
            (standard_axes(ok, ok, big), "O"),
        ] {
            let err = template.plan(&axes).unwrap_err();
            assert!(matches!(err, ScanError::InvalidTemplate(_)));
            assert!(err.to_string().starts_with(&format!("{} indices must stay below 2147483648", token)));
            assert!(err.is_input_error());
        }

        // absent axes are not checked
        let plan = PathTemplate::new("m/44'/60'/0'/N/O").plan(&standard_axes(big, ok, ok)).unwrap();
        assert_eq!(plan.prefix_count(), 1);
    }

    #[test]
    fn test_innermost_checked_even_if_not_marked_required() {
        let axes = vec![AxisSpec::optional("M", AxisRange::new(0, 1)), AxisSpec::optional("O", AxisRange::new(0, 1))];
        let err = PathTemplate::new("m/44'/60'/M'/0").plan(&axes).unwrap_err();
        assert_eq!(err.to_string(), "Missing O index component");
    }
}
