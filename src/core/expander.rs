//! Path-prefix enumeration
//!
//! Walks the Cartesian product of the present outer/middle axes (outer slowest) and yields
//! the template with those tokens substituted. The innermost token is left in place; it is
//! resolved later by key derivation.

use crate::core::path_template::{substitute_axis, AxisPlan, AxisSpec};

/// Lazy, finite iterator over path-prefixes. Cloning it or calling [`expand`] again
/// restarts the enumeration.
#[derive(Debug, Clone)]
pub struct PathPrefixes {
    template: String,
    axes: Vec<AxisSpec>,
    offsets: Vec<u32>,
    exhausted: bool,
}

impl PathPrefixes {
    /// Remaining number of prefixes, including the next one.
    pub fn remaining(&self) -> u64 {
        if self.exhausted {
            return 0;
        }
        // odometer position counted from the minor end
        let mut done: u64 = 0;
        for (axis, offset) in self.axes.iter().zip(&self.offsets) {
            done = done * axis.range.len() as u64 + *offset as u64;
        }
        let total: u64 = self.axes.iter().map(|a| a.range.len() as u64).product();
        total - done
    }

    fn current(&self) -> String {
        self.axes.iter().zip(&self.offsets).fold(self.template.clone(), |path, (axis, offset)| {
            substitute_axis(&path, &axis.token, axis.range.start + *offset)
        })
    }

    fn advance(&mut self) {
        for i in (0..self.axes.len()).rev() {
            self.offsets[i] += 1;
            if self.offsets[i] < self.axes[i].range.len() {
                return;
            }
            self.offsets[i] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for PathPrefixes {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }
        let path = self.current();
        self.advance();
        Some(path)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

/// Enumerates the path-prefixes for `template` over `axes`, outer-major.
///
/// With no axes the template itself is the single prefix. A range running past
/// `u32::MAX` is clipped the same way as
/// [`AxisRange::indices`](crate::core::path_template::AxisRange::indices); validated plans never
/// carry one.
pub fn expand(template: &str, axes: &[AxisSpec]) -> PathPrefixes {
    let exhausted = axes.iter().any(|a| a.range.is_empty());
    PathPrefixes {
        template: template.to_string(),
        axes: axes.to_vec(),
        offsets: vec![0; axes.len()],
        exhausted,
    }
}

/// Enumerates the path-prefixes of a validated plan.
pub fn expand_plan(plan: &AxisPlan) -> PathPrefixes {
    expand(plan.template.as_str(), &plan.prefix_axes)
}
