//! Size partition — the validated, ordered set of size classes.
//!
//! Classes are sorted by their lower bound and together cover every node
//! count in `[0, u32::MAX]` exactly once:
//!
//! ```text
//! small  [0, 10]   medium [11, 100]   large [101, +inf)
//! ```

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Effects;

/// A named node-count interval and the effects applied to its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeClass {
    pub name: String,
    /// Inclusive lower bound.
    pub from: u32,
    /// Inclusive upper bound; `None` is unbounded.
    pub to: Option<u32>,
    pub effects: Effects,
}

impl SizeClass {
    pub fn contains(&self, node_count: u32) -> bool {
        node_count >= self.from && self.to.is_none_or(|to| node_count <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizePartition {
    classes: Vec<SizeClass>,
}

impl SizePartition {
    /// Validate and sort size classes into a partition.
    pub fn new(mut classes: Vec<SizeClass>) -> ConfigResult<Self> {
        let mut seen = HashSet::new();
        for class in &classes {
            if class.name.is_empty() {
                return Err(ConfigError::EmptySizeName);
            }
            if !seen.insert(class.name.as_str()) {
                return Err(ConfigError::DuplicateSizeName(class.name.clone()));
            }
            if let Some(to) = class.to
                && class.from > to
            {
                return Err(ConfigError::InvertedRange {
                    name: class.name.clone(),
                    from: class.from,
                    to,
                });
            }
        }

        let zero: Vec<String> = classes
            .iter()
            .filter(|c| c.from == 0)
            .map(|c| c.name.clone())
            .collect();
        match zero.len() {
            0 => return Err(ConfigError::MissingZeroLowerBound),
            1 => {}
            _ => return Err(ConfigError::MultipleZeroLowerBound(zero)),
        }

        let open: Vec<String> = classes
            .iter()
            .filter(|c| c.to.is_none())
            .map(|c| c.name.clone())
            .collect();
        match open.len() {
            0 => return Err(ConfigError::MissingOpenUpperBound),
            1 => {}
            _ => return Err(ConfigError::MultipleOpenUpperBound(open)),
        }

        classes.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.name.cmp(&b.name)));

        for pair in classes.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            // The single open class sorted before another one swallows it.
            let Some(prev_to) = prev.to else {
                return Err(ConfigError::Overlap {
                    first: prev.name.clone(),
                    second: next.name.clone(),
                    at: next.from,
                });
            };
            if next.from <= prev_to {
                return Err(ConfigError::Overlap {
                    first: prev.name.clone(),
                    second: next.name.clone(),
                    at: next.from,
                });
            }
            if next.from - 1 > prev_to {
                return Err(ConfigError::Gap {
                    before: prev.name.clone(),
                    after: next.name.clone(),
                    start: prev_to + 1,
                    end: next.from - 1,
                });
            }
        }

        Ok(Self { classes })
    }

    /// The size class containing `node_count`. Total over `u32`.
    pub fn classify(&self, node_count: u32) -> &SizeClass {
        // classes[0].from == 0, so at least one class satisfies the predicate.
        let idx = self.classes.partition_point(|c| c.from <= node_count);
        &self.classes[idx - 1]
    }

    pub fn get(&self, name: &str) -> Option<&SizeClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lower node-count bound of the named class.
    pub fn lower_bound(&self, name: &str) -> Option<u32> {
        self.get(name).map(|c| c.from)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizeClass> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
