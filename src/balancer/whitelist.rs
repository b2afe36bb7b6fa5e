/// Whitelist of stack paths approved for production traffic
///
/// A stack path is eligible when it, or its 2-segment stack prefix, is
/// explicitly whitelisted. The whitelist is an immutable value object
/// replaced wholesale on change.

use crate::balancer::discovery::format_stack_path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Whitelist {
    paths: HashSet<String>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(|p| normalize(&p.into())).collect(),
        }
    }

    /// True when the path or its stack prefix is approved
    pub fn permits(&self, path: &str) -> bool {
        let normalized = normalize(path);
        self.paths.contains(&normalized) || self.paths.contains(&format_stack_path(&normalized))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
