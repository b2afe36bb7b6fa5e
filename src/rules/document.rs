/// Rule document format
///
/// A rule document is a forest of `if` blocks plus an optional `default`
/// section. Each `if` block owns a condition subtree and either a `return`
/// payload or a nested `if` (an additional guard). Documents are plain
/// serde structures; compilation into an executable model lives in
/// `rules::model`.

use crate::lists::NamespacedListRepository;
use crate::rules::condition::Condition;
use crate::rules::{Context, Destination, UrlParams};
use serde::{Deserialize, Serialize};

/// One `if` block: a guard and what it yields when the guard holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfBlock<T> {
    pub condition: Condition,
    #[serde(flatten)]
    pub outcome: Outcome<T>,
}

/// A block's payload: a direct return or a nested guard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome<T> {
    Return(T),
    If(Box<IfBlock<T>>),
}

impl<T> IfBlock<T> {
    /// Depth-first evaluation: the guard must hold, then nested guards in
    /// turn, down to the first `return` payload
    pub fn evaluate(&self, ctx: &Context, lists: &NamespacedListRepository) -> Option<&T> {
        if !self.condition.evaluate(ctx, lists) {
            return None;
        }
        match &self.outcome {
            Outcome::Return(value) => Some(value),
            Outcome::If(inner) => inner.evaluate(ctx, lists),
        }
    }

    /// Validate guards at every nesting level
    pub fn validate(&self) -> Result<(), String> {
        self.condition.validate()?;
        match &self.outcome {
            Outcome::Return(_) => Ok(()),
            Outcome::If(inner) => inner.validate(),
        }
    }
}

/// Flavor-routing rule document: resolves to a `Server`/`ServerGroup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesDocument {
    #[serde(default)]
    pub rules: Vec<IfBlock<Destination>>,
    #[serde(default)]
    pub default: Option<Destination>,
}

/// URL-routing rule document: resolves to `UrlParams` field-by-field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRulesDocument {
    #[serde(default)]
    pub rules: Vec<IfBlock<UrlParams>>,
    #[serde(default)]
    pub default: Option<UrlParams>,
}
