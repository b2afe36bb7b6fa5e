/// Compiled decision models
///
/// A model is compiled once per rule-set version and is read-only after
/// that; rule changes produce a whole new model that callers swap in
/// atomically. Compilation fails closed: a malformed document yields an
/// error and no model, and the caller keeps evaluating the previous one.

use crate::error::RuleError;
use crate::lists::NamespacedListRepository;
use crate::rules::document::{IfBlock, Outcome, RulesDocument, UrlRulesDocument};
use crate::rules::{Context, Destination, ServerGroup, UrlParams};

/// Executable form of a flavor-routing rule document
#[derive(Debug, Clone)]
pub struct DecisionModel {
    blocks: Vec<IfBlock<Destination>>,
    default: Option<Destination>,
}

impl DecisionModel {
    /// Compile a parsed document, validating every guard and destination
    pub fn compile(doc: RulesDocument) -> Result<Self, RuleError> {
        for (i, block) in doc.rules.iter().enumerate() {
            block
                .validate()
                .map_err(|e| RuleError::validation(format!("rule {}: {}", i, e)))?;
            validate_destinations(block)?;
        }
        if let Some(default) = &doc.default {
            validate_destination(default)
                .map_err(|e| RuleError::validation(format!("default: {}", e)))?;
        }
        Ok(Self {
            blocks: doc.rules,
            default: doc.default,
        })
    }

    /// Parse and compile a JSON rule document
    pub fn from_json(raw: &str) -> Result<Self, RuleError> {
        let doc: RulesDocument =
            serde_json::from_str(raw).map_err(|e| RuleError::parse(e.to_string()))?;
        Self::compile(doc)
    }

    /// First-match-wins traversal over the `if` forest, in document order
    ///
    /// Returns the default branch when no block matches, which may itself be
    /// absent (a null decision).
    pub fn execute<'a>(&'a self, ctx: &Context, lists: &NamespacedListRepository) -> Option<&'a Destination> {
        for block in &self.blocks {
            if let Some(destination) = block.evaluate(ctx, lists) {
                return Some(destination);
            }
        }
        self.default.as_ref()
    }

    pub fn rule_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Executable form of a URL-routing rule document
///
/// Unlike flavor routing this does not stop at the first match: every
/// matching block contributes the fields it explicitly sets, earlier blocks
/// winning per field, then the document default section, then the caller's
/// fallback constants fill whatever is still null.
#[derive(Debug, Clone)]
pub struct UrlDecisionModel {
    blocks: Vec<IfBlock<UrlParams>>,
    default: Option<UrlParams>,
}

impl UrlDecisionModel {
    pub fn compile(doc: UrlRulesDocument) -> Result<Self, RuleError> {
        for (i, block) in doc.rules.iter().enumerate() {
            block
                .validate()
                .map_err(|e| RuleError::validation(format!("url rule {}: {}", i, e)))?;
        }
        Ok(Self {
            blocks: doc.rules,
            default: doc.default,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleError> {
        let doc: UrlRulesDocument =
            serde_json::from_str(raw).map_err(|e| RuleError::parse(e.to_string()))?;
        Self::compile(doc)
    }

    /// Three-tier per-field cascade: matched blocks > document default >
    /// caller fallback
    pub fn execute(
        &self,
        ctx: &Context,
        lists: &NamespacedListRepository,
        fallback: &UrlParams,
    ) -> UrlParams {
        let mut out = UrlParams::default();
        for block in &self.blocks {
            if let Some(params) = block.evaluate(ctx, lists) {
                out.merge_missing_from(params);
            }
        }
        if let Some(default) = &self.default {
            out.merge_missing_from(default);
        }
        out.merge_missing_from(fallback);
        out
    }

    pub fn rule_count(&self) -> usize {
        self.blocks.len()
    }
}

fn validate_destinations(block: &IfBlock<Destination>) -> Result<(), RuleError> {
    match &block.outcome {
        Outcome::Return(destination) => validate_destination(destination)
            .map_err(|e| RuleError::validation(e)),
        Outcome::If(inner) => validate_destinations(inner),
    }
}

fn validate_destination(destination: &Destination) -> Result<(), String> {
    match destination {
        Destination::Server(server) => {
            if server.path.is_none() && server.url.is_none() {
                return Err("server needs a path or a url".to_string());
            }
            Ok(())
        }
        Destination::Group(group) => validate_group(group),
    }
}

fn validate_group(group: &ServerGroup) -> Result<(), String> {
    let mut total = 0.0;
    for dist in &group.distributions {
        if !(0.0..=100.0).contains(&dist.percent) {
            return Err(format!("distribution percent {} outside [0, 100]", dist.percent));
        }
        total += dist.percent;
    }
    if total > 100.0 {
        return Err(format!("distribution percents sum to {}", total));
    }
    if group.default.path.is_none() && group.default.url.is_none() {
        return Err("group default needs a path or a url".to_string());
    }
    Ok(())
}
