/// Condition tree for redirection rules
///
/// Rule documents compile into a forest of `If` blocks whose guards are
/// trees of these conditions. Each variant carries only the fields it needs
/// and evaluation is one recursive dispatch, so the compiler checks
/// exhaustiveness when the vocabulary grows.

use crate::lists::{IpRangeSet, NamespacedListRepository};
use crate::rules::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::OnceLock;

/// How an ordering comparison interprets its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareKind {
    /// Plain numeric comparison
    #[default]
    Numeric,
    /// Dotted version comparison, segment by segment (e.g. firmware or IPv4)
    Version,
}

/// One node of a rule condition tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Condition {
    And {
        conditions: Vec<Condition>,
    },
    Or {
        conditions: Vec<Condition>,
    },
    Xor {
        conditions: Vec<Condition>,
    },
    Equals {
        param: String,
        value: String,
    },
    NotEqual {
        param: String,
        value: String,
    },
    GreaterOrEqual {
        param: String,
        value: String,
        #[serde(default)]
        compare: CompareKind,
    },
    LessOrEqual {
        param: String,
        value: String,
        #[serde(default)]
        compare: CompareKind,
    },
    Contains {
        param: String,
        #[serde(default)]
        values: Vec<String>,
        #[serde(default)]
        namespaced_lists: Vec<String>,
    },
    IsEmpty {
        param: String,
    },
    InIpRange {
        param: String,
        #[serde(default)]
        values: Vec<String>,
        #[serde(default)]
        namespaced_lists: Vec<String>,
        /// Inline `values` parsed once; filled during validation so the
        /// request path never re-parses CIDRs
        #[serde(skip)]
        ranges: OnceLock<IpRangeSet>,
    },
    Percent {
        value: f64,
    },
}

impl Condition {
    /// Evaluate this condition against a request context
    ///
    /// Children evaluate left-to-right; `And`/`Or` short-circuit, `Xor`
    /// evaluates every child. Conditions are side-effect free, so
    /// short-circuiting never changes the result.
    pub fn evaluate(&self, ctx: &Context, lists: &NamespacedListRepository) -> bool {
        match self {
            Condition::And { conditions } => conditions.iter().all(|c| c.evaluate(ctx, lists)),
            Condition::Or { conditions } => conditions.iter().any(|c| c.evaluate(ctx, lists)),
            Condition::Xor { conditions } => conditions
                .iter()
                .fold(false, |acc, c| acc ^ c.evaluate(ctx, lists)),
            Condition::Equals { param, value } => ctx.get(param) == Some(value.as_str()),
            Condition::NotEqual { param, value } => ctx.get(param) != Some(value.as_str()),
            Condition::GreaterOrEqual {
                param,
                value,
                compare,
            } => matches!(
                compare_param(ctx.get(param), value, *compare),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            Condition::LessOrEqual {
                param,
                value,
                compare,
            } => matches!(
                compare_param(ctx.get(param), value, *compare),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            Condition::Contains {
                param,
                values,
                namespaced_lists,
            } => match ctx.get(param) {
                Some(v) => {
                    values.iter().any(|candidate| candidate == v)
                        || namespaced_lists
                            .iter()
                            .any(|name| lists.contains_value(name, v))
                }
                None => false,
            },
            Condition::IsEmpty { param } => ctx.is_empty_param(param),
            Condition::InIpRange {
                param,
                values,
                namespaced_lists,
                ranges,
            } => match ctx.get(param) {
                Some(probe) => {
                    let inline =
                        ranges.get_or_init(|| IpRangeSet::parse(values.iter().map(String::as_str)));
                    inline.matches(probe)
                        || namespaced_lists
                            .iter()
                            .any(|name| lists.matches_ip(name, probe))
                }
                None => false,
            },
            // Stateless pseudo-random gate; not deterministic by design
            Condition::Percent { value } => rand::thread_rng().gen::<f64>() * 100.0 < *value,
        }
    }

    /// Structural validation performed at compile time
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Condition::And { conditions }
            | Condition::Or { conditions }
            | Condition::Xor { conditions } => {
                if conditions.is_empty() {
                    return Err("boolean composite requires at least one child".to_string());
                }
                for c in conditions {
                    c.validate()?;
                }
                Ok(())
            }
            Condition::Equals { param, .. }
            | Condition::NotEqual { param, .. }
            | Condition::IsEmpty { param } => require_param(param),
            Condition::GreaterOrEqual {
                param,
                value,
                compare,
            }
            | Condition::LessOrEqual {
                param,
                value,
                compare,
            } => {
                require_param(param)?;
                match compare {
                    CompareKind::Numeric => value
                        .parse::<f64>()
                        .map(|_| ())
                        .map_err(|_| format!("non-numeric comparison value '{}'", value)),
                    CompareKind::Version => parse_version(value)
                        .map(|_| ())
                        .ok_or_else(|| format!("malformed version value '{}'", value)),
                }
            }
            Condition::Contains {
                param,
                values,
                namespaced_lists,
            } => {
                require_param(param)?;
                if values.is_empty() && namespaced_lists.is_empty() {
                    return Err(format!(
                        "condition on '{}' needs inline values or a namespaced list",
                        param
                    ));
                }
                Ok(())
            }
            Condition::InIpRange {
                param,
                values,
                namespaced_lists,
                ranges,
            } => {
                require_param(param)?;
                if values.is_empty() && namespaced_lists.is_empty() {
                    return Err(format!(
                        "condition on '{}' needs inline values or a namespaced list",
                        param
                    ));
                }
                // Validation runs at model compile time; parse here so every
                // later evaluation hits the cached set
                ranges.get_or_init(|| IpRangeSet::parse(values.iter().map(String::as_str)));
                Ok(())
            }
            Condition::Percent { value } => {
                if (0.0..=100.0).contains(value) {
                    Ok(())
                } else {
                    Err(format!("percent value {} outside [0, 100]", value))
                }
            }
        }
    }
}

fn require_param(param: &str) -> Result<(), String> {
    if param.trim().is_empty() {
        Err("empty parameter name".to_string())
    } else {
        Ok(())
    }
}

/// Compare a context value against a rule value; malformed input never orders
fn compare_param(actual: Option<&str>, expected: &str, kind: CompareKind) -> Option<Ordering> {
    let actual = actual?;
    match kind {
        CompareKind::Numeric => {
            let a = actual.trim().parse::<f64>().ok()?;
            let b = expected.trim().parse::<f64>().ok()?;
            a.partial_cmp(&b)
        }
        CompareKind::Version => {
            let a = parse_version(actual)?;
            let b = parse_version(expected)?;
            Some(compare_versions(&a, &b))
        }
    }
}

/// Parse a dotted version (or IPv4 address) into numeric segments
fn parse_version(value: &str) -> Option<Vec<u64>> {
    let segments: Result<Vec<u64>, _> = value.trim().split('.').map(str::parse::<u64>).collect();
    segments.ok().filter(|s| !s.is_empty())
}

/// Segment-by-segment comparison, shorter side padded with zeros
fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
