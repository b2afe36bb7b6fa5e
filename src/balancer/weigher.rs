/// Effective weight computation for discovered instances
///
/// An instance may advertise a weight as string metadata. The weigher turns
/// that into a selection weight: parse, round fractional values, fall back
/// to the configured default when the value is missing or unparsable, and
/// always clamp into `[0, max_weight]`. Every recovery is logged, none is
/// fatal.

use crate::balancer::discovery::Instance;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct InstanceWeigher {
    default_weight: u32,
    max_weight: u32,
}

impl InstanceWeigher {
    pub fn new(default_weight: u32, max_weight: u32) -> Self {
        Self {
            default_weight,
            max_weight,
        }
    }

    pub fn default_weight(&self) -> u32 {
        self.default_weight
    }

    pub fn max_weight(&self) -> u32 {
        self.max_weight
    }

    /// Effective selection weight for one instance
    pub fn weight(&self, instance: &Instance) -> u32 {
        let parsed = match &instance.weight {
            None => i64::from(self.default_weight),
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) => {
                    if value.fract() != 0.0 {
                        warn!(
                            instance = %instance.ipv4,
                            weight = %raw,
                            "fractional weights are not supported, rounding"
                        );
                    }
                    value.round() as i64
                }
                Err(_) => {
                    warn!(
                        instance = %instance.ipv4,
                        weight = %raw,
                        default = self.default_weight,
                        "unparsable weight, using default"
                    );
                    i64::from(self.default_weight)
                }
            },
        };

        if parsed < 0 {
            warn!(instance = %instance.ipv4, weight = parsed, "negative weight clamped to 0");
            return 0;
        }
        let parsed = parsed as u64;
        if parsed > u64::from(self.max_weight) {
            warn!(
                instance = %instance.ipv4,
                weight = parsed,
                max = self.max_weight,
                "weight exceeds configured maximum, clamping"
            );
            return self.max_weight;
        }
        parsed as u32
    }
}
