/// Traffic-shaping calculator
///
/// Two pure functions sharing the balancer's weight model, used by
/// operators to plan rollout ramps. Neither touches discovery or rules;
/// they work on scalar host counts and connection totals supplied by the
/// operator-facing tooling.

/// Per-host weights derived from a desired traffic boost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedWeights {
    /// Weight each boosted host should advertise
    pub adjusted_weight: i64,
    /// Default weight after absorbing any clamped deficit
    pub default_weight: i64,
    /// Resulting connections per boosted host
    pub weighted_host_connections: f64,
    /// Resulting connections per default-weight host
    pub default_host_connections: f64,
}

/// Per-host traffic delta derived from a chosen weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedThreshold {
    /// Percentage difference in per-host traffic between weighted and
    /// non-weighted hosts; `None` when every host is weighted and no
    /// comparison is possible
    pub percent_delta: Option<f64>,
    pub weighted_host_connections: f64,
    pub default_host_connections: f64,
}

/// Derive the per-host weight that boosts `weighted_hosts` by
/// `adjusted_traffic_percent`, and the traffic split it produces
///
/// The target weight is `round(default_weight * (pct/100 + 1))`. A negative
/// target (a cut deeper than -100%) clamps to zero, with the deficit
/// absorbed into the default weight so the requested ratio is preserved.
pub fn calculate_adjusted_weights(
    weighted_hosts: u64,
    adjusted_traffic_percent: f64,
    total_connections: u64,
    total_hosts: u64,
    default_weight: i64,
) -> AdjustedWeights {
    let weighted_hosts = weighted_hosts.min(total_hosts);
    let non_weighted_hosts = total_hosts - weighted_hosts;

    let target = (default_weight as f64 * (adjusted_traffic_percent / 100.0 + 1.0)).round() as i64;
    let (adjusted_weight, default_weight) = if target < 0 {
        (0, default_weight - target)
    } else {
        (target, default_weight)
    };

    let (weighted_per_host, default_per_host) = split_connections(
        weighted_hosts,
        non_weighted_hosts,
        total_connections,
        default_weight,
        adjusted_weight,
    );

    AdjustedWeights {
        adjusted_weight,
        default_weight,
        weighted_host_connections: weighted_per_host,
        default_host_connections: default_per_host,
    }
}

/// The inverse: given a chosen weight, derive the percentage difference in
/// per-host traffic between weighted and non-weighted hosts
pub fn calculate_adjusted_traffic(
    weighted_hosts: u64,
    total_connections: u64,
    total_hosts: u64,
    default_weight: i64,
    adjusted_weight: i64,
) -> AdjustedThreshold {
    let weighted_hosts = weighted_hosts.min(total_hosts);
    let non_weighted_hosts = total_hosts - weighted_hosts;

    let (weighted_per_host, default_per_host) = split_connections(
        weighted_hosts,
        non_weighted_hosts,
        total_connections,
        default_weight,
        adjusted_weight,
    );

    // With no non-weighted host there is nothing to compare against
    let percent_delta = if non_weighted_hosts == 0 || default_per_host == 0.0 {
        None
    } else {
        Some((weighted_per_host - default_per_host) / default_per_host * 100.0)
    };

    AdjustedThreshold {
        percent_delta,
        weighted_host_connections: weighted_per_host,
        default_host_connections: default_per_host,
    }
}

/// Proportional connection-bucket division over effective host counts
fn split_connections(
    weighted_hosts: u64,
    non_weighted_hosts: u64,
    total_connections: u64,
    default_weight: i64,
    adjusted_weight: i64,
) -> (f64, f64) {
    let effective =
        weighted_hosts as f64 * adjusted_weight as f64 + non_weighted_hosts as f64 * default_weight as f64;
    if effective <= 0.0 {
        return (0.0, 0.0);
    }
    let bucket = total_connections as f64 / effective;
    (bucket * adjusted_weight as f64, bucket * default_weight as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_target_weight() {
        // +50% on a default weight of 10 lands on 15
        let result = calculate_adjusted_weights(2, 50.0, 1400, 10, 10);
        assert_eq!(result.adjusted_weight, 15);
        assert_eq!(result.default_weight, 10);

        // Effective hosts: 2*15 + 8*10 = 110; bucket = 1400/110
        let bucket = 1400.0 / 110.0;
        assert!((result.weighted_host_connections - bucket * 15.0).abs() < 1e-9);
        assert!((result.default_host_connections - bucket * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_percent_is_neutral() {
        let result = calculate_adjusted_weights(3, 0.0, 1000, 10, 8);
        assert_eq!(result.adjusted_weight, 8);
        assert!(
            (result.weighted_host_connections - result.default_host_connections).abs() < 1e-9
        );
    }

    #[test]
    fn test_negative_target_clamps_and_absorbs() {
        // -150% of 10 targets -5: clamp to 0, default absorbs the deficit
        let result = calculate_adjusted_weights(2, -150.0, 1000, 10, 10);
        assert_eq!(result.adjusted_weight, 0);
        assert_eq!(result.default_weight, 15);
        assert_eq!(result.weighted_host_connections, 0.0);
    }

    #[test]
    fn test_weighted_hosts_clamped_to_total() {
        let result = calculate_adjusted_weights(50, 20.0, 1000, 10, 10);
        // All ten hosts weighted; the split is uniform at the boosted weight
        assert_eq!(result.adjusted_weight, 12);
        assert!((result.weighted_host_connections - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjusted_traffic_delta() {
        // Weighted hosts at 15 vs default 10: +50% per host
        let result = calculate_adjusted_traffic(2, 1400, 10, 10, 15);
        let delta = result.percent_delta.unwrap();
        assert!((delta - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjusted_traffic_all_hosts_weighted() {
        // Zero non-weighted hosts: no comparison possible
        let result = calculate_adjusted_traffic(10, 1000, 10, 10, 15);
        assert_eq!(result.percent_delta, None);
        assert!(result.weighted_host_connections > 0.0);
    }

    #[test]
    fn test_adjusted_traffic_inverse_of_weights() {
        let weights = calculate_adjusted_weights(3, 30.0, 2600, 12, 10);
        let traffic =
            calculate_adjusted_traffic(3, 2600, 12, weights.default_weight, weights.adjusted_weight);

        // The derived weight reproduces the requested boost
        assert!((traffic.percent_delta.unwrap() - 30.0).abs() < 1e-9);
        assert!(
            (traffic.weighted_host_connections - weights.weighted_host_connections).abs() < 1e-9
        );
    }

    #[test]
    fn test_zero_everything() {
        let result = calculate_adjusted_traffic(0, 0, 0, 0, 0);
        assert_eq!(result.percent_delta, None);
        assert_eq!(result.weighted_host_connections, 0.0);
        assert_eq!(result.default_host_connections, 0.0);
    }
}
