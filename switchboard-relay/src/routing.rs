//! Provider selection.
//!
//! Routing is a pure function over the registry and a statistics snapshot:
//! it never mutates state and never blocks. Candidates are the configured
//! providers currently observed online with a success rate above
//! [`MIN_SUCCESS_RATE`]; among those the lowest composite score wins, with
//! ties broken by registry declaration order.
//!
//! A provider that has never passed a probe stays offline and therefore can
//! never be selected, no matter how the others look.

use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::stats::{ProviderStats, StatsStore};

/// Candidacy floor for the rolling success rate.
pub const MIN_SUCCESS_RATE: f64 = 0.70;

const LATENCY_WEIGHT: f64 = 0.6;
const FAILURE_WEIGHT: f64 = 0.4;

/// Composite routing score, lower is better.
///
/// Latency dominates; the failure term only separates providers whose
/// latencies are close.
pub fn score(stats: &ProviderStats) -> f64 {
    LATENCY_WEIGHT * stats.response_time_ms + FAILURE_WEIGHT * (1.0 - stats.success_rate())
}

/// Pick the preferred provider for the next request, if any qualifies.
pub fn best_provider<'a>(
    registry: &'a ProviderRegistry,
    stats: &StatsStore,
) -> Option<&'a ProviderDescriptor> {
    let mut best: Option<(&ProviderDescriptor, f64)> = None;

    for provider in registry.configured() {
        let Some(snapshot) = stats.snapshot(&provider.name) else {
            continue;
        };
        if !snapshot.online || snapshot.success_rate() <= MIN_SUCCESS_RATE {
            continue;
        }

        let candidate_score = score(&snapshot);
        // Strict comparison keeps the earlier declaration on a tie.
        match best {
            Some((_, best_score)) if candidate_score >= best_score => {}
            _ => best = Some((provider, candidate_score)),
        }
    }

    best.map(|(provider, _)| provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderDescriptor;
    use crate::stats::FAILURE_PENALTY_MS;

    fn registry(names: &[&str]) -> ProviderRegistry {
        std::env::set_var("ROUTING_TEST_KEY", "sk-test");
        ProviderRegistry::new(
            names
                .iter()
                .map(|name| {
                    ProviderDescriptor::new(
                        *name,
                        "ROUTING_TEST_KEY",
                        format!("http://{name}.example"),
                        "model",
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn no_observations_means_no_selection() {
        let registry = registry(&["p1", "p2"]);
        let stats = StatsStore::new(&registry);
        assert!(best_provider(&registry, &stats).is_none());
    }

    #[test]
    fn offline_providers_are_excluded() {
        let registry = registry(&["p1", "p2"]);
        let stats = StatsStore::new(&registry);
        stats.record("p1", false, FAILURE_PENALTY_MS);
        stats.record("p2", false, FAILURE_PENALTY_MS);
        assert!(best_provider(&registry, &stats).is_none());
    }

    #[test]
    fn low_success_rate_disqualifies() {
        let registry = registry(&["p1"]);
        let stats = StatsStore::new(&registry);
        // 2 of 4 succeed: rate 0.5, below the floor even while online.
        stats.record("p1", false, FAILURE_PENALTY_MS);
        stats.record("p1", false, FAILURE_PENALTY_MS);
        stats.record("p1", true, 50.0);
        stats.record("p1", true, 50.0);
        assert!(best_provider(&registry, &stats).is_none());
    }

    #[test]
    fn lowest_score_wins() {
        let registry = registry(&["slow", "fast"]);
        let stats = StatsStore::new(&registry);
        stats.record("slow", true, 900.0);
        stats.record("fast", true, 40.0);

        let chosen = best_provider(&registry, &stats).unwrap();
        assert_eq!(chosen.name, "fast");
    }

    #[test]
    fn ties_break_by_declared_order() {
        let registry = registry(&["first", "second"]);
        let stats = StatsStore::new(&registry);
        stats.record("first", true, 100.0);
        stats.record("second", true, 100.0);

        let chosen = best_provider(&registry, &stats).unwrap();
        assert_eq!(chosen.name, "first");
    }

    #[test]
    fn unconfigured_provider_is_skipped_even_when_healthy() {
        std::env::remove_var("ROUTING_TEST_MISSING_KEY");
        let registry = ProviderRegistry::new(vec![
            ProviderDescriptor::new(
                "ghost",
                "ROUTING_TEST_MISSING_KEY",
                "http://ghost.example",
                "model",
            ),
            ProviderDescriptor::new("real", "ROUTING_TEST_KEY", "http://real.example", "model"),
        ]);
        std::env::set_var("ROUTING_TEST_KEY", "sk-test");

        let stats = StatsStore::new(&registry);
        stats.record("ghost", true, 1.0);
        stats.record("real", true, 500.0);

        let chosen = best_provider(&registry, &stats).unwrap();
        assert_eq!(chosen.name, "real");
    }

    #[test]
    fn score_weighs_latency_and_failures() {
        let mut stats = ProviderStats::default();
        stats.total_requests = 10;
        stats.failed_requests = 1;
        stats.response_time_ms = 100.0;
        stats.online = true;

        let expected = 0.6 * 100.0 + 0.4 * (1.0 - 0.9);
        assert!((score(&stats) - expected).abs() < 1e-9);
    }
}
