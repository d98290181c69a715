//! Property-based tests for trueno-fit
//!
//! - Test aggregation invariants over random result sets
//! - Test bit-exact persistence of numeric payloads
//! - Run with ProptestConfig::with_cases(100)

use proptest::prelude::*;
use std::collections::BTreeMap;
use trueno_fit::aggregate::{collapse, place, ResultAggregator};
use trueno_fit::config::RuntimeMetric;
use trueno_fit::record::{ErrorCode, ResultRecord};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

fn arb_code() -> impl Strategy<Value = ErrorCode> {
    prop_oneof![
        4 => Just(ErrorCode::Converged),
        1 => Just(ErrorCode::MaxIterations),
        1 => Just(ErrorCode::NotConverged),
        1 => Just(ErrorCode::SoftwareException),
        1 => Just(ErrorCode::BoundsUnsupported),
        1 => Just(ErrorCode::BoundsViolated),
    ]
}

/// A record on one of a handful of rows, minimizers and Jacobians, so that
/// columns overlap, collide and go sparse.
fn arb_record() -> impl Strategy<Value = ResultRecord> {
    (0..4usize, 0..3usize, 0..3usize, 0..2usize, 1e-6f64..10.0, 1e-4f64..5.0, arb_code())
        .prop_map(|(row, minimizer, jacobian, cost, accuracy, runtime, code)| {
            let builder = ResultRecord::builder(
                format!("p{row}"),
                ["nlls", "poisson"][cost],
                "s",
                format!("m{minimizer}"),
            )
            .jacobian(format!("j{jacobian}"))
            .error_code(code);
            if code.is_fatal() || code == ErrorCode::BoundsUnsupported {
                builder.runtimes(vec![f64::INFINITY], RuntimeMetric::Mean).build()
            } else {
                builder
                    .accuracy(accuracy)
                    .runtimes(vec![runtime], RuntimeMetric::Mean)
                    .build()
            }
        })
}

fn arb_records() -> impl Strategy<Value = Vec<ResultRecord>> {
    proptest::collection::vec(arb_record(), 1..40)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Aggregation Properties
    // ========================================================================

    /// Property: at most one best record per (row, category), and exactly
    /// one whenever the group holds a record inside bounds
    #[test]
    fn prop_best_is_unique(records in arb_records()) {
        let grid = ResultAggregator::new().aggregate(records);

        let mut best: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut eligible: BTreeMap<(String, String), bool> = BTreeMap::new();
        for r in grid.records() {
            let key = (r.problem().to_string(), r.cost_function().to_string());
            *best.entry(key.clone()).or_default() += usize::from(r.is_best());
            *eligible.entry(key).or_default() |= r.error_code() != ErrorCode::BoundsViolated;
        }
        for (key, count) in &best {
            prop_assert!(*count <= 1, "{key:?} has {count} best records");
            prop_assert_eq!(*count == 1, eligible[key]);
        }
    }

    /// Property: the best record normalizes to exactly 1 and nothing eligible
    /// normalizes below it
    #[test]
    fn prop_normalization_identity(records in arb_records()) {
        let grid = ResultAggregator::new().aggregate(records);

        for r in grid.records() {
            let norm = r.norm_accuracy().unwrap();
            if r.is_best() && r.effective_accuracy().is_finite() {
                prop_assert!((norm - 1.0).abs() < 1e-12);
            }
            if r.error_code() != ErrorCode::BoundsViolated {
                prop_assert!(norm >= 1.0 - 1e-12, "{} normalized to {norm}", r.minimizer());
            }
            prop_assert!(r.norm_runtime().unwrap() >= 1.0 - 1e-12);
        }
    }

    /// Property: collapsing a collapsed placement changes nothing
    #[test]
    fn prop_collapse_idempotent(records in arb_records()) {
        let mut placements = place(&records);
        collapse(&mut placements, &records);
        let once = placements.clone();

        prop_assert!(!collapse(&mut placements, &records));
        prop_assert_eq!(placements, once);
    }

    /// Property: every (row, category) has a slot for every column, and the
    /// best record of a group is one of its records
    #[test]
    fn prop_grid_is_dense(records in arb_records()) {
        let grid = ResultAggregator::new().aggregate(records);

        for category in grid.categories() {
            let width = grid.columns(category).len();
            for row in grid.rows() {
                let slots = grid.cells(row, category);
                prop_assert_eq!(slots.len(), width);
                let best: Vec<_> = slots.iter().flatten().filter(|r| r.is_best()).collect();
                if let Some(best) = best.first() {
                    prop_assert_eq!(best.problem(), row.label());
                    prop_assert_eq!(best.cost_function(), category.as_str());
                }
            }
        }
    }

    // ========================================================================
    // Persistence Properties
    // ========================================================================

    /// Property: parameters and timing samples reload bit for bit
    #[test]
    fn prop_record_roundtrip_bit_exact(
        params in proptest::collection::vec(any::<f64>(), 0..8),
        runtimes in proptest::collection::vec(any::<f64>(), 1..6),
        accuracy in any::<f64>(),
        energy in proptest::option::of(any::<f64>()),
    ) {
        let record = ResultRecord::builder("p", "nlls", "s", "m")
            .accuracy(accuracy)
            .runtimes(runtimes, RuntimeMetric::Median)
            .params(Some(params))
            .energy(energy)
            .error_code(ErrorCode::Converged)
            .build();

        let text = serde_json::to_string(&record).unwrap();
        let back: ResultRecord = serde_json::from_str(&text).unwrap();

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(back.params().unwrap()), bits(record.params().unwrap()));
        prop_assert_eq!(bits(back.runtimes()), bits(record.runtimes()));
        prop_assert!(
            back.accuracy() == record.accuracy()
                || (back.accuracy().is_nan() && record.accuracy().is_nan())
        );
        prop_assert!(
            back.runtime() == record.runtime()
                || (back.runtime().is_nan() && record.runtime().is_nan())
        );
        match (back.energy(), record.energy()) {
            (Some(a), Some(b)) => prop_assert!(a == b || (a.is_nan() && b.is_nan())),
            (a, b) => prop_assert_eq!(a.is_none(), b.is_none()),
        }
    }

    // ========================================================================
    // Runtime Metric Properties
    // ========================================================================

    /// Property: every metric lies between the fastest and slowest sample
    #[test]
    fn prop_runtime_metric_within_range(
        samples in proptest::collection::vec(1e-6f64..100.0, 1..20)
    ) {
        let lo = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for metric in [
            RuntimeMetric::Mean,
            RuntimeMetric::Median,
            RuntimeMetric::Minimum,
            RuntimeMetric::Maximum,
            RuntimeMetric::First,
            RuntimeMetric::Harmonic,
            RuntimeMetric::Trim,
        ] {
            let value = metric.aggregate(&samples);
            prop_assert!(value >= lo * (1.0 - 1e-12) && value <= hi * (1.0 + 1e-12),
                "{metric:?} = {value} outside [{lo}, {hi}]");
        }
    }
}
