//! Property-based tests for executor and aggregation invariants.
//!
//! Each case builds its own current-thread runtime, so the async executor
//! runs inside a plain proptest body.

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authload::loadtest::error::RequestError;
use authload::loadtest::metrics::LatencyRecorder;
use authload::loadtest::pool::{batch_count, Executor, ExecutorSettings};
use authload::loadtest::report::{aggregate, Outcome};

#[derive(Debug, Clone)]
struct Flagged {
    index: usize,
    ok: bool,
}

impl Outcome for Flagged {
    fn is_ok(&self) -> bool {
        self.ok
    }

    fn error(&self) -> Option<&RequestError> {
        None
    }

    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.index as u64 % 7)
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every submitted item yields exactly one result and |ok| + |fail| == N.
    #[test]
    fn every_item_yields_one_result(
        n in 0usize..120,
        k in 1usize..16,
        fail_every in 1usize..6,
    ) {
        let report = runtime().block_on(async {
            Executor::new(ExecutorSettings::new(k))
                .run(
                    (0..n).collect(),
                    move |index: usize| async move {
                        tokio::task::yield_now().await;
                        Flagged { index, ok: index % fail_every != 0 }
                    },
                    |_| {},
                )
                .await
        });

        prop_assert_eq!(report.results.len(), n);
        let mut seen: Vec<usize> = report.results.iter().map(|r| r.index).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..n).collect::<Vec<_>>());

        let agg = aggregate(report.results);
        prop_assert_eq!(agg.ok.len() + agg.fail.len(), n);
        prop_assert!(agg.fail.iter().all(|r| r.index % fail_every == 0));
    }

    /// Batched runs execute exactly ceil(N / B) batches.
    #[test]
    fn batched_run_uses_ceil_batches(
        n in 0usize..80,
        k in 1usize..8,
        b in 1usize..20,
    ) {
        let report = runtime().block_on(async {
            Executor::new(ExecutorSettings::new(k).with_batches(b, Duration::ZERO))
                .run((0..n).collect(), |i: usize| async move { i }, |_| {})
                .await
        });

        prop_assert_eq!(report.batches, n.div_ceil(b));
        prop_assert_eq!(report.batches, batch_count(n, Some(b)));
        prop_assert_eq!(report.results.len(), n);
    }

    /// The number of tasks in flight never exceeds the ceiling.
    #[test]
    fn in_flight_never_exceeds_ceiling(
        n in 1usize..60,
        k in 1usize..10,
    ) {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            runtime().block_on(async move {
                Executor::new(ExecutorSettings::new(k))
                    .run(
                        (0..n).collect(),
                        move |i: usize| {
                            let in_flight = Arc::clone(&in_flight);
                            let peak = Arc::clone(&peak);
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(1)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                i
                            }
                        },
                        |_| {},
                    )
                    .await
            })
        };

        prop_assert_eq!(report.results.len(), n);
        prop_assert!(peak.load(Ordering::SeqCst) <= k);
        prop_assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    /// The result callback sees every result exactly once.
    #[test]
    fn callback_sees_every_result(n in 0usize..100, k in 1usize..12) {
        let mut recorder = LatencyRecorder::new();
        let report = runtime().block_on(async {
            Executor::new(ExecutorSettings::new(k))
                .run(
                    (0..n).collect(),
                    |index: usize| async move { Flagged { index, ok: index % 3 != 0 } },
                    |r| recorder.record(r),
                )
                .await
        });

        let snap = recorder.snapshot();
        prop_assert_eq!(snap.total() as usize, report.results.len());
        prop_assert_eq!(snap.success_count as usize, (0..n).filter(|i| i % 3 != 0).count());
        prop_assert!(snap.error_rate() >= 0.0 && snap.error_rate() <= 1.0);
    }
}
