// Fixed-interval poll loop over every configured account.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use tracing::{error, info, warn};

use autoresponder_core::account::{Account, AccountRegistry, Marketplace};

use crate::marketplace::ReviewSource;
use crate::processor::{BatchReport, ReviewProcessor};
use crate::shutdown::Shutdown;

/// Summary of one full pass over the accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Accounts attempted this cycle.
    pub accounts: usize,
    /// Accounts whose fetch failed or that had no matching source.
    pub failed_accounts: usize,
    pub totals: BatchReport,
    pub cancelled: bool,
}

/// Drives the `ReviewProcessor` across all accounts, then sleeps for the
/// poll interval, until shutdown.
pub struct PollLoop {
    accounts: AccountRegistry,
    sources: HashMap<Marketplace, Arc<dyn ReviewSource>>,
    processor: ReviewProcessor,
    interval: Duration,
    max_concurrent_accounts: usize,
    shutdown: Shutdown,
}

impl PollLoop {
    pub fn new(
        accounts: AccountRegistry,
        sources: Vec<Arc<dyn ReviewSource>>,
        processor: ReviewProcessor,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.marketplace(), source))
            .collect();
        Self {
            accounts,
            sources,
            processor,
            interval,
            max_concurrent_accounts: 1,
            shutdown,
        }
    }

    /// Process up to `n` accounts at once. Values below 1 are treated as 1.
    pub fn with_max_concurrent_accounts(mut self, n: usize) -> Self {
        self.max_concurrent_accounts = n.max(1);
        self
    }

    /// Run cycles until shutdown. Returns the number of completed cycles.
    ///
    /// With no accounts configured the loop logs an error and idles until
    /// shutdown instead of exiting.
    pub async fn run(&self) -> u64 {
        info!(
            "Autoresponder started at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        if self.accounts.is_empty() {
            error!("No marketplace accounts configured; nothing to poll until restarted with credentials");
            self.shutdown.cancelled().await;
            info!("Poll loop stopped");
            return 0;
        }

        let mut cycles = 0u64;
        while !self.shutdown.is_cancelled() {
            let report = self.run_cycle().await;
            if report.cancelled {
                break;
            }
            cycles += 1;
            info!(
                accounts = report.accounts,
                failed_accounts = report.failed_accounts,
                submitted = report.totals.submitted(),
                skipped = report.totals.skipped,
                failures = report.totals.failures(),
                "Cycle finished at {}",
                chrono::Local::now().format("%H:%M:%S")
            );

            info!("Next check in {} seconds", self.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        info!("Poll loop stopped after {} cycle(s)", cycles);
        cycles
    }

    /// One pass over every account. Failures are contained per account.
    pub async fn run_cycle(&self) -> CycleReport {
        // Collected before streaming so the `run()` future stays `Send`.
        let pending: Vec<BoxFuture<'_, Option<BatchReport>>> = self
            .accounts
            .iter()
            .map(|account| self.run_account(account).boxed())
            .collect();
        let results: Vec<Option<BatchReport>> = stream::iter(pending)
            .buffer_unordered(self.max_concurrent_accounts)
            .collect()
            .await;

        let mut report = CycleReport {
            accounts: results.len(),
            ..CycleReport::default()
        };
        for result in results {
            match result {
                Some(batch) => report.totals.merge(&batch),
                None => report.failed_accounts += 1,
            }
        }
        report.cancelled = report.totals.cancelled || self.shutdown.is_cancelled();
        report
    }

    /// `None` when the account could not be processed at all.
    async fn run_account(&self, account: &Account) -> Option<BatchReport> {
        let Some(source) = self.sources.get(&account.marketplace()) else {
            warn!(
                marketplace = %account.marketplace(),
                account = account.id(),
                "No review source registered for marketplace"
            );
            return None;
        };

        match self.processor.process_account(source.as_ref(), account).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(
                    marketplace = %account.marketplace(),
                    account = account.id(),
                    "Failed to fetch reviews: {}",
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ozon_account, wb_account, FakeResponder, FakeSource};
    use crate::shutdown;
    use autoresponder_core::ledger::Ledger;
    use autoresponder_core::review::Review;

    const INTERVAL: Duration = Duration::from_secs(300);

    fn poll_loop(
        accounts: Vec<Account>,
        sources: Vec<Arc<FakeSource>>,
        shutdown: Shutdown,
    ) -> PollLoop {
        let sources = sources
            .into_iter()
            .map(|source| source as Arc<dyn ReviewSource>)
            .collect();
        let processor = ReviewProcessor::new(
            Arc::new(Ledger::in_memory()),
            Arc::new(FakeResponder::new()),
            "Thanks!",
            shutdown.clone(),
        );
        PollLoop::new(
            AccountRegistry::new(accounts),
            sources,
            processor,
            INTERVAL,
            shutdown,
        )
    }

    #[tokio::test]
    async fn failing_account_does_not_abort_cycle() {
        let wb = Arc::new(
            FakeSource::new(Marketplace::Wildberries)
                .with_reviews("main", vec![Review::new("1").with_body("good")]),
        );
        let ozon = Arc::new(
            FakeSource::new(Marketplace::Ozon)
                .failing_fetch_for("111")
                .with_reviews("222", vec![Review::new("r-1").with_body("fine")]),
        );
        let pl = poll_loop(
            vec![wb_account("main"), ozon_account("111"), ozon_account("222")],
            vec![wb.clone(), ozon.clone()],
            Shutdown::never(),
        );

        let report = pl.run_cycle().await;

        assert_eq!(report.accounts, 3);
        assert_eq!(report.failed_accounts, 1);
        assert_eq!(report.totals.answered, 2);
        assert_eq!(wb.submitted_ids(), vec!["1".to_string()]);
        assert_eq!(ozon.submitted_ids(), vec!["r-1".to_string()]);
        assert_eq!(ozon.fetches(), vec!["111".to_string(), "222".to_string()]);
    }

    #[tokio::test]
    async fn second_cycle_skips_answered_reviews() {
        let wb = Arc::new(
            FakeSource::new(Marketplace::Wildberries)
                .with_reviews("main", vec![Review::new("1").with_body("good")]),
        );
        let pl = poll_loop(vec![wb_account("main")], vec![wb.clone()], Shutdown::never());

        let first = pl.run_cycle().await;
        let second = pl.run_cycle().await;

        assert_eq!(first.totals.answered, 1);
        assert_eq!(second.totals.answered, 0);
        assert_eq!(second.totals.skipped, 1);
        assert_eq!(wb.submissions().len(), 1);
    }

    #[tokio::test]
    async fn account_without_source_is_counted_as_failed() {
        let wb = Arc::new(FakeSource::new(Marketplace::Wildberries));
        let pl = poll_loop(
            vec![wb_account("main"), ozon_account("111")],
            vec![wb.clone()],
            Shutdown::never(),
        );

        let report = pl.run_cycle().await;
        assert_eq!(report.accounts, 2);
        assert_eq!(report.failed_accounts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_cycle_per_interval_until_shutdown() {
        let (trigger, shutdown) = shutdown::channel();
        let wb = Arc::new(FakeSource::new(Marketplace::Wildberries));
        let pl = poll_loop(vec![wb_account("main")], vec![wb.clone()], shutdown);

        let (cycles, ()) = tokio::join!(pl.run(), async {
            // Cycles start at t=0, 300 and 600.
            tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(10)).await;
            trigger.trigger();
        });

        assert_eq!(cycles, 3);
        assert_eq!(wb.fetches().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_sleep() {
        let (trigger, shutdown) = shutdown::channel();
        let wb = Arc::new(FakeSource::new(Marketplace::Wildberries));
        let pl = poll_loop(vec![wb_account("main")], vec![wb.clone()], shutdown);
        let started = tokio::time::Instant::now();

        let (cycles, ()) = tokio::join!(pl.run(), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.trigger();
        });

        assert_eq!(cycles, 1);
        assert!(started.elapsed() < INTERVAL);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_no_cycle() {
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();
        let wb = Arc::new(FakeSource::new(Marketplace::Wildberries));
        let pl = poll_loop(vec![wb_account("main")], vec![wb.clone()], shutdown);

        assert_eq!(pl.run().await, 0);
        assert!(wb.fetches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_accounts_idles_until_shutdown() {
        let (trigger, shutdown) = shutdown::channel();
        let pl = poll_loop(vec![], vec![], shutdown);

        let (cycles, ()) = tokio::join!(pl.run(), async {
            tokio::time::sleep(INTERVAL * 3).await;
            trigger.trigger();
        });
        assert_eq!(cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_slow_fetch_ends_cycle() {
        let (trigger, shutdown) = shutdown::channel();
        let wb = Arc::new(
            FakeSource::new(Marketplace::Wildberries).with_fetch_delay(Duration::from_secs(3600)),
        );
        let pl = poll_loop(vec![wb_account("main")], vec![wb.clone()], shutdown);
        let started = tokio::time::Instant::now();

        let (cycles, ()) = tokio::join!(pl.run(), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });

        assert_eq!(cycles, 0);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn accounts_run_concurrently_when_allowed() {
        let wb = Arc::new(
            FakeSource::new(Marketplace::Wildberries).with_fetch_delay(Duration::from_secs(10)),
        );
        let accounts = vec![wb_account("a"), wb_account("b"), wb_account("c")];

        let sequential = poll_loop(accounts.clone(), vec![wb.clone()], Shutdown::never());
        let started = tokio::time::Instant::now();
        sequential.run_cycle().await;
        assert!(started.elapsed() >= Duration::from_secs(30));

        let concurrent = poll_loop(accounts, vec![wb.clone()], Shutdown::never())
            .with_max_concurrent_accounts(3);
        let started = tokio::time::Instant::now();
        let report = concurrent.run_cycle().await;
        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(report.accounts, 3);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn run_future_is_send() {
        let pl = poll_loop(vec![wb_account("main")], vec![], Shutdown::never());
        assert_send(&pl.run());
        assert_send(&pl.run_cycle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_loop_stops_on_shutdown() {
        let (trigger, shutdown) = shutdown::channel();
        let wb = Arc::new(
            FakeSource::new(Marketplace::Wildberries)
                .with_reviews("main", vec![Review::new("1").with_body("good")]),
        );
        let pl = poll_loop(vec![wb_account("main")], vec![wb.clone()], shutdown);

        let handle = tokio::spawn(async move { pl.run().await });
        for _ in 0..100 {
            if !wb.submissions().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.trigger();

        let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should stop after shutdown")
            .expect("loop task should not panic");
        // The trigger may land before the cycle's own bookkeeping finishes.
        assert!(cycles <= 1);
        assert_eq!(wb.submitted_ids(), vec!["1".to_string()]);
    }
}
