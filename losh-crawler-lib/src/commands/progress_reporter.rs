use crate::net::{Attempt, AttemptObserver, AttemptOutcome};
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

type MessageCallback = Box<dyn Fn() -> String + Send + Sync>;

const REFRESH_INTERVAL_MS: u64 = 100;

const TEMPLATE: &str = "{spinner:.green} {prefix:>11.bold.cyan} {msg}";
const TEMPLATE_NO_COLOR: &str = "{spinner} {prefix:>11} {msg}";

const TICK_STRINGS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "];

/// Counts the HTTP attempts made by requesters sharing it.
#[derive(Debug, Default)]
pub struct RequestStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl RequestStats {
    /// An observer feeding these stats, for [`crate::net::HttpRequesterBuilder::observer`].
    pub fn observer(self: &Arc<Self>) -> AttemptObserver {
        let stats = Arc::clone(self);
        Arc::new(move |attempt: &Attempt| {
            let _ = stats.attempts.fetch_add(1, Ordering::Relaxed);
            if attempt.index > 0 {
                let _ = stats.retries.fetch_add(1, Ordering::Relaxed);
            }
            if !matches!(attempt.outcome, AttemptOutcome::Response(_)) {
                let _ = stats.failures.fetch_add(1, Ordering::Relaxed);
            }
        })
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} requests, {} retries, {} failed attempts",
            self.attempts.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed)
        )
    }
}

/// What the spinner currently reports on.
struct Phase {
    started: Instant,
    describe: MessageCallback,
}

/// State shared between the reporter and its refresh task.
struct Shared {
    show_at: Instant,
    shown: AtomicBool,
    phase: Mutex<Phase>,
}

impl Shared {
    fn line(&self) -> String {
        let phase = self.phase.lock().expect("lock not poisoned");
        format!("{}s: {}", phase.started.elapsed().as_secs(), (phase.describe)())
    }
}

/// A spinner on stderr for long-running commands, hidden while the command is quick.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    shared: Arc<Shared>,
    refresh_task: Arc<JoinHandle<()>>,
}

impl ProgressReporter {
    /// The spinner stays hidden until `delay` has passed; `use_colors` selects the styled template.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template(if use_colors { TEMPLATE } else { TEMPLATE_NO_COLOR })
                .expect("could not create progress bar style")
                .tick_strings(TICK_STRINGS),
        );

        let shared = Arc::new(Shared {
            show_at: Instant::now() + delay,
            shown: AtomicBool::new(false),
            phase: Mutex::new(Phase {
                started: Instant::now(),
                describe: Box::new(String::new),
            }),
        });

        let refresh_task = Arc::new(tokio::spawn(refresh(bar.clone(), Arc::clone(&shared))));
        Self { bar, shared, refresh_task }
    }

    /// Switch to `phase` (e.g. "Crawling"); `describe` produces the text next to the spinner.
    pub fn set_phase(&self, phase: &str, describe: impl Fn() -> String + Send + Sync + 'static) {
        *self.shared.phase.lock().expect("lock not poisoned") = Phase {
            started: Instant::now(),
            describe: Box::new(describe),
        };
        self.bar.set_prefix(phase.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(REFRESH_INTERVAL_MS));
    }

    pub fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{msg}"));
    }

    /// Stop refreshing and clear the spinner.
    pub fn done(&self) {
        self.refresh_task.abort();
        if self.shared.shown.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("show_at", &self.shared.show_at)
            .field("shown", &self.shared.shown)
            .finish_non_exhaustive()
    }
}

async fn refresh(bar: ProgressBar, shared: Arc<Shared>) {
    let mut ticks = tokio::time::interval(Duration::from_millis(REFRESH_INTERVAL_MS));
    #[expect(clippy::infinite_loop, reason = "aborted by ProgressReporter::done")]
    loop {
        let _ = ticks.tick().await;

        if !shared.shown.load(Ordering::Relaxed) {
            if Instant::now() < shared.show_at {
                continue;
            }
            shared.shown.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        bar.set_message(shared.line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn stats_count_attempts() {
        let stats = Arc::new(RequestStats::default());
        let observer = stats.observer();

        observer(&Attempt {
            index: 0,
            delay: Duration::ZERO,
            outcome: AttemptOutcome::RetryableStatus(StatusCode::SERVICE_UNAVAILABLE),
        });
        observer(&Attempt {
            index: 1,
            delay: Duration::from_secs(1),
            outcome: AttemptOutcome::Response(StatusCode::OK),
        });

        assert_eq!(stats.summary(), "2 requests, 1 retries, 1 failed attempts");
    }
}
