//! Debounced runs: only the source that stays unchanged for the settle delay runs.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A timer is armed for the last submitted source.
    Pending,
    Running,
}

struct Settled {
    generation: u64,
    source: String,
}

pub struct RunScheduler {
    delay: Duration,
    generation: u64,
    state: SchedulerState,
    timer: Option<JoinHandle<()>>,
    sender: mpsc::UnboundedSender<Settled>,
    receiver: mpsc::UnboundedReceiver<Settled>,
}

impl RunScheduler {
    pub fn new(delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            delay,
            generation: 0,
            state: SchedulerState::Idle,
            timer: None,
            sender,
            receiver,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Replaces any pending run with one for `source`.
    ///
    /// # Panics
    ///
    /// Outside of a Tokio runtime.
    pub fn submit(&mut self, source: impl Into<String>) {
        self.abort_timer();
        self.generation += 1;
        let settled = Settled {
            generation: self.generation,
            source: source.into(),
        };
        let sender = self.sender.clone();
        let delay = self.delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(settled);
        }));
        self.state = SchedulerState::Pending;
        log::trace!("Run {} armed", self.generation);
    }

    /// Drops the pending run, if any.
    pub fn cancel(&mut self) {
        self.abort_timer();
        self.generation += 1;
        if self.state == SchedulerState::Pending {
            self.state = SchedulerState::Idle;
        }
        log::trace!("Pending run cancelled");
    }

    /// Waits for the next settled source and runs `run` on it.
    ///
    /// Timers of superseded submissions are skipped. Waits indefinitely
    /// while nothing is pending.
    pub async fn run_next<T>(&mut self, run: impl FnOnce(&str) -> T) -> T {
        let settled = loop {
            let settled = match self.receiver.recv().await {
                Some(settled) => settled,
                // The scheduler holds a sender, so the channel never closes.
                None => std::future::pending::<Settled>().await,
            };
            if settled.generation == self.generation {
                break settled;
            }
            log::trace!("Ignoring superseded run {}", settled.generation);
        };
        self.timer = None;
        self.state = SchedulerState::Running;
        log::trace!("Run {} started", settled.generation);
        let output = run(&settled.source);
        self.state = SchedulerState::Idle;
        log::trace!("Run {} finished", settled.generation);
        output
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Default for RunScheduler {
    fn default() -> Self {
        Self::new(SETTLE_DELAY)
    }
}

impl Drop for RunScheduler {
    fn drop(&mut self) {
        self.abort_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_runs_once_with_the_last_source() {
        let mut scheduler = RunScheduler::default();
        for source in ["a", "ab", "abc"] {
            scheduler.submit(source);
        }
        assert_eq!(scheduler.state(), SchedulerState::Pending);
        let ran = scheduler.run_next(|source| source.to_string()).await;
        assert_eq!(ran, "abc");
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let another = timeout(Duration::from_secs(10), scheduler.run_next(|source| source.to_string())).await;
        assert!(another.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_after_the_settle_delay() {
        let mut scheduler = RunScheduler::default();
        let start = Instant::now();
        scheduler.submit("x");
        scheduler.run_next(|_| ()).await;
        assert!(start.elapsed() >= SETTLE_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn each_edit_restarts_the_delay() {
        let mut scheduler = RunScheduler::new(Duration::from_millis(200));
        let start = Instant::now();
        scheduler.submit("first");
        advance(Duration::from_millis(150)).await;
        scheduler.submit("second");
        let ran = scheduler.run_next(|source| source.to_string()).await;
        assert_eq!(ran, "second");
        assert!(start.elapsed() >= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_run() {
        let mut scheduler = RunScheduler::default();
        scheduler.submit("never");
        scheduler.cancel();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        let ran = timeout(Duration::from_secs(10), scheduler.run_next(|source| source.to_string())).await;
        assert!(ran.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn edits_after_a_run_schedule_another() {
        let mut scheduler = RunScheduler::new(Duration::from_millis(10));
        scheduler.submit("one");
        assert_eq!(scheduler.run_next(|source| source.len()).await, 3);
        scheduler.submit("three");
        assert_eq!(scheduler.run_next(|source| source.len()).await, 5);
    }
}
