use std::num::NonZeroU64;

use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::prober::{Connector, Outcome, ProbeStep};
use crate::statistics::{Session, Statistics};
use crate::timer::Timer;

/// When the probe loop stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Bounded(NonZeroU64),
    Unbounded,
}

impl Termination {
    /// `0` means keep going until interrupted.
    pub fn from_count(count: u64) -> Self {
        NonZeroU64::new(count).map_or(Termination::Unbounded, Termination::Bounded)
    }

    pub fn reached(&self, attempts: u64) -> bool {
        match self {
            Termination::Bounded(limit) => attempts >= limit.get(),
            Termination::Unbounded => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CountReached,
    Interrupted,
}

/// What a finished run hands to the reporter.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub statistics: Statistics,
    pub reason: StopReason,
}

/// Drives paced, strictly sequential probe attempts against one target.
pub struct Scheduler<C> {
    connector: C,
    host: String,
    port: u16,
    interval: Duration,
    termination: Termination,
    steps: [ProbeStep; 2],
}

impl<C: Connector> Scheduler<C> {
    pub fn new(
        connector: C,
        host: impl Into<String>,
        port: u16,
        interval: Duration,
        termination: Termination,
    ) -> Self {
        let host = host.into();
        let steps = [
            ProbeStep::Connect {
                host: host.clone(),
                port,
            },
            ProbeStep::HalfClose,
        ];
        Self {
            connector,
            host,
            port,
            interval,
            termination,
            steps,
        }
    }

    /// Probe until the termination policy is met or `shutdown` turns true,
    /// then summarize. A dropped shutdown sender never interrupts.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RunReport {
        let mut session = Session::new();
        let mut n: u64 = 0;

        let reason = loop {
            let outcome = tokio::select! {
                biased;
                _ = interrupted(&mut shutdown) => Outcome::Cancelled,
                outcome = self.attempt() => outcome,
            };

            if matches!(outcome, Outcome::Cancelled) {
                info!(seq = n, "interrupted, finishing with {} attempts", session.attempts());
                break StopReason::Interrupted;
            }

            if let Some(line) = notice(&self.host, self.port, n, &outcome) {
                println!("{line}");
            }
            session.record(&outcome);

            n += 1;
            if self.termination.reached(n) {
                break StopReason::CountReached;
            }
        };

        RunReport {
            statistics: session.snapshot(&self.host, self.port),
            reason,
        }
    }

    /// One paced attempt. The probe is opened before the pacing sleep and
    /// released when this future completes or is dropped.
    async fn attempt(&self) -> Outcome {
        let probe = self.connector.open();
        sleep(self.interval).await;

        let mut probe = match probe {
            Ok(p) => p,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        let result = Timer::new().cost(&mut probe, &self.steps).await;
        drop(probe);

        match &result {
            Ok(elapsed) => debug!(host = %self.host, latency_ms = elapsed.as_secs_f64() * 1000.0, "connected"),
            Err(e) => debug!(host = %self.host, error = %e, "probe failed"),
        }
        Outcome::from_result(result)
    }
}

async fn interrupted(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Per-attempt line shown to the user, ping style.
pub fn notice(host: &str, port: u16, seq: u64, outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Success(ms) => Some(format!(
            "Connected to {host}[:{port}]: seq = {seq}, time = {ms:.2} ms"
        )),
        Outcome::TimedOut => Some(format!("Connected to {host}[:{port}]: seq = {seq} time out!")),
        Outcome::Failed(reason) => Some(format!(
            "Connected to {host}[:{port}]: seq = {seq} failed: {reason}"
        )),
        Outcome::Cancelled => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::tcp_connect::TcpConnector;
    use crate::prober::ProbeError;
    use crate::timer::Operation;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::ErrorKind;
    use std::rc::Rc;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone, Copy)]
    enum Script {
        Ok,
        Timeout,
        Refused,
        Hang,
    }

    struct ScriptedProbe {
        script: Script,
        open: Rc<RefCell<u32>>,
    }

    impl Drop for ScriptedProbe {
        fn drop(&mut self) {
            *self.open.borrow_mut() -= 1;
        }
    }

    impl Operation<ProbeStep> for ScriptedProbe {
        type Error = ProbeError;

        async fn apply(&mut self, step: &ProbeStep) -> Result<(), ProbeError> {
            match (self.script, step) {
                (_, ProbeStep::HalfClose) | (Script::Ok, _) => Ok(()),
                (Script::Timeout, _) => Err(ProbeError::Timeout(Duration::from_millis(500))),
                (Script::Refused, _) => Err(ProbeError::Connection(
                    std::io::Error::from(ErrorKind::ConnectionRefused),
                )),
                (Script::Hang, _) => std::future::pending::<Result<(), ProbeError>>().await,
            }
        }
    }

    /// Replays a fixed list of attempt results, then repeats the last one.
    struct ScriptedConnector {
        script: RefCell<VecDeque<Script>>,
        opened: RefCell<u32>,
        open: Rc<RefCell<u32>>,
    }

    impl ScriptedConnector {
        fn new(script: &[Script]) -> Self {
            Self {
                script: RefCell::new(script.iter().copied().collect()),
                opened: RefCell::new(0),
                open: Rc::new(RefCell::new(0)),
            }
        }
    }

    impl Connector for ScriptedConnector {
        type Probe = ScriptedProbe;

        fn open(&self) -> Result<ScriptedProbe, ProbeError> {
            let mut script = self.script.borrow_mut();
            let next = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                *script.front().unwrap()
            };
            *self.opened.borrow_mut() += 1;
            *self.open.borrow_mut() += 1;
            Ok(ScriptedProbe {
                script: next,
                open: self.open.clone(),
            })
        }
    }

    fn never_interrupted() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[test]
    fn test_termination_from_count() {
        assert_eq!(Termination::from_count(0), Termination::Unbounded);
        let bounded = Termination::from_count(3);
        assert!(!bounded.reached(2));
        assert!(bounded.reached(3));
        assert!(!Termination::Unbounded.reached(u64::MAX));
    }

    #[test]
    fn test_notice_lines() {
        assert_eq!(
            notice("h", 80, 2, &Outcome::Success(1.234)).unwrap(),
            "Connected to h[:80]: seq = 2, time = 1.23 ms"
        );
        assert_eq!(
            notice("h", 80, 0, &Outcome::TimedOut).unwrap(),
            "Connected to h[:80]: seq = 0 time out!"
        );
        assert!(notice("h", 80, 0, &Outcome::Cancelled).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_run_makes_exactly_count_attempts() {
        let connector = ScriptedConnector::new(&[Script::Ok, Script::Timeout, Script::Refused, Script::Ok]);
        let scheduler = Scheduler::new(
            connector,
            "example.com",
            80,
            Duration::from_secs(1),
            Termination::from_count(5),
        );
        let report = scheduler.run(never_interrupted()).await;

        assert_eq!(report.reason, StopReason::CountReached);
        assert_eq!(report.statistics.total(), 5);
        assert_eq!(report.statistics.successed, 3);
        assert_eq!(report.statistics.failed, 2);
        assert_eq!(*scheduler.connector.opened.borrow(), 5);
        assert_eq!(*scheduler.connector.open.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_timeouts_report_no_success() {
        let scheduler = Scheduler::new(
            ScriptedConnector::new(&[Script::Timeout]),
            "10.255.255.1",
            80,
            Duration::from_secs(1),
            Termination::from_count(2),
        );
        let stats = scheduler.run(never_interrupted()).await.statistics;

        assert_eq!(stats.successed, 0);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.success_rate, "0.00%");
        assert_eq!(stats.minimum, "0.00 ms");
        assert_eq!(stats.maximum, "0.00 ms");
        assert_eq!(stats.average, "0.00 ms");
        assert!(!stats.has_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_mid_sleep_counts_completed_attempts_only() {
        let scheduler = Scheduler::new(
            ScriptedConnector::new(&[Script::Ok, Script::Timeout, Script::Ok]),
            "example.com",
            80,
            Duration::from_secs(1),
            Termination::Unbounded,
        );
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            // Attempts finish at t=1s and t=2s; the third is still sleeping.
            sleep(Duration::from_millis(2500)).await;
            let _ = tx.send(true);
        });

        let report = scheduler.run(rx).await;

        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(report.statistics.successed, 1);
        assert_eq!(report.statistics.failed, 1);
        assert_eq!(*scheduler.connector.opened.borrow(), 3);
        assert_eq!(*scheduler.connector.open.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_while_connecting_releases_probe() {
        let scheduler = Scheduler::new(
            ScriptedConnector::new(&[Script::Ok, Script::Hang]),
            "example.com",
            80,
            Duration::from_secs(1),
            Termination::from_count(10),
        );
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });

        let report = scheduler.run(rx).await;

        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(report.statistics.total(), 1);
        assert_eq!(report.statistics.successed, 1);
        assert_eq!(*scheduler.connector.open.borrow(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_before_first_attempt() {
        let scheduler = Scheduler::new(
            ScriptedConnector::new(&[Script::Ok]),
            "example.com",
            80,
            Duration::from_secs(1),
            Termination::Unbounded,
        );
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = scheduler.run(rx).await;

        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(report.statistics.total(), 0);
        assert_eq!(report.statistics.success_rate, "0.00%");
    }

    #[tokio::test]
    async fn test_real_listener_all_succeed() {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                // Some sandboxed environments disallow binding; skip the test.
                return;
            }
            Err(e) => panic!("Failed to bind test listener: {e}"),
        };
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let scheduler = Scheduler::new(
            TcpConnector::new(Duration::from_secs(1)),
            "127.0.0.1",
            addr.port(),
            Duration::from_millis(10),
            Termination::from_count(3),
        );
        let stats = scheduler.run(never_interrupted()).await.statistics;

        assert_eq!(stats.successed, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.success_rate, "100.00%");
        assert!(stats.has_success());
    }

    #[tokio::test]
    async fn test_refused_port_counts_as_failure() {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return,
            Err(e) => panic!("Failed to bind test listener: {e}"),
        };
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let scheduler = Scheduler::new(
            TcpConnector::new(Duration::from_millis(500)),
            "127.0.0.1",
            port,
            Duration::ZERO,
            Termination::from_count(2),
        );
        let report = scheduler.run(never_interrupted()).await;

        assert_eq!(report.reason, StopReason::CountReached);
        assert_eq!(report.statistics.successed, 0);
        assert_eq!(report.statistics.failed, 2);
        assert!(!report.statistics.has_success());
    }
}
