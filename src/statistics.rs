use serde::Serialize;

use crate::prober::Outcome;

/// Final summary of one run. Produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub host: String,
    pub port: u16,
    pub successed: u64,
    pub failed: u64,
    /// Two decimals followed by `%`, e.g. `"66.67%"`.
    pub success_rate: String,
    pub minimum: String,
    pub maximum: String,
    pub average: String,
}

impl Statistics {
    pub fn total(&self) -> u64 {
        self.successed + self.failed
    }

    /// Whether at least one attempt connected. Drives the exit code.
    pub fn has_success(&self) -> bool {
        self.successed != 0
    }
}

/// Counters and latency samples accumulated over one run.
#[derive(Debug, Default, Clone)]
pub struct Session {
    successed: u64,
    failed: u64,
    conn_times: Vec<f64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished attempt into the counters.
    /// `Cancelled` attempts never finished and are ignored.
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success(latency_ms) => {
                self.successed += 1;
                self.conn_times.push(*latency_ms);
            }
            Outcome::TimedOut | Outcome::Failed(_) => self.failed += 1,
            Outcome::Cancelled => {}
        }
    }

    pub fn attempts(&self) -> u64 {
        self.successed + self.failed
    }

    pub fn success_rate(&self) -> String {
        let count = self.attempts();
        if count == 0 {
            return "0.00".to_string();
        }
        format!("{:.2}", self.successed as f64 / count as f64 * 100.0)
    }

    pub fn snapshot(&self, host: &str, port: u16) -> Statistics {
        let samples: &[f64] = if self.conn_times.is_empty() {
            &[0.0]
        } else {
            &self.conn_times
        };
        let minimum = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let maximum = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = samples.iter().sum::<f64>() / samples.len() as f64;

        Statistics {
            host: host.to_string(),
            port,
            successed: self.successed,
            failed: self.failed,
            success_rate: format!("{}%", self.success_rate()),
            minimum: format!("{minimum:.2} ms"),
            maximum: format!("{maximum:.2} ms"),
            average: format!("{average:.2} ms"),
        }
    }
}
