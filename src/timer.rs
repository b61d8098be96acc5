use std::future::Future;
use std::time::Duration;

use crate::timestamp::monotonic_ns;

/// Something that can carry out actions of type `A` one at a time.
pub trait Operation<A> {
    type Error;

    fn apply(&mut self, action: &A) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Times a run of actions executed back-to-back on one subject.
#[derive(Debug, Default)]
pub struct Timer {
    start: u128,
    stop: u128,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self) {
        self.start = monotonic_ns();
    }

    fn stop(&mut self) {
        self.stop = monotonic_ns();
    }

    /// Run `actions` in order against `subject` and return the elapsed time
    /// from just before the first action to just after the last one.
    ///
    /// The first failing action ends the run and its error is returned as is.
    pub async fn cost<O, A>(&mut self, subject: &mut O, actions: &[A]) -> Result<Duration, O::Error>
    where
        O: Operation<A>,
    {
        self.start();
        for action in actions {
            subject.apply(action).await?;
        }
        self.stop();

        let nanos = self.stop.saturating_sub(self.start);
        Ok(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}
