//! Contains code pertaining to the setup options that can be given to the [`ServerBuilder`](crate::ServerBuilder)

use std::time::Duration;

pub(crate) const DEFAULT_SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// The value returned by the future given to
/// [`ServerBuilder::shutdown_indicator`](crate::ServerBuilder::shutdown_indicator). It tells the
/// server how to go about shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shutdown {
    pub(crate) grace_period: Duration,
}

impl Shutdown {
    /// Creates the default shutdown instruction: in-flight requests get 10 seconds to finish.
    pub fn new() -> Self {
        Shutdown::default()
    }

    /// How long in-flight connections may take to finish before the server gives up on them.
    pub fn grace_period(mut self, d: impl Into<Duration>) -> Self {
        self.grace_period = d.into();
        self
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown {
            grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD,
        }
    }
}
