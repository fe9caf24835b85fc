//! Reconnection state machine.
//!
//! Pure bookkeeping with no I/O or timers, so the delay schedule can be
//! tested directly. The client task drives it.

use std::time::Duration;

use sentinel_settings::ClientSettings;

/// Linear reconnect schedule: attempt `n` waits `n × base_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after the first failure before giving up.
    pub max_attempts: u32,
    /// Delay unit; retry `n` waits `n` of these.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    /// Wait before retry `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl From<&ClientSettings> for ReconnectPolicy {
    fn from(s: &ClientSettings) -> Self {
        Self {
            max_attempts: s.max_reconnect_attempts,
            base_delay: Duration::from_millis(s.reconnect_base_delay_ms),
        }
    }
}

/// Client-visible connection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal until [`Supervisor::reset`].
    GaveUp,
}

/// What to do after the connection was lost or a connect failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextStep {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
    /// The loss followed an explicit disconnect.
    Stop,
}

/// Tracks attempts and state across connects and losses.
#[derive(Debug)]
pub struct Supervisor {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempt: u32,
    stopped: bool,
}

impl Supervisor {
    /// Create an empty instance.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            attempt: 0,
            stopped: false,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries used since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Active reconnect policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// A connect attempt is starting.
    pub fn begin_connect(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Resets the attempt counter.
    pub fn on_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempt = 0;
    }

    /// Socket closed or connect failed.
    pub fn on_connection_lost(&mut self) -> NextStep {
        if self.stopped {
            self.state = ConnectionState::Disconnected;
            return NextStep::Stop;
        }
        if self.state == ConnectionState::GaveUp {
            return NextStep::Stop;
        }
        if self.attempt < self.policy.max_attempts {
            self.attempt += 1;
            self.state = ConnectionState::Disconnected;
            NextStep::Retry {
                attempt: self.attempt,
                delay: self.policy.delay_for(self.attempt),
            }
        } else {
            self.state = ConnectionState::GaveUp;
            NextStep::GiveUp {
                attempts: self.attempt,
            }
        }
    }

    /// Explicit teardown. No reconnect follows.
    pub fn on_manual_disconnect(&mut self) {
        self.stopped = true;
        self.state = ConnectionState::Disconnected;
    }

    /// Manual restart after giving up or disconnecting.
    pub fn reset(&mut self) {
        self.stopped = false;
        self.attempt = 0;
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::default()
    }

    #[test]
    fn delays_grow_linearly() {
        let mut sup = Supervisor::new(policy());
        sup.begin_connect();
        let mut delays = Vec::new();
        while let NextStep::Retry { delay, .. } = sup.on_connection_lost() {
            delays.push(delay.as_secs());
            sup.begin_connect();
        }
        assert_eq!(delays, vec![1, 2, 3, 4, 5]);
        assert_eq!(sup.state(), ConnectionState::GaveUp);
    }

    #[test]
    fn gives_up_exactly_once() {
        let mut sup = Supervisor::new(ReconnectPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
        });
        assert!(matches!(sup.on_connection_lost(), NextStep::Retry { attempt: 1, .. }));
        assert!(matches!(sup.on_connection_lost(), NextStep::Retry { attempt: 2, .. }));
        assert_eq!(sup.on_connection_lost(), NextStep::GiveUp { attempts: 2 });
        assert_eq!(sup.on_connection_lost(), NextStep::Stop);
    }

    #[test]
    fn success_resets_attempts() {
        let mut sup = Supervisor::new(policy());
        let _ = sup.on_connection_lost();
        let _ = sup.on_connection_lost();
        assert_eq!(sup.attempt(), 2);
        sup.on_connected();
        assert_eq!(sup.attempt(), 0);
        assert_eq!(
            sup.on_connection_lost(),
            NextStep::Retry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn manual_disconnect_suppresses_reconnect() {
        let mut sup = Supervisor::new(policy());
        sup.on_connected();
        sup.on_manual_disconnect();
        assert_eq!(sup.on_connection_lost(), NextStep::Stop);
        assert_eq!(sup.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn reset_allows_resuming_after_give_up() {
        let mut sup = Supervisor::new(ReconnectPolicy {
            max_attempts: 0,
            base_delay: Duration::from_secs(1),
        });
        assert_eq!(sup.on_connection_lost(), NextStep::GiveUp { attempts: 0 });
        sup.reset();
        assert_eq!(sup.state(), ConnectionState::Disconnected);
        assert_eq!(sup.on_connection_lost(), NextStep::GiveUp { attempts: 0 });
    }

    #[test]
    fn policy_from_settings() {
        let settings = ClientSettings::default();
        let p = ReconnectPolicy::from(&settings);
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.delay_for(3), Duration::from_secs(3));
    }
}
