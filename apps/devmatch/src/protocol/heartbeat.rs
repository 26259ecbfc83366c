use std::time::Duration;

use tokio::time::Instant;

use super::stomp::FrameError;

/// How many negotiated intervals of silence are tolerated before the peer is
/// considered gone.
pub const SILENCE_TOLERANCE: u32 = 2;

/// A `heart-beat` header: how often this side can send and how often it wants
/// to receive. Zero disables a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing: Duration,
    pub incoming: Duration,
}

impl HeartBeat {
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn header_value(&self) -> String {
        format!("{},{}", self.outgoing.as_millis(), self.incoming.as_millis())
    }

    pub fn parse(value: &str) -> Result<Self, FrameError> {
        let invalid = || FrameError::MalformedHeader(format!("heart-beat:{value}"));
        let (outgoing, incoming) = value.split_once(',').ok_or_else(invalid)?;
        let outgoing = outgoing.trim().parse::<u64>().map_err(|_| invalid())?;
        let incoming = incoming.trim().parse::<u64>().map_err(|_| invalid())?;
        Ok(Self::new(
            Duration::from_millis(outgoing),
            Duration::from_millis(incoming),
        ))
    }

    /// Applies the STOMP 1.2 negotiation rule from the client's point of view.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> Negotiated {
        let pick = |ours: Duration, theirs: Duration| {
            (!ours.is_zero() && !theirs.is_zero()).then(|| ours.max(theirs))
        };
        Negotiated {
            send_every: pick(client.outgoing, server.incoming),
            expect_every: pick(server.outgoing, client.incoming),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    pub send_every: Option<Duration>,
    pub expect_every: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatDue {
    pub send: bool,
    pub expired: bool,
}

/// Tracks when the next outgoing heart-beat is due and whether the peer has
/// been silent for too long.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    send_every: Option<Duration>,
    silence_limit: Option<Duration>,
    next_send: Option<Instant>,
    last_inbound: Instant,
}

impl HeartbeatMonitor {
    pub fn new(negotiated: Negotiated, now: Instant) -> Self {
        Self {
            send_every: negotiated.send_every,
            silence_limit: negotiated
                .expect_every
                .map(|every| every.saturating_mul(SILENCE_TOLERANCE)),
            next_send: negotiated.send_every.map(|every| now + every),
            last_inbound: now,
        }
    }

    pub fn saw_inbound(&mut self, now: Instant) {
        self.last_inbound = now;
    }

    /// Earliest instant at which [`poll`](Self::poll) has something to report.
    pub fn next_due(&self) -> Option<Instant> {
        let silence = self.silence_limit.map(|limit| self.last_inbound + limit);
        match (self.next_send, silence) {
            (Some(send), Some(silence)) => Some(send.min(silence)),
            (send, silence) => send.or(silence),
        }
    }

    pub fn poll(&mut self, now: Instant) -> HeartbeatDue {
        let expired = self
            .silence_limit
            .map(|limit| now >= self.last_inbound + limit)
            .unwrap_or(false);
        let send = match (self.next_send, self.send_every) {
            (Some(at), Some(every)) if now >= at => {
                self.next_send = Some(now + every);
                true
            }
            _ => false,
        };
        HeartbeatDue { send, expired }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn parses_and_formats_header() {
        let beat = HeartBeat::parse("10000, 5000").unwrap();
        assert_eq!(beat, HeartBeat::new(ms(10_000), ms(5_000)));
        assert_eq!(beat.header_value(), "10000,5000");
        assert!(HeartBeat::parse("10000").is_err());
        assert!(HeartBeat::parse("a,b").is_err());
    }

    #[test]
    fn negotiation_takes_the_slower_side() {
        let client = HeartBeat::new(ms(10_000), ms(10_000));
        let server = HeartBeat::new(ms(25_000), ms(5_000));
        let negotiated = HeartBeat::negotiate(client, server);
        assert_eq!(negotiated.send_every, Some(ms(10_000)));
        assert_eq!(negotiated.expect_every, Some(ms(25_000)));
    }

    #[test]
    fn zero_disables_a_direction() {
        let client = HeartBeat::new(ms(10_000), ms(10_000));
        let negotiated = HeartBeat::negotiate(client, HeartBeat::new(ms(0), ms(4_000)));
        assert_eq!(negotiated.send_every, Some(ms(10_000)));
        assert_eq!(negotiated.expect_every, None);

        let off = HeartBeat::negotiate(HeartBeat::disabled(), HeartBeat::new(ms(1), ms(1)));
        assert_eq!(off, Negotiated::default());
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn monitor_sends_and_detects_silence() {
        let start = Instant::now();
        let mut monitor = HeartbeatMonitor::new(
            Negotiated {
                send_every: Some(ms(1_000)),
                expect_every: Some(ms(3_000)),
            },
            start,
        );
        assert_eq!(monitor.next_due(), Some(start + ms(1_000)));

        let due = monitor.poll(start + ms(1_000));
        assert_eq!(due, HeartbeatDue { send: true, expired: false });
        assert_eq!(monitor.next_due(), Some(start + ms(2_000)));

        monitor.saw_inbound(start + ms(5_000));
        let due = monitor.poll(start + ms(10_999));
        assert!(!due.expired);
        let due = monitor.poll(start + ms(11_000));
        assert!(due.expired);
    }
}
