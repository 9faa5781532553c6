use serde::Serialize;
use std::fmt::Display;

/// A snapshot of an admission gate's occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Configured maximum of simultaneous connections, `None` if unbounded
    pub limit: Option<usize>,
    /// Connections open right now
    pub in_flight: usize,
    /// Highest number of simultaneously open connections seen so far
    pub peak: usize,
}

impl GateStats {
    /// Slots that could be handed out right now without waiting.
    /// `None` if the gate is unbounded.
    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.in_flight))
    }

    /// Returns `true` if the peak ever reached the configured limit
    #[must_use]
    pub fn saturated(&self) -> bool {
        self.limit.is_some_and(|limit| self.peak >= limit)
    }
}

impl Display for GateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "{}/{limit} in flight, peak {}", self.in_flight, self.peak),
            None => write!(f, "{} in flight (unbounded), peak {}", self.in_flight, self.peak),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available() {
        let stats = GateStats {
            limit: Some(15),
            in_flight: 4,
            peak: 15,
        };
        assert_eq!(stats.available(), Some(11));
        assert!(stats.saturated());
        assert_eq!(stats.to_string(), "4/15 in flight, peak 15");

        let stats = GateStats {
            limit: None,
            in_flight: 30,
            peak: 30,
        };
        assert_eq!(stats.available(), None);
        assert!(!stats.saturated());
    }
}
