//! Connection state tracking.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// WebSocket connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and processing messages.
    Connected,
    /// Waiting to reconnect after a lost connection.
    Reconnecting,
    /// Closed by request. Terminal: no reconnection will happen.
    Closed,
}

impl ConnectionState {
    /// Returns true if a connection attempt may begin from this state.
    #[must_use]
    pub fn can_connect(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Reconnecting | Self::Closed
        )
    }

    /// Returns true if this is the terminal closed state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Mutable connection bookkeeping guarded by the session lock.
#[derive(Debug, Default)]
pub(crate) struct InternalState {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub last_connected: Option<Instant>,
    pub last_message: Option<Instant>,
}

impl InternalState {
    pub fn mark_connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Marks the connection established and resets the attempt counter.
    pub fn mark_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.reconnect_attempts = 0;
        self.last_connected = Some(Instant::now());
    }

    pub fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Marks a reconnect attempt and returns its 1-based number.
    pub fn mark_reconnecting(&mut self) -> u32 {
        self.state = ConnectionState::Reconnecting;
        self.reconnect_attempts += 1;
        self.reconnect_attempts
    }

    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn record_message(&mut self) {
        self.last_message = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn test_can_connect() {
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Reconnecting.can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::Connected.can_connect());
    }

    #[test]
    fn test_reconnect_attempt_counter() {
        let mut state = InternalState::default();
        assert_eq!(state.mark_reconnecting(), 1);
        assert_eq!(state.mark_reconnecting(), 2);

        state.mark_connected();
        assert_eq!(state.reconnect_attempts, 0);
        assert_eq!(state.mark_reconnecting(), 1);
    }
}
