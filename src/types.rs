/// Status value before any scan has been started.
pub const STATUS_IDLE: &str = "Idle";
/// Status value set when a session starts, before the process emits output.
pub const STATUS_SCANNING: &str = "Scanning...";
/// Terminal status after the scan process exits, regardless of exit code.
pub const STATUS_DONE: &str = "Done";
/// Terminal status after a cancelled session.
pub const STATUS_CANCELLED: &str = "Cancelled";
/// Status set when the scan process could not be spawned.
pub const STATUS_SPAWN_FAILED: &str = "Failed to start scan";
/// Status set when an in-flight session fails before a clean exit.
pub const STATUS_FAILED: &str = "Scan failed";

/// Whether a status string is one of the fixed terminal values.
pub fn is_terminal_status(text: &str) -> bool {
    matches!(
        text,
        STATUS_DONE | STATUS_CANCELLED | STATUS_SPAWN_FAILED | STATUS_FAILED
    )
}

/// One captured handshake reported by the scan process.
///
/// Immutable once created; identity is structural. Records are never
/// deduplicated or reordered by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRecord {
    pub ssid: String,
    pub mac: String,
    pub state: String,
}

impl HandshakeRecord {
    pub fn new(
        ssid: impl Into<String>,
        mac: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            mac: mac.into(),
            state: state.into(),
        }
    }
}

/// Session state machine: Idle -> Scanning -> Done | Failed | Cancelled.
/// A new session may start from any non-Scanning phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Done,
    Failed,
    Cancelled,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Done => "done",
            ScanPhase::Failed => "failed",
            ScanPhase::Cancelled => "cancelled",
        }
    }

    /// Whether a session is currently running.
    pub fn is_active(&self) -> bool {
        matches!(self, ScanPhase::Scanning)
    }
}

/// Ordered notification emitted by the state store on every mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    StatusChanged(String),
    RecordAppended(HandshakeRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_activity() {
        assert!(ScanPhase::Scanning.is_active());
        assert!(!ScanPhase::Idle.is_active());
        assert!(!ScanPhase::Done.is_active());
        assert!(!ScanPhase::Failed.is_active());
        assert!(!ScanPhase::Cancelled.is_active());
    }

    #[test]
    fn test_terminal_status_detection() {
        assert!(is_terminal_status(STATUS_DONE));
        assert!(is_terminal_status(STATUS_CANCELLED));
        assert!(is_terminal_status(STATUS_SPAWN_FAILED));
        assert!(is_terminal_status(STATUS_FAILED));
        assert!(!is_terminal_status(STATUS_IDLE));
        assert!(!is_terminal_status(STATUS_SCANNING));
        assert!(!is_terminal_status("Found network X"));
    }

    #[test]
    fn test_record_structural_identity() {
        let a = HandshakeRecord::new("HomeWifi", "aa:bb:cc:dd:ee:ff", "captured");
        let b = HandshakeRecord::new("HomeWifi", "aa:bb:cc:dd:ee:ff", "captured");
        assert_eq!(a, b);
    }
}
