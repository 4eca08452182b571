use eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::ScanStore;
use crate::types::{
    HandshakeRecord, ScanPhase, STATUS_CANCELLED, STATUS_DONE, STATUS_FAILED,
    STATUS_SCANNING, STATUS_SPAWN_FAILED,
};

const LINE_QUEUE_DEPTH: usize = 64;

/// Extension seam for recognizing discovery events in process output.
/// Lines the parser does not recognize stay plain status messages.
pub trait RecordParser: Send + Sync {
    fn parse(&self, line: &str) -> Option<HandshakeRecord>;
}

/// Parses `handshake ssid=<v> mac=<v> state=<v>` lines emitted by scan
/// scripts that opt into structured reporting. Unknown keys are ignored;
/// all three fields are required.
pub struct TaggedLineParser;

impl RecordParser for TaggedLineParser {
    fn parse(&self, line: &str) -> Option<HandshakeRecord> {
        let rest = line.trim().strip_prefix("handshake ")?;

        let mut ssid = None;
        let mut mac = None;
        let mut state = None;
        for token in rest.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key {
                "ssid" => ssid = Some(value),
                "mac" => mac = Some(value),
                "state" => state = Some(value),
                _ => {}
            }
        }
        Some(HandshakeRecord::new(ssid?, mac?, state?))
    }
}

/// Owns the external scan-process lifecycle and projects its textual output
/// onto the observable state store.
///
/// One session at a time: `start_scan` while a session is active is
/// coalesced into a no-op. The coordinator is the only writer to the store.
pub struct ScanCoordinator {
    interpreter: String,
    script: PathBuf,
    store: ScanStore,
    parser: Option<Box<dyn RecordParser>>,
    phase: watch::Sender<ScanPhase>,
    exit_code: watch::Sender<Option<i32>>,
    session_cancel: Mutex<CancellationToken>,
}

impl ScanCoordinator {
    pub fn new(store: ScanStore, interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        let interpreter = interpreter.into();
        let script = script.into();
        log::debug!("[coordinator] new: interpreter={} script={}",
            interpreter, script.display());

        let (phase_tx, _) = watch::channel(ScanPhase::Idle);
        let (exit_tx, _) = watch::channel(None);
        Self {
            interpreter,
            script,
            store,
            parser: None,
            phase: phase_tx,
            exit_code: exit_tx,
            session_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Install a record parser for the discovery extension point.
    pub fn with_parser(mut self, parser: Box<dyn RecordParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Current session phase.
    pub fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    /// Watch for phase transitions.
    pub fn watch_phase(&self) -> watch::Receiver<ScanPhase> {
        self.phase.subscribe()
    }

    /// Exit code of the most recently finished session. `None` while a
    /// session is running, before the first session, or when the process was
    /// terminated by a signal. Never reflected in the status string.
    pub fn last_exit_code(&self) -> Option<i32> {
        *self.exit_code.borrow()
    }

    /// Request cancellation of the active session. No-op when idle.
    pub fn cancel(&self) {
        let guard = self.session_cancel.lock().unwrap();
        if !self.phase.borrow().is_active() {
            log::debug!("[coordinator] cancel_ignored: no active session");
            return;
        }
        log::info!("[coordinator] cancel_requested");
        guard.cancel();
    }

    /// Run one scan session: spawn `<interpreter> <script>`, project its
    /// output onto the store, and resolve once the process has exited.
    ///
    /// Every non-whitespace line on either stream becomes the status value
    /// verbatim; per-stream order is preserved, cross-stream interleaving is
    /// unspecified. The terminal status is "Done" regardless of exit code,
    /// or "Cancelled" after [`cancel`](Self::cancel). A spawn failure sets a
    /// failure status and propagates the error to the caller.
    pub async fn start_scan(&self) -> Result<()> {
        let token = {
            let mut guard = self.session_cancel.lock().unwrap();
            let entered = self.phase.send_if_modified(|phase| {
                if phase.is_active() {
                    false
                } else {
                    *phase = ScanPhase::Scanning;
                    true
                }
            });
            if !entered {
                log::warn!("[coordinator] start_coalesced: session already active");
                return Ok(());
            }
            *guard = CancellationToken::new();
            guard.clone()
        };

        self.exit_code.send_replace(None);
        self.store.set_status(STATUS_SCANNING);

        let mut child = match Command::new(&self.interpreter)
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::error!("[coordinator] spawn_failed: interpreter={} script={} error={}",
                    self.interpreter, self.script.display(), e);
                self.fail_session(STATUS_SPAWN_FAILED);
                return Err(e).wrap_err_with(|| {
                    format!(
                        "Failed to spawn scan process: {} {}",
                        self.interpreter,
                        self.script.display()
                    )
                });
            }
        };

        log::info!("[coordinator] session_started: interpreter={} script={} pid={:?}",
            self.interpreter, self.script.display(), child.id());

        // Two independent readers feed one bounded queue; consuming it here
        // is the single ordering point for all store mutations.
        let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_QUEUE_DEPTH);
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader("stdout", stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader("stderr", stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut exit: Option<ExitStatus> = None;
        let mut cancelled = false;
        loop {
            tokio::select! {
                maybe_line = line_rx.recv() => match maybe_line {
                    Some(line) => self.apply_line(&line),
                    // Both streams hit EOF and the queue is drained.
                    None => break,
                },
                wait_result = child.wait(), if exit.is_none() => match wait_result {
                    Ok(status) => {
                        log::debug!("[coordinator] process_exited: status={}", status);
                        exit = Some(status);
                    }
                    Err(e) => {
                        log::error!("[coordinator] wait_failed: error={}", e);
                        self.fail_session(STATUS_FAILED);
                        return Err(e).wrap_err("Failed to await scan process exit");
                    }
                },
                _ = token.cancelled(), if !cancelled => {
                    cancelled = true;
                    if let Err(e) = child.start_kill() {
                        log::warn!("[coordinator] kill_failed: error={}", e);
                    }
                }
            }
        }

        let exit = match exit {
            Some(status) => status,
            None => match child.wait().await {
                Ok(status) => status,
                Err(e) => {
                    log::error!("[coordinator] wait_failed: error={}", e);
                    self.fail_session(STATUS_FAILED);
                    return Err(e).wrap_err("Failed to await scan process exit");
                }
            },
        };
        for reader in readers {
            let _ = reader.await;
        }

        // Exit code is recorded for observers but deliberately does not
        // influence the status string: a failed scan still reports "Done".
        self.exit_code.send_replace(exit.code());
        log::info!("[coordinator] session_finished: exit={} cancelled={}", exit, cancelled);

        if cancelled {
            self.phase.send_replace(ScanPhase::Cancelled);
            self.store.set_status(STATUS_CANCELLED);
        } else {
            self.phase.send_replace(ScanPhase::Done);
            self.store.set_status(STATUS_DONE);
        }
        Ok(())
    }

    /// Mark the session failed. Status and phase always move together so
    /// the UI never shows a stale in-progress value after an error.
    fn fail_session(&self, status_text: &str) {
        self.phase.send_replace(ScanPhase::Failed);
        self.store.set_status(status_text);
    }

    fn apply_line(&self, line: &str) {
        if line.trim().is_empty() {
            log::trace!("[coordinator] line_discarded: blank");
            return;
        }
        if let Some(parser) = &self.parser {
            if let Some(record) = parser.parse(line) {
                log::info!("[coordinator] handshake_discovered: ssid={} mac={} state={}",
                    record.ssid, record.mac, record.state);
                self.store.push_record(record);
            }
        }
        // The verbatim line is the new status, tagged or not.
        self.store.set_status(line);
    }
}

fn spawn_line_reader<R>(
    stream_name: &'static str,
    stream: R,
    tx: mpsc::Sender<String>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    log::trace!("[coordinator] line_received: stream={} len={}",
                        stream_name, line.len());
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    log::trace!("[coordinator] stream_closed: stream={}", stream_name);
                    break;
                }
                Err(e) => {
                    log::warn!("[coordinator] stream_read_failed: stream={} error={}",
                        stream_name, e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ScanStore;
    use crate::types::StoreEvent;
    use std::sync::Arc;
    use std::time::Duration;

    /// Write a shell script to a temp dir so sessions exercise the real
    /// `<interpreter> <script>` invocation shape.
    fn scan_script(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.sh");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    fn statuses(events: &mut tokio::sync::broadcast::Receiver<StoreEvent>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let StoreEvent::StatusChanged(text) = event {
                out.push(text);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_line_then_exit_reports_statuses_in_order() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("echo 'Found network X'\n");
        let coordinator = ScanCoordinator::new(store, "sh", script);
        let mut events = view.subscribe();

        coordinator.start_scan().await.unwrap();

        assert_eq!(
            statuses(&mut events),
            vec!["Scanning...", "Found network X", "Done"]
        );
        assert_eq!(view.status(), "Done");
        assert_eq!(coordinator.phase(), ScanPhase::Done);
        assert_eq!(coordinator.last_exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_whitespace_lines_and_nonzero_exit_still_report_done() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("printf '\\n   \\n\\t\\n'\nexit 1\n");
        let coordinator = ScanCoordinator::new(store, "sh", script);
        let mut events = view.subscribe();

        coordinator.start_scan().await.unwrap();

        // Blank lines never surface; a failing process is not distinguished
        // from a successful one in the status string.
        assert_eq!(statuses(&mut events), vec!["Scanning...", "Done"]);
        assert_eq!(coordinator.phase(), ScanPhase::Done);
        assert_eq!(coordinator.last_exit_code(), Some(1));
    }

    #[tokio::test]
    async fn test_stderr_lines_update_status() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("echo 'deauth sent' >&2\n");
        let coordinator = ScanCoordinator::new(store, "sh", script);
        let mut events = view.subscribe();

        coordinator.start_scan().await.unwrap();

        assert_eq!(
            statuses(&mut events),
            vec!["Scanning...", "deauth sent", "Done"]
        );
    }

    #[tokio::test]
    async fn test_stream_order_is_preserved() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("printf 'one\\ntwo\\nthree\\n'\n");
        let coordinator = ScanCoordinator::new(store, "sh", script);
        let mut events = view.subscribe();

        coordinator.start_scan().await.unwrap();

        assert_eq!(
            statuses(&mut events),
            vec!["Scanning...", "one", "two", "three", "Done"]
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_propagates_and_marks_failed() {
        let (store, view) = ScanStore::new();
        let coordinator =
            ScanCoordinator::new(store, "/nonexistent/interpreter", "main.py");

        let result = coordinator.start_scan().await;

        assert!(result.is_err());
        assert_eq!(view.status(), STATUS_SPAWN_FAILED);
        assert_eq!(coordinator.phase(), ScanPhase::Failed);
    }

    #[tokio::test]
    async fn test_failed_session_never_leaves_scanning_status() {
        let (store, view) = ScanStore::new();
        let coordinator = ScanCoordinator::new(store, "sh", "scan.sh");
        coordinator.store.set_status(STATUS_SCANNING);

        coordinator.fail_session(STATUS_FAILED);

        assert_eq!(coordinator.phase(), ScanPhase::Failed);
        assert_eq!(view.status(), STATUS_FAILED);
    }

    #[tokio::test]
    async fn test_concurrent_start_is_coalesced() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("echo started\nsleep 0.3\n");
        let coordinator = Arc::new(ScanCoordinator::new(store, "sh", script));
        let mut events = view.subscribe();

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.start_scan().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(coordinator.phase(), ScanPhase::Scanning);

        // Second invocation returns immediately without a second spawn.
        coordinator.start_scan().await.unwrap();
        assert_eq!(coordinator.phase(), ScanPhase::Scanning);

        first.await.unwrap().unwrap();
        let seen = statuses(&mut events);
        assert_eq!(seen.iter().filter(|s| *s == "started").count(), 1);
        assert_eq!(seen.iter().filter(|s| *s == "Scanning...").count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_terminates_session_as_cancelled() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("echo running\nsleep 5\n");
        let coordinator = Arc::new(ScanCoordinator::new(store, "sh", script));
        let mut events = view.subscribe();

        let session = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.start_scan().await })
        };

        // Wait until the process reported a line before cancelling.
        loop {
            match events.recv().await.unwrap() {
                StoreEvent::StatusChanged(text) if text == "running" => break,
                _ => {}
            }
        }
        coordinator.cancel();
        session.await.unwrap().unwrap();

        assert_eq!(view.status(), STATUS_CANCELLED);
        assert_eq!(coordinator.phase(), ScanPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_while_idle_is_noop() {
        let (store, view) = ScanStore::new();
        let coordinator = ScanCoordinator::new(store, "sh", "scan.sh");

        coordinator.cancel();

        assert_eq!(coordinator.phase(), ScanPhase::Idle);
        assert_eq!(view.status(), "Idle");
    }

    #[tokio::test]
    async fn test_session_can_restart_after_done() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script("echo pass\n");
        let coordinator = ScanCoordinator::new(store, "sh", script);

        coordinator.start_scan().await.unwrap();
        assert_eq!(coordinator.phase(), ScanPhase::Done);

        coordinator.start_scan().await.unwrap();
        assert_eq!(coordinator.phase(), ScanPhase::Done);
        assert_eq!(view.status(), "Done");
    }

    #[tokio::test]
    async fn test_tagged_lines_append_records() {
        let (store, view) = ScanStore::new();
        let (_dir, script) = scan_script(
            "echo 'handshake ssid=HomeWifi mac=aa:bb:cc:dd:ee:ff state=captured'\n\
             echo 'plain progress line'\n",
        );
        let coordinator = ScanCoordinator::new(store, "sh", script)
            .with_parser(Box::new(TaggedLineParser));

        coordinator.start_scan().await.unwrap();

        let records = view.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ssid, "HomeWifi");
        assert_eq!(records[0].mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(records[0].state, "captured");
        assert_eq!(view.status(), "Done");
    }

    #[test]
    fn test_tagged_line_parser_accepts_complete_lines() {
        let parser = TaggedLineParser;
        let record = parser
            .parse("handshake ssid=Cafe mac=00:11:22:33:44:55 state=seen")
            .unwrap();
        assert_eq!(record.ssid, "Cafe");
        assert_eq!(record.mac, "00:11:22:33:44:55");
        assert_eq!(record.state, "seen");
    }

    #[test]
    fn test_tagged_line_parser_rejects_incomplete_lines() {
        let parser = TaggedLineParser;
        assert!(parser.parse("Found network X").is_none());
        assert!(parser.parse("handshake ssid=Cafe mac=00:11").is_none());
        assert!(parser.parse("handshake").is_none());
        assert!(parser.parse("").is_none());
    }
}
