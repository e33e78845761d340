//! Async wrapper around long-running symbolication tool processes.
//!
//! `symbolicatecrash` can take tens of seconds on a large report, so
//! interactive callers run it through a [`SymbolicateTask`]: a spawned
//! child process whose status is observable through a watch channel and
//! which can be canceled mid-run. [`TaskTable`] dedupes concurrent runs
//! for the same debug-id.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Success,
    Failed(i32),
    Canceled,
}

/// A spawned tool process with observable status.
pub struct SymbolicateTask {
    status: watch::Receiver<TaskStatus>,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Option<String>>,
}

impl SymbolicateTask {
    /// Spawn `program` with `args` on the current tokio runtime.
    ///
    /// The status channel always receives a terminal state, whether the
    /// process exits, fails to launch, or is canceled.
    pub fn spawn(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let (status_tx, status_rx) = watch::channel(TaskStatus::Running);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            debug!("spawning {program}");
            let mut command = Command::new(&program);
            command
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let running = command.output();
            tokio::pin!(running);
            tokio::select! {
                _ = &mut cancel_rx => {
                    // Dropping the pinned future reaps the child.
                    let _ = status_tx.send(TaskStatus::Canceled);
                    None
                }
                result = &mut running => match result {
                    Ok(output) if output.status.success() => {
                        let _ = status_tx.send(TaskStatus::Success);
                        Some(String::from_utf8_lossy(&output.stdout).into_owned())
                    }
                    Ok(output) => {
                        let _ = status_tx.send(TaskStatus::Failed(output.status.code().unwrap_or(-1)));
                        None
                    }
                    Err(e) => {
                        debug!("{program} failed to launch: {e}");
                        let _ = status_tx.send(TaskStatus::Failed(-1));
                        None
                    }
                }
            }
        });

        Self {
            status: status_rx,
            cancel: Some(cancel_tx),
            handle,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status.borrow().clone()
    }

    /// A receiver observers can await status changes on.
    pub fn subscribe(&self) -> watch::Receiver<TaskStatus> {
        self.status.clone()
    }

    /// Kill the child process. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the process to finish and return its terminal status plus
    /// captured stdout on success.
    pub async fn wait(self) -> (TaskStatus, Option<String>) {
        let stdout = self.handle.await.unwrap_or(None);
        let status = self.status.borrow().clone();
        (status, stdout)
    }
}

/// Tracks in-flight symbolication runs by debug-id so the same dSYM is
/// never processed twice concurrently.
#[derive(Debug, Default, Clone)]
pub struct TaskTable {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `debug_id` for a new run. Returns `None` when a run for the
    /// same id is already in flight; the returned guard releases the claim
    /// on drop.
    pub fn begin(&self, debug_id: &str) -> Option<TaskClaim> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(debug_id.to_string()) {
            debug!("run for {debug_id} already in flight");
            return None;
        }
        Some(TaskClaim {
            table: Arc::clone(&self.in_flight),
            debug_id: debug_id.to_string(),
        })
    }
}

/// Releases a [`TaskTable`] claim when dropped.
pub struct TaskClaim {
    table: Arc<Mutex<HashSet<String>>>,
    debug_id: String,
}

impl Drop for TaskClaim {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.debug_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_run_reports_stdout() {
        let task = SymbolicateTask::spawn("/bin/echo", vec!["hello".into()]);
        let (status, stdout) = task.wait().await;
        assert_eq!(status, TaskStatus::Success);
        assert_eq!(stdout.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_code() {
        let task = SymbolicateTask::spawn("/bin/sh", vec!["-c".into(), "exit 3".into()]);
        let (status, stdout) = task.wait().await;
        assert_eq!(status, TaskStatus::Failed(3));
        assert!(stdout.is_none());
    }

    #[tokio::test]
    async fn unlaunchable_program_fails() {
        let task = SymbolicateTask::spawn("/nonexistent/tool", vec![]);
        let (status, _) = task.wait().await;
        assert_eq!(status, TaskStatus::Failed(-1));
    }

    #[tokio::test]
    async fn cancel_kills_the_child() {
        let mut task = SymbolicateTask::spawn("/bin/sleep", vec!["30".into()]);
        assert_eq!(task.status(), TaskStatus::Running);
        task.cancel();
        let (status, stdout) = task.wait().await;
        assert_eq!(status, TaskStatus::Canceled);
        assert!(stdout.is_none());
    }

    #[tokio::test]
    async fn status_watchers_see_the_terminal_state() {
        let task = SymbolicateTask::spawn("/bin/echo", vec![]);
        let mut rx = task.subscribe();
        let (status, _) = task.wait().await;
        assert_eq!(status, TaskStatus::Success);
        // The watcher observes the same terminal state without racing.
        rx.changed().await.ok();
        assert_eq!(*rx.borrow(), TaskStatus::Success);
    }

    #[test]
    fn table_dedupes_in_flight_ids() {
        let table = TaskTable::new();
        let claim = table.begin("42FD89F7-30BE-3AC5-A40A-4C1A99438DFB");
        assert!(claim.is_some());
        assert!(table.begin("42FD89F7-30BE-3AC5-A40A-4C1A99438DFB").is_none());

        // A different id is independent.
        assert!(table.begin("EE327708-9D2B-310C-8126-3E5FBCBB3138").is_some());

        drop(claim);
        assert!(table.begin("42FD89F7-30BE-3AC5-A40A-4C1A99438DFB").is_some());
    }
}
