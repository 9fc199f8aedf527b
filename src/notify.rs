//! Out-of-focus completion notification via the terminal title.
//!
//! When a reply finishes the window title flips to an alert string and the
//! terminal bell rings, so a user who switched away sees the tab change.
//! The title reverts after a configurable delay or as soon as the user
//! comes back, whichever is first. The terminal gives no focus events at
//! this layer, so the next prompt read stands in for regaining focus.

use crossterm::{terminal::SetTitle, ExecutableCommand};
use std::io::{stdout, Write};
use std::time::Duration;
use tokio::sync::watch;

/// Signals that the user is back at the prompt.
#[derive(Clone)]
pub struct FocusSignal {
    tx: watch::Sender<u64>,
}

impl FocusSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    /// Mark the user as present again.
    pub fn gained(&self) {
        self.tx.send_modify(|n| *n += 1);
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for FocusSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Flashes the terminal title when a reply completes.
pub struct TitleNotifier {
    base_title: String,
    alert_text: String,
    alert_ms: u64,
    focus: FocusSignal,
    flash_task: Option<tokio::task::JoinHandle<()>>,
}

impl TitleNotifier {
    pub fn new(
        base_title: impl Into<String>,
        alert_text: impl Into<String>,
        alert_ms: u64,
        focus: FocusSignal,
    ) -> Self {
        Self {
            base_title: base_title.into(),
            alert_text: alert_text.into(),
            alert_ms,
            focus,
            flash_task: None,
        }
    }

    /// Flip the title to the alert string and ring the bell.
    ///
    /// A second flash before the first reverts replaces it; only one revert
    /// task is ever pending.
    pub fn flash(&mut self) {
        if let Some(task) = self.flash_task.take() {
            task.abort();
        }

        set_title(&self.alert_text);
        ring_bell();

        let base_title = self.base_title.clone();
        let alert = Duration::from_millis(self.alert_ms);
        let mut focus = self.focus.subscribe();

        self.flash_task = Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(alert) => {}
                _ = focus.changed() => {}
            }
            set_title(&base_title);
        }));
    }

    /// Restore the base title immediately.
    pub fn reset(&mut self) {
        if let Some(task) = self.flash_task.take() {
            task.abort();
        }
        set_title(&self.base_title);
    }
}

impl Drop for TitleNotifier {
    fn drop(&mut self) {
        if let Some(task) = self.flash_task.take() {
            task.abort();
        }
        set_title(&self.base_title);
    }
}

fn set_title(title: &str) {
    let _ = stdout().execute(SetTitle(title));
}

fn ring_bell() {
    let mut out = stdout();
    let _ = out.write_all(b"\x07");
    let _ = out.flush();
}
