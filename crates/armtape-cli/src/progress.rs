//! Request and operation progress on stderr using indicatif.

use armtape::arm::{ProgressCallback, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Spinner that follows the ARM requests a command makes.
///
/// indicatif hides the spinner when stderr is not a terminal; with `verbose`
/// every event is also written as a plain line.
pub struct ArmProgress {
    spinner: Mutex<Option<ProgressBar>>,
    verbose: bool,
}

impl ArmProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            verbose,
        }
    }

    fn set_message(&self, message: String) {
        if let Ok(mut spinner) = self.spinner.lock() {
            let pb = spinner.get_or_insert_with(|| {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            });
            pb.set_message(message);
        }
    }

    /// Clear the spinner once the command is done.
    pub fn finish(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressCallback for ArmProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let message = match event {
            ProgressEvent::RequestStarted { method, url } => format!("{method} {url}"),
            ProgressEvent::OperationPending { attempt, status } => {
                format!("waiting for operation (poll {attempt}: {status})")
            }
            ProgressEvent::OperationFinished { status } => {
                format!("operation {}", status.as_str())
            }
        };
        if self.verbose {
            let _ = writeln!(std::io::stderr(), "  {message}");
        }
        self.set_message(message);
    }
}

impl Drop for ArmProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
