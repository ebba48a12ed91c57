use dockprep::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders workflow progress on stderr and counts failed units.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
    failed_units: Arc<AtomicUsize>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::new(0).with_style(Self::spinner_style());
        pb.set_draw_target(target);
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
            failed_units: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failed_units(&self) -> usize {
        self.failed_units.load(Ordering::Relaxed)
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();
        let failed = self.failed_units.clone();

        Box::new(move |progress: Progress| {
            let Ok(pb_guard) = pb_clone.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    pb_guard.reset();
                    pb_guard.set_length(0);
                    pb_guard.set_style(Self::spinner_style());
                    pb_guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb_guard.set_message(name);
                }
                Progress::PhaseFinish => {
                    pb_guard.disable_steady_tick();
                    pb_guard.finish_with_message("✓ Done");
                }
                Progress::TaskStart { total_steps } => {
                    pb_guard.disable_steady_tick();
                    pb_guard.set_length(total_steps);
                    pb_guard.set_position(0);
                    pb_guard.set_style(Self::bar_style());
                }
                Progress::TaskIncrement => pb_guard.inc(1),
                Progress::TaskFinish => {
                    let len = pb_guard.length().unwrap_or(0);
                    if pb_guard.position() < len {
                        pb_guard.set_position(len);
                    }
                    pb_guard.finish();
                }
                Progress::UnitFinished { label, success } => {
                    if !success {
                        failed.fetch_add(1, Ordering::Relaxed);
                        pb_guard.println(format!("  ✗ {}", label));
                    }
                }
                Progress::Message(msg) => pb_guard.println(format!("  {}", msg)),
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hidden() -> CliProgressHandler {
        CliProgressHandler::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn handler_starts_finished_and_empty() {
        let handler = hidden();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
        assert_eq!(handler.failed_units(), 0);
    }

    #[test]
    fn callback_drives_the_bar_through_a_phase() {
        let handler = hidden();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Building jobs" });
        assert_eq!(handler.pb.lock().unwrap().message(), "Building jobs");

        callback(Progress::TaskStart { total_steps: 4 });
        callback(Progress::TaskIncrement);
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.length(), Some(4));
            assert_eq!(pb.position(), 1);
        }

        callback(Progress::TaskFinish);
        {
            let pb = handler.pb.lock().unwrap();
            assert!(pb.is_finished());
            assert_eq!(pb.position(), 4);
        }

        callback(Progress::PhaseFinish);
        assert_eq!(handler.pb.lock().unwrap().message(), "✓ Done");
    }

    #[test]
    fn failed_units_are_counted_across_threads() {
        let handler = hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::UnitFinished {
                label: "k2_0".to_string(),
                success: true,
            });
            callback(Progress::UnitFinished {
                label: "k2_1".to_string(),
                success: false,
            });
        })
        .join()
        .unwrap();

        assert_eq!(handler.failed_units(), 1);
    }
}
