use console::style;
use fusionctl_core::errors::Result;
use fusionctl_core::progress::{ProgressEmitter, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn default_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

fn final_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap()
}

/// A spinner that maps the progress event stream to friendly messages on
/// stderr.
#[derive(Debug)]
pub struct SpinnerEmitter {
    pb: ProgressBar,
    total_steps: usize,
}

impl SpinnerEmitter {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(80));
        pb.set_style(default_style());
        Self { pb, total_steps: 0 }
    }

    fn set_msg(&self, msg: impl Into<String>) {
        self.pb.set_message(msg.into());
    }

    fn finish_with(&self, msg: impl Into<String>) {
        self.pb.set_style(final_style());
        self.pb.finish_with_message(msg.into());
    }
}

impl Drop for SpinnerEmitter {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

impl ProgressEmitter for SpinnerEmitter {
    fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        use ProgressEvent::*;
        match event {
            PipelineBegin {
                pipeline, steps, ..
            } => {
                self.total_steps = *steps;
                self.set_msg(
                    style(format!("Running {} ({} steps)…", pipeline, steps))
                        .yellow()
                        .to_string(),
                );
            }
            PipelineEnd {
                pipeline,
                success,
                duration_ms,
                ..
            } => {
                if *success {
                    self.finish_with(
                        style(format!("{} completed in {} ms", pipeline, duration_ms))
                            .green()
                            .to_string(),
                    );
                } else {
                    self.finish_with(style(format!("{} failed", pipeline)).red().to_string());
                }
            }
            StepBegin {
                step, description, ..
            } => {
                self.set_msg(
                    style(format!(
                        "[{}/{}] {}…",
                        step + 1,
                        self.total_steps,
                        description
                    ))
                    .yellow()
                    .to_string(),
                );
            }
            StepEnd { success, .. } => {
                if !*success {
                    // PipelineEnd will summarize; keep the failing step visible
                    self.pb.disable_steady_tick();
                }
            }
            RepoSyncBegin { url, .. } => {
                self.set_msg(style(format!("Syncing {}…", url)).yellow().to_string());
            }
            RepoSyncEnd { .. } => {
                // Step end follows immediately; nothing extra to show
            }
        }
        Ok(())
    }
}

impl Default for SpinnerEmitter {
    fn default() -> Self {
        Self::new()
    }
}
