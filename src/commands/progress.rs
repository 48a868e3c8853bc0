//! Progress display for simulated updates

use indicatif::{ProgressBar, ProgressStyle};

use exup_core::update::{UpdateProgress, UpdateState};

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using indicatif progress bars
///
/// One bar for hashing, one for parsing and programming.
#[derive(Default)]
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn create_bar(&mut self, total: u64, phase: &str) {
        let pb = create_progress_bar_with_phase(total, phase)
            .unwrap_or_else(|_| ProgressBar::new(total));
        self.current_bar = Some(pb);
    }

    fn set_position(&self, done: u32) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(done as u64);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish();
        }
    }
}

impl UpdateProgress for IndicatifProgress {
    fn state_changed(&mut self, state: UpdateState, image_size: u32) {
        match state {
            UpdateState::Idle => {}
            UpdateState::Verifying => self.create_bar(image_size as u64, "Verifying"),
            UpdateState::Programming => {
                self.finish();
                self.create_bar(image_size as u64, "Programming");
            }
            UpdateState::Done { .. } => self.finish(),
        }
    }

    fn hash_progress(&mut self, done: u32) {
        self.set_position(done);
    }

    fn program_progress(&mut self, done: u32) {
        self.set_position(done);
    }
}
