//! Progress bar utilities for stage runs

use indicatif::{ProgressBar, ProgressStyle};

const STAGE_TEMPLATE: &str =
    "{prefix:>10} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

/// Create a per-stage progress bar; hidden when `visible` is false
pub fn create_stage_progress(stage: &str, total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    // The template is a constant; a parse failure only loses styling.
    if let Ok(style) = ProgressStyle::default_bar().template(STAGE_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_prefix(stage.to_string());
    pb
}

/// Running ok/failed counts rendered into the bar message
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub failed: usize,
}

impl Tally {
    pub fn success(&mut self, pb: &ProgressBar) {
        self.ok += 1;
        self.render(pb);
    }

    pub fn failure(&mut self, pb: &ProgressBar) {
        self.failed += 1;
        self.render(pb);
    }

    fn render(&self, pb: &ProgressBar) {
        pb.set_message(format!("ok={} failed={}", self.ok, self.failed));
        pb.inc(1);
    }
}
