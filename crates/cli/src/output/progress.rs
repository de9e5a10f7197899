//! Progress bar for transfer runs
//!
//! The bar's length follows the number of objects discovered so far, since
//! the listing streams while transfers run.

use super::OutputConfig;

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Progress bar wrapper
///
/// Handles progress display based on output configuration.
/// In quiet or JSON mode, progress is suppressed.
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a progress bar over an object count that is still growing
    pub fn new(config: &OutputConfig) -> Self {
        let bar = if config.quiet || config.json || config.no_progress {
            None
        } else {
            let bar = indicatif::ProgressBar::new(0);
            // A bad template only costs the styling, never the run.
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(TEMPLATE) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar.set_message("listing");
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(bar)
        };

        Self { bar }
    }

    /// Update processed and discovered counts
    pub fn update(&self, processed: u64, discovered: u64) {
        if let Some(bar) = &self.bar {
            bar.set_length(discovered);
            bar.set_position(processed);
        }
    }

    /// Fix the length once the listing is over
    pub fn set_total(&self, total: u64) {
        if let Some(bar) = &self.bar {
            bar.set_length(total);
            bar.set_message("");
        }
    }

    /// Hide the bar while `f` writes to the terminal
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        match &self.bar {
            Some(bar) => bar.suspend(f),
            None => f(),
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }
}
