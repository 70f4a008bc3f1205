use std::time::{Duration, Instant};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::pipeline::ScanEvent;
use crate::utils::formatting::format_duration;

/// Step bar plus a status spinner, driven by [`ScanEvent`]s.
pub struct ScanProgress {
    multi: MultiProgress,
    step_bar: Option<ProgressBar>,
    status_bar: ProgressBar,
    findings_count: usize,
    current_tool: Option<String>,
    start_time: Instant,
}

fn style_or_default(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or(fallback)
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status_bar.set_message("Initializing scan...");
        status_bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            step_bar: None,
            status_bar,
            findings_count: 0,
            current_tool: None,
            start_time: Instant::now(),
        }
    }

    pub fn handle_event(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::ScanStarted { target, max_steps, .. } => {
                let bar = self
                    .multi
                    .insert_before(&self.status_bar, ProgressBar::new(u64::from(*max_steps)));
                bar.set_style(style_or_default(
                    "  {bar:30.cyan/dark_gray} {pos}/{len} steps | {msg}",
                    ProgressStyle::default_bar(),
                ));
                bar.set_message(format!("Scanning {}", target));
                self.step_bar = Some(bar);
                self.update_status();
            }
            ScanEvent::StepStarted { step, .. } => {
                if let Some(bar) = &self.step_bar {
                    bar.set_position(u64::from(step.saturating_sub(1)));
                }
                self.update_status();
            }
            ScanEvent::ToolStarted { tool } => {
                self.current_tool = Some(tool.clone());
                self.update_status();
            }
            ScanEvent::ToolCompleted { tool, success, error } => {
                self.current_tool = None;
                if !success {
                    self.println(&format!(
                        "  {} {} failed: {}",
                        style("✗").red(),
                        tool,
                        error.as_deref().unwrap_or("unknown error")
                    ));
                }
                self.update_status();
            }
            ScanEvent::FindingReported { class, severity, url } => {
                self.findings_count += 1;
                self.println(&format!(
                    "  {} {} [{}] {}",
                    style("!").yellow().bold(),
                    class.as_str(),
                    severity.as_str(),
                    url
                ));
                self.update_status();
            }
            ScanEvent::StrategyUpdated { focus_areas, significant_change } if *significant_change => {
                self.println(&format!("  {} Strategy now focused on: {}", style("→").cyan(), focus_areas.join(", ")));
            }
            ScanEvent::StepFailed { step, error } => {
                self.println(&format!("  {} step {}: {}", style("⚠").yellow(), step, error));
            }
            ScanEvent::ScanCompleted { steps, total_findings, duration_ms } => {
                if let Some(bar) = self.step_bar.take() {
                    bar.set_position(u64::from(*steps));
                    bar.finish_with_message("Scan complete");
                }
                self.status_bar.finish_with_message(format!(
                    "Scan complete: {} steps | {} findings | {}",
                    steps,
                    total_findings,
                    format_duration(*duration_ms),
                ));
            }
            ScanEvent::ScanFailed { error } => {
                if let Some(bar) = self.step_bar.take() {
                    bar.abandon_with_message("Failed");
                }
                self.status_bar.finish_with_message(format!("Scan failed: {}", error));
            }
            _ => {}
        }
    }

    fn update_status(&self) {
        let elapsed = format_duration(self.start_time.elapsed().as_millis() as u64);
        let tool = self
            .current_tool
            .as_deref()
            .map(|t| format!(" | running {}", t))
            .unwrap_or_default();
        self.status_bar
            .set_message(format!("{} | {} findings{}", elapsed, self.findings_count, tool));
    }

    /// Print a line above the bars.
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }
}
