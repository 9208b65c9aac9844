//! Structured run logging.
//!
//! Every lifecycle event of a run carries the run ID, and stage events also
//! carry the stage name, so a JSON log stream can be filtered per run.

use tracing::{error, info, warn, Span};

use loopcast_models::RunId;

use crate::error::Stage;

/// Logger bound to one assembly run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId) -> Self {
        Self {
            run_id: run_id.to_string(),
        }
    }

    /// Log the start of the run.
    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, "Run started: {}", message);
    }

    /// Log a stage event.
    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(run_id = %self.run_id, stage = %stage, "{}", message);
    }

    pub fn log_warning(&self, stage: Stage, message: &str) {
        warn!(run_id = %self.run_id, stage = %stage, "Run warning: {}", message);
    }

    /// Log a failed run; `stderr` is the tool's diagnostic tail, when captured.
    pub fn log_error(&self, stage: Option<Stage>, message: &str, stderr: Option<&str>) {
        let stage = stage.map(|s| s.as_str()).unwrap_or("none");
        match stderr {
            Some(stderr) => error!(
                run_id = %self.run_id,
                stage = %stage,
                stderr = %stderr,
                "Run failed: {}", message
            ),
            None => error!(run_id = %self.run_id, stage = %stage, "Run failed: {}", message),
        }
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, "Run completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}
