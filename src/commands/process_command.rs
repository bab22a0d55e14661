//! Batch processing command

use log::info;

use crate::commands::command_traits::Command;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::{PipelineConfig, PipelineOrchestrator};
use crate::utils::logger::Logger;

/// Runs the extraction and tiling pipeline over an input directory
pub struct ProcessCommand<'a> {
    config: PipelineConfig,
    logger: &'a Logger,
}

impl<'a> ProcessCommand<'a> {
    pub fn new(config: PipelineConfig, logger: &'a Logger) -> Self {
        ProcessCommand { config, logger }
    }
}

impl Command for ProcessCommand<'_> {
    fn execute(&self) -> PipelineResult<()> {
        self.config.validate()?;
        info!("Processing {} -> {} (channel {}, tile edge {})",
              self.config.input_dir.display(), self.config.output_root.display(),
              self.config.channel, self.config.tile_edge);

        let orchestrator = PipelineOrchestrator::new(self.config.clone());
        let summary = orchestrator.run_batch()?;

        let _ = self.logger.log(&format!(
            "Batch finished: {}/{} file(s) succeeded, {} failed",
            summary.succeeded, summary.total_files, summary.failed
        ));

        if summary.failed > 0 {
            return Err(PipelineError::RunFailed(format!(
                "{} of {} file(s) did not complete", summary.failed, summary.total_files
            )));
        }
        Ok(())
    }
}
