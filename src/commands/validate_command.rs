//! Output validation command

use std::path::PathBuf;

use crate::commands::command_traits::Command;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::OutputValidator;
use crate::utils::logger::Logger;

/// Validates an output tree against its manifests
pub struct ValidateCommand<'a> {
    output_root: PathBuf,
    logger: &'a Logger,
}

impl<'a> ValidateCommand<'a> {
    pub fn new(output_root: PathBuf, logger: &'a Logger) -> Self {
        ValidateCommand { output_root, logger }
    }
}

impl Command for ValidateCommand<'_> {
    fn execute(&self) -> PipelineResult<()> {
        let report = OutputValidator::new(&self.output_root).validate()?;

        let _ = self.logger.log(&format!(
            "Validation: {} manifest(s), {} tile(s), {} issue(s)",
            report.checked_manifests, report.checked_tiles, report.issues.len()
        ));

        for issue in &report.issues {
            println!("[{:?}] {} ({}): {}",
                     issue.kind,
                     issue.filename.as_deref().unwrap_or("-"),
                     issue.manifest,
                     issue.message);
        }

        if !report.passed {
            return Err(PipelineError::RunFailed(format!(
                "validation found {} issue(s)", report.issues.len()
            )));
        }
        println!("Validation passed: {} tile(s) across {} manifest(s)",
                 report.checked_tiles, report.checked_manifests);
        Ok(())
    }
}
