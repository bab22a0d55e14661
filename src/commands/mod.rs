//! CLI commands
//!
//! Command pattern implementation: the factory turns parsed clap arguments
//! into executable command objects, one per CLI operation.

pub mod command_traits;
pub mod describe_command;
pub mod process_command;
pub mod validate_command;

pub use command_traits::{Command, CommandFactory};
pub use describe_command::DescribeCommand;
pub use process_command::ProcessCommand;
pub use validate_command::ValidateCommand;

use clap::ArgMatches;
use std::path::PathBuf;

use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::PipelineConfig;
use crate::utils::logger::Logger;

/// Default factory producing tilekit commands from CLI arguments
pub struct TilekitCommandFactory;

impl TilekitCommandFactory {
    pub fn new() -> Self {
        TilekitCommandFactory
    }

    /// Build the pipeline configuration for the process subcommand
    ///
    /// A TOML file (when given) supplies the base values; individual flags
    /// override it.
    fn build_config(args: &ArgMatches) -> PipelineResult<PipelineConfig> {
        let input = args
            .get_one::<String>("input")
            .ok_or_else(|| PipelineError::Config("Missing input directory".to_string()))?;
        let output = args
            .get_one::<String>("output")
            .ok_or_else(|| PipelineError::Config("Missing output directory".to_string()))?;

        let mut config = match args.get_one::<String>("config") {
            Some(path) => {
                let mut config = PipelineConfig::from_file(&PathBuf::from(path))?;
                config.input_dir = PathBuf::from(input);
                config.output_root = PathBuf::from(output);
                config
            }
            None => PipelineConfig::new(PathBuf::from(input), PathBuf::from(output)),
        };

        if let Some(edge) = args.get_one::<String>("tile-size") {
            config.tile_edge = edge
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid tile size '{}'", edge)))?;
        }
        if let Some(channel) = args.get_one::<String>("channel") {
            config.channel = channel
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid channel '{}'", channel)))?;
        }
        if let Some(rows) = args.get_one::<String>("chunk-rows") {
            config.chunk_rows = rows
                .parse()
                .map_err(|_| PipelineError::Config(format!("Invalid chunk rows '{}'", rows)))?;
        }
        if let Some(scheme) = args.get_one::<String>("compression") {
            config.compression = scheme.clone();
        }
        if args.get_flag("keep-intermediate") {
            config.cleanup_intermediate = false;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for TilekitCommandFactory {
    fn default() -> Self {
        TilekitCommandFactory::new()
    }
}

impl<'a> CommandFactory<'a> for TilekitCommandFactory {
    fn create_command(
        &self,
        args: &ArgMatches,
        logger: &'a Logger,
    ) -> PipelineResult<Box<dyn Command + 'a>> {
        match args.subcommand() {
            Some(("process", sub)) => {
                let config = Self::build_config(sub)?;
                Ok(Box::new(ProcessCommand::new(config, logger)))
            }
            Some(("validate", sub)) => {
                let output = sub
                    .get_one::<String>("output")
                    .ok_or_else(|| PipelineError::Config("Missing output directory".to_string()))?;
                Ok(Box::new(ValidateCommand::new(PathBuf::from(output), logger)))
            }
            Some(("describe", sub)) => {
                let input = sub
                    .get_one::<String>("input")
                    .ok_or_else(|| PipelineError::Config("Missing input file".to_string()))?;
                Ok(Box::new(DescribeCommand::new(PathBuf::from(input), logger)))
            }
            _ => Err(PipelineError::Config(
                "No subcommand given; use process, validate or describe".to_string(),
            )),
        }
    }
}
