//! Source description command

use std::path::PathBuf;

use crate::commands::command_traits::Command;
use crate::errors::PipelineResult;
use crate::raster::{RasterSource, RegionSource};
use crate::utils::logger::Logger;

/// Prints the structural description of one source file
pub struct DescribeCommand<'a> {
    input: PathBuf,
    logger: &'a Logger,
}

impl<'a> DescribeCommand<'a> {
    pub fn new(input: PathBuf, logger: &'a Logger) -> Self {
        DescribeCommand { input, logger }
    }
}

impl Command for DescribeCommand<'_> {
    fn execute(&self) -> PipelineResult<()> {
        let source = RasterSource::open(&self.input)?;
        let info = source.info();

        println!("{}", self.input.display());
        println!("  Dimensions: {} x {} pixels", info.height, info.width);
        println!("  Channels:   {} ({})", info.channel_count, info.axis_order.name());
        println!("  Pixel type: {}", info.pixel_type);
        match source.physical_scale() {
            Some(scale) => println!("  Pixel size: {} x {} {}",
                                    scale.pixel_size_x, scale.pixel_size_y, scale.unit),
            None => println!("  Pixel size: unknown"),
        }

        let _ = self.logger.log(&format!(
            "Described {}: {}x{}, {} channel(s)",
            self.input.display(), info.height, info.width, info.channel_count
        ));
        Ok(())
    }
}
