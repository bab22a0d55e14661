use clap::{Arg, ArgAction, Command as ClapCommand};
use log::error;
use std::path::Path;
use std::process;

use tilekit::commands::{CommandFactory, TilekitCommandFactory};
use tilekit::utils::logger::Logger;

fn main() {
    let matches = ClapCommand::new("tilekit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extract one channel from huge TIFF/BigTIFF images and retile it into small tiles")
        .subcommand_required(true)
        .subcommand(
            ClapCommand::new("process")
                .about("Extract and tile every image in a directory")
                .arg(
                    Arg::new("input")
                        .help("Input directory of .btf/.tif/.tiff files")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("output")
                        .help("Output root directory")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("TOML configuration file")
                        .value_name("FILE")
                        .required(false),
                )
                .arg(
                    Arg::new("channel")
                        .short('c')
                        .long("channel")
                        .help("Channel index to extract (0=red, 1=green, 2=blue)")
                        .value_name("INDEX")
                        .required(false),
                )
                .arg(
                    Arg::new("tile-size")
                        .short('t')
                        .long("tile-size")
                        .help("Output tile edge in pixels")
                        .value_name("PIXELS")
                        .required(false),
                )
                .arg(
                    Arg::new("chunk-rows")
                        .long("chunk-rows")
                        .help("Nominal rows per extraction band")
                        .value_name("ROWS")
                        .required(false),
                )
                .arg(
                    Arg::new("compression")
                        .long("compression")
                        .help("Output compression (none, deflate, zstd)")
                        .value_name("NAME")
                        .required(false),
                )
                .arg(
                    Arg::new("keep-intermediate")
                        .long("keep-intermediate")
                        .help("Keep the intermediate single-channel raster")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            ClapCommand::new("validate")
                .about("Validate an output tree against its manifests")
                .arg(
                    Arg::new("output")
                        .help("Output root directory to validate")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            ClapCommand::new("describe")
                .about("Print the structure of one source image")
                .arg(
                    Arg::new("input")
                        .help("Source image file")
                        .required(true)
                        .index(1),
                ),
        )
        .get_matches();

    let log_file = Path::new("tilekit.log");
    let logger = match Logger::new(log_file) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error initializing logger: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = Logger::init_global_logger(Path::new("tilekit-global.log")) {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    let factory = TilekitCommandFactory::new();

    // The command borrows the logger; drop it before logger goes out of scope
    let result = factory.create_command(&matches, &logger);
    match result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
