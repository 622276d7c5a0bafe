//! Methods specific to the tefingerprint logger
//!

use camino::Utf8Path;

use crate::cli;
use crate::globals::PROGRAM_NAME;
use crate::os_utils::create_dir_all;

/// If debug is true set the default logger to the more verbose debug level
///
fn setup_logger(output_dir: &Utf8Path, debug: bool) -> Result<(), fern::InitError> {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let log_filename = output_dir.join(PROGRAM_NAME.to_string() + ".log");
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                PROGRAM_NAME,
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .chain(fern::log_file(log_filename)?)
        .apply()?;
    Ok(())
}

/// Check and create output directory, then setup logger to write there
///
/// Failures here exit the process directly, because there is no logger to report them yet.
///
/// # Arguments
/// * `debug` - If true use debug log level, and info level otherwise
///
pub fn setup_output_dir_and_logger(output_dir: &Utf8Path, clobber: bool, debug: bool) {
    if let Err(msg) = cli::check_novel_dirname(output_dir, "Output directory") {
        if !(clobber && output_dir.is_dir()) {
            eprintln!("Invalid command-line setting: {msg}");
            std::process::exit(exitcode::USAGE);
        }
    };

    if let Err(err) = create_dir_all(output_dir, "output") {
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }

    if let Err(err) = setup_logger(output_dir, debug) {
        eprintln!("Failed to setup logger: {err}");
        std::process::exit(exitcode::CANTCREAT);
    }
}
