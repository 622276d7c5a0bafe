mod bam_tip_source;
mod cli;
mod density_cluster;
mod error;
mod fingerprint;
mod fingerprint_run;
mod globals;
mod int_range;
mod join_loci;
mod known_elements;
mod logger;
mod os_utils;
mod output;
mod read_tips;
mod result_table;
mod run_stats;
mod work_units;
mod worker_thread_data;

use std::process;

use hhmmss::Hhmmss;
use log::{error, info};

use crate::error::FingerprintResult;
use crate::fingerprint_run::run_fingerprint;
use crate::globals::{PROGRAM_NAME, PROGRAM_VERSION};
use crate::logger::setup_output_dir_and_logger;

/// Run system configuration steps prior to starting any other program logic
///
fn system_configuration_prelude() {
    os_utils::attempt_max_open_file_limit();
}

fn run(settings: &cli::Settings) -> FingerprintResult<()> {
    info!("Starting {PROGRAM_NAME} {PROGRAM_VERSION}");
    info!(
        "cmdline: {}",
        std::env::args().collect::<Vec<_>>().join(" ")
    );
    info!("Running on {} threads", settings.shared.thread_count);

    let start = std::time::Instant::now();

    run_fingerprint(&settings.shared, &settings.fingerprint)?;

    info!(
        "{PROGRAM_NAME} completed. Total Runtime: {}",
        start.elapsed().hhmmssxxx()
    );
    Ok(())
}

fn main() {
    system_configuration_prelude();

    let settings = cli::validate_and_fix_settings(cli::parse_settings());

    // Setup logger, including creation of the output directory for the log file:
    setup_output_dir_and_logger(
        settings.get_output_dir(),
        settings.shared.clobber,
        settings.shared.debug,
    );

    if let Err(err) = run(&settings) {
        error!("{err}");
        process::exit(err.exit_code());
    }
}
