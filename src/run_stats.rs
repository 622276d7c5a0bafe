//! Track stats for the whole fingerprint run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{FingerprintError, FingerprintResult};

pub const RUN_STATS_FILENAME: &str = "run.stats.json";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FingerprintStats {
    pub work_unit_count: usize,

    /// Tips extracted over all samples, references and categories
    pub tip_count: usize,
    pub cluster_count: usize,
    pub locus_count: usize,

    /// Loci associated with a known element
    pub matched_locus_count: usize,
    pub joined_pair_count: usize,
}

impl FingerprintStats {
    pub fn merge(&mut self, other: &Self) {
        self.work_unit_count += other.work_unit_count;
        self.tip_count += other.tip_count;
        self.cluster_count += other.cluster_count;
        self.locus_count += other.locus_count;
        self.matched_locus_count += other.matched_locus_count;
        self.joined_pair_count += other.joined_pair_count;
    }
}

#[derive(Deserialize, Serialize)]
pub struct FingerprintRunStats {
    pub sample_names: Vec<String>,
    pub fingerprint_stats: FingerprintStats,

    /// Rows of the result table, counting each joined pair once
    pub record_count: usize,
    pub total_fingerprint_time_secs: f64,
}

/// Write run_stats structure out in json format
pub fn write_run_stats(
    output_dir: &Utf8Path,
    run_stats: &FingerprintRunStats,
) -> FingerprintResult<()> {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let output_error = |error| FingerprintError::Output {
        filename: filename.to_string(),
        error,
    };
    let f = File::create(&filename).map_err(output_error)?;
    serde_json::to_writer_pretty(&f, &run_stats).map_err(|e| output_error(e.into()))?;
    Ok(())
}
