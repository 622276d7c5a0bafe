//! Top-level fingerprint run, from alignment files to written output
//!

use std::collections::HashSet;

use log::info;

use crate::bam_tip_source::{get_reference_names, get_sample_name};
use crate::cli;
use crate::density_cluster::DensityClusterSettings;
use crate::error::{FingerprintError, FingerprintResult};
use crate::fingerprint::MergeSettings;
use crate::known_elements::KnownElements;
use crate::os_utils::check_open_file_limit;
use crate::output::{write_gff_output, write_supporting_read_names, write_tabular_output};
use crate::result_table::ResultTable;
use crate::run_stats::{FingerprintRunStats, write_run_stats};
use crate::work_units::{SharedUnitData, WorkUnitSettings, get_work_units, process_work_units};
use crate::worker_thread_data::{BamTipSourceSettings, get_bam_tip_source_worker_thread_data};

/// Get sample names for all alignment files, and check that they form a valid sample set
///
fn get_sample_names(
    bam_filenames: &[String],
    allow_single_sample: bool,
) -> FingerprintResult<Vec<String>> {
    if bam_filenames.is_empty() {
        return Err(FingerprintError::Configuration(
            "no alignment files provided".to_string(),
        ));
    }
    if bam_filenames.len() < 2 && !allow_single_sample {
        return Err(FingerprintError::Configuration(
            "at least two alignment files are required for comparison, unless single sample \
            runs are allowed"
                .to_string(),
        ));
    }

    let sample_names = bam_filenames
        .iter()
        .map(|x| get_sample_name(x))
        .collect::<Vec<_>>();

    let mut observed_names = HashSet::new();
    for (sample_name, bam_filename) in sample_names.iter().zip(bam_filenames) {
        if !observed_names.insert(sample_name) {
            return Err(FingerprintError::Configuration(format!(
                "duplicate sample name '{sample_name}' from alignment file '{bam_filename}'"
            )));
        }
    }
    Ok(sample_names)
}

/// Resolve the reference list of the run
///
/// If no references are requested, all references of the first sample are used, in header order.
/// Every reference of the run must be present in every sample.
///
/// # Arguments
/// * `sample_reference_names` - header reference names of each sample, with the sample name
///
fn get_run_references(
    requested_references: &[String],
    sample_reference_names: &[(&str, Vec<String>)],
) -> FingerprintResult<Vec<String>> {
    let references = if requested_references.is_empty() {
        sample_reference_names
            .first()
            .map(|(_, x)| x.clone())
            .unwrap_or_default()
    } else {
        requested_references.to_vec()
    };

    for (sample_name, reference_names) in sample_reference_names {
        let reference_names = reference_names
            .iter()
            .map(|x| x.as_str())
            .collect::<HashSet<_>>();
        if let Some(missing) = references
            .iter()
            .find(|x| !reference_names.contains(x.as_str()))
        {
            return Err(FingerprintError::Configuration(format!(
                "reference '{missing}' is not found in sample '{sample_name}'"
            )));
        }
    }
    Ok(references)
}

fn get_work_unit_settings(settings: &cli::FingerprintSettings) -> WorkUnitSettings {
    WorkUnitSettings {
        cluster: DensityClusterSettings {
            minimum_reads: settings.minimum_reads,
            epsilon: settings.epsilon,
            minimum_epsilon: settings.minimum_epsilon,
            hierarchical: !settings.non_hierarchical,
        },
        merge: MergeSettings {
            fingerprint_buffer: settings.fingerprint_buffer,
            n_common_elements: settings.number_common_elements,
        },
        join_distance: settings.join_distance,
    }
}

pub fn run_fingerprint(
    shared_settings: &cli::SharedSettings,
    settings: &cli::FingerprintSettings,
) -> FingerprintResult<()> {
    let start = std::time::Instant::now();

    let unit_settings = get_work_unit_settings(settings);
    unit_settings.cluster.validate()?;

    let sample_names = get_sample_names(&settings.bam_filenames, settings.allow_single_sample)?;
    info!("Fingerprinting {} samples", sample_names.len());

    let sample_reference_names = sample_names
        .iter()
        .zip(settings.bam_filenames.iter())
        .map(|(sample_name, bam_filename)| {
            Ok((sample_name.as_str(), get_reference_names(bam_filename)?))
        })
        .collect::<FingerprintResult<Vec<_>>>()?;
    let references = get_run_references(&settings.references, &sample_reference_names)?;

    let known_elements = settings
        .known_elements_filename
        .as_deref()
        .map(KnownElements::from_gff)
        .transpose()?;

    let units = get_work_units(&references, &settings.categories);
    info!(
        "Partitioned run into {} work units over {} references and {} categories",
        units.len(),
        references.len(),
        settings.categories.len()
    );

    let thread_count = shared_settings.thread_count;
    check_open_file_limit((thread_count * sample_names.len()) as u64);

    let worker_thread_dataset = get_bam_tip_source_worker_thread_data(
        thread_count,
        &BamTipSourceSettings {
            bam_filenames: &settings.bam_filenames,
            sample_names: &sample_names,
            min_mapq: settings.mapping_quality,
            mate_element_tag: &settings.mate_element_tag,
        },
    )?;

    let shared_data = SharedUnitData {
        settings: &unit_settings,
        known_elements: known_elements.as_ref(),
    };
    let (records, fingerprint_stats) =
        process_work_units(thread_count, worker_thread_dataset, &shared_data, &units)?;

    let table = ResultTable::new(sample_names.clone(), &references, records);
    info!(
        "Found {} loci, reported as {} records after joining",
        fingerprint_stats.locus_count,
        table.records().len()
    );

    let output_dir = settings.output_dir.as_path();
    write_tabular_output(output_dir, &table)?;
    write_gff_output(output_dir, &table, &settings.gff_columns)?;
    if settings.report_supporting_reads {
        write_supporting_read_names(output_dir, &table)?;
    }

    let run_stats = FingerprintRunStats {
        sample_names,
        fingerprint_stats,
        record_count: table.records().len(),
        total_fingerprint_time_secs: start.elapsed().as_secs_f64(),
    };
    write_run_stats(output_dir, &run_stats)?;

    Ok(())
}
