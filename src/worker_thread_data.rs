use std::sync::{Arc, Mutex};

use crate::bam_tip_source::BamTipSource;
use crate::error::FingerprintResult;
use crate::read_tips::TipSource;

/// For worker threads extracting read tips, this provides a persistent worker specific tip source
/// for each sample
pub struct TipSourceWorkerThreadData<S> {
    pub tip_sources: Vec<S>,
}

pub type TipSourceWorkerThreadDataSet<S> = Arc<Vec<Mutex<TipSourceWorkerThreadData<S>>>>;

/// Build one set of tip sources per worker thread
///
/// # Arguments
/// * `get_tip_sources` - creates a full set of tip sources, indexed by sample index
///
pub fn get_tip_source_worker_thread_data<S: TipSource>(
    thread_count: usize,
    get_tip_sources: impl Fn() -> FingerprintResult<Vec<S>>,
) -> FingerprintResult<TipSourceWorkerThreadDataSet<S>> {
    let mut worker_thread_data = Vec::new();
    for _ in 0..thread_count {
        worker_thread_data.push(Mutex::new(TipSourceWorkerThreadData {
            tip_sources: get_tip_sources()?,
        }));
    }
    Ok(Arc::new(worker_thread_data))
}

pub struct BamTipSourceSettings<'a> {
    pub bam_filenames: &'a [String],
    pub sample_names: &'a [String],
    pub min_mapq: u8,
    pub mate_element_tag: &'a str,
}

pub fn get_bam_tip_source_worker_thread_data(
    thread_count: usize,
    settings: &BamTipSourceSettings,
) -> FingerprintResult<TipSourceWorkerThreadDataSet<BamTipSource>> {
    assert_eq!(settings.bam_filenames.len(), settings.sample_names.len());
    get_tip_source_worker_thread_data(thread_count, || {
        settings
            .bam_filenames
            .iter()
            .zip(settings.sample_names.iter())
            .map(|(bam_filename, sample_name)| {
                BamTipSource::new(
                    bam_filename,
                    sample_name,
                    settings.min_mapq,
                    settings.mate_element_tag,
                )
            })
            .collect()
    })
}
