//! Partition the run into independent (reference, category) work units and process them on a
//! bounded worker pool
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;

use log::{debug, info};
use strum::IntoEnumIterator;

use crate::density_cluster::{DensityClusterSettings, cluster_tips};
use crate::error::FingerprintResult;
use crate::fingerprint::{Locus, MergeSettings, get_strand_loci};
use crate::join_loci::{ResultRecord, join_loci, match_known_elements};
use crate::known_elements::KnownElements;
use crate::read_tips::{Strand, TipGroup, TipSource};
use crate::run_stats::FingerprintStats;
use crate::worker_thread_data::TipSourceWorkerThreadDataSet;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkUnit {
    pub reference: String,
    pub category: String,
}

/// Enumerate the cross product of references and categories, reference-major
pub fn get_work_units(references: &[String], categories: &[String]) -> Vec<WorkUnit> {
    let mut units = Vec::with_capacity(references.len() * categories.len());
    for reference in references {
        for category in categories {
            units.push(WorkUnit {
                reference: reference.clone(),
                category: category.clone(),
            });
        }
    }
    units
}

pub struct WorkUnitSettings {
    pub cluster: DensityClusterSettings,
    pub merge: MergeSettings,

    /// Enables known element matching and locus joining
    pub join_distance: Option<i64>,
}

/// Shared read-only data used by every work unit
pub struct SharedUnitData<'a> {
    pub settings: &'a WorkUnitSettings,
    pub known_elements: Option<&'a KnownElements>,
}

type WorkUnitResult = (Vec<ResultRecord>, FingerprintStats);

/// Run extraction, clustering, fingerprinting and joining for one work unit
///
/// # Arguments
/// * `tip_sources` - one tip source per sample, indexed by sample index
///
pub fn process_work_unit<S: TipSource>(
    shared_data: &SharedUnitData,
    tip_sources: &mut [S],
    unit: &WorkUnit,
) -> FingerprintResult<WorkUnitResult> {
    let settings = shared_data.settings;
    let reference = unit.reference.as_str();
    let category = unit.category.as_str();

    let mut stats = FingerprintStats {
        work_unit_count: 1,
        ..Default::default()
    };

    // Per-sample tips indexed as [strand][sample]
    let mut strand_sample_tips: [Vec<_>; Strand::COUNT] = Default::default();
    for (sample_index, tip_source) in tip_sources.iter_mut().enumerate() {
        let tips = tip_source.read_tips(reference, category)?;
        stats.tip_count += tips.len();
        let group = TipGroup::new(sample_index, reference, category, tips);
        debug!(
            "Read {} tips for sample index {} on {} category '{}'",
            group.tips.len(),
            group.sample_index,
            group.reference,
            group.category
        );
        for (strand_index, tips) in group.into_strand_tips().into_iter().enumerate() {
            strand_sample_tips[strand_index].push(tips);
        }
    }

    let mut strand_loci: [Vec<Locus>; Strand::COUNT] = Default::default();
    for strand in Strand::iter() {
        let sample_tips = &strand_sample_tips[strand.index()];
        let clusters = sample_tips
            .iter()
            .enumerate()
            .flat_map(|(sample_index, tips)| {
                cluster_tips(
                    &settings.cluster,
                    reference,
                    category,
                    sample_index,
                    strand,
                    tips.clone(),
                )
            })
            .collect::<Vec<_>>();
        stats.cluster_count += clusters.len();

        let loci = get_strand_loci(
            &settings.merge,
            reference,
            category,
            strand,
            clusters,
            sample_tips,
        );
        stats.locus_count += loci.len();
        strand_loci[strand.index()] = loci;
    }

    let [mut forward_loci, mut reverse_loci] = strand_loci;
    let records = match settings.join_distance {
        Some(join_distance) => {
            if let Some(known_elements) = shared_data.known_elements {
                match_known_elements(&mut forward_loci, known_elements, join_distance);
                match_known_elements(&mut reverse_loci, known_elements, join_distance);
                stats.matched_locus_count = forward_loci
                    .iter()
                    .chain(reverse_loci.iter())
                    .filter(|x| x.known_element.is_some())
                    .count();
            }
            join_loci(forward_loci, reverse_loci, join_distance)
        }
        None => forward_loci
            .into_iter()
            .chain(reverse_loci)
            .map(ResultRecord::Single)
            .collect(),
    };
    stats.joined_pair_count = records
        .iter()
        .filter(|x| matches!(x, ResultRecord::Joined(_)))
        .count();

    debug!(
        "Finished work unit {reference} category '{category}': {} tips, {} clusters, {} records",
        stats.tip_count,
        stats.cluster_count,
        records.len()
    );

    Ok((records, stats))
}

/// Process all work units over the worker pool
///
/// Results are gathered by unit index, so the output does not depend on completion order. After
/// the first failed unit, no further units are started, and that first error is returned without
/// any records.
///
pub fn process_work_units<S: TipSource + Send>(
    thread_count: usize,
    worker_thread_dataset: TipSourceWorkerThreadDataSet<S>,
    shared_data: &SharedUnitData,
    units: &[WorkUnit],
) -> FingerprintResult<WorkUnitResult> {
    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .unwrap();

    info!(
        "Starting fingerprint of {} work units on {thread_count} threads",
        units.len()
    );

    let is_cancelled = &AtomicBool::new(false);
    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for (unit_index, unit) in units.iter().enumerate() {
            let worker_thread_dataset = worker_thread_dataset.clone();
            let tx = tx.clone();
            scope.spawn(move |_| {
                if is_cancelled.load(Ordering::Relaxed) {
                    return;
                }

                let worker_id = rayon::current_thread_index().unwrap();
                let tip_sources =
                    &mut worker_thread_dataset[worker_id].lock().unwrap().tip_sources;

                let result = process_work_unit(shared_data, tip_sources, unit);
                if result.is_err() {
                    is_cancelled.store(true, Ordering::Relaxed);
                }
                tx.send((unit_index, result)).unwrap();
            });
        }
    });

    let mut unit_results = (0..units.len()).map(|_| None).collect::<Vec<_>>();
    for (unit_index, result) in rx {
        match result {
            Ok(x) => unit_results[unit_index] = Some(x),
            Err(e) => return Err(e),
        }
    }

    let mut records = Vec::new();
    let mut stats = FingerprintStats::default();
    for (unit_records, unit_stats) in unit_results.into_iter().flatten() {
        records.extend(unit_records);
        stats.merge(&unit_stats);
    }

    info!("Finished fingerprint of all work units");

    Ok((records, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FingerprintError;
    use crate::read_tips::ReadTip;
    use crate::read_tips::test_utils::{MemoryTipSource, tip};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use crate::worker_thread_data::get_tip_source_worker_thread_data;

    fn get_test_settings(join_distance: Option<i64>) -> WorkUnitSettings {
        WorkUnitSettings {
            cluster: DensityClusterSettings {
                minimum_reads: 2,
                epsilon: 100,
                minimum_epsilon: 0,
                hierarchical: false,
            },
            merge: MergeSettings {
                fingerprint_buffer: 5,
                n_common_elements: 3,
            },
            join_distance,
        }
    }

    fn add_tips(source: &mut MemoryTipSource, reference: &str, strand: Strand, positions: &[i64]) {
        for &pos in positions {
            let name = format!("Gypsy_{}_{reference}_{strand}_{pos}", source.sample_name);
            source.add(reference, tip(pos, strand, &name, Some("Gypsy1")));
        }
    }

    fn get_test_sources() -> Vec<MemoryTipSource> {
        let mut source_a = MemoryTipSource::new("sampleA");
        add_tips(&mut source_a, "chr1", Strand::Forward, &[10, 20, 1000]);
        add_tips(&mut source_a, "chr1", Strand::Reverse, &[60, 70]);
        add_tips(&mut source_a, "chr2", Strand::Forward, &[500, 510, 520]);

        let mut source_b = MemoryTipSource::new("sampleB");
        add_tips(&mut source_b, "chr1", Strand::Forward, &[15, 25]);
        vec![source_a, source_b]
    }

    fn get_references() -> Vec<String> {
        vec!["chr1".to_string(), "chr2".to_string(), "chr3".to_string()]
    }

    #[test]
    fn test_get_work_units() {
        let categories = ["Gypsy".to_string(), "Copia".to_string()];
        let units = get_work_units(&get_references(), &categories);
        assert_eq!(units.len(), 6);
        assert_eq!(
            units[1],
            WorkUnit {
                reference: "chr1".to_string(),
                category: "Copia".to_string(),
            }
        );
        assert_eq!(units[2].reference, "chr2");
    }

    #[test]
    fn test_process_work_unit() {
        let settings = get_test_settings(None);
        let shared_data = SharedUnitData {
            settings: &settings,
            known_elements: None,
        };
        let mut sources = get_test_sources();
        let unit = WorkUnit {
            reference: "chr1".to_string(),
            category: "Gypsy".to_string(),
        };
        let (records, stats) = process_work_unit(&shared_data, &mut sources, &unit).unwrap();
        assert_eq!(stats.tip_count, 7);
        assert_eq!(stats.cluster_count, 3);
        assert_eq!(records.len(), 2);

        let forward = records
            .iter()
            .find(|x| x.strand() == Some(Strand::Forward))
            .unwrap();
        assert_eq!(forward.range().start, 10);
        assert_eq!(forward.range().stop, 25);
        let counts = forward
            .strand_samples(Strand::Forward)
            .unwrap()
            .iter()
            .map(|x| x.read_count)
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![2, 2]);

        // Sample B has no reverse tips, but still gets an explicit zero entry
        let reverse = records
            .iter()
            .find(|x| x.strand() == Some(Strand::Reverse))
            .unwrap();
        let reverse_samples = reverse.strand_samples(Strand::Reverse).unwrap();
        assert_eq!(reverse_samples.len(), 2);
        assert_eq!(reverse_samples[1].read_count, 0);

        // An unknown category yields no records and no error
        let unit = WorkUnit {
            reference: "chr1".to_string(),
            category: "Copia".to_string(),
        };
        let (records, _) = process_work_unit(&shared_data, &mut sources, &unit).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_process_work_unit_join() {
        let settings = get_test_settings(Some(100));
        let shared_data = SharedUnitData {
            settings: &settings,
            known_elements: None,
        };
        let mut sources = get_test_sources();
        let unit = WorkUnit {
            reference: "chr1".to_string(),
            category: "Gypsy".to_string(),
        };
        let (records, stats) = process_work_unit(&shared_data, &mut sources, &unit).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(stats.joined_pair_count, 1);
        assert_eq!(records[0].id(), "Gypsy_chr1_+_10");
        assert_eq!(records[0].partner_id().unwrap(), "Gypsy_chr1_-_60");
    }

    fn run_test_units(
        thread_count: usize,
        sources: Vec<MemoryTipSource>,
        units: &[WorkUnit],
    ) -> FingerprintResult<WorkUnitResult> {
        let settings = get_test_settings(None);
        let shared_data = SharedUnitData {
            settings: &settings,
            known_elements: None,
        };
        let dataset =
            get_tip_source_worker_thread_data(thread_count, || Ok(sources.clone())).unwrap();
        process_work_units(thread_count, dataset, &shared_data, units)
    }

    #[test]
    fn test_process_work_units() {
        let units = get_work_units(&get_references(), &["Gypsy".to_string()]);
        let (records, stats) = run_test_units(1, get_test_sources(), &units).unwrap();
        assert_eq!(stats.work_unit_count, 3);
        assert_eq!(stats.tip_count, 10);
        assert_eq!(records.len(), 3);

        let get_ids =
            |records: &[ResultRecord]| records.iter().map(|x| x.id()).collect::<Vec<_>>();
        let expected_ids = get_ids(&records);
        for thread_count in [2, 4] {
            let (records, other_stats) =
                run_test_units(thread_count, get_test_sources(), &units).unwrap();
            assert_eq!(get_ids(&records), expected_ids);
            assert_eq!(other_stats, stats);
        }
    }

    #[test]
    fn test_process_work_units_failure() {
        let mut sources = get_test_sources();
        sources[1].fail_on_reference = Some("chr2".to_string());

        let units = get_work_units(&get_references(), &["Gypsy".to_string()]);
        for thread_count in [1, 3] {
            let result = run_test_units(thread_count, sources.clone(), &units);
            assert!(matches!(result, Err(FingerprintError::SourceRead { .. })));
        }
    }

    /// Tip source which fails every request, counting the requests shared across all clones
    #[derive(Clone)]
    struct FailingTipSource {
        request_count: Arc<AtomicUsize>,
    }

    impl TipSource for FailingTipSource {
        fn sample_name(&self) -> &str {
            "failing"
        }

        fn read_tips(&mut self, reference: &str, _: &str) -> FingerprintResult<Vec<ReadTip>> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            Err(FingerprintError::source_read(
                "failing source",
                format!("reference '{reference}'"),
                "simulated read failure",
            ))
        }
    }

    #[test]
    fn test_no_units_started_after_failure() {
        let request_count = Arc::new(AtomicUsize::new(0));
        let source = FailingTipSource {
            request_count: request_count.clone(),
        };
        let settings = get_test_settings(None);
        let shared_data = SharedUnitData {
            settings: &settings,
            known_elements: None,
        };

        // A single worker runs units one at a time, so the first failure cancels all others
        let dataset =
            get_tip_source_worker_thread_data(1, || Ok(vec![source.clone(), source.clone()]))
                .unwrap();
        let categories = ["Gypsy".to_string(), "Copia".to_string()];
        let units = get_work_units(&get_references(), &categories);
        assert_eq!(units.len(), 6);

        let result = process_work_units(1, dataset, &shared_data, &units);
        assert!(matches!(result, Err(FingerprintError::SourceRead { .. })));
        assert_eq!(request_count.load(Ordering::SeqCst), 1);
    }
}
