//! Merge per-sample clusters into loci shared across all samples
//!

use itertools::Itertools;
use log::debug;

use crate::density_cluster::Cluster;
use crate::int_range::IntRange;
use crate::known_elements::ElementMatch;
use crate::read_tips::{ReadTip, Strand};

#[derive(Clone, Debug)]
pub struct MergeSettings {
    /// Slack added to both ends of each cluster interval when deciding whether clusters merge
    pub fingerprint_buffer: i64,

    /// Number of most frequent mate element names reported per sample in each locus
    pub n_common_elements: usize,
}

/// Statistics for one sample within one locus
///
/// Every locus carries one entry per sample, so absence is recorded as zero counts rather than
/// a missing entry.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleLocusStats {
    /// Total size of this sample's clusters merged into the locus
    pub read_count: usize,

    /// Count of all this sample's tips on the locus strand within the locus bounds
    pub tip_count: usize,

    /// Most frequent mate element names, by descending count and then name
    pub common_elements: Vec<String>,

    pub supporting_read_names: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Locus {
    pub reference: String,
    pub category: String,
    pub strand: Strand,

    /// Union of the unbuffered member cluster intervals
    pub range: IntRange,

    /// Highest support of any member cluster
    pub support: u32,

    /// Per-sample statistics, indexed by sample index
    pub samples: Vec<SampleLocusStats>,

    pub known_element: Option<ElementMatch>,
}

impl Locus {
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.category, self.reference, self.strand, self.range.start
        )
    }
}

/// Return the `n` most common mate element names in `tips`
///
/// Ties in count are ranked by ascending name.
///
pub fn get_common_elements<'a>(tips: impl Iterator<Item = &'a ReadTip>, n: usize) -> Vec<String> {
    tips.filter_map(|x| x.mate_element.as_deref())
        .counts()
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)))
        .take(n)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Count the tips of a position-sorted tip list within `range`
fn get_tip_count_in_range(tips: &[ReadTip], range: &IntRange) -> usize {
    let start_index = tips.partition_point(|x| x.position < range.start);
    let end_index = tips.partition_point(|x| x.position <= range.stop);
    end_index - start_index
}

/// Group clusters into runs whose buffered intervals overlap, transitively
///
/// Clusters are sorted on their full interval and sample index first, so the grouping does not
/// depend on input order.
///
fn get_merged_cluster_groups(mut clusters: Vec<Cluster>, buffer: i64) -> Vec<Vec<Cluster>> {
    clusters.sort_by(|a, b| {
        (a.range, a.sample_index, &a.tips[0].read_name).cmp(&(
            b.range,
            b.sample_index,
            &b.tips[0].read_name,
        ))
    });

    let mut groups: Vec<Vec<Cluster>> = Vec::new();
    let mut group_stop = i64::MIN;
    for cluster in clusters {
        let buffered_range = cluster.range.expanded_by(buffer);
        match groups.last_mut() {
            Some(group) if buffered_range.start <= group_stop => {
                group_stop = std::cmp::max(group_stop, buffered_range.stop);
                group.push(cluster);
            }
            _ => {
                group_stop = buffered_range.stop;
                groups.push(vec![cluster]);
            }
        }
    }
    groups
}

/// Build all loci for one strand of a (reference, category) unit
///
/// # Arguments
/// * `clusters` - clusters of all samples on this strand
/// * `sample_strand_tips` - the position-sorted tips of each sample on this strand, indexed by
///   sample index. This also defines the sample count.
///
pub fn get_strand_loci(
    settings: &MergeSettings,
    reference: &str,
    category: &str,
    strand: Strand,
    clusters: Vec<Cluster>,
    sample_strand_tips: &[Vec<ReadTip>],
) -> Vec<Locus> {
    debug_assert!(clusters.iter().all(|x| {
        x.reference == reference && x.category == category && x.strand == strand
    }));

    let sample_count = sample_strand_tips.len();
    let cluster_count = clusters.len();

    let loci = get_merged_cluster_groups(clusters, settings.fingerprint_buffer)
        .into_iter()
        .map(|group| {
            let mut range = group[0].range;
            for cluster in group.iter().skip(1) {
                range.merge(&cluster.range);
            }
            let support = group.iter().map(|x| x.support).max().unwrap_or(0);

            let samples = (0..sample_count)
                .map(|sample_index| {
                    let sample_clusters = group
                        .iter()
                        .filter(|x| x.sample_index == sample_index)
                        .collect::<Vec<_>>();
                    let member_tips = || sample_clusters.iter().flat_map(|x| x.tips.iter());
                    let strand_tips = &sample_strand_tips[sample_index];
                    SampleLocusStats {
                        read_count: sample_clusters.iter().map(|x| x.read_count()).sum(),
                        tip_count: get_tip_count_in_range(strand_tips, &range),
                        common_elements: get_common_elements(
                            member_tips(),
                            settings.n_common_elements,
                        ),
                        supporting_read_names: member_tips()
                            .map(|x| x.read_name.clone())
                            .collect(),
                    }
                })
                .collect();

            Locus {
                reference: reference.to_string(),
                category: category.to_string(),
                strand,
                range,
                support,
                samples,
                known_element: None,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        "Merged {cluster_count} clusters into {} loci on {reference} {strand} category '{category}'",
        loci.len()
    );

    loci
}
