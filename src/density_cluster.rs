//! Univariate density clustering of read tips
//!
//! Tips are clustered on sorted 1-D positions, so the epsilon-neighbor connected components are
//! simply maximal runs of positions where no gap between consecutive positions exceeds epsilon.
//!

use log::debug;

use crate::error::{FingerprintError, FingerprintResult};
use crate::int_range::{IntRange, MAX_DISTANCE};
use crate::read_tips::{ReadTip, Strand};

#[derive(Clone, Debug)]
pub struct DensityClusterSettings {
    /// Minimum number of tips in a reported cluster
    pub minimum_reads: usize,

    /// Maximum gap between consecutive tips of one cluster
    pub epsilon: i64,

    /// Lower bound of the epsilon sweep, used in hierarchical mode only
    pub minimum_epsilon: i64,

    pub hierarchical: bool,
}

impl DensityClusterSettings {
    pub fn validate(&self) -> FingerprintResult<()> {
        if self.minimum_reads == 0 {
            return Err(FingerprintError::Configuration(
                "minimum reads must be greater than 0".to_string(),
            ));
        }
        if self.epsilon <= 0 {
            return Err(FingerprintError::Configuration(format!(
                "epsilon must be greater than 0, found {}",
                self.epsilon
            )));
        }
        if self.epsilon > MAX_DISTANCE {
            return Err(FingerprintError::Configuration(format!(
                "epsilon must not exceed {MAX_DISTANCE}, found {}",
                self.epsilon
            )));
        }
        if self.minimum_epsilon < 0 {
            return Err(FingerprintError::Configuration(format!(
                "minimum epsilon must not be negative, found {}",
                self.minimum_epsilon
            )));
        }
        if self.minimum_epsilon > self.epsilon {
            return Err(FingerprintError::Configuration(format!(
                "minimum epsilon ({}) is greater than epsilon ({})",
                self.minimum_epsilon, self.epsilon
            )));
        }
        Ok(())
    }
}

/// A run of tips from one sample that are mutually close enough to be treated as one signal
///
#[derive(Clone, Debug)]
pub struct Cluster {
    pub reference: String,
    pub category: String,
    pub strand: Strand,
    pub sample_index: usize,
    pub range: IntRange,

    /// Member tips in position order, never fewer than the minimum reads setting
    pub tips: Vec<ReadTip>,

    /// Number of swept epsilon values at which this exact member set forms a valid cluster
    ///
    /// Always 1 in non-hierarchical mode.
    pub support: u32,
}

impl Cluster {
    pub fn read_count(&self) -> usize {
        self.tips.len()
    }
}

/// Find clusters in sorted positions and return them as half-open index slices
///
/// A new run starts wherever the gap between consecutive positions exceeds `epsilon`, so a gap of
/// exactly `epsilon` stays within the run. Runs with fewer than `minimum_reads` positions are
/// dropped.
///
pub fn get_cluster_slices(
    positions: &[i64],
    epsilon: i64,
    minimum_reads: usize,
) -> Vec<(usize, usize)> {
    debug_assert!(positions.windows(2).all(|x| x[0] <= x[1]));

    let mut slices = Vec::new();
    if positions.is_empty() {
        return slices;
    }

    let mut run_start = 0;
    for index in 1..=positions.len() {
        let is_run_end =
            index == positions.len() || positions[index] - positions[index - 1] > epsilon;
        if is_run_end {
            if index - run_start >= minimum_reads {
                slices.push((run_start, index));
            }
            run_start = index;
        }
    }
    slices
}

/// Largest gap between consecutive sorted positions, or 0 for fewer than two positions
pub fn get_max_internal_gap(positions: &[i64]) -> i64 {
    positions
        .windows(2)
        .map(|x| x[1] - x[0])
        .max()
        .unwrap_or(0)
}

/// Count the swept epsilon values for which a cluster found at `epsilon` keeps its exact member
/// set
///
/// The sweep covers every integer from `minimum_epsilon` to `epsilon` inclusive, in increasing
/// order. Lowering epsilon can never join a cluster with its neighbors, because the boundary gaps
/// already exceed `epsilon`. The member set therefore survives at a swept value exactly when that
/// value is at least the cluster's largest internal gap, and the sweep reduces to counting those
/// values.
///
pub fn get_sweep_support(max_internal_gap: i64, minimum_epsilon: i64, epsilon: i64) -> u32 {
    let persistence_epsilon = std::cmp::max(max_internal_gap, minimum_epsilon);
    if persistence_epsilon > epsilon {
        0
    } else {
        u32::try_from(epsilon - persistence_epsilon)
            .ok()
            .and_then(|x| x.checked_add(1))
            .unwrap_or(u32::MAX)
    }
}

/// Cluster the position sorted tips of one sample and strand
///
pub fn cluster_tips(
    settings: &DensityClusterSettings,
    reference: &str,
    category: &str,
    sample_index: usize,
    strand: Strand,
    tips: Vec<ReadTip>,
) -> Vec<Cluster> {
    let positions = tips.iter().map(|x| x.position).collect::<Vec<_>>();
    let slices = get_cluster_slices(&positions, settings.epsilon, settings.minimum_reads);

    let mut clusters = Vec::with_capacity(slices.len());
    let mut tips = tips.into_iter().enumerate().peekable();
    for (start_index, end_index) in slices {
        let cluster_positions = &positions[start_index..end_index];
        let support = if settings.hierarchical {
            get_sweep_support(
                get_max_internal_gap(cluster_positions),
                settings.minimum_epsilon,
                settings.epsilon,
            )
        } else {
            1
        };

        let mut cluster_tips = Vec::with_capacity(end_index - start_index);
        while let Some((index, tip)) = tips.next_if(|(index, _)| *index < end_index) {
            if index >= start_index {
                cluster_tips.push(tip);
            }
        }

        clusters.push(Cluster {
            reference: reference.to_string(),
            category: category.to_string(),
            strand,
            sample_index,
            range: IntRange::from_pair(positions[start_index], positions[end_index - 1]),
            tips: cluster_tips,
            support,
        });
    }

    debug!(
        "Found {} clusters from {} tips for sample index {sample_index} on {reference} {strand} category '{category}'",
        clusters.len(),
        positions.len(),
    );

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_tips::test_utils::forward_tips;

    fn flat_settings(minimum_reads: usize, epsilon: i64) -> DensityClusterSettings {
        DensityClusterSettings {
            minimum_reads,
            epsilon,
            minimum_epsilon: 0,
            hierarchical: false,
        }
    }

    /// Deterministic pseudo-random sorted positions
    fn get_test_positions(seed: u64, count: usize) -> Vec<i64> {
        let mut state = seed;
        let mut pos = 0i64;
        let mut positions = Vec::new();
        for _ in 0..count {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            pos += ((state >> 33) % 60) as i64;
            positions.push(pos);
        }
        positions
    }

    #[test]
    fn test_get_cluster_slices() {
        let positions = [10, 20, 1000];
        assert_eq!(get_cluster_slices(&positions, 100, 2), vec![(0, 2)]);
        assert_eq!(get_cluster_slices(&positions, 100, 1), vec![(0, 2), (2, 3)]);
        assert_eq!(get_cluster_slices(&positions, 980, 2), vec![(0, 3)]);
        assert!(get_cluster_slices(&[], 100, 1).is_empty());
    }

    #[test]
    fn test_gap_equal_to_epsilon_joins_run() {
        let positions = [0, 5, 10, 16];
        assert_eq!(get_cluster_slices(&positions, 5, 2), vec![(0, 3)]);
        assert_eq!(get_cluster_slices(&positions, 6, 2), vec![(0, 4)]);
    }

    #[test]
    fn test_cluster_slice_properties() {
        for seed in 0..20 {
            let positions = get_test_positions(seed, 200);
            for epsilon in [1, 10, 25, 40] {
                for minimum_reads in [1, 3, 7] {
                    let slices = get_cluster_slices(&positions, epsilon, minimum_reads);
                    for &(start, end) in slices.iter() {
                        assert!(end - start >= minimum_reads);
                        for i in start + 1..end {
                            assert!(positions[i] - positions[i - 1] <= epsilon);
                        }
                        if start > 0 {
                            assert!(positions[start] - positions[start - 1] > epsilon);
                        }
                        if end < positions.len() {
                            assert!(positions[end] - positions[end - 1] > epsilon);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_cluster_tips() {
        let settings = flat_settings(2, 100);
        let clusters = cluster_tips(
            &settings,
            "chr1",
            "Gypsy",
            0,
            Strand::Forward,
            forward_tips(&[10, 20, 1000, 1150, 1200, 1210]),
        );
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].range, IntRange::from_pair(10, 20));
        assert_eq!(clusters[0].read_count(), 2);
        assert_eq!(clusters[0].support, 1);
        assert_eq!(clusters[1].range, IntRange::from_pair(1150, 1210));
        assert_eq!(
            clusters[1].tips.iter().map(|x| x.read_name.as_str()).collect::<Vec<_>>(),
            vec!["read3", "read4", "read5"]
        );
        assert_eq!(clusters[1].category, "Gypsy");
    }

    #[test]
    fn test_get_sweep_support() {
        assert_eq!(get_sweep_support(10, 0, 100), 91);
        assert_eq!(get_sweep_support(10, 50, 100), 51);
        assert_eq!(get_sweep_support(100, 0, 100), 1);
        assert_eq!(get_sweep_support(101, 0, 100), 0);

        // Counts beyond the support type saturate
        assert_eq!(get_sweep_support(0, 0, i64::MAX), u32::MAX);
        assert_eq!(get_sweep_support(0, 0, u32::MAX as i64 - 1), u32::MAX);
    }

    /// Recount support by clustering at every swept epsilon
    fn get_brute_force_support(
        positions: &[i64],
        slice: (usize, usize),
        settings: &DensityClusterSettings,
    ) -> u32 {
        let mut support = 0;
        for epsilon in settings.minimum_epsilon..=settings.epsilon {
            let slices = get_cluster_slices(positions, epsilon, settings.minimum_reads);
            if slices.contains(&slice) {
                support += 1;
            }
        }
        support
    }

    #[test]
    fn test_hierarchical_support_matches_sweep() {
        for seed in 0..10 {
            let positions = get_test_positions(seed, 80);
            let tips = forward_tips(&positions);
            let settings = DensityClusterSettings {
                minimum_reads: 3,
                epsilon: 40,
                minimum_epsilon: 5,
                hierarchical: true,
            };
            let slices = get_cluster_slices(&positions, settings.epsilon, settings.minimum_reads);
            let clusters = cluster_tips(&settings, "chr1", "", 0, Strand::Forward, tips);
            assert_eq!(slices.len(), clusters.len());
            for (slice, cluster) in slices.into_iter().zip(clusters.iter()) {
                assert_eq!(
                    cluster.support,
                    get_brute_force_support(&positions, slice, &settings)
                );
                assert!(cluster.support >= 1);
            }
        }
    }

    #[test]
    fn test_hierarchical_support_monotonic_in_minimum_epsilon() {
        let positions = get_test_positions(7, 120);
        let mut last_supports: Option<Vec<u32>> = None;
        for minimum_epsilon in (0..=40).step_by(5) {
            let settings = DensityClusterSettings {
                minimum_reads: 2,
                epsilon: 40,
                minimum_epsilon,
                hierarchical: true,
            };
            let tips = forward_tips(&positions);
            let supports = cluster_tips(&settings, "chr1", "", 0, Strand::Forward, tips)
                .iter()
                .map(|x| x.support)
                .collect::<Vec<_>>();
            if let Some(last_supports) = last_supports {
                assert_eq!(last_supports.len(), supports.len());
                for (last, current) in last_supports.iter().zip(supports.iter()) {
                    assert!(current <= last);
                }
            }
            last_supports = Some(supports);
        }
    }

    #[test]
    fn test_validate_settings() {
        let mut settings = DensityClusterSettings {
            minimum_reads: 2,
            epsilon: 20,
            minimum_epsilon: 50,
            hierarchical: true,
        };
        assert!(matches!(settings.validate(), Err(FingerprintError::Configuration(_))));

        settings.hierarchical = false;
        assert!(settings.validate().is_err());

        settings.minimum_epsilon = 0;
        assert!(settings.validate().is_ok());

        settings.minimum_reads = 0;
        assert!(settings.validate().is_err());

        let settings = flat_settings(2, 0);
        assert!(settings.validate().is_err());

        let settings = flat_settings(2, MAX_DISTANCE + 1);
        assert!(matches!(settings.validate(), Err(FingerprintError::Configuration(_))));
    }
}
