//! Match loci to known elements and join loci flanking the same insertion
//!

use std::collections::BTreeMap;

use log::debug;

use crate::fingerprint::{Locus, SampleLocusStats};
use crate::int_range::{IntRange, get_int_range_distance};
use crate::known_elements::{ElementMatch, KnownElements};
use crate::read_tips::Strand;

/// Two loci identified as the left and right flanks of one insertion
///
/// The left flank is formed by forward strand tips and the right flank by reverse strand tips.
///
#[derive(Clone, Debug)]
pub struct JoinedPair {
    pub forward: Locus,
    pub reverse: Locus,
}

/// One finalized row of the result table
#[derive(Clone, Debug)]
pub enum ResultRecord {
    Single(Locus),
    Joined(JoinedPair),
}

impl ResultRecord {
    fn first_locus(&self) -> &Locus {
        match self {
            Self::Single(x) => x,
            Self::Joined(x) => &x.forward,
        }
    }

    pub fn reference(&self) -> &str {
        &self.first_locus().reference
    }

    pub fn category(&self) -> &str {
        &self.first_locus().category
    }

    /// Strand of a single locus, or none for a joined pair
    pub fn strand(&self) -> Option<Strand> {
        match self {
            Self::Single(x) => Some(x.strand),
            Self::Joined(_) => None,
        }
    }

    pub fn range(&self) -> IntRange {
        match self {
            Self::Single(x) => x.range,
            Self::Joined(x) => {
                let mut range = x.forward.range;
                range.merge(&x.reverse.range);
                range
            }
        }
    }

    pub fn support(&self) -> u32 {
        match self {
            Self::Single(x) => x.support,
            Self::Joined(x) => std::cmp::max(x.forward.support, x.reverse.support),
        }
    }

    pub fn id(&self) -> String {
        self.first_locus().id()
    }

    /// Id of the joined reverse strand locus
    pub fn partner_id(&self) -> Option<String> {
        match self {
            Self::Single(_) => None,
            Self::Joined(x) => Some(x.reverse.id()),
        }
    }

    /// The nearest known element matched to either locus of the record
    pub fn known_element(&self) -> Option<&ElementMatch> {
        match self {
            Self::Single(x) => x.known_element.as_ref(),
            Self::Joined(x) => [&x.forward.known_element, &x.reverse.known_element]
                .into_iter()
                .flatten()
                .min_by_key(|x| (x.distance, x.range)),
        }
    }

    /// Per-sample statistics of the given strand, if the record includes a locus on that strand
    pub fn strand_samples(&self, strand: Strand) -> Option<&[SampleLocusStats]> {
        match self {
            Self::Single(x) if x.strand == strand => Some(x.samples.as_slice()),
            Self::Single(_) => None,
            Self::Joined(x) => Some(match strand {
                Strand::Forward => x.forward.samples.as_slice(),
                Strand::Reverse => x.reverse.samples.as_slice(),
            }),
        }
    }

    /// All loci in the record
    pub fn loci(&self) -> Vec<&Locus> {
        match self {
            Self::Single(x) => vec![x],
            Self::Joined(x) => vec![&x.forward, &x.reverse],
        }
    }
}

/// Associate each locus with its nearest known element within `join_distance`
///
/// Elements must be on the locus reference and named with the locus category as a prefix.
///
pub fn match_known_elements(
    loci: &mut [Locus],
    known_elements: &KnownElements,
    join_distance: i64,
) {
    for locus in loci.iter_mut() {
        locus.known_element = known_elements.find_nearest(
            &locus.reference,
            &locus.range,
            &locus.category,
            join_distance,
        );
    }
}

/// Search radius for joining two loci
///
/// A matched element anchors the insertion, so the full join distance is used. Otherwise each
/// flank must be searched in both directions, which halves the radius.
///
fn get_join_threshold(forward: &Locus, reverse: &Locus, join_distance: i64) -> i64 {
    if forward.known_element.is_some() || reverse.known_element.is_some() {
        join_distance
    } else {
        join_distance / 2
    }
}

/// Return all (forward index, reverse index, distance) pairs eligible for joining
///
/// A reverse locus qualifies when its start is not before the forward locus start and the
/// nearest-edge distance is within the join threshold. Both inputs must be sorted by range.
///
fn get_join_candidates(
    forward_loci: &[Locus],
    reverse_loci: &[Locus],
    join_distance: i64,
) -> Vec<(usize, usize, i64)> {
    let mut candidates = Vec::new();
    for (forward_index, forward) in forward_loci.iter().enumerate() {
        let first_reverse_index =
            reverse_loci.partition_point(|x| x.range.start < forward.range.start);
        for (reverse_index, reverse) in reverse_loci.iter().enumerate().skip(first_reverse_index) {
            if reverse.range.start > forward.range.stop.saturating_add(join_distance) {
                break;
            }
            let distance = get_int_range_distance(&forward.range, &reverse.range);
            if distance <= get_join_threshold(forward, reverse, join_distance) {
                candidates.push((forward_index, reverse_index, distance));
            }
        }
    }
    candidates
}

/// Join forward and reverse loci of one (reference, category) unit by mutual nearest neighbor
///
/// Each locus nominates its nearest eligible partner, with ties going to the partner with the
/// earliest start and then the earliest stop. A pair is joined only if both loci nominate each
/// other. All nominations are made before any pair is joined, so the result does not depend on
/// the order of evaluation.
///
/// Returns joined pairs and all remaining single loci, in no particular order.
///
pub fn join_loci(
    mut forward_loci: Vec<Locus>,
    mut reverse_loci: Vec<Locus>,
    join_distance: i64,
) -> Vec<ResultRecord> {
    forward_loci.sort_by_key(|x| x.range);
    reverse_loci.sort_by_key(|x| x.range);

    let candidates = get_join_candidates(&forward_loci, &reverse_loci, join_distance);

    let mut forward_best = BTreeMap::new();
    let mut reverse_best = BTreeMap::new();
    for &(forward_index, reverse_index, distance) in candidates.iter() {
        let forward_key = (distance, reverse_loci[reverse_index].range, reverse_index);
        forward_best
            .entry(forward_index)
            .and_modify(|x: &mut (i64, IntRange, usize)| {
                if forward_key < *x {
                    *x = forward_key;
                }
            })
            .or_insert(forward_key);

        let reverse_key = (distance, forward_loci[forward_index].range, forward_index);
        reverse_best
            .entry(reverse_index)
            .and_modify(|x: &mut (i64, IntRange, usize)| {
                if reverse_key < *x {
                    *x = reverse_key;
                }
            })
            .or_insert(reverse_key);
    }

    let mut partners = vec![None; forward_loci.len()];
    let mut is_reverse_joined = vec![false; reverse_loci.len()];
    for (&forward_index, &(_, _, reverse_index)) in forward_best.iter() {
        if reverse_best.get(&reverse_index).map(|x| x.2) == Some(forward_index) {
            partners[forward_index] = Some(reverse_index);
            is_reverse_joined[reverse_index] = true;
        }
    }

    let mut reverse_loci = reverse_loci.into_iter().map(Some).collect::<Vec<_>>();
    let mut records = Vec::new();
    for (forward, partner) in forward_loci.into_iter().zip(partners) {
        let reverse = partner.and_then(|x| reverse_loci[x].take());
        records.push(match reverse {
            Some(reverse) => ResultRecord::Joined(JoinedPair { forward, reverse }),
            None => ResultRecord::Single(forward),
        });
    }
    let joined_count = is_reverse_joined.iter().filter(|&&x| x).count();
    records.extend(reverse_loci.into_iter().flatten().map(ResultRecord::Single));

    debug!(
        "Joined {joined_count} locus pairs from {} candidate pairs",
        candidates.len()
    );

    records
}
