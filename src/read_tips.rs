//! Read tip data model and the alignment source capability used to extract tips
//!

use strum::{Display, EnumIter, EnumString};

use crate::error::FingerprintResult;

#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Strand {
    #[strum(to_string = "+")]
    Forward,
    #[strum(to_string = "-")]
    Reverse,
}

impl Strand {
    pub const COUNT: usize = 2;

    pub fn index(&self) -> usize {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }
}

/// The single genomic coordinate derived from one read
///
/// The reference and category of a tip are carried by the enclosing [TipGroup], because every tip
/// extracted for a work unit shares them.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadTip {
    /// 1-indexed anchor position
    pub position: i64,
    pub strand: Strand,
    pub read_name: String,

    /// Element name of the read's mate, taken from the mate element aux tag
    pub mate_element: Option<String>,
}

/// All tips of one sample for one (reference, category) work unit, sorted by position
///
pub struct TipGroup {
    pub sample_index: usize,
    pub reference: String,
    pub category: String,
    pub tips: Vec<ReadTip>,
}

impl TipGroup {
    pub fn new(
        sample_index: usize,
        reference: &str,
        category: &str,
        mut tips: Vec<ReadTip>,
    ) -> Self {
        tips.sort_by(|a, b| {
            (a.position, a.strand, &a.read_name).cmp(&(b.position, b.strand, &b.read_name))
        });
        Self {
            sample_index,
            reference: reference.to_string(),
            category: category.to_string(),
            tips,
        }
    }

    /// Split into one position-sorted tip list per strand, indexed by [Strand::index]
    pub fn into_strand_tips(self) -> [Vec<ReadTip>; Strand::COUNT] {
        let mut strand_tips: [Vec<ReadTip>; Strand::COUNT] = Default::default();
        for tip in self.tips {
            strand_tips[tip.strand.index()].push(tip);
        }
        strand_tips
    }
}

/// Capability to produce filtered read tips from one sample's alignments
///
/// Implementations own their file handle, so each worker thread needs its own instance.
///
pub trait TipSource {
    fn sample_name(&self) -> &str;

    /// Return all tips on `reference` from reads passing the mapping quality threshold, whose
    /// names start with `category`
    ///
    /// The result does not need to be sorted. An empty result is valid.
    ///
    fn read_tips(&mut self, reference: &str, category: &str) -> FingerprintResult<Vec<ReadTip>>;
}


#[cfg(test)]
mod tests {
    use super::test_utils::tip;
    use super::*;

    #[test]
    fn test_strand_labels() {
        assert_eq!(Strand::Forward.to_string(), "+");
        assert_eq!(Strand::Reverse.to_string(), "-");
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Reverse);
        assert!("x".parse::<Strand>().is_err());
    }

    #[test]
    fn test_tip_group_strand_split() {
        let tips = vec![
            tip(30, Strand::Reverse, "r1", None),
            tip(10, Strand::Forward, "f1", Some("Gypsy1")),
            tip(20, Strand::Forward, "f2", None),
            tip(5, Strand::Reverse, "r2", None),
        ];
        let group = TipGroup::new(0, "chr1", "", tips);
        assert_eq!(
            group.tips.iter().map(|x| x.position).collect::<Vec<_>>(),
            vec![5, 10, 20, 30]
        );

        let [forward, reverse] = group.into_strand_tips();
        assert_eq!(forward.iter().map(|x| x.position).collect::<Vec<_>>(), vec![10, 20]);
        assert_eq!(reverse.iter().map(|x| x.position).collect::<Vec<_>>(), vec![5, 30]);
    }
}
