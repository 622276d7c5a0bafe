//! Known transposable element annotations, indexed for nearest-element queries
//!

use std::collections::HashMap;

use bio::data_structures::interval_tree::IntervalTree;
use log::info;

use crate::error::{FingerprintError, FingerprintResult};
use crate::int_range::{IntRange, get_int_range_distance};

/// An annotated element, in 1-indexed closed coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct KnownElement {
    pub range: IntRange,
    pub name: String,
}

/// The known element associated with a locus
#[derive(Clone, Debug, PartialEq)]
pub struct ElementMatch {
    pub name: String,
    pub range: IntRange,

    /// Nearest-edge distance from the locus, 0 if they overlap
    pub distance: i64,
}

/// Known elements of one reference sequence
///
#[derive(Clone)]
pub struct ChromElements {
    elements: IntervalTree<i64, KnownElement>,
}

impl ChromElements {
    pub fn new() -> Self {
        Self {
            elements: IntervalTree::new(),
        }
    }

    pub fn add_element(&mut self, element: KnownElement) {
        let range = element.range;
        self.elements.insert(range.start..range.stop + 1, element);
    }

    /// Find the element nearest to `range` among those within `max_distance` with names starting
    /// with `category`
    ///
    /// Ties in distance go to the element with the earliest start.
    ///
    pub fn find_nearest(
        &self,
        range: &IntRange,
        category: &str,
        max_distance: i64,
    ) -> Option<ElementMatch> {
        let search_range = range.expanded_by(max_distance);
        self.elements
            .find(search_range.start..search_range.stop + 1)
            .map(|x| x.data())
            .filter(|x| x.name.starts_with(category))
            .map(|x| ElementMatch {
                name: x.name.clone(),
                range: x.range,
                distance: get_int_range_distance(range, &x.range),
            })
            .min_by(|a, b| {
                (a.distance, a.range, &a.name).cmp(&(b.distance, b.range, &b.name))
            })
    }
}

#[derive(Clone, Default)]
pub struct KnownElements {
    pub chroms: HashMap<String, ChromElements>,
}

/// Get the element name from a GFF attribute column
///
/// The Name attribute is preferred, then ID.
///
fn get_gff_element_name(attributes: &str) -> Option<&str> {
    let mut id = None;
    for attribute in attributes.split(';') {
        match attribute.trim().split_once('=') {
            Some(("Name", val)) if !val.is_empty() => return Some(val),
            Some(("ID", val)) if !val.is_empty() => id = Some(val),
            _ => {}
        }
    }
    id
}

impl KnownElements {
    pub fn add_element(&mut self, reference: &str, element: KnownElement) {
        self.chroms
            .entry(reference.to_owned())
            .or_insert_with(ChromElements::new)
            .add_element(element);
    }

    /// Find the nearest element on `reference`, see [ChromElements::find_nearest]
    ///
    pub fn find_nearest(
        &self,
        reference: &str,
        range: &IntRange,
        category: &str,
        max_distance: i64,
    ) -> Option<ElementMatch> {
        self.chroms
            .get(reference)
            .and_then(|x| x.find_nearest(range, category, max_distance))
    }

    /// Load elements from a GFF3 file, which may be bgzip-compressed
    ///
    /// Comment and directive lines are skipped, and reading stops at an embedded FASTA section.
    /// Elements are named from the Name attribute, then the ID attribute, then the feature type.
    ///
    pub fn from_gff(filename: &str) -> FingerprintResult<Self> {
        use rust_htslib::bgzf;
        use std::io::Read;

        info!("Reading known elements from file '{filename}'");

        let input = format!("known elements file '{filename}'");
        let mut reader = bgzf::Reader::from_path(filename)
            .map_err(|e| FingerprintError::source_read(&input, "open", e))?;

        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| FingerprintError::source_read(&input, "read", e))?;

        let mut known_elements = Self::default();
        let mut element_count = 0;
        for (line_index, line) in content.lines().enumerate() {
            if line.starts_with("##FASTA") {
                break;
            }
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line_error = |msg: String| {
                FingerprintError::source_read(&input, format!("line {}", line_index + 1), msg)
            };

            let words = line.split('\t').collect::<Vec<_>>();
            if words.len() < 9 {
                return Err(line_error(format!(
                    "expected 9 tab-separated columns, found {}",
                    words.len()
                )));
            }
            let parse_pos = |word: &str| {
                word.parse::<i64>()
                    .map_err(|_| line_error(format!("invalid coordinate '{word}'")))
            };
            let start = parse_pos(words[3])?;
            let stop = parse_pos(words[4])?;
            if start < 1 || start > stop {
                return Err(line_error(format!("invalid element range {start}-{stop}")));
            }

            let name = get_gff_element_name(words[8]).unwrap_or(words[2]);
            known_elements.add_element(
                words[0],
                KnownElement {
                    range: IntRange::from_pair(start, stop),
                    name: name.to_string(),
                },
            );
            element_count += 1;
        }

        info!(
            "Read {element_count} known elements on {} reference sequences",
            known_elements.chroms.len()
        );

        Ok(known_elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn element(start: i64, stop: i64, name: &str) -> KnownElement {
        KnownElement {
            range: IntRange::from_pair(start, stop),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_get_gff_element_name() {
        assert_eq!(get_gff_element_name("ID=te1;Name=Gypsy7"), Some("Gypsy7"));
        assert_eq!(get_gff_element_name("ID=te1;Note=x"), Some("te1"));
        assert_eq!(get_gff_element_name("Note=x"), None);
        assert_eq!(get_gff_element_name("."), None);
    }

    #[test]
    fn test_find_nearest() {
        let mut known_elements = KnownElements::default();
        known_elements.add_element("chr1", element(100, 200, "Gypsy1"));
        known_elements.add_element("chr1", element(300, 400, "Gypsy2"));
        known_elements.add_element("chr1", element(240, 260, "Copia1"));

        let locus = IntRange::from_pair(230, 250);
        let nearest = known_elements.find_nearest("chr1", &locus, "Gypsy", 100).unwrap();
        assert_eq!(nearest.name, "Gypsy1");
        assert_eq!(nearest.distance, 30);

        // An empty category accepts the overlapping Copia1
        let nearest = known_elements.find_nearest("chr1", &locus, "", 100).unwrap();
        assert_eq!(nearest.name, "Copia1");
        assert_eq!(nearest.distance, 0);

        assert!(known_elements.find_nearest("chr1", &locus, "Gypsy", 29).is_none());
        assert!(known_elements.find_nearest("chr1", &locus, "Gypsy", 30).is_some());
        assert!(known_elements.find_nearest("chr2", &locus, "", 1000).is_none());
    }

    #[test]
    fn test_find_nearest_tie() {
        let mut known_elements = KnownElements::default();
        known_elements.add_element("chr1", element(300, 310, "Gypsy2"));
        known_elements.add_element("chr1", element(180, 190, "Gypsy1"));

        let nearest = known_elements
            .find_nearest("chr1", &IntRange::from_pair(240, 250), "", 100)
            .unwrap();
        assert_eq!(nearest.name, "Gypsy1");
        assert_eq!(nearest.distance, 50);
    }

    #[test]
    fn test_from_gff() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("elements.gff3");
        {
            let mut f = std::fs::File::create(&filename).unwrap();
            writeln!(f, "##gff-version 3").unwrap();
            writeln!(
                f,
                "chr1\trm\ttransposable_element\t100\t200\t.\t+\t.\tID=te1;Name=Gypsy1"
            )
            .unwrap();
            writeln!(f, "# comment").unwrap();
            writeln!(f, "chr2\trm\tCopia\t50\t60\t.\t-\t.\t.").unwrap();
            writeln!(f, "##FASTA").unwrap();
            writeln!(f, ">chr1").unwrap();
        }
        let known_elements = KnownElements::from_gff(filename.to_str().unwrap()).unwrap();
        assert_eq!(known_elements.chroms.len(), 2);

        let nearest = known_elements
            .find_nearest("chr2", &IntRange::from_pair(70, 70), "", 10)
            .unwrap();
        assert_eq!(nearest.name, "Copia");
        assert_eq!(nearest.range, IntRange::from_pair(50, 60));
    }

    #[test]
    fn test_from_gff_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("elements.gff3");
        {
            let mut f = std::fs::File::create(&filename).unwrap();
            writeln!(f, "chr1\trm\tGypsy\t200\t100\t.\t+\t.\tName=Gypsy1").unwrap();
        }
        let result = KnownElements::from_gff(filename.to_str().unwrap());
        assert!(matches!(result, Err(FingerprintError::SourceRead { .. })));

        assert!(KnownElements::from_gff("/nonexistent/elements.gff3").is_err());
    }
}
