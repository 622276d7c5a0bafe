//! Alignment file utilities and the alignment file implementation of [TipSource]
//!

use camino::Utf8Path;
use rust_htslib::bam::{self, Read};

use crate::error::{FingerprintError, FingerprintResult};
use crate::read_tips::{ReadTip, Strand, TipSource};

/// Return true for records that never contribute read tips
///
pub fn filter_out_alignment_record(record: &bam::Record) -> bool {
    record.is_unmapped()
        || record.is_secondary()
        || record.is_supplementary()
        || record.is_quality_check_failed()
        || record.is_duplicate()
}

/// Retrieve a string aux tag from a bam record
///
/// Returns an error message if the tag is present with a non-string value
///
pub fn get_optional_string_aux_tag(
    record: &bam::Record,
    aux_tag: &[u8],
) -> Result<Option<String>, String> {
    match record.aux(aux_tag) {
        Ok(bam::record::Aux::String(val)) => Ok(Some(val.to_string())),
        Ok(aux_val) => Err(format!(
            "Unexpected {} tag format in read {}: {:?}",
            String::from_utf8_lossy(aux_tag),
            String::from_utf8_lossy(record.qname()),
            aux_val,
        )),
        Err(_) => Ok(None),
    }
}

/// Get the 1-indexed tip position and strand of a mapped record
///
/// The tip is the read end facing the putative insertion: the last aligned reference base of a
/// forward strand read, or the first aligned reference base of a reverse strand read.
///
pub fn get_read_tip(record: &bam::Record) -> (i64, Strand) {
    if record.is_reverse() {
        (record.pos() + 1, Strand::Reverse)
    } else {
        // end_pos is the 0-indexed exclusive end, which equals the 1-indexed inclusive end
        (record.cigar().end_pos(), Strand::Forward)
    }
}

/// Sample name used for an alignment file in all output
pub fn get_sample_name(bam_filename: &str) -> String {
    let path = Utf8Path::new(bam_filename);
    match path.file_stem() {
        Some(x) if !x.is_empty() => x.to_string(),
        _ => bam_filename.to_string(),
    }
}

/// Reference sequence names from the alignment file header, in header order
pub fn get_reference_names(bam_filename: &str) -> FingerprintResult<Vec<String>> {
    let reader = bam::Reader::from_path(bam_filename).map_err(|e| {
        FingerprintError::source_read(
            format!("alignment file '{bam_filename}'"),
            "header",
            e,
        )
    })?;
    Ok(reader
        .header()
        .target_names()
        .into_iter()
        .map(|x| String::from_utf8_lossy(x).to_string())
        .collect())
}

pub struct BamTipSource {
    bam_filename: String,
    sample_name: String,
    min_mapq: u8,
    mate_element_tag: Vec<u8>,
    reader: bam::IndexedReader,
}

impl BamTipSource {
    pub fn new(
        bam_filename: &str,
        sample_name: &str,
        min_mapq: u8,
        mate_element_tag: &str,
    ) -> FingerprintResult<Self> {
        let reader = bam::IndexedReader::from_path(bam_filename).map_err(|e| {
            FingerprintError::source_read(
                format!("alignment file '{bam_filename}'"),
                format!("sample '{sample_name}'"),
                e,
            )
        })?;
        Ok(Self {
            bam_filename: bam_filename.to_string(),
            sample_name: sample_name.to_string(),
            min_mapq,
            mate_element_tag: mate_element_tag.as_bytes().to_vec(),
            reader,
        })
    }

    fn read_error(
        &self,
        reference: &str,
        category: &str,
        message: impl ToString,
    ) -> FingerprintError {
        FingerprintError::source_read(
            format!("alignment file '{}'", self.bam_filename),
            format!(
                "sample '{}' reference '{reference}' category '{category}'",
                self.sample_name
            ),
            message,
        )
    }
}

impl TipSource for BamTipSource {
    fn sample_name(&self) -> &str {
        &self.sample_name
    }

    fn read_tips(&mut self, reference: &str, category: &str) -> FingerprintResult<Vec<ReadTip>> {
        if let Err(e) = self.reader.fetch(reference) {
            return Err(self.read_error(reference, category, e));
        }

        let category_bytes = category.as_bytes();
        let mut tips = Vec::new();
        let mut record = bam::Record::new();
        while let Some(r) = self.reader.read(&mut record) {
            if let Err(e) = r {
                return Err(self.read_error(reference, category, e));
            }

            if filter_out_alignment_record(&record)
                || record.mapq() < self.min_mapq
                || !record.qname().starts_with(category_bytes)
            {
                continue;
            }

            let mate_element = match get_optional_string_aux_tag(&record, &self.mate_element_tag) {
                Ok(x) => x,
                Err(msg) => return Err(self.read_error(reference, category, msg)),
            };

            let (position, strand) = get_read_tip(&record);
            tips.push(ReadTip {
                position,
                strand,
                read_name: String::from_utf8_lossy(record.qname()).to_string(),
                mate_element,
            });
        }
        Ok(tips)
    }
}
