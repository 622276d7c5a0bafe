//! Write the result table views and supporting read names to the output directory
//!

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::{Compression, write::GzEncoder};
use log::info;

use crate::error::{FingerprintError, FingerprintResult};
use crate::result_table::{ResultTable, TableColumn};

pub const TABULAR_FILENAME: &str = "fingerprint.tsv";
pub const GFF_FILENAME: &str = "fingerprint.gff3";
pub const SUPPORTING_READS_FILENAME: &str = "supporting_reads.json.gz";

/// Key on sample name
type LocusSupportingReadNames = BTreeMap<String, Vec<String>>;

/// Key on locus id
type SupportingReadNames = BTreeMap<String, LocusSupportingReadNames>;

fn get_output_error(filename: &Utf8Path) -> impl Fn(std::io::Error) -> FingerprintError + '_ {
    move |error| FingerprintError::Output {
        filename: filename.to_string(),
        error,
    }
}

/// Write each line from `lines` to a new file
fn write_lines(filename: &Utf8Path, lines: impl Iterator<Item = String>) -> FingerprintResult<()> {
    let output_error = get_output_error(filename);
    let f = File::create(filename).map_err(&output_error)?;
    let mut f = BufWriter::new(f);
    for line in lines {
        writeln!(f, "{line}").map_err(&output_error)?;
    }
    f.flush().map_err(&output_error)?;
    Ok(())
}

pub fn write_tabular_output(
    output_dir: &Utf8Path,
    table: &ResultTable,
) -> FingerprintResult<Utf8PathBuf> {
    let filename = output_dir.join(TABULAR_FILENAME);
    info!("Writing fingerprint table to file: '{filename}'");
    write_lines(&filename, table.tabular_view().lines())?;
    Ok(filename)
}

pub fn write_gff_output(
    output_dir: &Utf8Path,
    table: &ResultTable,
    columns: &[TableColumn],
) -> FingerprintResult<Utf8PathBuf> {
    let filename = output_dir.join(GFF_FILENAME);
    info!("Writing fingerprint features to file: '{filename}'");
    write_lines(&filename, table.gff_view(columns).lines())?;
    Ok(filename)
}

fn get_supporting_read_names(table: &ResultTable) -> SupportingReadNames {
    let mut supporting_read_names = SupportingReadNames::default();
    for locus in table.records().iter().flat_map(|x| x.loci()) {
        let locus_read_names = table
            .sample_names()
            .iter()
            .zip(locus.samples.iter())
            .map(|(sample_name, stats)| (sample_name.clone(), stats.supporting_read_names.clone()))
            .collect();
        supporting_read_names.insert(locus.id(), locus_read_names);
    }
    supporting_read_names
}

/// Write the names of the reads supporting each locus, for each sample
pub fn write_supporting_read_names(
    output_dir: &Utf8Path,
    table: &ResultTable,
) -> FingerprintResult<Utf8PathBuf> {
    let filename = output_dir.join(SUPPORTING_READS_FILENAME);
    info!("Writing supporting read names to file: '{filename}'");

    let output_error = get_output_error(&filename);
    let srn_string = serde_json::to_string_pretty(&get_supporting_read_names(table))
        .map_err(|e| output_error(e.into()))?;

    let fp = File::create(&filename).map_err(&output_error)?;
    let mut encoder = GzEncoder::new(fp, Compression::default());
    encoder
        .write_all(srn_string.as_bytes())
        .map_err(&output_error)?;
    encoder.finish().map_err(&output_error)?;
    drop(output_error);
    Ok(filename)
}
