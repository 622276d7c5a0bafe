use camino::Utf8PathBuf;
use clap::Args;
use const_format::concatcp;
use simple_error::{SimpleResult, bail};

use super::defaults::{EPSILON, MATE_ELEMENT_TAG, MIN_MAPQ, MINIMUM_READS, NUMBER_COMMON_ELEMENTS};
use super::utils::{check_optional_filename, check_required_filename};
use crate::int_range::MAX_DISTANCE;
use crate::result_table::{DEFAULT_GFF_COLUMNS, TableColumn};

#[derive(Args)]
pub struct FingerprintSettings {
    /// Directory for all output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_output"))]
    pub output_dir: Utf8PathBuf,

    /// Indexed alignment file for one sample in BAM or CRAM format. Specify once per sample.
    ///
    /// The sample name used in all output is the file name without its final extension.
    ///
    #[arg(long = "bam", value_name = "FILE", required = true)]
    pub bam_filenames: Vec<String>,

    /// Reference sequence to fingerprint. Can be specified multiple times. Defaults to all
    /// reference sequences in the header of the first alignment file.
    #[arg(long = "reference", value_name = "NAME")]
    pub references: Vec<String>,

    /// Read name prefix selecting one category of transposable element reads. Can be specified
    /// multiple times. Defaults to a single category including all reads.
    #[arg(long = "category", value_name = "PREFIX")]
    pub categories: Vec<String>,

    /// Minimum MAPQ value for reads to be used as tips
    #[arg(long, default_value_t = MIN_MAPQ)]
    pub mapping_quality: u8,

    /// Minimum number of tips in a cluster
    #[arg(long, default_value_t = MINIMUM_READS)]
    pub minimum_reads: usize,

    /// Maximum distance between consecutive tips of one cluster
    #[arg(long, default_value_t = EPSILON)]
    pub epsilon: i64,

    /// Lower bound of the epsilon range swept to estimate cluster support
    #[arg(long, default_value_t = 0)]
    pub minimum_epsilon: i64,

    /// Cluster at the epsilon value only, reporting a support of 1 for every cluster
    #[arg(long)]
    pub non_hierarchical: bool,

    /// Number of most common mate element names to report for each sample at each locus
    #[arg(long, default_value_t = NUMBER_COMMON_ELEMENTS)]
    pub number_common_elements: usize,

    /// Distance added to both ends of each cluster when merging clusters across samples
    #[arg(long, default_value_t = 0)]
    pub fingerprint_buffer: i64,

    /// Search distance for known element matching and for joining loci that flank one insertion
    ///
    /// Matching and joining are disabled unless this is set.
    ///
    #[arg(long)]
    pub join_distance: Option<i64>,

    /// Known transposable elements in GFF3 format, used for locus matching
    #[arg(long = "known-elements", value_name = "FILE")]
    pub known_elements_filename: Option<String>,

    /// Alignment aux tag holding the element name of each read's mate
    #[arg(long, value_name = "TAG", default_value = MATE_ELEMENT_TAG)]
    pub mate_element_tag: String,

    /// Columns of the GFF output. Reference, start, stop, category, strand and support map onto
    /// standard GFF fields, all others are written as attributes.
    ///
    /// Available columns: reference, start, stop, category, strand, support, id, partner,
    /// known_element, counts, tips, elements
    ///
    #[arg(long, value_name = "COLUMN", num_args = 1.., default_values_t = DEFAULT_GFF_COLUMNS)]
    pub gff_columns: Vec<TableColumn>,

    /// Allow a run with a single alignment file
    #[arg(long)]
    pub allow_single_sample: bool,

    /// Write the names of the reads supporting each locus to a compressed json file
    #[arg(long)]
    pub report_supporting_reads: bool,
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_fingerprint_settings(
    settings: FingerprintSettings,
) -> SimpleResult<FingerprintSettings> {
    for bam_filename in settings.bam_filenames.iter() {
        check_required_filename(bam_filename, "alignment")?;
    }

    check_optional_filename(settings.known_elements_filename.as_deref(), "known elements")?;

    if settings.known_elements_filename.is_some() && settings.join_distance.is_none() {
        bail!("--known-elements requires --join-distance");
    }

    if let Some(join_distance) = settings.join_distance {
        if join_distance < 0 {
            bail!("--join-distance argument must not be negative");
        }
    }

    if settings.fingerprint_buffer < 0 {
        bail!("--fingerprint-buffer argument must not be negative");
    }

    for (label, value) in [
        ("epsilon", Some(settings.epsilon)),
        ("minimum-epsilon", Some(settings.minimum_epsilon)),
        ("fingerprint-buffer", Some(settings.fingerprint_buffer)),
        ("join-distance", settings.join_distance),
    ] {
        if let Some(value) = value {
            if value > MAX_DISTANCE {
                bail!("--{label} argument must not exceed {MAX_DISTANCE}, found {value}");
            }
        }
    }

    if settings.mate_element_tag.len() != 2 || !settings.mate_element_tag.is_ascii() {
        bail!(
            "--mate-element-tag argument must be a two character aux tag, found '{}'",
            settings.mate_element_tag
        );
    }

    for required_column in [TableColumn::Reference, TableColumn::Start, TableColumn::Stop] {
        if !settings.gff_columns.contains(&required_column) {
            bail!("--gff-columns argument must include '{required_column}'");
        }
    }

    let mut settings = settings;
    if settings.categories.is_empty() {
        settings.categories.push(String::new());
    }

    Ok(settings)
}
