//! The ordered comparative record set, and its tabular and GFF text views
//!

use std::collections::HashMap;

use itertools::Itertools;
use strum::{Display, EnumString};

use crate::fingerprint::SampleLocusStats;
use crate::globals::PROGRAM_NAME;
use crate::join_loci::ResultRecord;
use crate::read_tips::Strand;

/// Columns which can be selected for the GFF view
///
/// The per-sample columns expand to one value per sample and strand.
///
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum TableColumn {
    Reference,
    Start,
    Stop,
    Category,
    Strand,
    Support,
    Id,
    Partner,
    KnownElement,
    Counts,
    Tips,
    Elements,
}

pub const DEFAULT_GFF_COLUMNS: [TableColumn; 4] = [
    TableColumn::Reference,
    TableColumn::Start,
    TableColumn::Stop,
    TableColumn::Category,
];

/// All fingerprint records of a run, in output order
///
/// Records are ordered by reference, then start, then category, so the order never depends on
/// the order in which work units completed.
///
pub struct ResultTable {
    sample_names: Vec<String>,
    records: Vec<ResultRecord>,
}

impl ResultTable {
    /// # Arguments
    /// * `reference_names` - defines reference order, references not in the list sort last
    ///
    pub fn new(
        sample_names: Vec<String>,
        reference_names: &[String],
        mut records: Vec<ResultRecord>,
    ) -> Self {
        let reference_order = reference_names
            .iter()
            .enumerate()
            .map(|(i, x)| (x.as_str(), i))
            .collect::<HashMap<_, _>>();
        let get_reference_index =
            |x: &ResultRecord| reference_order.get(x.reference()).copied().unwrap_or(usize::MAX);

        records.sort_by_cached_key(|x| {
            let range = x.range();
            (
                get_reference_index(x),
                x.reference().to_string(),
                range.start,
                x.category().to_string(),
                x.strand(),
                range.stop,
                x.id(),
            )
        });

        Self {
            sample_names,
            records,
        }
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn tabular_view(&self) -> TabularView<'_> {
        TabularView { table: self }
    }

    pub fn gff_view<'a>(&'a self, columns: &'a [TableColumn]) -> GffView<'a> {
        GffView {
            table: self,
            columns,
        }
    }
}

const MISSING_VALUE: &str = ".";

fn get_optional_string(value: Option<impl ToString>) -> String {
    match value {
        Some(x) => x.to_string(),
        None => MISSING_VALUE.to_string(),
    }
}

/// The empty category matches all reads, and is written as a missing value
fn get_category_string(category: &str) -> &str {
    if category.is_empty() {
        MISSING_VALUE
    } else {
        category
    }
}

fn get_elements_string(elements: &[String]) -> String {
    if elements.is_empty() {
        MISSING_VALUE.to_string()
    } else {
        elements.join(",")
    }
}

fn get_strand_label(strand: Strand) -> &'static str {
    match strand {
        Strand::Forward => "fwd",
        Strand::Reverse => "rev",
    }
}

/// Per-sample statistics of one strand, with zero statistics when the record lacks that strand
fn get_strand_sample_stats<'a>(
    record: &'a ResultRecord,
    strand: Strand,
    sample_index: usize,
) -> Option<&'a SampleLocusStats> {
    record.strand_samples(strand).map(|x| &x[sample_index])
}

/// Lazy tab-delimited rendering of a [ResultTable]
///
/// Each call to [TabularView::lines] starts a fresh pass over the table.
///
pub struct TabularView<'a> {
    table: &'a ResultTable,
}

impl<'a> TabularView<'a> {
    fn header(&self) -> String {
        let mut fields = [
            TableColumn::Reference,
            TableColumn::Start,
            TableColumn::Stop,
            TableColumn::Category,
            TableColumn::Strand,
            TableColumn::Support,
            TableColumn::Id,
            TableColumn::Partner,
            TableColumn::KnownElement,
        ]
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>();

        for sample_name in self.table.sample_names.iter() {
            for strand in [Strand::Forward, Strand::Reverse] {
                let label = get_strand_label(strand);
                fields.push(format!("{sample_name}_{label}_count"));
                fields.push(format!("{sample_name}_{label}_tips"));
                fields.push(format!("{sample_name}_{label}_elements"));
            }
        }
        fields.join("\t")
    }

    fn row(&self, record: &ResultRecord) -> String {
        let range = record.range();
        let mut fields = vec![
            record.reference().to_string(),
            range.start.to_string(),
            range.stop.to_string(),
            get_category_string(record.category()).to_string(),
            get_optional_string(record.strand()),
            record.support().to_string(),
            record.id(),
            get_optional_string(record.partner_id()),
            get_optional_string(record.known_element().map(|x| &x.name)),
        ];

        for sample_index in 0..self.table.sample_names.len() {
            for strand in [Strand::Forward, Strand::Reverse] {
                match get_strand_sample_stats(record, strand, sample_index) {
                    Some(stats) => {
                        fields.push(stats.read_count.to_string());
                        fields.push(stats.tip_count.to_string());
                        fields.push(get_elements_string(&stats.common_elements));
                    }
                    None => {
                        fields.push("0".to_string());
                        fields.push("0".to_string());
                        fields.push(MISSING_VALUE.to_string());
                    }
                }
            }
        }
        fields.join("\t")
    }

    /// Header line followed by one line per record, without line terminators
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.header()).chain(self.table.records.iter().map(|x| self.row(x)))
    }
}

/// Escape characters with reserved meaning in GFF3 attribute values
fn escape_gff_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => escaped.push_str("%3B"),
            '=' => escaped.push_str("%3D"),
            '&' => escaped.push_str("%26"),
            ',' => escaped.push_str("%2C"),
            '\t' => escaped.push_str("%09"),
            '%' => escaped.push_str("%25"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Lazy GFF3 rendering of a [ResultTable] for a selected column list
///
/// Reference, start, stop, category, strand and support map onto the seqid, start, end, type,
/// strand and score fields. Every other selected column becomes an attribute, in the selected
/// order, after the ID attribute which is always present.
///
pub struct GffView<'a> {
    table: &'a ResultTable,
    columns: &'a [TableColumn],
}

impl<'a> GffView<'a> {
    fn is_selected(&self, column: TableColumn) -> bool {
        self.columns.contains(&column)
    }

    /// Append the per-sample attributes of one expanded column
    fn push_sample_attributes(
        &self,
        record: &ResultRecord,
        column: TableColumn,
        attributes: &mut Vec<String>,
    ) {
        for (sample_index, sample_name) in self.table.sample_names.iter().enumerate() {
            for strand in [Strand::Forward, Strand::Reverse] {
                let stats = get_strand_sample_stats(record, strand, sample_index);
                let label = get_strand_label(strand);
                let (key, value) = match column {
                    TableColumn::Counts => (
                        "count",
                        stats.map(|x| x.read_count).unwrap_or(0).to_string(),
                    ),
                    TableColumn::Tips => {
                        ("tips", stats.map(|x| x.tip_count).unwrap_or(0).to_string())
                    }
                    _ => (
                        "elements",
                        match stats {
                            Some(x) if !x.common_elements.is_empty() => x
                                .common_elements
                                .iter()
                                .map(|x| escape_gff_value(x))
                                .join(","),
                            _ => MISSING_VALUE.to_string(),
                        },
                    ),
                };
                attributes.push(format!(
                    "{}_{label}_{key}={value}",
                    escape_gff_value(sample_name)
                ));
            }
        }
    }

    fn row(&self, record: &ResultRecord) -> String {
        let range = record.range();

        let feature_type = if self.is_selected(TableColumn::Category) {
            get_category_string(record.category())
        } else {
            MISSING_VALUE
        };
        let score = if self.is_selected(TableColumn::Support) {
            record.support().to_string()
        } else {
            MISSING_VALUE.to_string()
        };
        let strand = if self.is_selected(TableColumn::Strand) {
            get_optional_string(record.strand())
        } else {
            MISSING_VALUE.to_string()
        };

        let mut attributes = vec![format!("ID={}", escape_gff_value(&record.id()))];
        for &column in self.columns {
            match column {
                TableColumn::Reference
                | TableColumn::Start
                | TableColumn::Stop
                | TableColumn::Category
                | TableColumn::Strand
                | TableColumn::Support
                | TableColumn::Id => {}
                TableColumn::Partner => {
                    if let Some(partner_id) = record.partner_id() {
                        attributes.push(format!("partner={}", escape_gff_value(&partner_id)));
                    }
                }
                TableColumn::KnownElement => {
                    if let Some(element) = record.known_element() {
                        attributes.push(format!(
                            "known_element={}",
                            escape_gff_value(&element.name)
                        ));
                    }
                }
                TableColumn::Counts | TableColumn::Tips | TableColumn::Elements => {
                    self.push_sample_attributes(record, column, &mut attributes);
                }
            }
        }

        let start = range.start.to_string();
        let stop = range.stop.to_string();
        let attributes = attributes.join(";");
        let fields: [&str; 9] = [
            record.reference(),
            PROGRAM_NAME,
            feature_type,
            &start,
            &stop,
            &score,
            &strand,
            MISSING_VALUE,
            &attributes,
        ];
        fields.join("\t")
    }

    /// Version directive followed by one line per record, without line terminators
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once("##gff-version 3".to_string())
            .chain(self.table.records.iter().map(|x| self.row(x)))
    }
}
