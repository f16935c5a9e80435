// SPDX-License-Identifier: MIT

// Entity types for the specimen database: vouchers, genes, sequences, primers, curated sets and
// voucher images. The derived fields (base-pair counts, normalized set lists) are computed by the
// helpers at the bottom; the store applies them on every save.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Larva,
    Worker,
    Queen,
    Unknown,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Larva => "larva",
            Sex::Worker => "worker",
            Sex::Queen => "queen",
            Sex::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Sex::Male),
            "female" => Some(Sex::Female),
            "larva" => Some(Sex::Larva),
            "worker" => Some(Sex::Worker),
            "queen" => Some(Sex::Queen),
            "unknown" => Some(Sex::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Whether the specimen is a type for its species.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TypeSpecies {
    Unknown,
    Yes,
    Not,
}

impl TypeSpecies {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeSpecies::Unknown => "unknown",
            TypeSpecies::Yes => "yes",
            TypeSpecies::Not => "not",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(TypeSpecies::Unknown),
            "yes" => Some(TypeSpecies::Yes),
            "not" => Some(TypeSpecies::Not),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSpecies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Physical condition of the voucher specimen. The stored strings keep their historical spelling
// (with spaces); the CLI names use dashes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum VoucherStatus {
    #[serde(rename = "spread")]
    Spread,
    #[serde(rename = "in envelope")]
    #[clap(name = "in-envelope")]
    InEnvelope,
    #[serde(rename = "only photo")]
    #[clap(name = "only-photo")]
    OnlyPhoto,
    #[serde(rename = "no voucher")]
    #[clap(name = "no-voucher")]
    NoVoucher,
    #[serde(rename = "destroyed")]
    Destroyed,
    #[serde(rename = "lost")]
    Lost,
    #[serde(rename = "unknown")]
    Unknown,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherStatus::Spread => "spread",
            VoucherStatus::InEnvelope => "in envelope",
            VoucherStatus::OnlyPhoto => "only photo",
            VoucherStatus::NoVoucher => "no voucher",
            VoucherStatus::Destroyed => "destroyed",
            VoucherStatus::Lost => "lost",
            VoucherStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spread" => Some(VoucherStatus::Spread),
            "in envelope" => Some(VoucherStatus::InEnvelope),
            "only photo" => Some(VoucherStatus::OnlyPhoto),
            "no voucher" => Some(VoucherStatus::NoVoucher),
            "destroyed" => Some(VoucherStatus::Destroyed),
            "lost" => Some(VoucherStatus::Lost),
            "unknown" => Some(VoucherStatus::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Three-valued flag for gene curation fields (aligned, prot_code).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Curation {
    Yes,
    No,
    NotSet,
}

impl Curation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Curation::Yes => "yes",
            Curation::No => "no",
            Curation::NotSet => "notset",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "yes" => Some(Curation::Yes),
            "no" => Some(Curation::No),
            "notset" => Some(Curation::NotSet),
            _ => None,
        }
    }
}

impl fmt::Display for Curation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// A physical specimen with its taxonomic lineage and collection history. The code is the primary
// key; dependent records (sequences, images) refer to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    // not "order": reserved word in SQL
    pub orden: String,
    pub superfamily: String,
    pub family: String,
    pub subfamily: String,
    pub tribe: String,
    pub subtribe: String,
    pub genus: String,
    pub species: String,
    pub subspecies: String,
    pub author: String,
    pub determined_by: String,
    pub type_species: TypeSpecies,
    pub country: String,
    pub specific_locality: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_altitude: Option<i64>,
    pub min_altitude: Option<i64>,
    pub collector: String,
    pub date_collection: Option<NaiveDate>,
    pub extraction: String,
    pub extraction_tube: String,
    pub date_extraction: Option<NaiveDate>,
    pub extractor: String,
    pub sex: Sex,
    pub voucher: VoucherStatus,
    pub voucher_locality: String,
    pub voucher_code: String,
    pub code_bold: String,
    pub hostorg: String,
    pub published_in: String,
    pub notes: String,
    pub edits: String,
    pub latest_editor: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Voucher {
    pub fn new(code: &str) -> Self {
        let now = Utc::now();
        Voucher {
            code: code.to_string(),
            orden: String::new(),
            superfamily: String::new(),
            family: String::new(),
            subfamily: String::new(),
            tribe: String::new(),
            subtribe: String::new(),
            genus: String::new(),
            species: String::new(),
            subspecies: String::new(),
            author: String::new(),
            determined_by: String::new(),
            type_species: TypeSpecies::Unknown,
            country: String::new(),
            specific_locality: String::new(),
            latitude: None,
            longitude: None,
            max_altitude: None,
            min_altitude: None,
            collector: String::new(),
            date_collection: None,
            extraction: String::new(),
            extraction_tube: String::new(),
            date_extraction: None,
            extractor: String::new(),
            sex: Sex::Unknown,
            voucher: VoucherStatus::Unknown,
            voucher_locality: String::new(),
            voucher_code: String::new(),
            code_bold: String::new(),
            hostorg: String::new(),
            published_in: String::new(),
            notes: String::new(),
            edits: String::new(),
            latest_editor: String::new(),
            created: now,
            modified: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gene {
    pub gene_code: String,
    /// NCBI translation table, as a number.
    pub genetic_code: Option<u32>,
    /// Expected number of base pairs.
    pub length: Option<u32>,
    pub description: String,
    /// Either 1, 2 or 3.
    pub reading_frame: Option<u32>,
    pub notes: String,
    pub aligned: Curation,
    pub intron: String,
    pub prot_code: Curation,
    /// Nuclear, mitochondrial.
    pub gene_type: String,
    pub time_created: DateTime<Utc>,
}

impl Gene {
    pub fn new(gene_code: &str) -> Self {
        Gene {
            gene_code: gene_code.to_string(),
            genetic_code: None,
            length: None,
            description: String::new(),
            reading_frame: None,
            notes: String::new(),
            aligned: Curation::NotSet,
            intron: String::new(),
            prot_code: Curation::NotSet,
            gene_type: String::new(),
            time_created: Utc::now(),
        }
    }
}

// One DNA sequence for a (voucher, gene) pair. The bp counts are derived from the sequence text
// on save and must never be set by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: i64,
    /// Voucher code this sequence belongs to.
    pub code: String,
    pub gene_code: String,
    /// Raw sequence text, possibly with alignment padding.
    pub sequences: String,
    pub accession: String,
    pub lab_person: String,
    pub time_created: DateTime<Utc>,
    pub time_edited: DateTime<Utc>,
    pub notes: String,
    pub genbank: Option<bool>,
    pub total_number_bp: i64,
    pub number_ambiguous_bp: i64,
}

impl Sequence {
    pub fn new(code: &str, gene_code: &str, sequences: &str) -> Self {
        let now = Utc::now();
        Sequence {
            id: 0,
            code: code.to_string(),
            gene_code: gene_code.to_string(),
            sequences: sequences.to_string(),
            accession: String::new(),
            lab_person: String::new(),
            time_created: now,
            time_edited: now,
            notes: String::new(),
            genbank: None,
            total_number_bp: 0,
            number_ambiguous_bp: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primer {
    pub id: i64,
    /// Sequence row this primer pair was used for.
    pub for_sequence: i64,
    pub primer_f: String,
    pub primer_r: String,
}

impl Primer {
    pub fn new(for_sequence: i64, primer_f: &str, primer_r: &str) -> Self {
        Primer {
            id: 0,
            for_sequence,
            primer_f: primer_f.to_string(),
            primer_r: primer_r.to_string(),
        }
    }
}

// A named list of gene codes, one per line. Normalized on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneSet {
    pub id: i64,
    pub name: String,
    pub creator: String,
    pub description: String,
    pub items: String,
}

impl GeneSet {
    pub fn new(name: &str, items: &str) -> Self {
        GeneSet {
            id: 0,
            name: name.to_string(),
            creator: String::new(),
            description: String::new(),
            items: items.to_string(),
        }
    }
}

// A named list of taxon identifiers, one per line. Normalized on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonSet {
    pub id: i64,
    pub name: String,
    pub creator: String,
    pub description: String,
    pub items: String,
}

impl TaxonSet {
    pub fn new(name: &str, items: &str) -> Self {
        TaxonSet {
            id: 0,
            name: name.to_string(),
            creator: String::new(),
            description: String::new(),
            items: items.to_string(),
        }
    }
}

// A voucher photo kept on the photo host. The local file only exists until the upload has gone
// through; after that the URLs are the authoritative copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlickrImage {
    pub id: i64,
    pub voucher_code: String,
    /// URL of the photo page.
    pub voucher_image: String,
    /// URL of the small-sized rendition.
    pub thumbnail: String,
    /// Photo id assigned by the host.
    pub flickr_id: String,
    /// Path of the uploaded file, relative to the media root. Deleted right after upload.
    pub image_file: String,
}

impl FlickrImage {
    pub fn new(voucher_code: &str, image_file: &str) -> Self {
        FlickrImage {
            id: 0,
            voucher_code: voucher_code.to_string(),
            voucher_image: String::new(),
            thumbnail: String::new(),
            flickr_id: String::new(),
            image_file: image_file.to_string(),
        }
    }
}

// A voucher photo kept on the local filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalImage {
    pub id: i64,
    pub voucher_code: String,
    /// Path of the image file, relative to the media root.
    pub voucher_image: String,
}

impl LocalImage {
    pub fn new(voucher_code: &str, voucher_image: &str) -> Self {
        LocalImage {
            id: 0,
            voucher_code: voucher_code.to_string(),
            voucher_image: voucher_image.to_string(),
        }
    }
}

/// Number of ambiguous positions in a sequence: '?', '-', 'N' and 'n' all count.
pub fn ambiguous_bp_count(sequence: &str) -> i64 {
    sequence
        .chars()
        .filter(|c| matches!(c, '?' | '-' | 'N' | 'n'))
        .count() as i64
}

/// Total number of positions in a sequence, padding included.
pub fn total_bp_count(sequence: &str) -> i64 {
    sequence.chars().count() as i64
}

/// Trim every line of a set list and drop the blank ones.
pub fn normalize_set_list(items: &str) -> String {
    items
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .join("\n")
}

pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        Err(format!(
            "{} is limited to {} characters (got {})",
            field,
            max,
            value.chars().count()
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_bp_count() {
        assert_eq!(0, ambiguous_bp_count("GAATTC"));
        assert_eq!(6, ambiguous_bp_count("??GA-TNnC?"));
        // Lowercase bases other than 'n' are plain data.
        assert_eq!(1, ambiguous_bp_count("gattacan"));
    }

    #[test]
    fn test_total_bp_count() {
        assert_eq!(0, total_bp_count(""));
        assert_eq!(10, total_bp_count("??GA-TNnC?"));
    }

    #[test]
    fn test_normalize_set_list() {
        let raw = " COI \n\n   EF1a\n \n16S ";
        assert_eq!("COI\nEF1a\n16S", normalize_set_list(raw));
        // Idempotent
        let once = normalize_set_list(raw);
        assert_eq!(once, normalize_set_list(&once));
    }

    #[test]
    fn test_voucher_status_strings() {
        assert_eq!("in envelope", VoucherStatus::InEnvelope.as_str());
        assert_eq!(
            Some(VoucherStatus::OnlyPhoto),
            VoucherStatus::parse("only photo")
        );
        assert_eq!(None, VoucherStatus::parse("framed"));
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("name", "short", 75).is_ok());
        assert!(check_len("name", &"x".repeat(76), 75).is_err());
    }
}
