// SPDX-License-Identifier: MIT

// Command-line front end: parses the subcommands, finds the configuration file, opens the store
// and dispatches into the library. All user-visible failure text comes from VoseqError's Display.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use log::info;

use crate::blast::Blast;
use crate::config::{find_voseq_config, VoseqConfig};
use crate::errors::VoseqError;
use crate::flickr::FlickrClient;
use crate::records::{
    Curation, FlickrImage, Gene, GeneSet, LocalImage, Primer, Sequence, Sex, TaxonSet,
    TypeSpecies, Voucher, VoucherStatus,
};
use crate::seq::fasta::read_fasta_file;
use crate::store::Store;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: .voseqconfig in $HOME, then in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database file and schema
    Init,

    /// Add or update a voucher
    AddVoucher(AddVoucher),

    /// Print one voucher in full
    ShowVoucher { code: String },

    /// List all vouchers
    ListVouchers,

    /// Delete a voucher (fails while sequences or images reference it)
    RemoveVoucher { code: String },

    /// Add or update a gene
    AddGene(AddGene),

    /// List all genes
    ListGenes,

    /// Add or update a sequence for a (voucher, gene) pair
    AddSequence(AddSequence),

    /// Print one sequence in full
    ShowSequence { code: String, gene: String },

    /// List sequences, optionally restricted to one gene
    ListSequences {
        #[arg(short, long)]
        gene: Option<String>,
    },

    /// Record the primer pair used for a sequence
    AddPrimer {
        code: String,
        gene: String,
        primer_f: String,
        primer_r: String,
    },

    /// Create or update a named list of gene codes
    AddGeneSet(AddSet),

    /// Create or update a named list of taxa
    AddTaxonSet(AddSet),

    /// List gene and taxon sets
    ListSets,

    /// Register a voucher image; uploads to the photo host unless --local-only
    AddImage {
        code: String,
        /// Image file, relative to the media root
        file: String,
        /// Keep the file on the local filesystem instead of uploading it
        #[arg(long)]
        local_only: bool,
    },

    /// Local BLAST databases
    #[command(subcommand)]
    Blast(BlastCommand),
}

#[derive(Debug, Args)]
struct AddVoucher {
    code: String,
    #[arg(long)]
    orden: Option<String>,
    #[arg(long)]
    superfamily: Option<String>,
    #[arg(long)]
    family: Option<String>,
    #[arg(long)]
    subfamily: Option<String>,
    #[arg(long)]
    tribe: Option<String>,
    #[arg(long)]
    subtribe: Option<String>,
    #[arg(long)]
    genus: Option<String>,
    #[arg(long)]
    species: Option<String>,
    #[arg(long)]
    subspecies: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    determined_by: Option<String>,
    #[arg(long, value_enum)]
    type_species: Option<TypeSpecies>,
    #[arg(long)]
    country: Option<String>,
    #[arg(long)]
    specific_locality: Option<String>,
    #[arg(long)]
    latitude: Option<f64>,
    #[arg(long)]
    longitude: Option<f64>,
    #[arg(long)]
    max_altitude: Option<i64>,
    #[arg(long)]
    min_altitude: Option<i64>,
    #[arg(long)]
    collector: Option<String>,
    #[arg(long, value_enum)]
    sex: Option<Sex>,
    /// Physical state of the voucher
    #[arg(long, value_enum)]
    voucher: Option<VoucherStatus>,
    #[arg(long)]
    voucher_locality: Option<String>,
    #[arg(long)]
    code_bold: Option<String>,
    #[arg(long)]
    hostorg: Option<String>,
    #[arg(long)]
    published_in: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    latest_editor: Option<String>,
}

#[derive(Debug, Args)]
struct AddGene {
    gene_code: String,
    /// NCBI translation table number
    #[arg(long)]
    genetic_code: Option<u32>,
    /// Expected length in base pairs
    #[arg(long)]
    length: Option<u32>,
    #[arg(long)]
    description: Option<String>,
    /// 1, 2 or 3
    #[arg(long)]
    reading_frame: Option<u32>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, value_enum)]
    aligned: Option<Curation>,
    #[arg(long)]
    intron: Option<String>,
    #[arg(long, value_enum)]
    prot_code: Option<Curation>,
    /// Nuclear, mitochondrial
    #[arg(long)]
    gene_type: Option<String>,
}

#[derive(Debug, Args)]
struct AddSequence {
    code: String,
    gene: String,
    /// Sequence text, inline
    #[arg(long, conflicts_with = "fasta")]
    sequence: Option<String>,
    /// Read the sequence text from a single-record FASTA file
    #[arg(long)]
    fasta: Option<PathBuf>,
    #[arg(long)]
    accession: Option<String>,
    #[arg(long)]
    lab_person: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    genbank: Option<bool>,
}

#[derive(Debug, Args)]
struct AddSet {
    name: String,
    /// List items, one argument per line
    items: Vec<String>,
    #[arg(long)]
    creator: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Subcommand)]
enum BlastCommand {
    /// Export the gene's sequences and build its local database
    Build {
        gene: String,
        /// Skip low-complexity masking
        #[arg(long)]
        no_mask: bool,
        /// Rebuild even when the database is current
        #[arg(long)]
        force: bool,
    },
    /// Report presence and currency of the gene's local database
    Status { gene: String },
    /// Run one voucher's sequence against the gene's database
    Query {
        voucher: String,
        gene: String,
        /// Skip low-complexity masking
        #[arg(long)]
        no_mask: bool,
    },
}

pub fn run() -> Result<(), VoseqError> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match cli.config.or_else(find_voseq_config) {
        Some(path) => {
            info!("reading configuration from {}", path.display());
            VoseqConfig::from_file(&path)?
        }
        None => {
            info!("no configuration file found, using defaults");
            VoseqConfig::default()
        }
    };

    if let Command::Init = cli.command {
        Store::create(&config.database)?;
        println!("created {}", config.database.display());
        return Ok(());
    }

    let mut store = Store::open(&config.database)?;
    match cli.command {
        Command::Init => unreachable!("handled above"),
        Command::AddVoucher(args) => add_voucher(&mut store, args)?,
        Command::ShowVoucher { code } => {
            let voucher = store
                .voucher(&code)?
                .ok_or_else(|| VoseqError::Format(format!("no voucher {}", code)))?;
            print_voucher(&voucher);
        }
        Command::ListVouchers => {
            for voucher in store.vouchers()? {
                println!(
                    "{}\t{} {}\t{}",
                    voucher.code, voucher.genus, voucher.species, voucher.country
                );
            }
        }
        Command::RemoveVoucher { code } => {
            store.delete_voucher(&code)?;
            println!("removed voucher {}", code);
        }
        Command::AddGene(args) => add_gene(&mut store, args)?,
        Command::ListGenes => {
            for gene in store.genes()? {
                println!(
                    "{}\t{}\t{}",
                    gene.gene_code,
                    gene.length.map_or(String::from("-"), |n| n.to_string()),
                    gene.description
                );
            }
        }
        Command::AddSequence(args) => add_sequence(&mut store, args)?,
        Command::ShowSequence { code, gene } => {
            let sequence = store.sequence(&code, &gene)?.ok_or_else(|| {
                VoseqError::Format(format!("no sequence for voucher {} and gene {}", code, gene))
            })?;
            print_sequence(&sequence, &store.primers_for_sequence(sequence.id)?);
        }
        Command::ListSequences { gene } => {
            let sequences = match gene {
                Some(gene) => store.sequences_for_gene(&gene)?,
                None => store.sequences()?,
            };
            for sequence in &sequences {
                println!(
                    "{}\t{}\t{} bp\t{} ambiguous",
                    sequence.code,
                    sequence.gene_code,
                    sequence.total_number_bp,
                    sequence.number_ambiguous_bp
                );
            }
            let gene_count = sequences
                .iter()
                .map(|sequence| sequence.gene_code.as_str())
                .unique()
                .count();
            println!("{} sequences, {} genes", sequences.len(), gene_count);
        }
        Command::AddPrimer {
            code,
            gene,
            primer_f,
            primer_r,
        } => {
            let sequence = store.sequence(&code, &gene)?.ok_or_else(|| {
                VoseqError::Format(format!("no sequence for voucher {} and gene {}", code, gene))
            })?;
            let mut primer = Primer::new(sequence.id, &primer_f, &primer_r);
            store.save_primer(&mut primer)?;
            println!("added primer pair {} for {} {}", primer.id, code, gene);
        }
        Command::AddGeneSet(args) => {
            let mut set = match store.gene_set(&args.name)? {
                Some(set) => set,
                None => GeneSet::new(&args.name, ""),
            };
            set.items = args.items.join("\n");
            if let Some(creator) = args.creator {
                set.creator = creator;
            }
            if let Some(description) = args.description {
                set.description = description;
            }
            store.save_gene_set(&mut set)?;
            println!("saved gene set {}", set.name);
        }
        Command::AddTaxonSet(args) => {
            let mut set = match store.taxon_set(&args.name)? {
                Some(set) => set,
                None => TaxonSet::new(&args.name, ""),
            };
            set.items = args.items.join("\n");
            if let Some(creator) = args.creator {
                set.creator = creator;
            }
            if let Some(description) = args.description {
                set.description = description;
            }
            store.save_taxon_set(&mut set)?;
            println!("saved taxon set {}", set.name);
        }
        Command::ListSets => {
            for set in store.gene_sets()? {
                println!("gene set\t{}\t{} items", set.name, set.items.lines().count());
            }
            for set in store.taxon_sets()? {
                println!("taxon set\t{}\t{} items", set.name, set.items.lines().count());
            }
        }
        Command::AddImage {
            code,
            file,
            local_only,
        } => {
            if local_only {
                let mut image = LocalImage::new(&code, &file);
                store.save_local_image(&mut image)?;
                println!("registered local image {} for {}", file, code);
            } else {
                let (key, secret) = config.flickr.credentials().ok_or_else(|| {
                    VoseqError::Format(String::from(
                        "flickr_api_key and flickr_api_secret must be set in .voseqconfig",
                    ))
                })?;
                let host = FlickrClient::new(key, secret);
                let mut image = FlickrImage::new(&code, &file);
                store.save_flickr_image(&mut image, &host, &config.media_root)?;
                println!("uploaded {} for {} as photo {}", file, code, image.flickr_id);
            }
        }
        Command::Blast(command) => run_blast(&store, &config, command)?,
    }
    Ok(())
}

fn add_voucher(store: &mut Store, args: AddVoucher) -> Result<(), VoseqError> {
    let mut voucher = match store.voucher(&args.code)? {
        Some(voucher) => voucher,
        None => Voucher::new(&args.code),
    };
    macro_rules! apply {
        ($($field:ident),+) => {
            $(if let Some(value) = args.$field {
                voucher.$field = value;
            })+
        };
    }
    apply!(
        orden,
        superfamily,
        family,
        subfamily,
        tribe,
        subtribe,
        genus,
        species,
        subspecies,
        author,
        determined_by,
        type_species,
        country,
        specific_locality,
        collector,
        sex,
        voucher,
        voucher_locality,
        code_bold,
        hostorg,
        published_in,
        notes,
        latest_editor
    );
    if args.latitude.is_some() {
        voucher.latitude = args.latitude;
    }
    if args.longitude.is_some() {
        voucher.longitude = args.longitude;
    }
    if args.max_altitude.is_some() {
        voucher.max_altitude = args.max_altitude;
    }
    if args.min_altitude.is_some() {
        voucher.min_altitude = args.min_altitude;
    }
    store.save_voucher(&mut voucher)?;
    println!("saved voucher {}", voucher.code);
    Ok(())
}

fn add_gene(store: &mut Store, args: AddGene) -> Result<(), VoseqError> {
    let mut gene = match store.gene(&args.gene_code)? {
        Some(gene) => gene,
        None => Gene::new(&args.gene_code),
    };
    if args.genetic_code.is_some() {
        gene.genetic_code = args.genetic_code;
    }
    if args.length.is_some() {
        gene.length = args.length;
    }
    if let Some(description) = args.description {
        gene.description = description;
    }
    if args.reading_frame.is_some() {
        gene.reading_frame = args.reading_frame;
    }
    if let Some(notes) = args.notes {
        gene.notes = notes;
    }
    if let Some(aligned) = args.aligned {
        gene.aligned = aligned;
    }
    if let Some(intron) = args.intron {
        gene.intron = intron;
    }
    if let Some(prot_code) = args.prot_code {
        gene.prot_code = prot_code;
    }
    if let Some(gene_type) = args.gene_type {
        gene.gene_type = gene_type;
    }
    store.save_gene(&mut gene)?;
    println!("saved gene {}", gene.gene_code);
    Ok(())
}

fn add_sequence(store: &mut Store, args: AddSequence) -> Result<(), VoseqError> {
    let text = match (args.sequence, args.fasta) {
        (Some(text), None) => text,
        (None, Some(path)) => {
            let mut records = read_fasta_file(&path)?;
            if records.len() != 1 {
                return Err(VoseqError::Format(format!(
                    "{} holds {} records, expected exactly one",
                    path.display(),
                    records.len()
                )));
            }
            records.remove(0).sequence
        }
        _ => {
            return Err(VoseqError::Format(String::from(
                "pass the sequence text with --sequence or --fasta",
            )))
        }
    };
    let mut sequence = match store.sequence(&args.code, &args.gene)? {
        Some(sequence) => sequence,
        None => Sequence::new(&args.code, &args.gene, ""),
    };
    sequence.sequences = text;
    if let Some(accession) = args.accession {
        sequence.accession = accession;
    }
    if let Some(lab_person) = args.lab_person {
        sequence.lab_person = lab_person;
    }
    if let Some(notes) = args.notes {
        sequence.notes = notes;
    }
    if args.genbank.is_some() {
        sequence.genbank = args.genbank;
    }
    store.save_sequence(&mut sequence)?;
    println!(
        "saved sequence for {} {}: {} bp, {} ambiguous",
        sequence.code, sequence.gene_code, sequence.total_number_bp, sequence.number_ambiguous_bp
    );
    Ok(())
}

fn run_blast(
    store: &Store,
    config: &VoseqConfig,
    command: BlastCommand,
) -> Result<(), VoseqError> {
    match command {
        BlastCommand::Build {
            gene,
            no_mask,
            force,
        } => {
            let blast = Blast::new(store, &config.blast, None, &gene, !no_mask);
            if force {
                blast.export_sequences_to_file()?;
                blast.build_database()?;
            } else {
                blast.ensure_current_database()?;
            }
            println!("database for {} is ready", gene);
        }
        BlastCommand::Status { gene } => {
            let blast = Blast::new(store, &config.blast, None, &gene, true);
            if !blast.has_local_database() {
                println!("{}: no local database", gene);
            } else if blast.is_database_current()? {
                println!("{}: current", gene);
            } else {
                println!("{}: stale (sequences changed since the last build)", gene);
            }
        }
        BlastCommand::Query {
            voucher,
            gene,
            no_mask,
        } => {
            let blast = Blast::new(store, &config.blast, Some(&voucher), &gene, !no_mask);
            blast.ensure_current_database()?;
            blast.export_query_to_file()?;
            let output = blast.run_query()?;
            println!("{}", output.display());
        }
    }
    Ok(())
}

fn print_voucher(voucher: &Voucher) {
    println!("code:              {}", voucher.code);
    println!(
        "taxon:             {} {} {} {}",
        voucher.family, voucher.genus, voucher.species, voucher.subspecies
    );
    println!(
        "lineage:           {} / {} / {} / {} / {}",
        voucher.orden, voucher.superfamily, voucher.subfamily, voucher.tribe, voucher.subtribe
    );
    println!("author:            {}", voucher.author);
    println!("determined by:     {}", voucher.determined_by);
    println!("type species:      {}", voucher.type_species);
    println!("sex:               {}", voucher.sex);
    println!("voucher:           {}", voucher.voucher);
    println!("country:           {}", voucher.country);
    println!("locality:          {}", voucher.specific_locality);
    if let (Some(latitude), Some(longitude)) = (voucher.latitude, voucher.longitude) {
        println!("coordinates:       {} {}", latitude, longitude);
    }
    println!("collector:         {}", voucher.collector);
    if let Some(date) = voucher.date_collection {
        println!("collected:         {}", date);
    }
    println!("published in:      {}", voucher.published_in);
    println!("notes:             {}", voucher.notes);
    println!("created:           {}", voucher.created);
    println!("modified:          {}", voucher.modified);
}

fn print_sequence(sequence: &Sequence, primers: &[Primer]) {
    println!("voucher:           {}", sequence.code);
    println!("gene:              {}", sequence.gene_code);
    println!("total bp:          {}", sequence.total_number_bp);
    println!("ambiguous bp:      {}", sequence.number_ambiguous_bp);
    println!("accession:         {}", sequence.accession);
    println!("lab person:        {}", sequence.lab_person);
    println!("created:           {}", sequence.time_created);
    println!("edited:            {}", sequence.time_edited);
    for primer in primers {
        println!("primers:           {} / {}", primer.primer_f, primer.primer_r);
    }
    println!("{}", sequence.sequences);
}
