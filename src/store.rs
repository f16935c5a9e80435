// SPDX-License-Identifier: MIT

// Embedded SQLite store for the specimen database. One table per entity, foreign keys on. The
// save_* methods are the only write path and apply the per-entity save hooks: derived base-pair
// counts for sequences, list normalization for gene/taxon sets, and the upload pipeline for
// photo-hosted images.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::errors::VoseqError;
use crate::flickr::{photo_description, photo_tags, photo_title, thumbnail_url, PhotoHost};
use crate::records::{
    ambiguous_bp_count, check_len, normalize_set_list, total_bp_count, Curation, FlickrImage,
    Gene, GeneSet, LocalImage, Primer, Sequence, Sex, TaxonSet, TypeSpecies, Voucher,
    VoucherStatus,
};

/// Current schema version, stored under the `version` key of the `meta` table.
pub const SCHEMA_VERSION: &str = "1";

const VOUCHER_COLUMNS: &str = "code, orden, superfamily, family, subfamily, tribe, subtribe, \
     genus, species, subspecies, author, determined_by, type_species, country, \
     specific_locality, latitude, longitude, max_altitude, min_altitude, collector, \
     date_collection, extraction, extraction_tube, date_extraction, extractor, sex, voucher, \
     voucher_locality, voucher_code, code_bold, hostorg, published_in, notes, edits, \
     latest_editor, created, modified";

const SEQUENCE_COLUMNS: &str = "id, code, gene_code, sequences, accession, lab_person, \
     time_created, time_edited, notes, genbank, total_number_bp, number_ambiguous_bp";

const GENE_COLUMNS: &str = "gene_code, genetic_code, length, description, reading_frame, notes, \
     aligned, intron, prot_code, gene_type, time_created";

pub struct Store {
    connection: Connection,
}

impl Store {
    /// Creates a new database file with an empty schema. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Store, VoseqError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(VoseqError::Format(format!(
                "{} already exists",
                path.display()
            )));
        }
        let connection = Connection::open(path)?;
        let store = Store::initialize(connection)?;
        info!("created database {}", path.display());
        Ok(store)
    }

    /// Opens an existing database file and checks its schema version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store, VoseqError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VoseqError::Format(format!(
                "{} does not exist (run `voseq init` first)",
                path.display()
            )));
        }
        let connection = Connection::open(path)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: String = connection.query_row(
            "SELECT value FROM meta WHERE key = 'version'",
            (),
            |row| row.get(0),
        )?;
        if version != SCHEMA_VERSION {
            return Err(VoseqError::Format(format!(
                "unsupported database version: {} (expected {})",
                version, SCHEMA_VERSION
            )));
        }
        Ok(Store { connection })
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Store, VoseqError> {
        let connection = Connection::open_in_memory()?;
        Store::initialize(connection)
    }

    fn initialize(connection: Connection) -> Result<Store, VoseqError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        Store::create_tables(&connection)?;
        connection.execute(
            "INSERT INTO meta (key, value) VALUES ('version', ?1)",
            (SCHEMA_VERSION,),
        )?;
        Ok(Store { connection })
    }

    fn create_tables(connection: &Connection) -> rusqlite::Result<()> {
        connection.execute(
            "CREATE TABLE meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) WITHOUT ROWID",
            (),
        )?;
        connection.execute(
            "CREATE TABLE vouchers (
                code TEXT PRIMARY KEY,
                orden TEXT NOT NULL DEFAULT '',
                superfamily TEXT NOT NULL DEFAULT '',
                family TEXT NOT NULL DEFAULT '',
                subfamily TEXT NOT NULL DEFAULT '',
                tribe TEXT NOT NULL DEFAULT '',
                subtribe TEXT NOT NULL DEFAULT '',
                genus TEXT NOT NULL DEFAULT '',
                species TEXT NOT NULL DEFAULT '',
                subspecies TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                determined_by TEXT NOT NULL DEFAULT '',
                type_species TEXT NOT NULL,
                country TEXT NOT NULL DEFAULT '',
                specific_locality TEXT NOT NULL DEFAULT '',
                latitude REAL,
                longitude REAL,
                max_altitude INTEGER,
                min_altitude INTEGER,
                collector TEXT NOT NULL DEFAULT '',
                date_collection TEXT,
                extraction TEXT NOT NULL DEFAULT '',
                extraction_tube TEXT NOT NULL DEFAULT '',
                date_extraction TEXT,
                extractor TEXT NOT NULL DEFAULT '',
                sex TEXT NOT NULL,
                voucher TEXT NOT NULL,
                voucher_locality TEXT NOT NULL DEFAULT '',
                voucher_code TEXT NOT NULL DEFAULT '',
                code_bold TEXT NOT NULL DEFAULT '',
                hostorg TEXT NOT NULL DEFAULT '',
                published_in TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                edits TEXT NOT NULL DEFAULT '',
                latest_editor TEXT NOT NULL DEFAULT '',
                created TEXT NOT NULL,
                modified TEXT NOT NULL
            ) WITHOUT ROWID",
            (),
        )?;
        connection.execute(
            "CREATE TABLE genes (
                gene_code TEXT PRIMARY KEY,
                genetic_code INTEGER,
                length INTEGER,
                description TEXT NOT NULL DEFAULT '',
                reading_frame INTEGER,
                notes TEXT NOT NULL DEFAULT '',
                aligned TEXT NOT NULL DEFAULT 'notset',
                intron TEXT NOT NULL DEFAULT '',
                prot_code TEXT NOT NULL DEFAULT 'notset',
                gene_type TEXT NOT NULL DEFAULT '',
                time_created TEXT NOT NULL
            ) WITHOUT ROWID",
            (),
        )?;
        connection.execute(
            "CREATE TABLE sequences (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL REFERENCES vouchers(code),
                gene_code TEXT NOT NULL,
                sequences TEXT NOT NULL DEFAULT '',
                accession TEXT NOT NULL DEFAULT '',
                lab_person TEXT NOT NULL DEFAULT '',
                time_created TEXT NOT NULL,
                time_edited TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                genbank INTEGER,
                total_number_bp INTEGER NOT NULL,
                number_ambiguous_bp INTEGER NOT NULL,
                UNIQUE (code, gene_code)
            )",
            (),
        )?;
        connection.execute(
            "CREATE TABLE primers (
                id INTEGER PRIMARY KEY,
                for_sequence INTEGER NOT NULL REFERENCES sequences(id),
                primer_f TEXT NOT NULL DEFAULT '',
                primer_r TEXT NOT NULL DEFAULT ''
            )",
            (),
        )?;
        connection.execute(
            "CREATE TABLE gene_sets (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                creator TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                items TEXT NOT NULL DEFAULT ''
            )",
            (),
        )?;
        connection.execute(
            "CREATE TABLE taxon_sets (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                creator TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                items TEXT NOT NULL DEFAULT ''
            )",
            (),
        )?;
        connection.execute(
            "CREATE TABLE flickr_images (
                id INTEGER PRIMARY KEY,
                voucher_code TEXT NOT NULL REFERENCES vouchers(code),
                voucher_image TEXT NOT NULL DEFAULT '',
                thumbnail TEXT NOT NULL DEFAULT '',
                flickr_id TEXT NOT NULL DEFAULT '',
                image_file TEXT NOT NULL DEFAULT ''
            )",
            (),
        )?;
        connection.execute(
            "CREATE TABLE local_images (
                id INTEGER PRIMARY KEY,
                voucher_code TEXT NOT NULL REFERENCES vouchers(code),
                voucher_image TEXT NOT NULL DEFAULT ''
            )",
            (),
        )?;
        Ok(())
    }
}

/// Vouchers.
impl Store {
    /// Inserts or updates a voucher. `modified` is refreshed; `created` is kept for existing
    /// records.
    pub fn save_voucher(&mut self, voucher: &mut Voucher) -> Result<(), VoseqError> {
        if voucher.code.is_empty() {
            return Err(VoseqError::Format(String::from("voucher code is empty")));
        }
        // The code ends up left of the '|' in FASTA export ids.
        if voucher.code.contains('|') {
            return Err(VoseqError::Format(format!(
                "voucher code {} contains '|'",
                voucher.code
            )));
        }
        check_len("voucher code", &voucher.code, 300)?;
        voucher.modified = Utc::now();
        let existing = self.voucher(&voucher.code)?;
        let is_update = existing.is_some();
        if let Some(existing) = existing {
            voucher.created = existing.created;
        } else {
            voucher.created = voucher.modified;
        }
        let params = rusqlite::params![
            voucher.code,
            voucher.orden,
            voucher.superfamily,
            voucher.family,
            voucher.subfamily,
            voucher.tribe,
            voucher.subtribe,
            voucher.genus,
            voucher.species,
            voucher.subspecies,
            voucher.author,
            voucher.determined_by,
            voucher.type_species,
            voucher.country,
            voucher.specific_locality,
            voucher.latitude,
            voucher.longitude,
            voucher.max_altitude,
            voucher.min_altitude,
            voucher.collector,
            voucher.date_collection,
            voucher.extraction,
            voucher.extraction_tube,
            voucher.date_extraction,
            voucher.extractor,
            voucher.sex,
            voucher.voucher,
            voucher.voucher_locality,
            voucher.voucher_code,
            voucher.code_bold,
            voucher.hostorg,
            voucher.published_in,
            voucher.notes,
            voucher.edits,
            voucher.latest_editor,
            voucher.created,
            voucher.modified,
        ];
        // REPLACE would delete and re-insert the row, which trips the foreign key checks once
        // sequences or images reference the code. Hence the explicit update.
        if is_update {
            self.connection.execute(
                "UPDATE vouchers SET orden = ?2, superfamily = ?3, family = ?4, subfamily = ?5, \
                 tribe = ?6, subtribe = ?7, genus = ?8, species = ?9, subspecies = ?10, \
                 author = ?11, determined_by = ?12, type_species = ?13, country = ?14, \
                 specific_locality = ?15, latitude = ?16, longitude = ?17, max_altitude = ?18, \
                 min_altitude = ?19, collector = ?20, date_collection = ?21, extraction = ?22, \
                 extraction_tube = ?23, date_extraction = ?24, extractor = ?25, sex = ?26, \
                 voucher = ?27, voucher_locality = ?28, voucher_code = ?29, code_bold = ?30, \
                 hostorg = ?31, published_in = ?32, notes = ?33, edits = ?34, \
                 latest_editor = ?35, created = ?36, modified = ?37 WHERE code = ?1",
                params,
            )?;
        } else {
            let statement = format!(
                "INSERT INTO vouchers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, \
                 ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37)",
                VOUCHER_COLUMNS
            );
            self.connection.execute(&statement, params)?;
        }
        Ok(())
    }

    pub fn voucher(&self, code: &str) -> Result<Option<Voucher>, VoseqError> {
        let statement = format!("SELECT {} FROM vouchers WHERE code = ?1", VOUCHER_COLUMNS);
        let voucher = self
            .connection
            .query_row(&statement, (code,), Store::voucher_from_row)
            .optional()?;
        Ok(voucher)
    }

    pub fn vouchers(&self) -> Result<Vec<Voucher>, VoseqError> {
        let statement = format!("SELECT {} FROM vouchers ORDER BY code", VOUCHER_COLUMNS);
        let mut select = self.connection.prepare(&statement)?;
        let rows = select.query_map((), Store::voucher_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Deletes a voucher. Fails while sequences or images still reference the code.
    pub fn delete_voucher(&mut self, code: &str) -> Result<(), VoseqError> {
        let n = self
            .connection
            .execute("DELETE FROM vouchers WHERE code = ?1", (code,))?;
        if n == 0 {
            return Err(VoseqError::Format(format!("no voucher {}", code)));
        }
        Ok(())
    }

    fn voucher_from_row(row: &Row) -> rusqlite::Result<Voucher> {
        Ok(Voucher {
            code: row.get(0)?,
            orden: row.get(1)?,
            superfamily: row.get(2)?,
            family: row.get(3)?,
            subfamily: row.get(4)?,
            tribe: row.get(5)?,
            subtribe: row.get(6)?,
            genus: row.get(7)?,
            species: row.get(8)?,
            subspecies: row.get(9)?,
            author: row.get(10)?,
            determined_by: row.get(11)?,
            type_species: row.get(12)?,
            country: row.get(13)?,
            specific_locality: row.get(14)?,
            latitude: row.get(15)?,
            longitude: row.get(16)?,
            max_altitude: row.get(17)?,
            min_altitude: row.get(18)?,
            collector: row.get(19)?,
            date_collection: row.get(20)?,
            extraction: row.get(21)?,
            extraction_tube: row.get(22)?,
            date_extraction: row.get(23)?,
            extractor: row.get(24)?,
            sex: row.get(25)?,
            voucher: row.get(26)?,
            voucher_locality: row.get(27)?,
            voucher_code: row.get(28)?,
            code_bold: row.get(29)?,
            hostorg: row.get(30)?,
            published_in: row.get(31)?,
            notes: row.get(32)?,
            edits: row.get(33)?,
            latest_editor: row.get(34)?,
            created: row.get(35)?,
            modified: row.get(36)?,
        })
    }
}

/// Genes.
impl Store {
    pub fn save_gene(&mut self, gene: &mut Gene) -> Result<(), VoseqError> {
        if gene.gene_code.is_empty() {
            return Err(VoseqError::Format(String::from("gene code is empty")));
        }
        check_len("gene code", &gene.gene_code, 100)?;
        if let Some(frame) = gene.reading_frame {
            if !(1..=3).contains(&frame) {
                return Err(VoseqError::Format(format!(
                    "reading frame must be 1, 2 or 3 (got {})",
                    frame
                )));
            }
        }
        if let Some(existing) = self.gene(&gene.gene_code)? {
            gene.time_created = existing.time_created;
        } else {
            gene.time_created = Utc::now();
        }
        let statement = format!(
            "INSERT OR REPLACE INTO genes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
             ?11)",
            GENE_COLUMNS
        );
        self.connection.execute(
            &statement,
            rusqlite::params![
                gene.gene_code,
                gene.genetic_code,
                gene.length,
                gene.description,
                gene.reading_frame,
                gene.notes,
                gene.aligned,
                gene.intron,
                gene.prot_code,
                gene.gene_type,
                gene.time_created,
            ],
        )?;
        Ok(())
    }

    pub fn gene(&self, gene_code: &str) -> Result<Option<Gene>, VoseqError> {
        let statement = format!("SELECT {} FROM genes WHERE gene_code = ?1", GENE_COLUMNS);
        let gene = self
            .connection
            .query_row(&statement, (gene_code,), Store::gene_from_row)
            .optional()?;
        Ok(gene)
    }

    pub fn genes(&self) -> Result<Vec<Gene>, VoseqError> {
        let statement = format!("SELECT {} FROM genes ORDER BY gene_code", GENE_COLUMNS);
        let mut select = self.connection.prepare(&statement)?;
        let rows = select.query_map((), Store::gene_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn gene_from_row(row: &Row) -> rusqlite::Result<Gene> {
        Ok(Gene {
            gene_code: row.get(0)?,
            genetic_code: row.get(1)?,
            length: row.get(2)?,
            description: row.get(3)?,
            reading_frame: row.get(4)?,
            notes: row.get(5)?,
            aligned: row.get(6)?,
            intron: row.get(7)?,
            prot_code: row.get(8)?,
            gene_type: row.get(9)?,
            time_created: row.get(10)?,
        })
    }
}

/// Sequences and primers.
impl Store {
    /// Inserts (id 0) or updates a sequence. Recomputes the derived base-pair counts from the
    /// sequence text and refreshes `time_edited`.
    pub fn save_sequence(&mut self, sequence: &mut Sequence) -> Result<(), VoseqError> {
        check_len("gene code", &sequence.gene_code, 100)?;
        check_len("accession", &sequence.accession, 100)?;
        check_len("lab person", &sequence.lab_person, 100)?;
        if sequence.gene_code.is_empty() {
            return Err(VoseqError::Format(String::from("gene code is empty")));
        }
        sequence.total_number_bp = total_bp_count(&sequence.sequences);
        sequence.number_ambiguous_bp = ambiguous_bp_count(&sequence.sequences);
        let now = Utc::now();
        if sequence.id == 0 {
            sequence.time_created = now;
            sequence.time_edited = now;
            self.connection.execute(
                "INSERT INTO sequences (code, gene_code, sequences, accession, lab_person, \
                 time_created, time_edited, notes, genbank, total_number_bp, \
                 number_ambiguous_bp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    sequence.code,
                    sequence.gene_code,
                    sequence.sequences,
                    sequence.accession,
                    sequence.lab_person,
                    sequence.time_created,
                    sequence.time_edited,
                    sequence.notes,
                    sequence.genbank,
                    sequence.total_number_bp,
                    sequence.number_ambiguous_bp,
                ],
            )?;
            sequence.id = self.connection.last_insert_rowid();
        } else {
            sequence.time_edited = now;
            self.connection.execute(
                "UPDATE sequences SET sequences = ?1, accession = ?2, lab_person = ?3, \
                 time_edited = ?4, notes = ?5, genbank = ?6, total_number_bp = ?7, \
                 number_ambiguous_bp = ?8 WHERE id = ?9",
                rusqlite::params![
                    sequence.sequences,
                    sequence.accession,
                    sequence.lab_person,
                    sequence.time_edited,
                    sequence.notes,
                    sequence.genbank,
                    sequence.total_number_bp,
                    sequence.number_ambiguous_bp,
                    sequence.id,
                ],
            )?;
        }
        Ok(())
    }

    pub fn sequence(&self, code: &str, gene_code: &str) -> Result<Option<Sequence>, VoseqError> {
        let statement = format!(
            "SELECT {} FROM sequences WHERE code = ?1 AND gene_code = ?2",
            SEQUENCE_COLUMNS
        );
        let sequence = self
            .connection
            .query_row(&statement, (code, gene_code), Store::sequence_from_row)
            .optional()?;
        Ok(sequence)
    }

    /// All sequences for one gene, ordered by voucher code. This is the record set a BLAST
    /// database for the gene is built from.
    pub fn sequences_for_gene(&self, gene_code: &str) -> Result<Vec<Sequence>, VoseqError> {
        let statement = format!(
            "SELECT {} FROM sequences WHERE gene_code = ?1 ORDER BY code",
            SEQUENCE_COLUMNS
        );
        let mut select = self.connection.prepare(&statement)?;
        let rows = select.query_map((gene_code,), Store::sequence_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn sequences(&self) -> Result<Vec<Sequence>, VoseqError> {
        let statement = format!(
            "SELECT {} FROM sequences ORDER BY code, gene_code",
            SEQUENCE_COLUMNS
        );
        let mut select = self.connection.prepare(&statement)?;
        let rows = select.query_map((), Store::sequence_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Most recent creation and edit timestamps over all sequence records, or None for an empty
    /// table. Drives the staleness check for local BLAST databases.
    pub fn latest_sequence_times(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, VoseqError> {
        let times = self.connection.query_row(
            "SELECT MAX(time_created), MAX(time_edited) FROM sequences",
            (),
            |row| {
                let created: Option<DateTime<Utc>> = row.get(0)?;
                let edited: Option<DateTime<Utc>> = row.get(1)?;
                Ok(created.zip(edited))
            },
        )?;
        Ok(times)
    }

    pub fn delete_sequence(&mut self, id: i64) -> Result<(), VoseqError> {
        let n = self
            .connection
            .execute("DELETE FROM sequences WHERE id = ?1", (id,))?;
        if n == 0 {
            return Err(VoseqError::Format(format!("no sequence with id {}", id)));
        }
        Ok(())
    }

    fn sequence_from_row(row: &Row) -> rusqlite::Result<Sequence> {
        Ok(Sequence {
            id: row.get(0)?,
            code: row.get(1)?,
            gene_code: row.get(2)?,
            sequences: row.get(3)?,
            accession: row.get(4)?,
            lab_person: row.get(5)?,
            time_created: row.get(6)?,
            time_edited: row.get(7)?,
            notes: row.get(8)?,
            genbank: row.get(9)?,
            total_number_bp: row.get(10)?,
            number_ambiguous_bp: row.get(11)?,
        })
    }

    pub fn save_primer(&mut self, primer: &mut Primer) -> Result<(), VoseqError> {
        check_len("forward primer", &primer.primer_f, 100)?;
        check_len("reverse primer", &primer.primer_r, 100)?;
        if primer.id == 0 {
            self.connection.execute(
                "INSERT INTO primers (for_sequence, primer_f, primer_r) VALUES (?1, ?2, ?3)",
                rusqlite::params![primer.for_sequence, primer.primer_f, primer.primer_r],
            )?;
            primer.id = self.connection.last_insert_rowid();
        } else {
            self.connection.execute(
                "UPDATE primers SET primer_f = ?1, primer_r = ?2 WHERE id = ?3",
                rusqlite::params![primer.primer_f, primer.primer_r, primer.id],
            )?;
        }
        Ok(())
    }

    pub fn primers_for_sequence(&self, sequence_id: i64) -> Result<Vec<Primer>, VoseqError> {
        let mut select = self.connection.prepare(
            "SELECT id, for_sequence, primer_f, primer_r FROM primers WHERE for_sequence = ?1 \
             ORDER BY id",
        )?;
        let rows = select.query_map((sequence_id,), |row| {
            Ok(Primer {
                id: row.get(0)?,
                for_sequence: row.get(1)?,
                primer_f: row.get(2)?,
                primer_r: row.get(3)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

/// Gene and taxon sets.
impl Store {
    pub fn save_gene_set(&mut self, set: &mut GeneSet) -> Result<(), VoseqError> {
        Store::check_set_fields(&set.name, &set.creator, &set.description)?;
        set.items = normalize_set_list(&set.items);
        if set.id == 0 {
            self.connection.execute(
                "INSERT INTO gene_sets (name, creator, description, items) VALUES (?1, ?2, ?3, \
                 ?4)",
                rusqlite::params![set.name, set.creator, set.description, set.items],
            )?;
            set.id = self.connection.last_insert_rowid();
        } else {
            self.connection.execute(
                "UPDATE gene_sets SET name = ?1, creator = ?2, description = ?3, items = ?4 \
                 WHERE id = ?5",
                rusqlite::params![set.name, set.creator, set.description, set.items, set.id],
            )?;
        }
        Ok(())
    }

    pub fn gene_set(&self, name: &str) -> Result<Option<GeneSet>, VoseqError> {
        let set = self
            .connection
            .query_row(
                "SELECT id, name, creator, description, items FROM gene_sets WHERE name = ?1",
                (name,),
                |row| {
                    Ok(GeneSet {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        creator: row.get(2)?,
                        description: row.get(3)?,
                        items: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(set)
    }

    pub fn gene_sets(&self) -> Result<Vec<GeneSet>, VoseqError> {
        let mut select = self.connection.prepare(
            "SELECT id, name, creator, description, items FROM gene_sets ORDER BY name",
        )?;
        let rows = select.query_map((), |row| {
            Ok(GeneSet {
                id: row.get(0)?,
                name: row.get(1)?,
                creator: row.get(2)?,
                description: row.get(3)?,
                items: row.get(4)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn save_taxon_set(&mut self, set: &mut TaxonSet) -> Result<(), VoseqError> {
        Store::check_set_fields(&set.name, &set.creator, &set.description)?;
        set.items = normalize_set_list(&set.items);
        if set.id == 0 {
            self.connection.execute(
                "INSERT INTO taxon_sets (name, creator, description, items) VALUES (?1, ?2, ?3, \
                 ?4)",
                rusqlite::params![set.name, set.creator, set.description, set.items],
            )?;
            set.id = self.connection.last_insert_rowid();
        } else {
            self.connection.execute(
                "UPDATE taxon_sets SET name = ?1, creator = ?2, description = ?3, items = ?4 \
                 WHERE id = ?5",
                rusqlite::params![set.name, set.creator, set.description, set.items, set.id],
            )?;
        }
        Ok(())
    }

    pub fn taxon_set(&self, name: &str) -> Result<Option<TaxonSet>, VoseqError> {
        let set = self
            .connection
            .query_row(
                "SELECT id, name, creator, description, items FROM taxon_sets WHERE name = ?1",
                (name,),
                |row| {
                    Ok(TaxonSet {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        creator: row.get(2)?,
                        description: row.get(3)?,
                        items: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(set)
    }

    pub fn taxon_sets(&self) -> Result<Vec<TaxonSet>, VoseqError> {
        let mut select = self.connection.prepare(
            "SELECT id, name, creator, description, items FROM taxon_sets ORDER BY name",
        )?;
        let rows = select.query_map((), |row| {
            Ok(TaxonSet {
                id: row.get(0)?,
                name: row.get(1)?,
                creator: row.get(2)?,
                description: row.get(3)?,
                items: row.get(4)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    fn check_set_fields(name: &str, creator: &str, description: &str) -> Result<(), VoseqError> {
        if name.is_empty() {
            return Err(VoseqError::Format(String::from("set name is empty")));
        }
        check_len("set name", name, 75)?;
        check_len("set creator", creator, 75)?;
        check_len("set description", description, 140)?;
        Ok(())
    }
}

/// Voucher images.
impl Store {
    /// Saves a photo-hosted image. A record without a photo id is first pushed to the host:
    /// upload, then a metadata fetch for the page and thumbnail URLs. The local file is deleted
    /// afterwards; the host copy is the one that counts.
    pub fn save_flickr_image(
        &mut self,
        image: &mut FlickrImage,
        host: &dyn PhotoHost,
        media_root: &Path,
    ) -> Result<(), VoseqError> {
        let voucher = self.voucher(&image.voucher_code)?.ok_or_else(|| {
            VoseqError::Format(format!("no voucher {}", image.voucher_code))
        })?;
        if image.flickr_id.is_empty() {
            let file = media_root.join(&image.image_file);
            let title = photo_title(&voucher);
            let description = photo_description(&voucher);
            let tags = photo_tags(&voucher);
            let photo_id = host.upload(&file, &title, &description, &tags)?;
            let info = host.photo_info(&photo_id)?;
            image.voucher_image = info.page_url.clone();
            image.thumbnail = thumbnail_url(&info, &photo_id);
            image.flickr_id = photo_id;
            info!(
                "uploaded {} for voucher {} as photo {}",
                image.image_file, image.voucher_code, image.flickr_id
            );
        }
        Store::delete_local_photo(media_root, &image.image_file)?;
        if image.id == 0 {
            self.connection.execute(
                "INSERT INTO flickr_images (voucher_code, voucher_image, thumbnail, flickr_id, \
                 image_file) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    image.voucher_code,
                    image.voucher_image,
                    image.thumbnail,
                    image.flickr_id,
                    image.image_file,
                ],
            )?;
            image.id = self.connection.last_insert_rowid();
        } else {
            self.connection.execute(
                "UPDATE flickr_images SET voucher_image = ?1, thumbnail = ?2, flickr_id = ?3, \
                 image_file = ?4 WHERE id = ?5",
                rusqlite::params![
                    image.voucher_image,
                    image.thumbnail,
                    image.flickr_id,
                    image.image_file,
                    image.id,
                ],
            )?;
        }
        Ok(())
    }

    fn delete_local_photo(media_root: &Path, image_file: &str) -> Result<(), VoseqError> {
        let path = media_root.join(image_file);
        if path.is_file() {
            std::fs::remove_file(&path)?;
            info!("deleted local copy {}", path.display());
        }
        Ok(())
    }

    pub fn flickr_images(&self, voucher_code: &str) -> Result<Vec<FlickrImage>, VoseqError> {
        let mut select = self.connection.prepare(
            "SELECT id, voucher_code, voucher_image, thumbnail, flickr_id, image_file FROM \
             flickr_images WHERE voucher_code = ?1 ORDER BY id",
        )?;
        let rows = select.query_map((voucher_code,), |row| {
            Ok(FlickrImage {
                id: row.get(0)?,
                voucher_code: row.get(1)?,
                voucher_image: row.get(2)?,
                thumbnail: row.get(3)?,
                flickr_id: row.get(4)?,
                image_file: row.get(5)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn save_local_image(&mut self, image: &mut LocalImage) -> Result<(), VoseqError> {
        if image.id == 0 {
            self.connection.execute(
                "INSERT INTO local_images (voucher_code, voucher_image) VALUES (?1, ?2)",
                rusqlite::params![image.voucher_code, image.voucher_image],
            )?;
            image.id = self.connection.last_insert_rowid();
        } else {
            self.connection.execute(
                "UPDATE local_images SET voucher_image = ?1 WHERE id = ?2",
                rusqlite::params![image.voucher_image, image.id],
            )?;
        }
        Ok(())
    }

    pub fn local_images(&self, voucher_code: &str) -> Result<Vec<LocalImage>, VoseqError> {
        let mut select = self.connection.prepare(
            "SELECT id, voucher_code, voucher_image FROM local_images WHERE voucher_code = ?1 \
             ORDER BY id",
        )?;
        let rows = select.query_map((voucher_code,), |row| {
            Ok(LocalImage {
                id: row.get(0)?,
                voucher_code: row.get(1)?,
                voucher_image: row.get(2)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

// SQL mappings for the choice enums. Stored as their historical strings.

impl ToSql for Sex {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Sex {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Sex::parse(s).ok_or_else(|| FromSqlError::Other(format!("not a sex: {}", s).into()))
    }
}

impl ToSql for TypeSpecies {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for TypeSpecies {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        TypeSpecies::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("not a type-species flag: {}", s).into()))
    }
}

impl ToSql for VoucherStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for VoucherStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        VoucherStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("not a voucher status: {}", s).into()))
    }
}

impl ToSql for Curation {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Curation {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Curation::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("not a curation flag: {}", s).into()))
    }
}
