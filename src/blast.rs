// SPDX-License-Identifier: MIT

// Local BLAST handling for the sequences of one gene: exporting them from the store to FASTA,
// building a searchable database with the NCBI command-line tools (masked by default) and running
// blastn queries against it. The external binaries are opaque; exit status and the files they
// leave behind are the only signals used.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::BlastConfig;
use crate::errors::VoseqError;
use crate::seq::fasta::write_fasta_file;
use crate::seq::file::SeqFile;
use crate::seq::record::SeqRecord;
use crate::store::Store;

/// Expectation-value cutoff passed to blastn.
pub const BLAST_EVALUE: &str = "0.001";

/// Fixed name of the blastn result file (XML, outfmt 5), created in the database directory.
pub const BLAST_OUTPUT_FILE: &str = "blast_output.xml";

pub struct Blast<'a> {
    store: &'a Store,
    db_dir: PathBuf,
    bin_dir: Option<PathBuf>,
    voucher_code: Option<String>,
    gene_code: String,
    mask: bool,
}

impl<'a> Blast<'a> {
    /// A builder for one gene's local database. `mask` eliminates low-complexity regions from
    /// the sequences; pass false for an unmasked database. The voucher code is only needed when
    /// a query is going to be run.
    pub fn new(
        store: &'a Store,
        config: &BlastConfig,
        voucher_code: Option<&str>,
        gene_code: &str,
        mask: bool,
    ) -> Blast<'a> {
        Blast {
            store,
            db_dir: config.db_dir.clone(),
            bin_dir: config.bin_dir.clone(),
            voucher_code: voucher_code.map(String::from),
            gene_code: gene_code.to_string(),
            mask,
        }
    }

    /// Whether database files for this gene already exist on disk.
    pub fn has_local_database(&self) -> bool {
        !self.database_files().is_empty()
    }

    /// False when there is no database; otherwise true unless some sequence record was created
    /// or edited after the newest database file was written.
    pub fn is_database_current(&self) -> Result<bool, VoseqError> {
        if !self.has_local_database() {
            return Ok(false);
        }
        let built = self.newest_database_time()?;
        // An empty sequence table cannot have anything newer than the files on disk.
        let Some((latest_created, latest_edited)) = self.store.latest_sequence_times()? else {
            return Ok(true);
        };
        Ok(latest_created <= built && latest_edited <= built)
    }

    /// Writes all of the gene's sequences to `<gene>_seqs.fas` in the database directory,
    /// overwriting any previous export. Record ids are `<voucher code>|<gene code>`; leading and
    /// trailing placeholder runs are stripped.
    pub fn export_sequences_to_file(&self) -> Result<PathBuf, VoseqError> {
        self.ensure_db_dir()?;
        let sequences = self.store.sequences_for_gene(&self.gene_code)?;
        if sequences.is_empty() {
            warn!("no sequences stored for gene {}", self.gene_code);
        }
        let records: SeqFile = sequences
            .iter()
            .map(|sequence| SeqRecord {
                header: format!("{}|{}", sequence.code, sequence.gene_code),
                sequence: strip_placeholder_runs(&sequence.sequences).to_string(),
            })
            .collect();
        let path = self.seqs_file_path();
        // Written under a temporary name first, so nothing ever reads a half-done export.
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".tmp-{}", std::process::id()));
        let tmp = PathBuf::from(tmp);
        write_fasta_file(&tmp, &records)?;
        fs::rename(&tmp, &path)?;
        info!("wrote {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Writes the query sequence (the builder's voucher and gene) to `<gene>_query.fas`,
    /// placeholder runs stripped, and returns the path for `run_query`.
    pub fn export_query_to_file(&self) -> Result<PathBuf, VoseqError> {
        let voucher_code = self
            .voucher_code
            .as_deref()
            .ok_or_else(|| VoseqError::Format(String::from("no voucher code for the query")))?;
        let sequence = self
            .store
            .sequence(voucher_code, &self.gene_code)?
            .ok_or_else(|| {
                VoseqError::Format(format!(
                    "no sequence for voucher {} and gene {}",
                    voucher_code, self.gene_code
                ))
            })?;
        self.ensure_db_dir()?;
        let record = SeqRecord {
            header: format!("{}|{}", sequence.code, sequence.gene_code),
            sequence: strip_placeholder_runs(&sequence.sequences).to_string(),
        };
        let path = self.query_file_path();
        write_fasta_file(&path, &[record])?;
        Ok(path)
    }

    /// Builds the database from the exported FASTA file. With masking on, dustmasker marks the
    /// low-complexity regions first and makeblastdb takes its annotations; otherwise makeblastdb
    /// runs alone. A lock file serializes builders for the same gene: a second build fails fast
    /// while one is running. Any non-zero exit aborts the build.
    pub fn build_database(&self) -> Result<(), VoseqError> {
        self.ensure_db_dir()?;
        let _lock = BuildLock::acquire(&self.lock_file_path())?;
        if self.mask {
            run_tool(self.dustmasker_command(), "dustmasker")?;
        }
        run_tool(self.makeblastdb_command(), "makeblastdb")?;
        info!(
            "built local database for {} ({})",
            self.gene_code,
            if self.mask { "masked" } else { "unmasked" }
        );
        Ok(())
    }

    /// Export and build, unless a database exists and no sequence is newer than it.
    pub fn ensure_current_database(&self) -> Result<(), VoseqError> {
        if self.is_database_current()? {
            info!("local database for {} is current", self.gene_code);
            return Ok(());
        }
        self.export_sequences_to_file()?;
        self.build_database()
    }

    /// Runs blastn with the prepared query against the gene's database. The result lands in a
    /// fixed-named XML file in the database directory.
    pub fn run_query(&self) -> Result<PathBuf, VoseqError> {
        run_tool(self.blastn_command(), "blastn")?;
        Ok(self.output_file_path())
    }

    pub fn seqs_file_path(&self) -> PathBuf {
        self.db_dir.join(format!("{}_seqs.fas", self.gene_code))
    }

    // makeblastdb expects the mask file name as produced by dustmasker, appended to the FASTA
    // name rather than replacing its extension.
    fn mask_file_path(&self) -> PathBuf {
        let mut name = self.seqs_file_path().into_os_string();
        name.push("_dust.asnb");
        PathBuf::from(name)
    }

    fn query_file_path(&self) -> PathBuf {
        self.db_dir.join(format!("{}_query.fas", self.gene_code))
    }

    fn lock_file_path(&self) -> PathBuf {
        self.db_dir.join(format!("{}.lock", self.gene_code))
    }

    fn output_file_path(&self) -> PathBuf {
        self.db_dir.join(BLAST_OUTPUT_FILE)
    }

    // The on-disk database is a family of files named <gene>_seqs.fas.n* (nhr, nin, nsq and
    // friends).
    fn database_files(&self) -> Vec<PathBuf> {
        let prefix = format!("{}_seqs.fas.n", self.gene_code);
        let Ok(entries) = fs::read_dir(&self.db_dir) else {
            return Vec::new();
        };
        let mut files = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) {
                files.push(entry.path());
            }
        }
        files
    }

    fn newest_database_time(&self) -> Result<DateTime<Utc>, VoseqError> {
        let mut newest: Option<SystemTime> = None;
        for file in self.database_files() {
            let modified = fs::metadata(&file)?.modified()?;
            newest = Some(match newest {
                Some(current) if current >= modified => current,
                _ => modified,
            });
        }
        let newest = newest.ok_or_else(|| {
            VoseqError::Format(format!("no database files for {}", self.gene_code))
        })?;
        Ok(DateTime::<Utc>::from(newest))
    }

    fn ensure_db_dir(&self) -> Result<(), VoseqError> {
        fs::create_dir_all(&self.db_dir)?;
        Ok(())
    }

    fn tool_command(&self, name: &str) -> Command {
        match &self.bin_dir {
            Some(dir) => Command::new(dir.join(name)),
            None => Command::new(name),
        }
    }

    fn dustmasker_command(&self) -> Command {
        let mut command = self.tool_command("dustmasker");
        command
            .arg("-in")
            .arg(self.seqs_file_path())
            .arg("-infmt")
            .arg("fasta")
            .arg("-outfmt")
            .arg("maskinfo_asn1_bin")
            .arg("-out")
            .arg(self.mask_file_path());
        command
    }

    fn makeblastdb_command(&self) -> Command {
        let mut command = self.tool_command("makeblastdb");
        command
            .arg("-in")
            .arg(self.seqs_file_path())
            .arg("-input_type")
            .arg("fasta")
            .arg("-dbtype")
            .arg("nucl");
        if self.mask {
            command.arg("-mask_data").arg(self.mask_file_path());
        }
        command.arg("-out").arg(self.seqs_file_path());
        if self.mask {
            command
                .arg("-title")
                .arg("Whole Genome without low-complexity regions");
        } else {
            command.arg("-title").arg("Whole Genome unmasked");
        }
        command
    }

    fn blastn_command(&self) -> Command {
        let mut command = self.tool_command("blastn");
        command
            .arg("-query")
            .arg(self.query_file_path())
            .arg("-db")
            .arg(self.seqs_file_path())
            .arg("-evalue")
            .arg(BLAST_EVALUE)
            .arg("-outfmt")
            .arg("5")
            .arg("-out")
            .arg(self.output_file_path());
        command
    }
}

// Alignment padding: leading and trailing runs of '?' are stripped before export, anything
// interior stays.
fn strip_placeholder_runs(sequence: &str) -> &str {
    sequence.trim_matches('?')
}

fn run_tool(mut command: Command, tool: &str) -> Result<(), VoseqError> {
    info!("running {:?}", command);
    let output = command
        .output()
        .map_err(|e| VoseqError::Tool(format!("failed to run {}: {}", tool, e)))?;
    if !output.status.success() {
        return Err(VoseqError::Tool(format!(
            "{} failed: {}",
            tool,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

// Holds `<gene>.lock` in the database directory for as long as a build runs. Created with
// create_new, so a second builder for the same gene fails instead of interleaving writes.
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(path: &Path) -> Result<BuildLock, VoseqError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(BuildLock {
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(VoseqError::Format(
                format!("a build is already running ({} exists)", path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        fs::remove_file(&self.path).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlastConfig;

    fn test_blast(store: &Store, mask: bool) -> Blast<'_> {
        let config = BlastConfig {
            db_dir: PathBuf::from("db"),
            bin_dir: None,
        };
        Blast::new(store, &config, Some("CP100-10"), "COI", mask)
    }

    fn args_of(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_strip_placeholder_runs() {
        assert_eq!("GAATTC", strip_placeholder_runs("???GAATTC??"));
        assert_eq!("GAA??TTC", strip_placeholder_runs("GAA??TTC"));
        assert_eq!("", strip_placeholder_runs("????"));
        assert_eq!("GA-TT", strip_placeholder_runs("GA-TT"));
    }

    #[test]
    fn test_file_paths() {
        let store = Store::open_in_memory().expect("in-memory store");
        let blast = test_blast(&store, true);
        assert_eq!(PathBuf::from("db/COI_seqs.fas"), blast.seqs_file_path());
        assert_eq!(
            PathBuf::from("db/COI_seqs.fas_dust.asnb"),
            blast.mask_file_path()
        );
        assert_eq!(PathBuf::from("db/COI_query.fas"), blast.query_file_path());
        assert_eq!(PathBuf::from("db/COI.lock"), blast.lock_file_path());
        assert_eq!(
            PathBuf::from("db/blast_output.xml"),
            blast.output_file_path()
        );
    }

    #[test]
    fn test_dustmasker_arguments() {
        let store = Store::open_in_memory().expect("in-memory store");
        let blast = test_blast(&store, true);
        let command = blast.dustmasker_command();
        assert_eq!(command.get_program(), "dustmasker");
        assert_eq!(
            args_of(&command),
            vec![
                "-in",
                "db/COI_seqs.fas",
                "-infmt",
                "fasta",
                "-outfmt",
                "maskinfo_asn1_bin",
                "-out",
                "db/COI_seqs.fas_dust.asnb",
            ]
        );
    }

    #[test]
    fn test_makeblastdb_arguments_masked() {
        let store = Store::open_in_memory().expect("in-memory store");
        let blast = test_blast(&store, true);
        let command = blast.makeblastdb_command();
        assert_eq!(
            args_of(&command),
            vec![
                "-in",
                "db/COI_seqs.fas",
                "-input_type",
                "fasta",
                "-dbtype",
                "nucl",
                "-mask_data",
                "db/COI_seqs.fas_dust.asnb",
                "-out",
                "db/COI_seqs.fas",
                "-title",
                "Whole Genome without low-complexity regions",
            ]
        );
    }

    #[test]
    fn test_makeblastdb_arguments_unmasked() {
        let store = Store::open_in_memory().expect("in-memory store");
        let blast = test_blast(&store, false);
        let command = blast.makeblastdb_command();
        assert_eq!(
            args_of(&command),
            vec![
                "-in",
                "db/COI_seqs.fas",
                "-input_type",
                "fasta",
                "-dbtype",
                "nucl",
                "-out",
                "db/COI_seqs.fas",
                "-title",
                "Whole Genome unmasked",
            ]
        );
    }

    #[test]
    fn test_blastn_arguments() {
        let store = Store::open_in_memory().expect("in-memory store");
        let blast = test_blast(&store, true);
        let command = blast.blastn_command();
        assert_eq!(
            args_of(&command),
            vec![
                "-query",
                "db/COI_query.fas",
                "-db",
                "db/COI_seqs.fas",
                "-evalue",
                "0.001",
                "-outfmt",
                "5",
                "-out",
                "db/blast_output.xml",
            ]
        );
    }

    #[test]
    fn test_tool_command_uses_bin_dir() {
        let store = Store::open_in_memory().expect("in-memory store");
        let config = BlastConfig {
            db_dir: PathBuf::from("db"),
            bin_dir: Some(PathBuf::from("/usr/local/ncbi/blast/bin")),
        };
        let blast = Blast::new(&store, &config, None, "COI", true);
        let command = blast.tool_command("blastn");
        assert_eq!(command.get_program(), "/usr/local/ncbi/blast/bin/blastn");
    }
}
