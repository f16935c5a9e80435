// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::seq::file::SeqFile;
use crate::seq::record::SeqRecord;

// Sequence lines are wrapped on output; 60 columns is the usual width for nucleotide FASTA.
pub const FASTA_LINE_WIDTH: usize = 60;

pub fn read_fasta_file<P: AsRef<Path>>(path: P) -> Result<SeqFile, std::io::Error> {
    let file = File::open(path)?;
    let mut result: SeqFile = Vec::new();
    let mut current_record = SeqRecord {
        header: String::new(),
        sequence: String::new(),
    };
    let mut first_header = true;

    for line in BufReader::new(file).lines() {
        let l: String = line?;
        if let Some(hdr) = l.strip_prefix(">") {
            if first_header {
                first_header = false;
            } else {
                // push existing record
                result.push(current_record);
            }
            current_record = SeqRecord {
                header: String::new(),
                sequence: String::new(),
            };
            current_record.header.push_str(hdr);
        } else {
            // append line to current record's sequence
            current_record.sequence.push_str(&l);
        }
    }
    result.push(current_record);
    Ok(result)
}

pub fn write_fasta_file<P: AsRef<Path>>(path: P, records: &[SeqRecord]) -> Result<(), std::io::Error> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, ">{}", record.header)?;
        for chunk in record.sequence.as_bytes().chunks(FASTA_LINE_WIDTH) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_fasta_file_1() {
        let path = "data/test1.fas";
        let fasta: SeqFile = read_fasta_file(path).expect("Test file not found");
        assert_eq!(fasta[0].header, "CP100-10|COI");
        assert_eq!(fasta[0].sequence, "GAATTC");
        assert_eq!(fasta[1].header, "CP100-11|COI");
        assert_eq!(fasta[1].sequence, "TTGCCGACGA");
    }

    #[test]
    fn test_read_fasta_file_2() {
        // Sequence split over several lines, placeholder padding left intact by the reader.
        let path = "data/test2.fas";
        let fasta: SeqFile = read_fasta_file(path).expect("Test file not found");
        assert_eq!(fasta[0].header, "CP100-12|EF1a");
        assert_eq!(
            fasta[0].sequence,
            "????TTGAGCAGGAATAGTAGGAACTTCTTTAAGTTTATTAATTCGAGCAGAATT????"
        );
    }

    #[test]
    fn test_write_fasta_file_wraps_lines() {
        let mut path = std::env::temp_dir();
        path.push(format!("voseq-fasta-wrap-{}.fas", std::process::id()));
        let records = vec![SeqRecord {
            header: String::from("CP100-10|COI"),
            sequence: "A".repeat(130),
        }];
        write_fasta_file(&path, &records).expect("writing test file");
        let text = std::fs::read_to_string(&path).expect("reading test file back");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ">CP100-10|COI");
        assert_eq!(lines[1].len(), 60);
        assert_eq!(lines[2].len(), 60);
        assert_eq!(lines[3].len(), 10);
        assert_eq!(lines.len(), 4);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_then_read_back() {
        let mut path = std::env::temp_dir();
        path.push(format!("voseq-fasta-rt-{}.fas", std::process::id()));
        let records = vec![
            SeqRecord {
                header: String::from("CP100-10|COI"),
                sequence: String::from("GAATTC"),
            },
            SeqRecord {
                header: String::from("CP100-11|COI"),
                sequence: String::from("TTGCCGACGA"),
            },
        ];
        write_fasta_file(&path, &records).expect("writing test file");
        let back = read_fasta_file(&path).expect("reading test file back");
        assert_eq!(back, records);
        std::fs::remove_file(&path).ok();
    }
}
