// SPDX-License-Identifier: MIT

// A record for sequences, consisting of some description and a raw sequence. Used both for FASTA
// I/O and for sequences pulled out of the store on their way to a BLAST database.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub header: String,
    pub sequence: String,
}
