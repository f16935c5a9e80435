// SPDX-License-Identifier: MIT

pub mod fasta;
pub mod file;
pub mod record;
