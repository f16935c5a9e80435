// SPDX-License-Identifier: MIT

use std::{fmt, io};

#[derive(Debug)]
pub enum VoseqError {
    Io(io::Error),
    Db(rusqlite::Error),
    Format(String),
    Tool(String),
    Remote(String),
}

// These allow conversion to VoseqError, so '?' works throughout the crate.

impl From<io::Error> for VoseqError {
    fn from(e: io::Error) -> Self {
        VoseqError::Io(e)
    }
}

impl From<rusqlite::Error> for VoseqError {
    fn from(e: rusqlite::Error) -> Self {
        VoseqError::Db(e)
    }
}

impl From<String> for VoseqError {
    fn from(s: String) -> Self {
        VoseqError::Format(s)
    }
}

impl fmt::Display for VoseqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoseqError::Io(e) => write!(f, "I/O error: {}", e),
            VoseqError::Db(e) => write!(f, "Database error: {}", e),
            VoseqError::Format(msg) => write!(f, "Format error: {}", msg),
            VoseqError::Tool(msg) => write!(f, "External tool error: {}", msg),
            VoseqError::Remote(msg) => write!(f, "Photo host error: {}", msg),
        }
    }
}
