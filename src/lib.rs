// SPDX-License-Identifier: MIT

pub mod blast;
pub mod config;
pub mod errors;
pub mod flickr;
pub mod records;
mod runner;
pub mod seq;
pub mod store;

use crate::errors::VoseqError;

pub fn run() -> Result<(), VoseqError> {
    runner::run()
}
