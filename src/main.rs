// SPDX-License-Identifier: MIT

use std::process::ExitCode;

fn main() -> ExitCode {
    match voseq::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("voseq: {}", e);
            ExitCode::FAILURE
        }
    }
}
