// SPDX-License-Identifier: MIT

pub mod utils;
