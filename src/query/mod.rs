// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - search, lookup and analytics commands

pub mod analytics;
pub mod records;
pub mod search;
