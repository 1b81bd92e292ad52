// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexer module - commands that write the catalogue or the collection

pub mod add;
pub mod ingest;
