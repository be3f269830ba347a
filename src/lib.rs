//! bikeprep: bicycle-incident cleaning library
//!
//! Loads a crowdsourced bicycle-incident export, selects and recodes its
//! survey fields, and produces a stratified, fold-partitioned dataset with
//! a binary injury outcome for an external modeling library.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
