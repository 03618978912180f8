#![recursion_limit = "256"]

// Dynamic Coattention Network reader: a coattention encoder and an
// iterative answer-pointer decoder scoring start/end positions with
// two Highway Maxout Networks.

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
pub mod error;
