//! A3S Index CLI - compose multi-platform OCI image indexes.

pub mod commands;
pub mod output;
pub mod target;
