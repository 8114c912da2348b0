pub mod cli;
pub mod collection;
pub mod config;
pub mod data_types;
pub mod document;
pub mod matcher;
pub mod naming;
pub mod sort;

#[cfg(test)]
pub(crate) mod testutils;
