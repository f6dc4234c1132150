#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// Contains data model types.
pub mod data_model;

/// Contains extensibility types.
pub mod extensibility;
