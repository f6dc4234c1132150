//! Integration tests for the Nexus data model.

mod data_model_extension_tests;
mod data_model_tests;
mod resource_path_tests;
