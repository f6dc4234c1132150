//! End-to-end tests of the data plane core: catalog discovery, soft links,
//! authorization-filtered enumeration, cached aggregation, resampling and
//! orchestrated reads.

pub mod test_source;

#[cfg(test)]
mod catalog_tests;
#[cfg(test)]
mod read_tests;
