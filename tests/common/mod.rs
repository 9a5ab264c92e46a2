//! Common test utilities for somatic-etl integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod logs;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use logs::*;
