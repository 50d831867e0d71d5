#![allow(dead_code)]

pub mod integration;
pub mod utils;

/// Namespace every test run publishes into.
const TEST_DATABASE: &str = "servicenow_raw";
const TEST_JOB: &str = "servicenow_nightly";
