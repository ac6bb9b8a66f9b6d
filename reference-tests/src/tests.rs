//! Reference test integration tests
//!
//! These tests run the reference suite via cargo test.

use crate::{
    decomposed_duct_test, settling_column_test, spray_channel_test, ReferenceTest, TestResult,
};

/// Resolve the case directory relative to the workspace root
fn configs_dir() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let project_root = std::path::Path::new(manifest_dir)
        .parent()
        .expect("Could not find workspace root");
    project_root.join("configs").to_string_lossy().to_string()
}

fn run(test: ReferenceTest) -> TestResult {
    let result = test.run().expect("reference test should run");
    result.print_summary();
    result
}

#[test]
fn test_settling_column() {
    let result = run(settling_column_test(&configs_dir()));
    assert!(result.passed, "Settling column failed: {:?}", result.checks);
    assert_eq!(result.totals.migrations, 0);
}

#[test]
fn test_spray_channel() {
    let result = run(spray_channel_test(&configs_dir()));
    assert!(result.passed, "Spray channel failed: {:?}", result.checks);
}

#[test]
fn test_decomposed_duct() {
    let result = run(decomposed_duct_test(&configs_dir()));
    assert!(result.passed, "Decomposed duct failed: {:?}", result.checks);
    assert!(result.totals.migrations >= 16);
}

#[test]
fn test_missing_case_file_is_an_error() {
    let mut test = settling_column_test(&configs_dir());
    test.config_path = format!("{}/missing.json", configs_dir());
    assert!(test.run().is_err());
}
