//! Enforcement over the real workspace sources

use architectural_enforcement::{
    declared_dependencies, scan_dir, workspace_root, Violation, CORE_RULES,
    FORBIDDEN_CORE_DEPENDENCIES, PRODUCTION_RULES,
};

fn report(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_core_production_code() {
    let dir = workspace_root().join("copilot/core/src");
    assert!(dir.is_dir(), "missing {}", dir.display());

    let mut violations = scan_dir(&dir, PRODUCTION_RULES);
    violations.extend(scan_dir(&dir, CORE_RULES));
    assert!(violations.is_empty(), "\n{}", report(&violations));
}

#[test]
fn test_cli_production_code() {
    let dir = workspace_root().join("copilot/cli/src");
    let violations = scan_dir(&dir, PRODUCTION_RULES);
    assert!(violations.is_empty(), "\n{}", report(&violations));
}

#[test]
fn test_core_has_no_ui_dependencies() {
    let manifest = std::fs::read_to_string(workspace_root().join("copilot/core/Cargo.toml")).unwrap();
    let dependencies = declared_dependencies(&manifest);

    for forbidden in FORBIDDEN_CORE_DEPENDENCIES {
        assert!(
            !dependencies.iter().any(|d| d == forbidden),
            "copilot-core must not depend on {forbidden}"
        );
    }
    assert!(dependencies.iter().any(|d| d == "tokio"));
}
