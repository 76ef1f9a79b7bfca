//! Discovery: current input revision and available host configurations.

use serde_json::Value;
use std::path::Path;

use crate::backend::Backend;
use crate::error::{Error, Query, Result};
use crate::types::{HostCatalog, PinState};

/// Revision of `input` as currently locked in the flake at `repo`.
pub fn current_revision(backend: &dyn Backend, repo: &Path, input: &str) -> Result<PinState> {
    let json = backend
        .flake_info(repo)
        .map_err(|e| Error::discovery(Query::Info, e.to_string()))?;
    let pin = parse_revision(&json, input)?;
    log::debug!("Input '{}' locked at {}", input, pin.last_modified);
    Ok(pin)
}

/// Host configurations listed under `attr` in the flake at `repo`.
pub fn list_hosts(backend: &dyn Backend, repo: &Path, attr: &str) -> Result<HostCatalog> {
    let json = backend
        .flake_show(repo)
        .map_err(|e| Error::discovery(Query::Show, e.to_string()))?;
    let catalog = parse_hosts(&json, attr)?;
    log::debug!("Flake exposes {} host(s) under {}", catalog.len(), attr);
    Ok(catalog)
}

/// Extract `locks.nodes.<input>.locked.lastModified` from flake metadata.
pub fn parse_revision(json: &str, input: &str) -> Result<PinState> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::discovery(Query::Info, format!("invalid JSON: {e}")))?;

    let node = &value["locks"]["nodes"][input];
    if node.is_null() {
        return Err(Error::discovery(
            Query::Info,
            format!("input '{input}' not found in lock file"),
        ));
    }

    // Older lock files store the timestamp as a string
    let last_modified = match &node["locked"]["lastModified"] {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        Error::discovery(
            Query::Info,
            format!("input '{input}' has no locked lastModified timestamp"),
        )
    })?;

    Ok(PinState::new(last_modified))
}

/// Extract the configuration names under `attr` from flake outputs.
pub fn parse_hosts(json: &str, attr: &str) -> Result<HostCatalog> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::discovery(Query::Show, format!("invalid JSON: {e}")))?;

    let configurations = value[attr].as_object().ok_or_else(|| {
        Error::discovery(Query::Show, format!("flake has no '{attr}' output"))
    })?;

    Ok(HostCatalog::new(configurations.keys().cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{BEFORE, MockBackend};

    const METADATA: &str = r#"{
        "locks": {
            "nodes": {
                "nixpkgs": {
                    "locked": {
                        "lastModified": 1700000000,
                        "narHash": "sha256-abc",
                        "type": "github"
                    }
                },
                "root": { "inputs": { "nixpkgs": "nixpkgs" } }
            },
            "root": "root",
            "version": 7
        }
    }"#;

    #[test]
    fn test_parse_revision() {
        let pin = parse_revision(METADATA, "nixpkgs").unwrap();
        assert_eq!(pin, PinState::new(1_700_000_000));
    }

    #[test]
    fn test_parse_revision_string_timestamp() {
        let json = r#"{"locks": {"nodes": {"nixpkgs": {"locked": {"lastModified": "42"}}}}}"#;
        assert_eq!(parse_revision(json, "nixpkgs").unwrap(), PinState::new(42));
    }

    #[test]
    fn test_parse_revision_missing_input() {
        let err = parse_revision(METADATA, "home-manager").unwrap_err();
        assert!(matches!(err, Error::Discovery { query: Query::Info, .. }));
        assert!(err.to_string().contains("home-manager"));
    }

    #[test]
    fn test_parse_revision_missing_timestamp() {
        let json = r#"{"locks": {"nodes": {"nixpkgs": {"locked": {}}}}}"#;
        assert!(parse_revision(json, "nixpkgs").is_err());
    }

    #[test]
    fn test_parse_revision_invalid_json() {
        let err = parse_revision("warning: unknown setting\n{", "nixpkgs").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_parse_hosts() {
        let json = r#"{
            "nixosConfigurations": {
                "beta": { "type": "nixos-configuration" },
                "alpha": { "type": "nixos-configuration" }
            },
            "formatter": {}
        }"#;
        let catalog = parse_hosts(json, "nixosConfigurations").unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["alpha", "beta"]);
    }

    #[test]
    fn test_parse_hosts_missing_attr() {
        let err = parse_hosts(r#"{"packages": {}}"#, "nixosConfigurations").unwrap_err();
        assert!(matches!(err, Error::Discovery { query: Query::Show, .. }));
    }

    #[test]
    fn test_parse_hosts_other_attr() {
        let json = r#"{"darwinConfigurations": {"laptop": {}}}"#;
        let catalog = parse_hosts(json, "darwinConfigurations").unwrap();
        assert!(catalog.contains("laptop"));
    }

    #[test]
    fn test_failed_metadata_query() {
        let mut backend = MockBackend::new(&["alpha"]);
        backend.fail_info = true;

        let err = current_revision(&backend, Path::new("/flake"), "nixpkgs").unwrap_err();
        assert!(matches!(err, Error::Discovery { query: Query::Info, .. }));
        assert!(err.to_string().contains("exited with status 1"));
    }

    #[test]
    fn test_failed_show_query() {
        let mut backend = MockBackend::new(&["alpha"]);
        backend.fail_show = true;

        let err = list_hosts(&backend, Path::new("/flake"), "nixosConfigurations").unwrap_err();
        assert!(matches!(err, Error::Discovery { query: Query::Show, .. }));
        assert!(err.to_string().contains("nix flake show"));
    }

    #[test]
    fn test_discovery_through_backend() {
        let backend = MockBackend::new(&["alpha", "beta"]);
        let repo = Path::new("/flake");

        let pin = current_revision(&backend, repo, "nixpkgs").unwrap();
        assert_eq!(pin.last_modified, BEFORE);

        let catalog = list_hosts(&backend, repo, "nixosConfigurations").unwrap();
        assert_eq!(catalog.len(), 2);
    }
}
