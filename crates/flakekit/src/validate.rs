//! Validation of requested hosts against the flake's host catalog.

use crate::types::HostCatalog;

/// Requested hosts split into those the flake defines and those it doesn't.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// Known hosts, in request order (duplicates kept)
    pub valid: Vec<String>,
    /// Unknown hosts, in request order
    pub rejected: Vec<String>,
}

impl Validation {
    /// Whether every requested host was found.
    pub fn all_valid(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Keep the requested hosts present in `catalog`, preserving input order.
pub fn filter_valid<S: AsRef<str>>(requested: &[S], catalog: &HostCatalog) -> Validation {
    let mut validation = Validation::default();
    for host in requested {
        let host = host.as_ref();
        if catalog.contains(host) {
            validation.valid.push(host.to_string());
        } else {
            log::warn!("Host '{}' not found in flake repository", host);
            validation.rejected.push(host.to_string());
        }
    }
    validation
}
