//! Version manifest and partition naming.
//!
//! Partition names follow `<role>-<version>`; the name is the sole
//! versioning mechanism. Activation deletes any partition whose full name
//! is not in the manifest's expected set.

use serde::{Deserialize, Serialize};

use crate::key::normalize;
use crate::resource::ResourceRequest;

/// Logical role of a partition within one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Core app shell assets, pre-cached on install.
    Static,
    /// Everything cached on demand at runtime.
    Dynamic,
    /// Third-party library resources.
    External,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Static, Role::Dynamic, Role::External];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Static => "static",
            Role::Dynamic => "dynamic",
            Role::External => "external",
        }
    }
}

/// Build-time description of one version of the app's resources.
///
/// Fixed at construction, read-only at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    /// Version identifier, e.g. `v3.0`.
    pub version: String,

    /// Origin of the hosting app, used for same-origin partition routing.
    pub origin: String,

    /// Core app shell paths, pre-cached into the static partition on install.
    pub core_paths: Vec<String>,

    /// Third-party URLs pre-cached into the external partition on install.
    pub external_urls: Vec<String>,

    /// Allowlisted third-party library hosts, in addition to the hosts of
    /// `external_urls`.
    pub external_hosts: Vec<String>,

    /// Path of the document served as a last-resort navigation fallback.
    pub root_document: String,
}

impl VersionManifest {
    /// `<role>-<version>` partition name.
    pub fn partition_name(&self, role: Role) -> String {
        format!("{}-{}", role.as_str(), self.version)
    }

    /// The full set of partition names this version owns. Any other name
    /// found in the store after activation is garbage.
    pub fn expected_partitions(&self) -> Vec<String> {
        Role::ALL.iter().map(|r| self.partition_name(*r)).collect()
    }

    /// Partition lookup order for reads: static first, then dynamic, then
    /// external.
    pub fn lookup_order(&self) -> Vec<String> {
        vec![
            self.partition_name(Role::Static),
            self.partition_name(Role::Dynamic),
            self.partition_name(Role::External),
        ]
    }

    /// Which role a captured response for this request is written to:
    /// same-origin goes to static, allowlisted external hosts to external,
    /// everything else to dynamic.
    pub fn role_for(&self, request: &ResourceRequest) -> Role {
        let Ok(url) = normalize(&request.url) else {
            return Role::Dynamic;
        };

        if let Ok(origin) = normalize(&self.origin)
            && url.origin() == origin.origin()
        {
            return Role::Static;
        }

        if let Some(host) = url.host_str()
            && self
                .all_external_hosts()
                .iter()
                .any(|h| h.eq_ignore_ascii_case(host))
        {
            return Role::External;
        }

        Role::Dynamic
    }

    /// Configured external hosts plus the hosts of the external URLs.
    pub fn all_external_hosts(&self) -> Vec<String> {
        let mut hosts = self.external_hosts.clone();
        for u in &self.external_urls {
            if let Ok(parsed) = normalize(u)
                && let Some(host) = parsed.host_str()
                && !hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
            {
                hosts.push(host.to_string());
            }
        }
        hosts
    }

    /// Absolute URL of a core path, resolved against the origin.
    pub fn core_url(&self, path: &str) -> String {
        let origin = self.origin.trim_end_matches('/');
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", origin, path.trim_start_matches('/'))
        }
    }

    /// Absolute URL of the root document fallback.
    pub fn root_document_url(&self) -> String {
        self.core_url(&self.root_document)
    }
}
