// src/state/record.rs
//! Repository record model and its identity key
//!
//! Records carry the PascalCase field names third-party manifests publish.
//! Numeric fields that origins publish inconsistently (number, float or
//! quoted string) are coerced to explicit optional integers at decode time;
//! anything uncoercible decodes as absent.

use serde::{Deserialize, Serialize};
use url::Url;

/// Composite identity of a repository record
///
/// Equality on all three fields defines "same repository" for
/// upsert/replace semantics, and the ordering gives readers a
/// deterministic listing order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoKey {
    pub name: String,
    pub author: String,
    pub internal_name: String,
}

impl RepoKey {
    pub fn of(record: &RepositoryRecord) -> Self {
        Self {
            name: record.name.clone(),
            author: record.author.clone(),
            internal_name: record.internal_name.clone(),
        }
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.author, self.internal_name)
    }
}

/// Source tracking embedded in every record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginInfo {
    /// URL the record was last fetched from
    #[serde(rename = "RepositoryUrl", default)]
    pub repository_url: String,

    /// Unix timestamp of the last successful refresh
    #[serde(rename = "LastUpdatedAt", default)]
    pub last_updated_at: i64,

    /// Set when the record came from a GitHub release poll
    #[serde(
        rename = "IsInternalPlugin",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_internal_plugin: Option<bool>,

    /// Set when the backing GitHub repository is private
    #[serde(
        rename = "IsPrivatePlugin",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub is_private_plugin: Option<bool>,
}

/// A single plugin repository entry, as published in the listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    #[serde(rename = "Author", default)]
    pub author: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Punchline", default, skip_serializing_if = "Option::is_none")]
    pub punchline: Option<String>,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "Changelog", default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,

    #[serde(rename = "InternalName", default)]
    pub internal_name: String,

    /// Version marker, origin-defined and loosely typed
    #[serde(
        rename = "AssemblyVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub assembly_version: Option<serde_json::Value>,

    #[serde(
        rename = "TestingAssemblyVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub testing_assembly_version: Option<serde_json::Value>,

    /// Canonical source URL; derived from a download link when absent
    #[serde(rename = "RepoUrl", default)]
    pub repo_url: Option<String>,

    #[serde(rename = "IconUrl", default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,

    #[serde(
        rename = "ApplicableVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub applicable_version: Option<String>,

    #[serde(rename = "Tags", default)]
    pub tags: Option<Vec<String>>,

    /// Compatibility level used for the derived outdated flag
    #[serde(
        rename = "ApiLevel",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub api_level: Option<i64>,

    /// Derived, never trusted from input; recomputed on every read
    #[serde(rename = "IsOutdated", default)]
    pub is_outdated: bool,

    #[serde(
        rename = "TestingApiLevel",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub testing_api_level: Option<i64>,

    #[serde(
        rename = "IsHide",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub is_hide: Option<bool>,

    #[serde(
        rename = "IsTestingExclusive",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub is_testing_exclusive: Option<bool>,

    #[serde(
        rename = "LastUpdated",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub last_updated: Option<i64>,

    /// Aggregated across all known release assets for internal plugins
    #[serde(
        rename = "DownloadCount",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub download_count: Option<i64>,

    #[serde(
        rename = "LastUpdate",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub last_update: Option<i64>,

    #[serde(
        rename = "LoadPriority",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub load_priority: Option<i64>,

    #[serde(
        rename = "LoadRequiredState",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub load_required_state: Option<i64>,

    #[serde(rename = "LoadSync", default, skip_serializing_if = "Option::is_none")]
    pub load_sync: Option<bool>,

    #[serde(
        rename = "AcceptsFeedback",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub accepts_feedback: Option<bool>,

    #[serde(
        rename = "DownloadLinkInstall",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_link_install: Option<String>,

    #[serde(
        rename = "DownloadLinkTesting",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_link_testing: Option<String>,

    #[serde(
        rename = "DownloadLinkUpdate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_link_update: Option<String>,

    #[serde(rename = "OriginRepositoryUrl", default)]
    pub origin: OriginInfo,
}

impl RepositoryRecord {
    pub fn key(&self) -> RepoKey {
        RepoKey::of(self)
    }

    /// The authoritative download link, in install > testing > update order
    pub fn available_download_link(&self) -> Option<&str> {
        [
            &self.download_link_install,
            &self.download_link_testing,
            &self.download_link_update,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|link| !link.is_empty())
    }

    /// Derive the canonical source URL from whichever download link is set
    ///
    /// GitHub links keep the first two path segments (owner/repo); any
    /// other host reduces to scheme, host and port.
    pub fn derive_repo_url(&self) -> Option<String> {
        let link = self.available_download_link()?;
        let parsed = Url::parse(link).ok()?;

        let mut base = format!("{}://{}", parsed.scheme(), parsed.host_str()?);
        if let Some(port) = parsed.port() {
            base.push_str(&format!(":{}", port));
        }

        if !link.starts_with("https://github.com") {
            return Some(base);
        }

        let mut segments = parsed.path_segments()?;
        let owner = segments.next().filter(|s| !s.is_empty())?;
        let repo = segments.next().filter(|s| !s.is_empty())?;
        Some(format!("{}/{}/{}", base, owner, repo))
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(coerce_i64))
    }

    pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(coerce_bool))
    }

    fn coerce_i64(value: Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    fn coerce_bool(value: Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_links(
        install: Option<&str>,
        testing: Option<&str>,
        update: Option<&str>,
    ) -> RepositoryRecord {
        RepositoryRecord {
            download_link_install: install.map(String::from),
            download_link_testing: testing.map(String::from),
            download_link_update: update.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_lenient_numeric_decode() {
        let json = r#"{
            "Name": "Sample",
            "ApiLevel": 9,
            "TestingApiLevel": 9.0,
            "LastUpdate": "1700000000",
            "DownloadCount": "not-a-number"
        }"#;

        let record: RepositoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.api_level, Some(9));
        assert_eq!(record.testing_api_level, Some(9));
        assert_eq!(record.last_update, Some(1_700_000_000));
        assert_eq!(record.download_count, None);
    }

    #[test]
    fn test_lenient_bool_decode() {
        let json = r#"{
            "Name": "Sample",
            "IsHide": "False",
            "IsTestingExclusive": 1
        }"#;

        let record: RepositoryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.is_hide, Some(false));
        assert_eq!(record.is_testing_exclusive, Some(true));
    }

    #[test]
    fn test_wire_field_names_round_trip() {
        let record = RepositoryRecord {
            author: "acme".into(),
            name: "Sample".into(),
            internal_name: "SamplePlugin".into(),
            api_level: Some(9),
            download_link_install: Some("https://example.com/sample.zip".into()),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Author"], "acme");
        assert_eq!(json["InternalName"], "SamplePlugin");
        assert_eq!(json["ApiLevel"], 9);
        assert_eq!(json["DownloadLinkInstall"], "https://example.com/sample.zip");
        // RepoUrl has no omit semantics on the wire
        assert!(json.get("RepoUrl").is_some());
        assert!(json.get("Punchline").is_none());
        assert!(json.get("OriginRepositoryUrl").is_some());

        let back: RepositoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_download_link_priority() {
        let record = record_with_links(
            Some("https://example.com/install.zip"),
            Some("https://example.com/testing.zip"),
            Some("https://example.com/update.zip"),
        );
        assert_eq!(
            record.available_download_link(),
            Some("https://example.com/install.zip")
        );

        let record = record_with_links(None, Some("https://example.com/testing.zip"), None);
        assert_eq!(
            record.available_download_link(),
            Some("https://example.com/testing.zip")
        );

        // Empty strings are skipped, not treated as present
        let record = record_with_links(Some(""), None, Some("https://example.com/update.zip"));
        assert_eq!(
            record.available_download_link(),
            Some("https://example.com/update.zip")
        );

        let record = record_with_links(None, None, None);
        assert_eq!(record.available_download_link(), None);
    }

    #[test]
    fn test_derive_repo_url_github() {
        let record = record_with_links(
            None,
            None,
            Some("https://github.com/acme/plugin/releases/download/v1/x.zip"),
        );
        assert_eq!(
            record.derive_repo_url(),
            Some("https://github.com/acme/plugin".to_string())
        );
    }

    #[test]
    fn test_derive_repo_url_other_host() {
        let record = record_with_links(Some("https://plugins.example.com/repo/sample.zip"), None, None);
        assert_eq!(
            record.derive_repo_url(),
            Some("https://plugins.example.com".to_string())
        );

        let record = record_with_links(Some("http://localhost:8080/files/sample.zip"), None, None);
        assert_eq!(
            record.derive_repo_url(),
            Some("http://localhost:8080".to_string())
        );
    }

    #[test]
    fn test_derive_repo_url_unparseable() {
        let record = record_with_links(Some("not a url"), None, None);
        assert_eq!(record.derive_repo_url(), None);

        let record = record_with_links(None, None, None);
        assert_eq!(record.derive_repo_url(), None);
    }

    #[test]
    fn test_key_equality() {
        let mut a = RepositoryRecord {
            author: "acme".into(),
            name: "Sample".into(),
            internal_name: "SamplePlugin".into(),
            ..Default::default()
        };
        let b = a.clone();
        assert_eq!(RepoKey::of(&a), RepoKey::of(&b));

        a.description = "differs".into();
        assert_eq!(RepoKey::of(&a), RepoKey::of(&b));

        a.internal_name = "Other".into();
        assert_ne!(RepoKey::of(&a), RepoKey::of(&b));
    }
}
