//! JSON schemas structures for serde deserialization.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::hash::Sha1Hash;


// ================== //
//  PACKAGE MANIFEST  //
// ================== //

/// The modpack descriptor: a release tag, the target game version and the overlay
/// content layered on top of it.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// The modpack release tag.
    pub version: String,
    /// The target game version id (e.g. `1.20.1`).
    pub game_version: String,
    /// Origin of this manifest, none for purely local instances.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
    /// Optional extra primary library origin, prepended to every library source list
    /// at plan time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries_url: Option<String>,
    /// Optional embedded copy of the version manifest, it may be incomplete and is
    /// repaired during resolution when its downloads mapping is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_manifest: Option<VersionManifest>,
    /// Feature flags enabled by this modpack, checked against library rules.
    #[serde(default)]
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub features: IndexSet<String>,
    /// The overlay content, opaque to the planner and handed to the package
    /// installer collaborator.
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
}

/// A single overlay file of the modpack.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Path of the file, relative to the instance content directory.
    pub path: String,
    #[serde(flatten)]
    pub download: Download,
}

// ================== //
//  VERSION MANIFEST  //
// ================== //

/// The game-engine descriptor for a specific game version: client JAR, libraries
/// and asset index.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    /// The game version id.
    pub id: String,
    /// Key into the asset index directory, may be missing for legacy versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    /// Download information of the asset index, none for legacy versions that have
    /// no assets to fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<Download>,
    /// A mapping of downloads for entry point JAR files, the `client` role at least.
    /// Empty on old embedded manifests, which triggers the resolver repair.
    #[serde(default)]
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub downloads: IndexMap<String, Download>,
    /// The sequence of library archives required by this version, the order is
    /// meaningful and must be preserved by the resolver repair.
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub name: String,
    #[serde(default)]
    #[serde(skip_serializing_if = "LibraryDownloads::is_empty")]
    pub downloads: LibraryDownloads,
    /// Mapping from os name to the natives classifier to use on it, the classifier
    /// may contain the `${arch}` replacement pattern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibraryDownload>,
    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub classifiers: HashMap<String, LibraryDownload>,
}

impl LibraryDownloads {
    fn is_empty(&self) -> bool {
        self.artifact.is_none() && self.classifiers.is_empty()
    }
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDownload {
    /// Install path of the artifact, relative to the libraries directory.
    pub path: Option<String>,
    #[serde(flatten)]
    pub download: Download,
}

// ================== //
//    RELEASE LIST    //
// ================== //

/// Index of all game versions available from an origin.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseList {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<ReleaseLatest>,
    pub versions: Vec<ReleaseEntry>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct ReleaseLatest {
    pub release: Option<String>,
    pub snapshot: Option<String>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_time: Option<DateTime<FixedOffset>>,
    #[serde(flatten)]
    pub download: Download,
}

// ================== //
//    ASSET INDEX     //
// ================== //

/// Mapping of assets from their logical name to their download information. The
/// on-wire path of an object is `<hash[0:2]>/<hash>` under the assets origin.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct AssetIndex {
    pub objects: IndexMap<String, AssetObject>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct AssetObject {
    pub hash: Sha1Hash,
    pub size: u32,
}

// ================== //
//       COMMON       //
// ================== //

/// A single downloadable, hash-addressed artifact.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct Download {
    pub url: String,
    pub size: Option<u32>,
    pub sha1: Option<Sha1Hash>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: RuleOs,
    #[serde(default)]
    pub features: HashMap<String, bool>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RuleOs {
    pub name: Option<String>,
    pub arch: Option<String>,
    /// Only known value to use a regex pattern.
    #[serde(default, with = "os_version_pattern", skip_serializing_if = "Option::is_none")]
    pub version: Option<Regex>,
}

/// Serde adapter keeping the os version rule as its regex pattern string.
mod os_version_pattern {

    use regex::Regex;
    use serde::de::Error as _;
    use serde::Deserialize as _;

    pub fn serialize<S>(version: &Option<Regex>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match version {
            Some(regex) => serializer.serialize_some(regex.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|pattern| Regex::new(&pattern).map_err(D::Error::custom))
            .transpose()
    }

}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Disallow,
}
