//! Construction of ordered download source lists from the configuration store.
//!
//! Every downloadable document has a *primary* origin, configured through a
//! built-in property, and an optional operator-configured *custom* origin
//! (mirror). The resulting list is deterministic: the origin of each URL and the
//! `customSourcesFirst` toggle fully determine its position.

use std::collections::HashMap;

use indexmap::IndexMap;


/// Property key of the primary libraries origin.
pub const LIBRARIES_SOURCE: &str = "librariesSource";
/// Property key of the primary asset objects origin.
pub const ASSETS_SOURCE: &str = "assetsSource";
/// Property key of the primary release list (all game versions) origin.
pub const VERSION_MANIFEST_URL: &str = "versionManifestUrl";
/// Property key of the custom libraries origin.
pub const CUSTOM_LIBRARIES_SOURCE: &str = "customLibrariesSource";
/// Property key of the custom asset objects origin.
pub const CUSTOM_ASSETS_SOURCE: &str = "customAssetsSource";
/// Property key of the custom release list origin.
pub const CUSTOM_VERSION_MANIFEST_URL: &str = "customVersionManifestUrl";
/// Property key of the custom origin serving both per-version JSON documents and
/// client JAR files (`<id>.json`, `<id>-client.jar` are joined onto it).
pub const CUSTOM_VERSIONS_SOURCE: &str = "customVersionsSource";
/// Property key of the custom asset indexes origin.
pub const CUSTOM_ASSET_INDEXES_SOURCE: &str = "customAssetIndexesSource";
/// Property key of the toggle that puts custom origins before primary ones when
/// its value is `"true"` (case-insensitive).
pub const CUSTOM_SOURCES_FIRST: &str = "customSourcesFirst";

/// Default primary origin for libraries.
const DEFAULT_LIBRARIES_SOURCE: &str = "https://libraries.minecraft.net/";
/// Default primary origin for asset objects.
const DEFAULT_ASSETS_SOURCE: &str = "https://resources.download.minecraft.net/";
/// Default primary origin for the release list.
const DEFAULT_VERSION_MANIFEST_URL: &str = "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// A read-only, string-valued view over the launcher's key/object store.
pub trait Properties {

    /// Return the raw value of the given property, if present.
    fn get_property(&self, key: &str) -> Option<&str>;

    /// True if the `customSourcesFirst` property is set to `"true"`, case-insensitive,
    /// any other value or its absence means that custom origins are fallbacks.
    fn custom_sources_first(&self) -> bool {
        self.get_property(CUSTOM_SOURCES_FIRST)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

}

impl Properties for IndexMap<String, String> {
    fn get_property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Properties for HashMap<String, String> {
    fn get_property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// Return the built-in properties, containing the primary origins.
pub fn default_properties() -> IndexMap<String, String> {
    IndexMap::from([
        (LIBRARIES_SOURCE.to_string(), DEFAULT_LIBRARIES_SOURCE.to_string()),
        (ASSETS_SOURCE.to_string(), DEFAULT_ASSETS_SOURCE.to_string()),
        (VERSION_MANIFEST_URL.to_string(), DEFAULT_VERSION_MANIFEST_URL.to_string()),
    ])
}

/// Build a source list with the primary origin read from the given property key,
/// see [`source_list_with`].
pub fn source_list(
    props: &dyn Properties,
    primary_key: &str,
    custom_key: Option<&str>,
    derive: impl Fn(&str) -> String,
) -> Vec<Box<str>> {
    source_list_with(props, props.get_property(primary_key), custom_key, derive)
}

/// Build a source list from an optional literal primary URL and an optional custom
/// origin property. The custom value, when present and not blank, goes through the
/// given derivation to produce a concrete URL (identity for root origins,
/// suffix-join for per-version documents). A custom URL that fails to parse is
/// omitted with a warning. The returned list may only be empty when the primary is
/// absent and no usable custom origin exists, callers treat that as a no-sources
/// error.
pub fn source_list_with(
    props: &dyn Properties,
    primary: Option<&str>,
    custom_key: Option<&str>,
    derive: impl Fn(&str) -> String,
) -> Vec<Box<str>> {

    let custom = custom_key
        .and_then(|key| props.get_property(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|base| derive(base))
        .and_then(|url| {
            match reqwest::Url::parse(&url) {
                Ok(_) => Some(url),
                Err(e) => {
                    log::warn!("omitting invalid custom source {url:?}: {e}");
                    None
                }
            }
        });

    let mut list = Vec::with_capacity(2);

    if props.custom_sources_first() {
        list.extend(custom.map(String::into_boxed_str));
        list.extend(primary.map(Box::from));
    } else {
        list.extend(primary.map(Box::from));
        list.extend(custom.map(String::into_boxed_str));
    }

    list

}

/// Join a path suffix onto a base URL, ensuring exactly one separating slash.
pub fn suffix_join(base: &str, suffix: &str) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    url.push('/');
    url.push_str(suffix.trim_start_matches('/'));
    url
}

/// Rebase every origin of the given list by appending the given path, used for
/// libraries and asset objects where the sources are root origins.
pub fn rebased(list: &[Box<str>], path: &str) -> Vec<Box<str>> {
    list.iter()
        .map(|base| suffix_join(base, path).into_boxed_str())
        .collect()
}

#[cfg(test)]
mod tests {

    use super::*;

    fn props(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|&(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn urls(list: &[Box<str>]) -> Vec<&str> {
        list.iter().map(|url| &**url).collect()
    }

    #[test]
    fn primary_only() {
        let props = props(&[(ASSETS_SOURCE, "https://assets.example.com/")]);
        let list = source_list(&props, ASSETS_SOURCE, Some(CUSTOM_ASSETS_SOURCE), str::to_string);
        assert_eq!(urls(&list), ["https://assets.example.com/"]);
    }

    #[test]
    fn custom_is_fallback_by_default() {
        let props = props(&[
            (ASSETS_SOURCE, "https://assets.example.com/"),
            (CUSTOM_ASSETS_SOURCE, "https://mirror.example.com/assets/"),
        ]);
        let list = source_list(&props, ASSETS_SOURCE, Some(CUSTOM_ASSETS_SOURCE), str::to_string);
        assert_eq!(urls(&list), ["https://assets.example.com/", "https://mirror.example.com/assets/"]);
    }

    #[test]
    fn custom_sources_first_flips_ordering() {
        let props = props(&[
            (ASSETS_SOURCE, "https://assets.example.com/"),
            (CUSTOM_ASSETS_SOURCE, "https://mirror.example.com/assets/"),
            (CUSTOM_SOURCES_FIRST, "TRUE"),
        ]);
        let list = source_list(&props, ASSETS_SOURCE, Some(CUSTOM_ASSETS_SOURCE), str::to_string);
        assert_eq!(urls(&list), ["https://mirror.example.com/assets/", "https://assets.example.com/"]);
    }

    #[test]
    fn custom_sources_first_other_values_ignored() {
        let props = props(&[
            (ASSETS_SOURCE, "https://assets.example.com/"),
            (CUSTOM_ASSETS_SOURCE, "https://mirror.example.com/assets/"),
            (CUSTOM_SOURCES_FIRST, "yes"),
        ]);
        let list = source_list(&props, ASSETS_SOURCE, Some(CUSTOM_ASSETS_SOURCE), str::to_string);
        assert_eq!(&*list[0], "https://assets.example.com/");
    }

    #[test]
    fn blank_custom_is_absent() {
        let props = props(&[
            (ASSETS_SOURCE, "https://assets.example.com/"),
            (CUSTOM_ASSETS_SOURCE, "   "),
            (CUSTOM_SOURCES_FIRST, "true"),
        ]);
        let list = source_list(&props, ASSETS_SOURCE, Some(CUSTOM_ASSETS_SOURCE), str::to_string);
        assert_eq!(urls(&list), ["https://assets.example.com/"]);
    }

    #[test]
    fn invalid_custom_is_omitted() {
        let props = props(&[
            (ASSETS_SOURCE, "https://assets.example.com/"),
            (CUSTOM_ASSETS_SOURCE, "not a url"),
        ]);
        let list = source_list(&props, ASSETS_SOURCE, Some(CUSTOM_ASSETS_SOURCE), str::to_string);
        assert_eq!(urls(&list), ["https://assets.example.com/"]);
    }

    #[test]
    fn derive_applies_to_custom_only() {
        let props = props(&[(CUSTOM_VERSIONS_SOURCE, "https://mirror.example.com/versions")]);
        let list = source_list_with(
            &props,
            Some("https://meta.example.com/v1/packages/abc/1.20.1.json"),
            Some(CUSTOM_VERSIONS_SOURCE),
            |base| suffix_join(base, "1.20.1.json"),
        );
        assert_eq!(urls(&list), [
            "https://meta.example.com/v1/packages/abc/1.20.1.json",
            "https://mirror.example.com/versions/1.20.1.json",
        ]);
    }

    #[test]
    fn suffix_join_normalizes_slashes() {
        assert_eq!(suffix_join("https://a.example.com", "x/y"), "https://a.example.com/x/y");
        assert_eq!(suffix_join("https://a.example.com/", "/x/y"), "https://a.example.com/x/y");
    }

}
