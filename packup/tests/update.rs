use std::fs::{self, File};
use std::io::BufReader;

use packup::download::{CancelToken, EntryErrorKind};
use packup::install::{self, Instance, Outcome, Updater};
use packup::manifest::{self, serde::{PackageManifest, VersionManifest}};
use packup::sources;

use indexmap::{IndexMap, IndexSet};
use serde_json::json;
use sha1::{Digest, Sha1};

use tempfile::TempDir;

use mockito::{Server, ServerGuard};


fn sha1_hex(data: &[u8]) -> String {
    let mut digest = Sha1::new();
    digest.update(data);
    format!("{:x}", digest.finalize())
}

fn tempdir() -> TempDir {
    tempfile::Builder::new()
        .prefix("")
        .suffix(".update")
        .tempdir_in(env!("CARGO_TARGET_TMPDIR"))
        .unwrap()
}

fn test_props(server: &ServerGuard) -> IndexMap<String, String> {
    IndexMap::from([
        (sources::VERSION_MANIFEST_URL.to_string(), format!("{}/version_manifest.json", server.url())),
        (sources::LIBRARIES_SOURCE.to_string(), format!("{}/libraries/", server.url())),
        (sources::ASSETS_SOURCE.to_string(), format!("{}/assets/", server.url())),
    ])
}

fn test_package(server: &ServerGuard) -> PackageManifest {
    PackageManifest {
        version: "1.0.0".to_string(),
        game_version: "1.20.1".to_string(),
        manifest_url: Some(format!("{}/packs/test.json", server.url())),
        libraries_url: None,
        version_manifest: None,
        features: IndexSet::new(),
        files: Vec::new(),
    }
}

fn release_body(server: &ServerGuard) -> String {
    json!({
        "versions": [
            {"id": "1.20.1", "url": format!("{}/1.20.1.json", server.url())},
        ],
    }).to_string()
}

#[test]
fn fresh_install_then_idempotent() {

    const CLIENT: &[u8] = b"client jar bytes";
    const LIBRARY: &[u8] = b"library bytes";
    const ASSET_ONE: &[u8] = b"asset one bytes";
    const ASSET_TWO: &[u8] = b"asset two bytes!!";

    let mut server = Server::new();
    let launcher_dir = tempdir();
    let instance_dir = tempdir();

    let index_body = json!({
        "objects": {
            "icons/a.png": {"hash": sha1_hex(ASSET_ONE), "size": ASSET_ONE.len()},
            "icons/b.png": {"hash": sha1_hex(ASSET_TWO), "size": ASSET_TWO.len()},
        },
    }).to_string();

    let version_body = json!({
        "id": "1.20.1",
        "assetId": "5",
        "assetIndex": {
            "url": format!("{}/indexes/5.json", server.url()),
            "size": index_body.len(),
            "sha1": sha1_hex(index_body.as_bytes()),
        },
        "downloads": {
            "client": {
                "url": format!("{}/client.jar", server.url()),
                "size": CLIENT.len(),
                "sha1": sha1_hex(CLIENT),
            },
        },
        "libraries": [
            {
                "name": "com.example:alpha:1.0",
                "downloads": {
                    "artifact": {
                        "path": "com/example/alpha/1.0/alpha-1.0.jar",
                        "url": format!("{}/libraries/com/example/alpha/1.0/alpha-1.0.jar", server.url()),
                        "size": LIBRARY.len(),
                        "sha1": sha1_hex(LIBRARY),
                    },
                },
            },
        ],
    }).to_string();

    // The second update resolves again but downloads nothing.
    let release_mock = server.mock("GET", "/version_manifest.json")
        .with_body(release_body(&server))
        .expect(2)
        .create();
    let version_mock = server.mock("GET", "/1.20.1.json")
        .with_body(&version_body)
        .expect(2)
        .create();
    let index_mock = server.mock("GET", "/indexes/5.json")
        .with_body(&index_body)
        .expect(1)
        .create();
    let client_mock = server.mock("GET", "/client.jar")
        .with_body(CLIENT)
        .expect(1)
        .create();
    let library_mock = server.mock("GET", "/libraries/com/example/alpha/1.0/alpha-1.0.jar")
        .with_body(LIBRARY)
        .expect(1)
        .create();
    let asset_mocks = [ASSET_ONE, ASSET_TWO].map(|body| {
        let hash = sha1_hex(body);
        server.mock("GET", &*format!("/assets/{}/{hash}", &hash[0..2]))
            .with_body(body)
            .expect(1)
            .create()
    });

    let mut updater = Updater::new(launcher_dir.path());
    updater.concurrency(2);

    let package = test_package(&server);
    let props = test_props(&server);

    let mut instance = Instance::new("test", instance_dir.path());
    instance.manifest_url = package.manifest_url.clone();

    let outcome = updater.update(&mut instance, &package, &props, &mut (), &mut (), ()).unwrap();
    assert_eq!(outcome, Outcome::Updated);

    assert!(instance.installed);
    assert!(!instance.update_pending);
    assert!(instance.local);
    assert_eq!(instance.version, "1.0.0");

    // Every artifact is at its expected path with its expected content.
    assert_eq!(fs::read(launcher_dir.path().join("versions/1.20.1-client.jar")).unwrap(), CLIENT);
    assert_eq!(fs::read(launcher_dir.path().join("libraries/com/example/alpha/1.0/alpha-1.0.jar")).unwrap(), LIBRARY);
    for body in [ASSET_ONE, ASSET_TWO] {
        let hash = sha1_hex(body);
        assert_eq!(fs::read(launcher_dir.path().join(format!("assets/objects/{}/{hash}", &hash[0..2]))).unwrap(), body);
    }
    assert!(launcher_dir.path().join("assets/indexes/5.json").is_file());
    assert!(instance_dir.path().join("version.json").is_file());
    assert!(launcher_dir.path().join("versions/1.20.1.json").is_file());

    // Second run: everything hits the skip-if-valid path, the artifact mocks
    // above expect exactly one request each.
    instance.update_pending = true;
    let outcome = updater.update(&mut instance, &package, &props, &mut (), &mut (), ()).unwrap();
    assert_eq!(outcome, Outcome::Updated);
    assert!(instance.installed);
    assert!(!instance.update_pending);

    release_mock.assert();
    version_mock.assert();
    index_mock.assert();
    client_mock.assert();
    library_mock.assert();
    for mock in &asset_mocks {
        mock.assert();
    }

}

#[test]
fn custom_sources_first_skips_primary() {

    const CLIENT: &[u8] = b"client jar bytes";
    const ASSET: &[u8] = b"asset bytes";

    let mut server = Server::new();
    let launcher_dir = tempdir();
    let instance_dir = tempdir();

    let asset_hash = sha1_hex(ASSET);

    let index_body = json!({
        "objects": {
            "icons/a.png": {"hash": asset_hash, "size": ASSET.len()},
        },
    }).to_string();

    let version_body = json!({
        "id": "1.20.1",
        "assetId": "5",
        "assetIndex": {
            "url": format!("{}/indexes/5.json", server.url()),
            "size": index_body.len(),
            "sha1": sha1_hex(index_body.as_bytes()),
        },
        "downloads": {
            "client": {
                "url": format!("{}/client.jar", server.url()),
                "size": CLIENT.len(),
                "sha1": sha1_hex(CLIENT),
            },
        },
    }).to_string();

    server.mock("GET", "/version_manifest.json").with_body(release_body(&server)).create();
    server.mock("GET", "/1.20.1.json").with_body(&version_body).create();
    server.mock("GET", "/indexes/5.json").with_body(&index_body).create();
    server.mock("GET", "/client.jar").with_body(CLIENT).create();

    // With customSourcesFirst, the mirror answers and the primary is never
    // contacted.
    let primary_mock = server.mock("GET", &*format!("/assets/{}/{asset_hash}", &asset_hash[0..2]))
        .expect(0)
        .create();
    let mirror_mock = server.mock("GET", &*format!("/mirror-assets/{}/{asset_hash}", &asset_hash[0..2]))
        .with_body(ASSET)
        .expect(1)
        .create();

    let mut props = test_props(&server);
    props.insert(sources::CUSTOM_ASSETS_SOURCE.to_string(), format!("{}/mirror-assets/", server.url()));
    props.insert(sources::CUSTOM_SOURCES_FIRST.to_string(), "true".to_string());

    let mut updater = Updater::new(launcher_dir.path());
    updater.concurrency(2);

    let package = test_package(&server);
    let mut instance = Instance::new("test", instance_dir.path());
    instance.manifest_url = package.manifest_url.clone();

    let outcome = updater.update(&mut instance, &package, &props, &mut (), &mut (), ()).unwrap();
    assert_eq!(outcome, Outcome::Updated);

    primary_mock.assert();
    mirror_mock.assert();

    let object_file = launcher_dir.path().join(format!("assets/objects/{}/{asset_hash}", &asset_hash[0..2]));
    assert_eq!(fs::read(object_file).unwrap(), ASSET);

}

#[test]
fn library_hash_mismatch_is_fatal() {

    const CLIENT: &[u8] = b"client jar bytes";
    const LIBRARY: &[u8] = b"library bytes";

    let mut server = Server::new();
    let launcher_dir = tempdir();
    let instance_dir = tempdir();

    let version_body = json!({
        "id": "1.20.1",
        "downloads": {
            "client": {
                "url": format!("{}/client.jar", server.url()),
                "size": CLIENT.len(),
                "sha1": sha1_hex(CLIENT),
            },
        },
        "libraries": [
            {
                "name": "com.example:alpha:1.0",
                "downloads": {
                    "artifact": {
                        "path": "com/example/alpha/1.0/alpha-1.0.jar",
                        "url": format!("{}/libraries/com/example/alpha/1.0/alpha-1.0.jar", server.url()),
                        "size": LIBRARY.len(),
                        "sha1": sha1_hex(LIBRARY),
                    },
                },
            },
        ],
    }).to_string();

    server.mock("GET", "/version_manifest.json").with_body(release_body(&server)).create();
    server.mock("GET", "/1.20.1.json").with_body(&version_body).create();
    server.mock("GET", "/client.jar").with_body(CLIENT).create();
    server.mock("GET", "/libraries/com/example/alpha/1.0/alpha-1.0.jar")
        .with_body(b"corrupted library bytes".as_slice())
        .create();

    let mut updater = Updater::new(launcher_dir.path());
    updater.concurrency(2);

    let package = test_package(&server);
    let props = test_props(&server);

    let mut instance = Instance::new("test", instance_dir.path());
    instance.manifest_url = package.manifest_url.clone();

    let error = updater.update(&mut instance, &package, &props, &mut (), &mut (), ()).unwrap_err();

    match error {
        install::Error::ArtifactFetchFailed { file, kind } => {
            assert!(matches!(kind, EntryErrorKind::SizeMismatch | EntryErrorKind::HashMismatch));
            assert!(!file.exists());
            let mut tmp_file = file.into_path_buf();
            tmp_file.as_mut_os_string().push(".tmp");
            assert!(!tmp_file.exists(), "{} should not exist", tmp_file.display());
        }
        e => panic!("{e:?}"),
    }

    // The failure is fatal, nothing has been committed to the record.
    assert!(!instance.installed);

}

#[test]
fn embedded_manifest_repair_preserves_libraries() {

    const CLIENT: &[u8] = b"client jar bytes";

    let mut server = Server::new();
    let dir = tempdir();

    let fresh_version_body = json!({
        "id": "1.20.1",
        "downloads": {
            "client": {
                "url": format!("{}/client.jar", server.url()),
                "size": CLIENT.len(),
                "sha1": sha1_hex(CLIENT),
            },
        },
        "libraries": [
            {"name": "com.example:fresh:2.0"},
        ],
    }).to_string();

    server.mock("GET", "/version_manifest.json").with_body(release_body(&server)).create();
    server.mock("GET", "/1.20.1.json").with_body(&fresh_version_body).create();

    // An old embedded manifest: no downloads, but a meaningful library list.
    let embedded: VersionManifest = serde_json::from_value(json!({
        "id": "1.20.1",
        "libraries": [
            {"name": "com.example:embedded:1.0"},
        ],
    })).unwrap();

    let mut package = test_package(&server);
    package.version_manifest = Some(embedded);

    let props = IndexMap::from([
        (sources::VERSION_MANIFEST_URL.to_string(), format!("{}/version_manifest.json", server.url())),
    ]);

    let version_file = dir.path().join("version.json");
    let resolved = manifest::resolve(&package, &props, &version_file, &CancelToken::new()).unwrap();

    // Downloads have been repaired, the library list is the embedded one.
    assert!(resolved.downloads.contains_key("client"));
    assert_eq!(resolved.libraries.len(), 1);
    assert_eq!(resolved.libraries[0].name, "com.example:embedded:1.0");

    // The resolved manifest has been written to the version file.
    let written: VersionManifest = serde_json::from_reader(BufReader::new(File::open(&version_file).unwrap())).unwrap();
    assert!(written.downloads.contains_key("client"));
    assert_eq!(written.libraries[0].name, "com.example:embedded:1.0");

}

#[test]
fn unknown_game_version_is_not_found() {

    let mut server = Server::new();

    server.mock("GET", "/version_manifest.json").with_body(release_body(&server)).create();

    let props = IndexMap::from([
        (sources::VERSION_MANIFEST_URL.to_string(), format!("{}/version_manifest.json", server.url())),
    ]);

    let error = manifest::fetch_for_game_version("1.19.4", &props, &CancelToken::new()).unwrap_err();
    assert!(matches!(error, manifest::Error::ManifestNotFound { game_version } if game_version == "1.19.4"));

}
