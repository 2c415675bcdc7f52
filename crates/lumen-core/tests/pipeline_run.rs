//! Full pipeline runs against a mock update service.

use std::sync::Arc;
use std::time::Duration;

use mockito::{Server, ServerGuard};
use sha1::{Digest, Sha1};
use serde_json::json;

use lumen_core::fetch::FetchOptions;
use lumen_core::pipeline::{Pipeline, PipelineOptions};
use lumen_core::reconcile::ReconcileOptions;
use lumen_core::settings::{keys, MemoryStore, SettingsStore};
use lumen_core::{InstallRoot, NullProgress};
use lumen_schema::manifest::LaunchMetadata;

fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

fn pipeline_options(server: &ServerGuard) -> PipelineOptions {
    let fetch = FetchOptions {
        timeout: Duration::from_secs(5),
        retries: 0,
        backoff: Duration::from_millis(1),
    };
    PipelineOptions {
        api_url: format!("{}/api", server.url()),
        default_config_url: format!("{}/config.example.json", server.url()),
        reconcile: ReconcileOptions {
            batch_size: 2500,
            concurrency: 8,
            fetch: fetch.clone(),
        },
        fetch,
    }
}

fn metadata(server: &ServerGuard, index_sha1: &str, artifact_body: &[u8]) -> LaunchMetadata {
    serde_json::from_value(json!({
        "textures": {
            "indexUrl": format!("{}/textures/index.txt", server.url()),
            "indexSha1": index_sha1,
            "baseUrl": format!("{}/textures/", server.url()),
        },
        "launchTypeData": {
            "artifacts": [{
                "name": "client.jar",
                "url": format!("{}/files/client.jar", server.url()),
                "sha1": sha1_hex(artifact_body),
            }],
        },
    }))
    .unwrap()
}

async fn serve_happy_remote(server: &mut ServerGuard) -> (String, Vec<u8>) {
    server
        .mock("GET", "/api/updater/index")
        .with_header("content-type", "application/json")
        .with_body(r#"{"index":{"stable":{"patcher":"1.4.0","engine":"2.0.0"}}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/updater/?item=patcher&version=1.4.0")
        .with_body("patch jar bytes")
        .create_async()
        .await;
    server
        .mock("GET", "/api/updater/?item=engine&version=2.0.0")
        .with_body("engine jar bytes")
        .create_async()
        .await;
    server
        .mock("GET", "/config.example.json")
        .with_header("content-type", "application/json")
        .with_body(r#"{"metadata":{"isEnabled":true},"newFeature":{"level":1}}"#)
        .create_async()
        .await;

    let asset_body = b"asset payload".to_vec();
    let asset_hash = sha1_hex(&asset_body);
    let index_body = format!("icons/a.png {asset_hash}\n");
    let index_hash = sha1_hex(index_body.as_bytes());
    server
        .mock("GET", "/textures/index.txt")
        .with_body(index_body)
        .create_async()
        .await;
    server
        .mock("GET", format!("/textures/{asset_hash}").as_str())
        .with_body(asset_body)
        .create_async()
        .await;

    let artifact_body = b"game file bytes".to_vec();
    server
        .mock("GET", "/files/client.jar")
        .with_body(artifact_body.clone())
        .create_async()
        .await;

    (index_hash, artifact_body)
}

#[tokio::test]
async fn fresh_install_runs_every_stage() {
    let mut server = Server::new_async().await;
    let (index_hash, artifact_body) = serve_happy_remote(&mut server).await;

    let dir = tempfile::tempdir().unwrap();
    let root = InstallRoot::at(dir.path().to_path_buf());
    let settings = Arc::new(MemoryStore::default());
    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        root.clone(),
        settings.clone(),
        Arc::new(NullProgress),
        pipeline_options(&server),
    );

    let meta = metadata(&server, &index_hash, &artifact_body);
    let report = pipeline.run(&meta).await.unwrap();
    assert!(report.success(), "stages failed: {:?}", report.stages);

    // Patch layer installed and recorded.
    assert!(root.patch_jar_path().is_file());
    assert_eq!(
        settings.get_string(keys::PATCH_VERSION).await.as_deref(),
        Some("1.4.0")
    );
    // Config seeded empty on first install (no merge yet).
    let config = std::fs::read_to_string(root.config_path()).unwrap();
    assert_eq!(config.trim(), "{}");

    // Engine installed and recorded.
    assert!(root.engine_jar_path().is_file());
    assert_eq!(
        settings.get_string(keys::ENGINE_VERSION).await.as_deref(),
        Some("2.0.0")
    );

    // Both trees reconciled.
    assert!(root.textures_dir().join("icons/a.png").is_file());
    assert!(root.game_files_dir().join("client.jar").is_file());
}

#[tokio::test]
async fn upgrade_merges_defaults_preserving_user_values() {
    let mut server = Server::new_async().await;
    let (index_hash, artifact_body) = serve_happy_remote(&mut server).await;

    let dir = tempfile::tempdir().unwrap();
    let root = InstallRoot::at(dir.path().to_path_buf());

    // An existing 1.3.0 install with a user-tuned config.
    std::fs::create_dir_all(root.patch_dir()).unwrap();
    std::fs::write(root.patch_jar_path(), b"old jar").unwrap();
    std::fs::write(
        root.config_path(),
        r#"{"metadata":{"isEnabled":false},"userOnly":{"keep":true}}"#,
    )
    .unwrap();
    let settings = Arc::new(MemoryStore::default());
    settings
        .set(keys::PATCH_VERSION, json!("1.3.0"))
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        root.clone(),
        settings.clone(),
        Arc::new(NullProgress),
        pipeline_options(&server),
    );

    let meta = metadata(&server, &index_hash, &artifact_body);
    let report = pipeline.run(&meta).await.unwrap();
    assert!(report.success(), "stages failed: {:?}", report.stages);

    assert_eq!(
        settings.get_string(keys::PATCH_VERSION).await.as_deref(),
        Some("1.4.0")
    );
    let merged: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.config_path()).unwrap()).unwrap();
    // User override survives the upgrade.
    assert_eq!(merged["metadata"]["isEnabled"], json!(false));
    // Newly introduced default appears.
    assert_eq!(merged["newFeature"]["level"], json!(1));
    // Keys upstream no longer ships are retained.
    assert_eq!(merged["userOnly"]["keep"], json!(true));
}

#[tokio::test]
async fn up_to_date_install_fetches_nothing_for_the_patch_layer() {
    let mut server = Server::new_async().await;
    let (index_hash, artifact_body) = serve_happy_remote(&mut server).await;
    let jar_mock = server
        .mock("GET", "/api/updater/?item=patcher&version=1.4.0")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = InstallRoot::at(dir.path().to_path_buf());
    std::fs::create_dir_all(root.patch_dir()).unwrap();
    std::fs::write(root.patch_jar_path(), b"current jar").unwrap();
    let settings = Arc::new(MemoryStore::default());
    settings
        .set(keys::PATCH_VERSION, json!("1.4.0"))
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        root.clone(),
        settings,
        Arc::new(NullProgress),
        pipeline_options(&server),
    );

    let meta = metadata(&server, &index_hash, &artifact_body);
    let report = pipeline.run(&meta).await.unwrap();
    assert!(report.success(), "stages failed: {:?}", report.stages);
    jar_mock.assert_async().await;
    assert_eq!(std::fs::read(root.patch_jar_path()).unwrap(), b"current jar");
}

#[tokio::test]
async fn current_engine_version_skips_the_engine_fetch() {
    let mut server = Server::new_async().await;
    let (index_hash, artifact_body) = serve_happy_remote(&mut server).await;
    let engine_mock = server
        .mock("GET", "/api/updater/?item=engine&version=2.0.0")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = InstallRoot::at(dir.path().to_path_buf());
    std::fs::create_dir_all(root.engine_jar_path().parent().unwrap()).unwrap();
    std::fs::write(root.engine_jar_path(), b"current engine").unwrap();
    let settings = Arc::new(MemoryStore::default());
    settings
        .set(keys::ENGINE_VERSION, json!("2.0.0"))
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        root.clone(),
        settings,
        Arc::new(NullProgress),
        pipeline_options(&server),
    );

    let meta = metadata(&server, &index_hash, &artifact_body);
    let report = pipeline.run(&meta).await.unwrap();
    assert!(report.success(), "stages failed: {:?}", report.stages);
    engine_mock.assert_async().await;
    assert_eq!(
        std::fs::read(root.engine_jar_path()).unwrap(),
        b"current engine"
    );
}

#[tokio::test]
async fn missing_updater_index_is_a_hard_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/updater/index")
        .with_status(500)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = InstallRoot::at(dir.path().to_path_buf());
    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        root,
        Arc::new(MemoryStore::default()),
        Arc::new(NullProgress),
        pipeline_options(&server),
    );

    let meta = metadata(&server, &sha1_hex(b"x"), b"y");
    assert!(pipeline.run(&meta).await.is_err());
    // No stage touched the filesystem.
    assert!(!dir.path().join("patch").exists());
    assert!(!dir.path().join("textures").exists());
}

#[tokio::test]
async fn soft_stage_failure_does_not_stop_the_others() {
    let mut server = Server::new_async().await;
    let (_bad_index_hash, artifact_body) = serve_happy_remote(&mut server).await;

    let dir = tempfile::tempdir().unwrap();
    let root = InstallRoot::at(dir.path().to_path_buf());
    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        root.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(NullProgress),
        pipeline_options(&server),
    );

    // A wrong index digest makes the assets stage fail its verify-after.
    let meta = metadata(&server, &sha1_hex(b"not the real index"), &artifact_body);
    let report = pipeline.run(&meta).await.unwrap();

    assert!(!report.success());
    let assets = report.stages.iter().find(|s| s.stage == "assets").unwrap();
    assert!(!assets.ok);
    // The independent game-files stage still completed.
    let game = report.stages.iter().find(|s| s.stage == "game-files").unwrap();
    assert!(game.ok);
    assert!(root.game_files_dir().join("client.jar").is_file());
}
