use sg_core::SessionId;
use sg_results::*;

fn manifest(session: &str) -> RunManifest {
    RunManifest {
        session: session.to_string(),
        config_digest: "ab".repeat(32),
        timestamp: "2026-02-25T12:00:00+00:00".to_string(),
        runs: 3,
        seed: 7,
        time_steps: 100,
        elapsed_secs: 1.25,
        result_files: vec![
            format!("run-{session}_1.csv"),
            format!("run-{session}_mean.csv"),
        ],
    }
}

#[test]
fn save_and_load_manifest() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ManifestStore::new(temp_dir.path().join("out")).unwrap();
    let session = SessionId::parse("abc123").unwrap();

    assert!(!store.has_manifest(&session));
    assert!(matches!(
        store.load(&session),
        Err(ResultsError::RunNotFound { .. })
    ));

    store.save(&manifest("abc123")).unwrap();
    assert!(store.root().join("run-abc123.json").exists());

    let loaded = store.load(&session).unwrap();
    assert_eq!(loaded, manifest("abc123"));

    store.delete(&session).unwrap();
    store.delete(&session).unwrap();
    assert!(!store.has_manifest(&session));
}

#[test]
fn manifests_are_per_session() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ManifestStore::new(temp_dir.path().to_path_buf()).unwrap();

    store.save(&manifest("abc123")).unwrap();
    store.save(&manifest("zzz999")).unwrap();

    let other = SessionId::parse("zzz999").unwrap();
    assert_eq!(store.load(&other).unwrap().session, "zzz999");
    assert!(store.save(&manifest("../etc")).is_err());
}
