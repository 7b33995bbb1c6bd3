#![cfg(test)]

use std::fs;
use std::sync::Arc;

use crate::kernel::constants::PROLOG_PREFIX;
use crate::kernel::error::Result;
use crate::storage::spec::{Resolution, RoamingType, SplitterHandle, StorageClass, StorageSpec};
use crate::storage::state::StorageData;
use crate::storage::traits::{SaveSession, StateSplitter, StateStorage};

use super::common::{
    setup_manager, state, KeySplitter, PlainComponent, RecordingStorage, RecordingStreamProvider,
    RoutedComponent,
};

fn save_all(sessions: &[Arc<dyn SaveSession>]) -> Result<()> {
    for session in sessions {
        session.save()?;
    }
    Ok(())
}

#[test]
fn test_round_writes_shared_file_and_reloads() -> Result<()> {
    let fixture = setup_manager();
    let manager = &fixture.manager;
    let spec = StorageSpec::file("$ROOT$/options/ui.json");

    let mut round = manager.start_externalization();
    round.set_state(&[spec.clone()], &PlainComponent, "Editor", &state(&[("font", "mono")]))?;
    round.set_state(&[spec.clone()], &PlainComponent, "Theme", &state(&[("name", "dark")]))?;
    let sessions = round.create_save_sessions();
    assert_eq!(sessions.len(), 1, "Both components share one storage");
    save_all(&sessions)?;

    let path = fixture.root().join("options").join("ui.json");
    let written = fs::read_to_string(&path).expect("storage file should exist");
    assert!(written.starts_with(PROLOG_PREFIX));
    let data = StorageData::from_document(&written)?;
    assert_eq!(data.component_names(), vec!["Editor".to_string(), "Theme".to_string()]);
    assert_eq!(data.root_tag(), "application");

    // A fresh instance picks the committed file up from disk
    manager.clear_state_storage(&spec.file);
    manager.get_state_storage(&spec)?;
    let reloaded = manager.cached_file_storages([spec.file.as_str()]);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(
        reloaded[0].component_state("Theme").and_then(|s| s.get::<String>("name")),
        Some("dark".to_string())
    );
    Ok(())
}

#[test]
fn test_unchanged_state_produces_no_save_unit() -> Result<()> {
    let fixture = setup_manager();
    let spec = StorageSpec::file("$ROOT$/other.json");
    let values = state(&[("k", "v")]);

    let mut first = fixture.manager.start_externalization();
    first.set_state(&[spec.clone()], &PlainComponent, "C", &values)?;
    save_all(&first.create_save_sessions())?;

    let mut second = fixture.manager.start_externalization();
    second.set_state(&[spec], &PlainComponent, "C", &values)?;
    assert!(second.create_save_sessions().is_empty());
    Ok(())
}

#[test]
fn test_tombstones_remove_component_and_then_file() -> Result<()> {
    let fixture = setup_manager();
    let current = StorageSpec::file("$ROOT$/new.json");
    let old = StorageSpec::file("$ROOT$/old.json");
    let values = state(&[("k", "v")]);

    // Seed the old file
    let mut seed = fixture.manager.start_externalization();
    seed.set_state(&[old.clone()], &PlainComponent, "C", &values)?;
    save_all(&seed.create_save_sessions())?;
    assert!(fixture.root().join("old.json").exists());

    // The old location is now deprecated: it receives an empty state
    let mut round = fixture.manager.start_externalization();
    round.set_state(
        &[current.clone(), old.clone().mark_deprecated()],
        &PlainComponent,
        "C",
        &values,
    )?;
    let sessions = round.create_save_sessions();
    assert_eq!(sessions.len(), 2);
    save_all(&sessions)?;

    assert!(fixture.root().join("new.json").exists());
    assert!(!fixture.root().join("old.json").exists(), "Emptied file should be deleted");
    Ok(())
}

#[test]
fn test_clear_resolution_erases_target() -> Result<()> {
    let fixture = setup_manager();
    let spec = StorageSpec::file("$ROOT$/cleared.json");

    let mut seed = fixture.manager.start_externalization();
    seed.set_state(&[spec.clone()], &PlainComponent, "C", &state(&[("k", "v")]))?;
    seed.set_state(&[spec.clone()], &PlainComponent, "D", &state(&[("k", "v")]))?;
    save_all(&seed.create_save_sessions())?;

    let component = RoutedComponent::new(&[("$ROOT$/cleared.json", Resolution::Clear)]);
    let mut round = fixture.manager.start_externalization();
    round.set_state(&[spec.clone()], &component, "C", &state(&[("k", "changed")]))?;
    save_all(&round.create_save_sessions())?;

    let storages = fixture.manager.cached_file_storages([spec.file.as_str()]);
    assert!(storages[0].component_state("C").is_none());
    assert!(storages[0].component_state("D").is_some());
    Ok(())
}

#[test]
fn test_directory_storage_splits_and_prunes_files() -> Result<()> {
    let fixture = setup_manager();
    fixture
        .container
        .register_splitter("by-key", || -> Arc<dyn StateSplitter> { Arc::new(KeySplitter) });
    let spec = StorageSpec::directory("$ROOT$/runConfigurations", SplitterHandle::new("by-key"));
    let dir = fixture.root().join("runConfigurations");

    let mut round = fixture.manager.start_externalization();
    round.set_state(&[spec.clone()], &PlainComponent, "Run", &state(&[("app", "a"), ("test", "t")]))?;
    save_all(&round.create_save_sessions())?;
    assert!(dir.join("Run.app.json").exists());
    assert!(dir.join("Run.test.json").exists());

    let mut round = fixture.manager.start_externalization();
    round.set_state(&[spec], &PlainComponent, "Run", &state(&[("app", "a2")]))?;
    save_all(&round.create_save_sessions())?;
    assert!(dir.join("Run.app.json").exists());
    assert!(!dir.join("Run.test.json").exists(), "Stale split file should be removed");
    Ok(())
}

#[test]
fn test_stream_provider_mirrors_roaming_files_only() -> Result<()> {
    let fixture = setup_manager();
    let workspace = fixture.root().join("workspace.json").to_string_lossy().to_string();
    fixture.manager.add_macro("$WORKSPACE_FILE$", &workspace);

    let stream = Arc::new(RecordingStreamProvider::default());
    // Set after the manager exists; storages built later and earlier both see it
    let early = fixture.manager.get_state_storage(&StorageSpec::file("$ROOT$/early.json"))?;
    fixture.manager.set_stream_provider(Some(stream.clone()));

    let mut round = fixture.manager.start_externalization();
    round.set_state(
        &[
            StorageSpec::file("$ROOT$/early.json"),
            StorageSpec::file("$WORKSPACE_FILE$").with_roaming(RoamingType::PerUser),
        ],
        &PlainComponent,
        "C",
        &state(&[("k", "v")]),
    )?;
    save_all(&round.create_save_sessions())?;

    let saved = stream.saved.lock().unwrap();
    assert_eq!(saved.len(), 1, "Workspace file never roams");
    assert_eq!(saved[0].0, "$ROOT$/early.json");
    assert_eq!(saved[0].2, RoamingType::PerUser);
    drop(early);
    Ok(())
}

#[test]
fn test_custom_storage_round() -> Result<()> {
    let fixture = setup_manager();
    let backing = Arc::new(RecordingStorage::new("custom"));
    let shared = backing.clone();
    fixture.container.register_storage_class("remote", move || {
        Ok(shared.clone() as Arc<dyn StateStorage>)
    });

    let spec = StorageSpec::custom("ignored.json", StorageClass::new("remote"));
    let mut round = fixture.manager.start_externalization();
    round.set_state(&[spec], &PlainComponent, "C", &state(&[("k", "v")]))?;
    assert_eq!(round.create_save_sessions().len(), 1);
    assert_eq!(backing.writes().len(), 1);
    assert_eq!(fixture.container.registered_keys().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_manager_registered_for_teardown() -> Result<()> {
    let fixture = setup_manager();
    fixture.manager.get_state_storage(&StorageSpec::file("$ROOT$/kept.json"))?;
    assert_eq!(fixture.disposer.registered_names(), vec!["StateStorageManager"]);

    fixture.disposer.dispose_all().await?;
    assert!(fixture.disposer.is_empty());
    // Teardown does not touch the cache
    assert!(fixture.manager.storage_keys().contains("$ROOT$/kept.json"));
    Ok(())
}
