//! Tests for job catalogs

use render_lanes::core::JobCatalog;
use render_lanes::infra::{InMemoryCatalog, SuggestionFileCatalog};

fn write(dir: &std::path::Path, rel: &str, body: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

#[test]
fn test_suggestion_files_become_pools() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "story/story__wide.txt",
        "Scene 1\nSuggestion: harbour at dawn\nScene 3\nSuggestion: storm\n",
    );
    write(dir.path(), "story/story__close.txt", "Scene 2\nSuggestion: face\n");
    write(dir.path(), "story/story__empty.txt", "nothing here\n");
    write(dir.path(), "story/notes.txt", "Scene 9\nSuggestion: ignored\n");
    write(dir.path(), "story/other__wide.txt", "Scene 8\nSuggestion: ignored\n");

    let catalog = SuggestionFileCatalog::new(dir.path());
    assert_eq!(catalog.pools("story").unwrap(), vec!["close", "wide"]);

    let wide = catalog.scenes_for_pool("story", "wide").unwrap();
    assert_eq!(wide.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(wide[&1], "harbour at dawn");
    assert!(catalog.scenes_for_pool("story", "missing").unwrap().is_empty());
}

#[test]
fn test_unknown_base_has_no_pools() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = SuggestionFileCatalog::new(dir.path());
    assert!(catalog.pools("nope").unwrap().is_empty());
}

#[test]
fn test_bases_lists_directories() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b/b__x.txt", "");
    write(dir.path(), "a/a__x.txt", "");
    write(dir.path(), "stray.txt", "");
    let catalog = SuggestionFileCatalog::new(dir.path());
    assert_eq!(catalog.bases().unwrap(), vec!["a", "b"]);

    let missing = SuggestionFileCatalog::new(dir.path().join("absent"));
    assert!(missing.bases().unwrap().is_empty());
}

#[test]
fn test_in_memory_catalog() {
    let catalog = InMemoryCatalog::new()
        .with_pool("story", "B", [4, 5])
        .with_pool("story", "A", [1])
        .with_pool("story", "C", []);
    assert_eq!(catalog.pools("story").unwrap(), vec!["A", "B"]);
    assert_eq!(catalog.scenes_for_pool("story", "B").unwrap().len(), 2);
    assert!(catalog.scenes_for_pool("story", "Z").is_err());
    assert_eq!(catalog.bases().unwrap(), vec!["story"]);
}
