use super::*;
use crate::stub_loader::{provider_module_json, runner_module_json, write_module, StubLoader};
use crate::types::Stage;

#[test]
fn stage_runner_catalog_loads_runners_from_every_root() {
    let root_a = tempfile::tempdir().unwrap();
    let root_b = tempfile::tempdir().unwrap();
    write_module(
        root_a.path(),
        "convert.mod",
        r#"{"exports":[{"kind":"stage_runner","type_id":"convert","display_name":"Converter","stages":16,"priority":5}]}"#,
    );
    write_module(root_a.path(), "model.mod", &provider_module_json("model"));
    write_module(root_b.path(), "verify.mod", &runner_module_json("verify"));

    let catalog = StageRunnerCatalog::new(StubLoader::new());
    let runners = catalog
        .find_all(
            &[root_a.path().to_path_buf(), root_b.path().to_path_buf()],
            &FilePattern::new("*.mod"),
        )
        .unwrap();

    let ids: Vec<_> = runners.iter().map(|r| r.type_id().to_string()).collect();
    assert_eq!(ids, ["convert", "verify"]);

    let convert = runners[0].stage_runner().unwrap();
    assert_eq!(convert.descriptor().display_name, "Converter");
    assert_eq!(convert.descriptor().priority, 5);
    assert!(convert.descriptor().stages.contains(Stage::Convert));
    assert!(!convert.descriptor().stages.contains(Stage::Parse));
    convert.run(Stage::Convert, "{}").unwrap();
}

#[test]
fn duplicate_module_file_names_load_once() {
    let root_a = tempfile::tempdir().unwrap();
    let root_b = tempfile::tempdir().unwrap();
    write_module(root_a.path(), "foo.mod", &runner_module_json("foo_a"));
    write_module(root_b.path(), "foo.mod", &runner_module_json("foo_b"));

    let catalog = StageRunnerCatalog::new(StubLoader::new());
    let runners = catalog
        .find_all(
            &[root_a.path().to_path_buf(), root_b.path().to_path_buf()],
            &FilePattern::new("*.mod"),
        )
        .unwrap();
    assert_eq!(runners.len(), 1);
    assert_eq!(runners[0].type_id(), "foo_a");
}

#[test]
fn stage_runner_catalog_is_empty_when_nothing_matches() {
    let root = tempfile::tempdir().unwrap();
    let catalog = StageRunnerCatalog::new(StubLoader::new());
    let runners = catalog
        .find_all(&[root.path().to_path_buf()], &FilePattern::new("*.mod"))
        .unwrap();
    assert!(runners.is_empty());
    assert_eq!(catalog.host().boundary_count(), 0);
}

#[test]
fn model_provider_catalog_takes_the_first_matching_root() {
    let root_a = tempfile::tempdir().unwrap();
    let root_b = tempfile::tempdir().unwrap();
    write_module(root_a.path(), "model_a.mod", &provider_module_json("model_a"));
    write_module(root_b.path(), "model_b.mod", &provider_module_json("model_b"));

    let catalog = ModelProviderCatalog::new(StubLoader::new());
    let provider = catalog
        .find_one(
            &[root_a.path().to_path_buf(), root_b.path().to_path_buf()],
            &FilePattern::new("*.mod"),
        )
        .unwrap()
        .unwrap();

    assert_eq!(provider.type_id(), "model_a");
    let model = provider.model_provider().unwrap().model_json().unwrap();
    assert_eq!(model, r#"{"provider":"model_a"}"#);
}

#[test]
fn provider_in_second_root_is_found_despite_runners_in_first() {
    let root_a = tempfile::tempdir().unwrap();
    let root_b = tempfile::tempdir().unwrap();
    write_module(root_a.path(), "parse.mod", &runner_module_json("parse"));
    write_module(root_a.path(), "verify.mod", &runner_module_json("verify"));
    write_module(root_b.path(), "model.mod", &provider_module_json("model"));

    let catalog = ModelProviderCatalog::new(StubLoader::new());
    let provider = catalog
        .find_one(
            &[root_a.path().to_path_buf(), root_b.path().to_path_buf()],
            &FilePattern::new("*.mod"),
        )
        .unwrap();
    assert_eq!(provider.unwrap().type_id(), "model");
}

#[test]
fn model_provider_catalog_returns_none_when_absent() {
    let root = tempfile::tempdir().unwrap();
    let catalog = ModelProviderCatalog::new(StubLoader::new());
    let provider = catalog
        .find_one(&[root.path().to_path_buf()], &FilePattern::new("*.mod"))
        .unwrap();
    assert!(provider.is_none());
}

#[test]
fn runner_only_module_yields_no_model_provider() {
    let root = tempfile::tempdir().unwrap();
    write_module(root.path(), "runner.mod", &runner_module_json("runner"));

    let catalog = ModelProviderCatalog::new(StubLoader::new());
    let provider = catalog
        .find_one(&[root.path().to_path_buf()], &FilePattern::new("*.mod"))
        .unwrap();
    assert!(provider.is_none());
}
