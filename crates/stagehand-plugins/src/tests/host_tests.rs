use super::*;
use crate::stub_loader::{provider_module_json, runner_module_json, write_module, StubLoader};
use crate::types::dylib_file_name;

fn no_shared() -> SharedTypeSet {
    SharedTypeSet::default()
}

#[test]
fn repeat_loads_are_no_ops() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(dir.path(), "foo.mod", &runner_module_json("foo"));
    let host = PluginHost::new(StubLoader::new());

    let first = host.load(&[module.clone()], &no_shared()).unwrap();
    let second = host.load(&[module], &no_shared()).unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(host.plugins().len(), 1);
    assert_eq!(host.records().len(), 1);
}

#[test]
fn same_directory_modules_share_one_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let foo = write_module(dir.path(), "foo.mod", &runner_module_json("foo"));
    let bar = write_module(dir.path(), "bar.mod", &provider_module_json("bar"));
    let host = PluginHost::new(StubLoader::new());

    host.load(&[foo, bar], &no_shared()).unwrap();
    assert_eq!(host.boundary_count(), 1);
    assert_eq!(host.plugins().len(), 2);
}

#[test]
fn different_directories_get_separate_boundaries() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let foo = write_module(dir_a.path(), "foo.mod", &runner_module_json("foo"));
    let bar = write_module(dir_b.path(), "bar.mod", &runner_module_json("bar"));
    let host = PluginHost::new(StubLoader::new());

    host.load(&[foo, bar], &no_shared()).unwrap();
    assert_eq!(host.boundary_count(), 2);
}

#[test]
fn differing_shared_set_keeps_the_original_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let foo = write_module(dir.path(), "foo.mod", &runner_module_json("foo"));
    let bar = write_module(dir.path(), "bar.mod", &runner_module_json("bar"));
    let host = PluginHost::new(StubLoader::new());

    host.load(&[foo], &SharedTypeSet::new(["tracing"])).unwrap();
    host.load(&[bar], &SharedTypeSet::new(["serde"])).unwrap();
    assert_eq!(host.boundary_count(), 1);
}

#[test]
fn instantiation_failure_spares_the_other_exports() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(
        dir.path(),
        "mixed.mod",
        r#"{"exports":[
            {"kind":"stage_runner","type_id":"broken","fail_instantiate":true},
            {"kind":"stage_runner","type_id":"works","stages":63}
        ]}"#,
    );
    let host = PluginHost::new(StubLoader::new());

    let constructed = host.load(&[module], &no_shared()).unwrap();
    assert_eq!(constructed, 1);
    let plugins = host.plugins();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].type_id(), "works");
}

#[test]
fn contract_library_is_not_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let contract = write_module(
        dir.path(),
        &contract_library_file_name(),
        &runner_module_json("sneaky"),
    );
    let host = PluginHost::new(StubLoader::new());

    let constructed = host.load(&[contract], &no_shared()).unwrap();
    assert_eq!(constructed, 0);
    assert_eq!(host.boundary_count(), 0);
}

#[test]
fn resolve_across_boundaries_finds_a_sibling_library() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(dir.path(), "foo.mod", &runner_module_json("foo"));
    std::fs::write(dir.path().join(dylib_file_name("shared_dep")), b"x").unwrap();
    let host = PluginHost::new(StubLoader::new());
    host.load(&[module], &no_shared()).unwrap();

    let handle = host.resolve_across_boundaries("shared_dep").unwrap();
    assert_eq!(handle.identity(), "shared_dep");
    assert!(host.resolve_across_boundaries("absent_dep").is_none());
}

#[test]
fn resolution_guard_is_released_after_a_miss() {
    let host = PluginHost::new(StubLoader::new());
    assert!(host.resolve_across_boundaries("anything").is_none());
    // A failed resolution must not leave the guard set.
    assert!(host.resolve_across_boundaries("anything").is_none());
}

#[test]
fn exports_are_constructed_in_declared_order() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(
        dir.path(),
        "ordered.mod",
        r#"{"exports":[
            {"kind":"stage_runner","type_id":"second","priority":10},
            {"kind":"stage_runner","type_id":"first","priority":1}
        ]}"#,
    );
    let host = PluginHost::new(StubLoader::new());
    host.load(&[module], &no_shared()).unwrap();

    let ids: Vec<_> = host.plugins().iter().map(|p| p.type_id().to_string()).collect();
    assert_eq!(ids, ["second", "first"]);
}
