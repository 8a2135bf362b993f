//! Sheet hierarchy discovery over pages written to a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use kicad_unit_swap::kicad::{EnvSnapshot, KicadError, SheetWalker};

fn page_with_sheets(files: &[&str]) -> String {
    let mut text = String::from("EESchema Schematic File Version 4\nEELAYER 30 0\nEELAYER END\n");
    for (i, file) in files.iter().enumerate() {
        text.push_str(&format!(
            "$Sheet\nS 1000 1000 500 500\nU 0000000{i}\nF0 \"S{i}\" 50\nF1 \"{file}\" 50\n$EndSheet\n"
        ));
    }
    text.push_str("$EndSCHEMATC\n");
    text
}

fn write(dir: &Path, name: &str, sheets: &[&str]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, page_with_sheets(sheets)).unwrap();
    path
}

fn names(paths: &[PathBuf], base: &Path) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            p.strip_prefix(base)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

fn walker() -> SheetWalker {
    SheetWalker::new(EnvSnapshot::new())
}

#[test]
fn pages_come_back_in_declaration_order() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["a.sch", "b.sch"]);
    write(dir.path(), "a.sch", &["a1.sch"]);
    write(dir.path(), "a1.sch", &[]);
    write(dir.path(), "b.sch", &[]);

    let pages = walker().discover_paths(&root).unwrap();
    assert_eq!(
        names(&pages, dir.path()),
        ["root.sch", "a.sch", "a1.sch", "b.sch"]
    );
}

#[test]
fn cycles_terminate_with_each_page_once() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["sub.sch"]);
    write(dir.path(), "sub.sch", &["root.sch", "sub.sch"]);

    let pages = walker().discover_paths(&root).unwrap();
    assert_eq!(names(&pages, dir.path()), ["root.sch", "sub.sch"]);
}

#[test]
fn shared_page_is_loaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["left.sch", "right.sch"]);
    write(dir.path(), "left.sch", &["common.sch"]);
    write(dir.path(), "right.sch", &["./common.sch"]);
    write(dir.path(), "common.sch", &[]);

    let pages = walker().discover_paths(&root).unwrap();
    assert_eq!(
        names(&pages, dir.path()),
        ["root.sch", "left.sch", "common.sch", "right.sch"]
    );
}

#[test]
fn nested_directories_resolve_against_referencing_page() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["blocks\\power.sch"]);
    write(dir.path(), "blocks/power.sch", &["../shared/ldo.sch"]);
    write(dir.path(), "shared/ldo.sch", &[]);

    let pages = walker().discover_paths(&root).unwrap();
    assert_eq!(
        names(&pages, dir.path()),
        ["root.sch", "blocks/power.sch", "shared/ldo.sch"]
    );
}

#[test]
fn variables_expand_from_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["${KIPRJMOD}/lib/sub.sch"]);
    write(dir.path(), "lib/sub.sch", &[]);

    let env = EnvSnapshot::new().with_var("KIPRJMOD", dir.path().to_string_lossy());
    let pages = SheetWalker::new(env).discover_paths(&root).unwrap();
    assert_eq!(names(&pages, dir.path()), ["root.sch", "lib/sub.sch"]);

    let err = walker().discover(&root).unwrap_err();
    assert!(matches!(err, KicadError::UnresolvedVariable { .. }));
}

#[test]
fn depth_limit_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["one.sch"]);
    write(dir.path(), "one.sch", &["two.sch"]);
    write(dir.path(), "two.sch", &[]);

    assert_eq!(
        walker().with_max_depth(2).discover(&root).unwrap().len(),
        3
    );
    let err = walker().with_max_depth(1).discover(&root).unwrap_err();
    assert!(matches!(
        err,
        KicadError::SheetDepthExceeded { max_depth: 1, ref page } if page.ends_with("two.sch")
    ));
}

#[test]
fn depth_limit_uses_shortest_chain() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["a.sch", "b.sch"]);
    write(dir.path(), "a.sch", &["b.sch"]);
    write(dir.path(), "b.sch", &[]);

    let pages = walker().with_max_depth(1).discover_paths(&root).unwrap();
    assert_eq!(names(&pages, dir.path()), ["root.sch", "a.sch", "b.sch"]);
}

#[test]
fn missing_child_page_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "root.sch", &["ghost.sch"]);

    let err = walker().discover(&root).unwrap_err();
    assert!(matches!(
        err,
        KicadError::FileRead { ref path, .. } if path.ends_with("ghost.sch")
    ));
}

#[test]
fn sheet_block_without_file_field_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root.sch");
    fs::write(
        &root,
        "EESchema Schematic File Version 4\n$Sheet\nS 0 0 10 10\nF0 \"X\" 50\n$EndSheet\n",
    )
    .unwrap();

    let err = walker().discover(&root).unwrap_err();
    assert!(matches!(
        err,
        KicadError::MalformedSheetBlock { line: 2, .. }
    ));
}
