//! Pinned byte layout of the canonical hasher.

use evgate_kit::Exclusions;
use evgate_kit::anchor::anchor_path;
use std::path::Path;
use tempfile::TempDir;

const TREE_ANCHOR: &str = "fdba097519544be398f887bd190ddd0789eaac32a1fec150f135c0df49f83439";
const README_ANCHOR: &str = "5303a1867c6162b92c462d2b2a7acdc6c816d5e8cf3d71dfebc2bc9ff92efca7";

fn write_tree(root: &Path, order: &[usize]) {
    let files: [(&str, &str); 3] = [
        ("README.md", "evidence gate\n"),
        ("src/lib.rs", "pub fn answer() -> u32 { 42 }\n"),
        ("docs/guide.txt", "run evgate gate check\n"),
    ];
    for &i in order {
        let (relative, content) = files[i];
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, content).expect("write fixture file");
    }
}

#[test]
fn three_file_tree_matches_recorded_anchor() {
    let dir = TempDir::new().expect("temp dir");
    write_tree(dir.path(), &[0, 1, 2]);

    let anchor = anchor_path(dir.path(), &Exclusions::none()).expect("anchor");
    assert_eq!(anchor.as_str(), TREE_ANCHOR);
}

#[test]
fn creation_order_does_not_matter() {
    let forward = TempDir::new().expect("temp dir");
    let backward = TempDir::new().expect("temp dir");
    write_tree(forward.path(), &[0, 1, 2]);
    write_tree(backward.path(), &[2, 1, 0]);

    assert_eq!(
        anchor_path(forward.path(), &Exclusions::none()).expect("anchor"),
        anchor_path(backward.path(), &Exclusions::none()).expect("anchor"),
    );
}

#[test]
fn state_directory_is_excluded_by_default_config() {
    let dir = TempDir::new().expect("temp dir");
    write_tree(dir.path(), &[0, 1, 2]);
    std::fs::create_dir_all(dir.path().join(".evgate")).expect("mkdir");
    std::fs::write(dir.path().join(".evgate/status.json"), "{}").expect("write");

    let exclusions = evgate_kit::config::HasherConfig::default().exclusions();
    let anchor = anchor_path(dir.path(), &exclusions).expect("anchor");
    assert_eq!(anchor.as_str(), TREE_ANCHOR);
}

#[test]
fn single_file_anchor_is_content_hash() {
    let dir = TempDir::new().expect("temp dir");
    write_tree(dir.path(), &[0]);
    let anchor = anchor_path(&dir.path().join("README.md"), &Exclusions::none()).expect("anchor");
    assert_eq!(anchor.as_str(), README_ANCHOR);
}
