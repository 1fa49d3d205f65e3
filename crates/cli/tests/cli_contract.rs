use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::fixtures;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{Settings, Storage};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("temp dir should be created") }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, bytes).expect("fixture should be written");
        path
    }

    fn numbered(&self, pages: u32) -> PathBuf {
        self.write("numbered.pdf", &fixtures::numbered_pdf(pages))
    }

    fn config_dir(&self) -> PathBuf {
        self.path().join("config")
    }
}

fn exported_page_texts(path: &Path) -> Vec<String> {
    let document = lopdf::Document::load(path).expect("export should parse");
    document
        .get_pages()
        .values()
        .map(|page_id| {
            let content = document.get_page_content(*page_id).expect("content should read");
            String::from_utf8_lossy(&content).into_owned()
        })
        .collect()
}

#[test]
fn info_emits_stable_json_contract() {
    let workspace = Workspace::new();
    let file = workspace.numbered(3);

    let output = cargo_bin_cmd!("pagepick")
        .arg("info")
        .arg(&file)
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 3);
    assert_eq!(value["first_page_size_pt"]["width"].as_f64(), Some(fixtures::page_width(1) as f64));
    assert_eq!(value["first_page_size_pt"]["height"].as_f64(), Some(fixtures::PAGE_HEIGHT as f64));
}

#[test]
fn info_fails_for_missing_file() {
    let workspace = Workspace::new();

    cargo_bin_cmd!("pagepick")
        .arg("info")
        .arg(workspace.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn previews_writes_one_png_per_page() {
    let workspace = Workspace::new();
    let file = workspace.numbered(3);
    let out = workspace.path().join("previews");

    cargo_bin_cmd!("pagepick")
        .arg("previews")
        .arg(&file)
        .arg("--output-dir")
        .arg(&out)
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("numbered-page-3.png"));

    for page in 1..=3 {
        let image = image::open(out.join(format!("numbered-page-{page}.png")))
            .expect("preview should be readable image");
        assert_eq!(image.width(), (fixtures::page_width(page) * 0.5).round() as u32);
    }
}

#[test]
fn previews_uses_scale_from_settings() {
    let workspace = Workspace::new();
    let file = workspace.numbered(2);
    Storage::with_root(workspace.config_dir())
        .save_settings(&Settings { preview_scale: 0.25, ..Settings::default() })
        .expect("settings should save");

    cargo_bin_cmd!("pagepick")
        .arg("previews")
        .arg(&file)
        .arg("--page")
        .arg("2")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success();

    let image = image::open(workspace.path().join("numbered-page-2.png"))
        .expect("preview should be readable image");
    assert_eq!(image.width(), (fixtures::page_width(2) * 0.25).round() as u32);
    assert!(!workspace.path().join("numbered-page-1.png").exists());
}

#[test]
fn extract_writes_selected_pages_in_ascending_order() {
    let workspace = Workspace::new();
    let file = workspace.numbered(9);
    let out = workspace.path().join("out");

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--pages")
        .arg("8,2,5")
        .arg("--output-dir")
        .arg(&out)
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("selected_pages.pdf"))
        .stderr(predicate::str::contains("Downloaded 3 pages successfully"));

    let texts = exported_page_texts(&out.join("selected_pages.pdf"));
    assert_eq!(texts.len(), 3);
    assert!(texts[0].contains("(Page 2)"));
    assert!(texts[1].contains("(Page 5)"));
    assert!(texts[2].contains("(Page 8)"));
}

#[test]
fn extract_all_keeps_every_page() {
    let workspace = Workspace::new();
    let file = workspace.numbered(3);

    cargo_bin_cmd!("pagepick")
        .current_dir(workspace.path())
        .arg("extract")
        .arg(&file)
        .arg("--all")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success();

    let texts = exported_page_texts(&workspace.path().join("selected_pages.pdf"));
    assert_eq!(texts.len(), 3);
    assert!(texts[0].contains("(Page 1)"));
    assert!(texts[2].contains("(Page 3)"));
}

#[test]
fn extract_uses_download_dir_from_settings() {
    let workspace = Workspace::new();
    let file = workspace.numbered(2);
    let downloads = workspace.path().join("downloads");
    Storage::with_root(workspace.config_dir())
        .save_settings(&Settings { download_dir: Some(downloads.clone()), ..Settings::default() })
        .expect("settings should save");

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--pages")
        .arg("2")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success();

    assert_eq!(exported_page_texts(&downloads.join("selected_pages.pdf")).len(), 1);
}

#[test]
fn extract_requires_pages_or_all() {
    let workspace = Workspace::new();
    let file = workspace.numbered(2);

    cargo_bin_cmd!("pagepick").arg("extract").arg(&file).assert().failure();
}

#[test]
fn extract_rejects_page_past_the_end() {
    let workspace = Workspace::new();
    let file = workspace.numbered(2);
    let out = workspace.path().join("out");

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--pages")
        .arg("1,3")
        .arg("--output-dir")
        .arg(&out)
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("page 3 out of range"));

    assert!(!out.join("selected_pages.pdf").exists());
}

#[test]
fn extract_rejects_huge_range_without_allocating_it() {
    let workspace = Workspace::new();
    let file = workspace.numbered(2);

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--pages")
        .arg("1-4294967295")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("page 4294967295 out of range"));
}

#[test]
fn extract_reports_unwritable_download_dir() {
    let workspace = Workspace::new();
    let file = workspace.numbered(2);
    let blocker = workspace.write("blocker", b"regular file");

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--all")
        .arg("--output-dir")
        .arg(blocker.join("sub"))
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error creating PDF"))
        .stderr(predicate::str::contains("Downloaded").not());
}

#[test]
fn previews_reject_out_of_range_scale() {
    let workspace = Workspace::new();
    let file = workspace.numbered(1);

    cargo_bin_cmd!("pagepick")
        .arg("previews")
        .arg(&file)
        .arg("--page")
        .arg("1")
        .arg("--scale")
        .arg("1000000")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("preview scale 1000000 is outside"));

    assert!(!workspace.path().join("numbered-page-1.png").exists());
}

#[test]
fn settings_command_saves_updates() {
    let workspace = Workspace::new();
    let exports = workspace.path().join("exports");

    cargo_bin_cmd!("pagepick")
        .arg("settings")
        .arg("--preview-scale")
        .arg("0.75")
        .arg("--download-dir")
        .arg(&exports)
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"preview_scale\": 0.75"));

    let saved = Storage::with_root(workspace.config_dir()).load_settings().expect("settings load");
    assert_eq!(saved, Settings { preview_scale: 0.75, download_dir: Some(exports) });

    cargo_bin_cmd!("pagepick")
        .arg("settings")
        .arg("--preview-scale")
        .arg("9")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("preview scale must be in"));

    cargo_bin_cmd!("pagepick")
        .arg("settings")
        .arg("--clear-download-dir")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"download_dir\": null"));
}

#[test]
fn extract_rejects_non_pdf_input() {
    let workspace = Workspace::new();
    let file = workspace.write("notes.txt", &fixtures::numbered_pdf(1));

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--all")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please select a valid PDF file"));
}

#[test]
fn extract_fails_for_invalid_pdf() {
    let workspace = Workspace::new();
    let file = workspace.write("invalid.pdf", &fixtures::invalid_pdf());

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--all")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error loading PDF"));
}

#[test]
fn extract_fails_for_encrypted_marker_pdf() {
    let workspace = Workspace::new();
    let file = workspace.write("encrypted-marker.pdf", &fixtures::encrypted_marker_pdf());

    cargo_bin_cmd!("pagepick")
        .arg("extract")
        .arg(&file)
        .arg("--all")
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn pick_session_toggles_and_exports() {
    let workspace = Workspace::new();
    let file = workspace.numbered(10);
    let out = workspace.path().join("out");

    cargo_bin_cmd!("pagepick")
        .arg("pick")
        .arg(&file)
        .arg("--output-dir")
        .arg(&out)
        .arg("--config-dir")
        .arg(workspace.config_dir())
        .write_stdin("toggle 3\ntoggle 7\ntoggle 3\nexport\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Click on pages to select them for download"))
        .stdout(predicate::str::contains("[ok] 1 pages selected"))
        .stdout(predicate::str::contains("[ok] Downloaded 1 pages successfully"));

    let texts = exported_page_texts(&out.join("selected_pages.pdf"));
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("(Page 7)"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pagepick")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
