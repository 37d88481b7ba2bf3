//! CLI integration tests for sdcsync.
//!
//! These run the actual binary against offline inputs: literal source text,
//! local image files and temporary databases.

use assert_cmd::Command;
use image::{ImageBuffer, Rgb};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a Command for the sdcsync binary.
fn sdcsync() -> Command {
    let mut cmd = Command::cargo_bin("sdcsync").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("FINGERPRINT_DB")
        .env_remove("CROSSWALK_DB");
    cmd
}

fn write_pattern(dir: &Path, name: &str, inverted: bool) -> PathBuf {
    let img = ImageBuffer::from_fn(128, 128, |x, y| {
        let v = (((x / 16) * 37 + (y / 16) * 91) % 256) as u8;
        let v = if inverted { 255 - v } else { v };
        Rgb([v, v, v])
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    sdcsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Finna"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("reconcile"))
        .stdout(predicate::str::contains("crosswalk"));
}

#[test]
fn test_version_displays_version() {
    sdcsync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sdcsync"));
}

#[test]
fn test_help_shows_exit_codes() {
    sdcsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

// ============================================================================
// Extract and Migrate Tests
// ============================================================================

#[test]
fn test_extract_record_id() {
    sdcsync()
        .args([
            "--quiet",
            "extract",
            "Museovirasto [https://www.finna.fi/Record/museovirasto.0D5A1A9C Finna]",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("museovirasto.0D5A1A9C"));
}

#[test]
fn test_extract_json_report() {
    sdcsync()
        .args([
            "extract",
            "--json",
            "http://www.kuvakokoelmat.fi/pictures/view/HK7155_219-65-1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"legacy_gallery_id\": \"HK7155_219-65-1\""))
        .stdout(predicate::str::contains("musketti.M012%3AHK7155%3A219-65-1"));
}

#[test]
fn test_extract_from_page_file() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.wiki");
    fs::write(
        &page,
        "{{Information\n|description=Tori\n|source=[https://www.finna.fi/Record/hkm.ABC123 Finna]\n|author=x\n}}",
    )
    .unwrap();

    sdcsync()
        .args(["--quiet", "extract", page.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("hkm.ABC123"));
}

#[test]
fn test_extract_without_identifier_fails() {
    // Exit code 65 = EX_DATAERR
    sdcsync()
        .args(["extract", "Own work, no links here"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to resolve an identifier"));
}

#[test]
fn test_migrate_legacy_id() {
    sdcsync()
        .args(["--quiet", "migrate", "HK7155_219-65-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("musketti.M012%3AHK7155%3A219-65-1"));
}

#[test]
fn test_migrate_unknown_prefix_fails() {
    sdcsync()
        .args(["migrate", "XYZ_123"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("no known legacy prefix"));
}

// ============================================================================
// Crosswalk Tests
// ============================================================================

#[test]
fn test_crosswalk_add_and_lookup() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("fngcache.db");
    let db = db.to_str().unwrap();

    sdcsync()
        .args(["crosswalk", "add", "624337", "A I 226", "--db", db])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));

    // Second insert is a no-op
    sdcsync()
        .args(["crosswalk", "add", "624337", "A I 226", "--db", db])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already known"));

    sdcsync()
        .args(["--quiet", "crosswalk", "lookup", "--accession", "A I 226", "--db", db])
        .assert()
        .success()
        .stdout(predicate::str::diff("624337\n"));

    sdcsync()
        .args(["--quiet", "crosswalk", "lookup", "--object-id", "624337", "--db", db])
        .assert()
        .success()
        .stdout(predicate::str::diff("A I 226\n"));
}

#[test]
fn test_crosswalk_lookup_missing() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("fngcache.db");

    sdcsync()
        .args([
            "crosswalk",
            "lookup",
            "--accession",
            "A 1",
            "--db",
            db.to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No unique crosswalk entry"));
}

// ============================================================================
// Fingerprint and Compare Tests
// ============================================================================

#[test]
fn test_fingerprint_local_image() {
    let temp = TempDir::new().unwrap();
    let image = write_pattern(temp.path(), "a.png", false);
    let db = temp.path().join("cache.db");

    sdcsync()
        .args([
            "fingerprint",
            "--json",
            image.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"phash\""))
        .stdout(predicate::str::contains("\"width\": 8"));

    assert!(db.exists(), "Fingerprint should be cached");
}

#[test]
fn test_fingerprint_undecodable_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("broken.jpg");
    fs::write(&file, vec![0x42u8; 256]).unwrap();

    sdcsync()
        .args([
            "fingerprint",
            file.to_str().unwrap(),
            "--db",
            temp.path().join("cache.db").to_str().unwrap(),
        ])
        .assert()
        .code(65);
}

#[test]
fn test_compare_same_photograph() {
    let temp = TempDir::new().unwrap();
    let a = write_pattern(temp.path(), "a.png", false);
    let b = temp.path().join("b.png");
    fs::copy(&a, &b).unwrap();

    sdcsync()
        .args([
            "compare",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--db",
            temp.path().join("cache.db").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("SAME PHOTOGRAPH"));
}

#[test]
fn test_compare_different_images() {
    let temp = TempDir::new().unwrap();
    let a = write_pattern(temp.path(), "a.png", false);
    let b = write_pattern(temp.path(), "b.png", true);

    sdcsync()
        .args([
            "compare",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--db",
            temp.path().join("cache.db").to_str().unwrap(),
        ])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("DIFFERENT"));
}

// ============================================================================
// Reconcile Input Tests
// ============================================================================

#[test]
fn test_reconcile_missing_page_file() {
    // Exit code 66 = EX_NOINPUT
    sdcsync()
        .args(["reconcile", "nonexistent_page.json"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read page file"));
}

#[test]
fn test_reconcile_invalid_page_json() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.json");
    fs::write(&page, b"{not json").unwrap();

    sdcsync()
        .args(["reconcile", page.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse page JSON"));
}

#[test]
fn test_reconcile_skips_unsupported_mime() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("page.json");
    fs::write(
        &page,
        r#"{
            "title": "File:Map.svg",
            "wikitext": "{{Information|source=[https://www.finna.fi/Record/museovirasto.ABC Finna]}}",
            "mime": "image/svg+xml",
            "local_image_url": "https://upload.example/Map.svg",
            "statements": []
        }"#,
    )
    .unwrap();

    sdcsync()
        .args([
            "reconcile",
            page.to_str().unwrap(),
            "--db",
            temp.path().join("cache.db").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\": \"skipped\""))
        .stdout(predicate::str::contains("unsupported_mime"));
}
