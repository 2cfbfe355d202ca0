#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn shelter_cmd(data: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("shelter"));
    cmd.env("SHELTER_RETRY_DELAY_MS", "0")
        .env_remove("RUST_LOG")
        .arg("--data")
        .arg(data);
    cmd
}

fn add_john(data: &Path) {
    shelter_cmd(data)
        .args(["add", "--badge", "24191", "--first", "John", "--last", "Doe", "--room", "1.04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added resident 24191 (John Doe)"));
}

#[test]
fn test_add_and_list_residents() {
    let temp = TempDir::new().unwrap();
    add_john(temp.path());
    shelter_cmd(temp.path())
        .args(["add", "--badge", "30001", "--first", "Ana", "--last", "Lima"])
        .assert()
        .success();

    shelter_cmd(temp.path())
        .args(["residents"])
        .assert()
        .success()
        .stdout(predicate::str::contains("John Doe"))
        .stdout(predicate::str::contains("Ana Lima"));

    shelter_cmd(temp.path())
        .args(["residents", "--room", "1.04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("John Doe"))
        .stdout(predicate::str::contains("Ana Lima").not());

    shelter_cmd(temp.path())
        .args(["residents", "--wing", "north"])
        .assert()
        .success()
        .stdout(predicate::str::contains("John Doe"))
        .stdout(predicate::str::contains("Ana Lima").not());

    assert!(temp.path().join("tables").join("residents.json").exists());
}

#[test]
fn test_update_and_kitchen_list() {
    let temp = TempDir::new().unwrap();
    add_john(temp.path());

    shelter_cmd(temp.path())
        .args(["update", "1", "room=2.05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated resident 1"));

    shelter_cmd(temp.path())
        .args(["kitchen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.05"))
        .stdout(predicate::str::contains("Week A"))
        .stdout(predicate::str::contains("Halal"));

    shelter_cmd(temp.path())
        .args(["--json", "occupancy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"occupancy\""))
        .stdout(predicate::str::contains("\"south\": 1"))
        .stdout(predicate::str::contains("\"capacity\": 60"));

    shelter_cmd(temp.path())
        .args(["occupancy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.05  1 residents, not a bedroom"))
        .stdout(predicate::str::contains("60 of 60 beds free (0% occupied)"));
}

#[test]
fn test_sync_then_checkout_moves_documents() {
    let temp = TempDir::new().unwrap();
    add_john(temp.path());

    let in_folder = temp
        .path()
        .join("containers/administrative-documents/IN/24191_John_Doe");
    fs::create_dir_all(&in_folder).unwrap();
    fs::write(in_folder.join("passport.pdf"), b"%PDF").unwrap();

    shelter_cmd(temp.path())
        .args(["sync", "24191", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 files synced"));

    shelter_cmd(temp.path())
        .args(["checkout", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked out resident 24191"))
        .stdout(predicate::str::contains("Transferred 1 documents"));

    assert!(!in_folder.join("passport.pdf").exists());
    assert!(temp
        .path()
        .join("containers/administrative-documents-out/OUT/24191_John_Doe/passport.pdf")
        .exists());

    shelter_cmd(temp.path())
        .args(["residents", "--out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("24191"));

    shelter_cmd(temp.path())
        .args(["status", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OUT documents: 1"))
        .stdout(predicate::str::contains("Transferred:   yes"));
}

#[test]
fn test_bad_input_fails() {
    let temp = TempDir::new().unwrap();
    add_john(temp.path());

    shelter_cmd(temp.path())
        .args(["update", "1", "room"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected key=value"));

    shelter_cmd(temp.path())
        .args(["migrate", "99"])
        .assert()
        .failure();

    shelter_cmd(temp.path())
        .args(["sync", "24191", "1", "--type", "sideways"])
        .assert()
        .failure();
}
