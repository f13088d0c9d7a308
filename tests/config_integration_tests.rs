//! Integration tests for ConfigLoader and configuration file handling
//!
//! These tests verify:
//! - Loading the main document and both substitution documents
//! - JSON and YAML documents
//! - Ordered text substitutions
//! - Fatal errors for missing documents, bad documents and bad root paths

use bulkpatch::{ConfigError, ConfigLoader, MainConfig};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

/// Write a main config pointing at `root` plus two substitution documents
fn write_config(dir: &Utf8Path, root: &Utf8Path, lines: &str, files: &str) -> Utf8PathBuf {
    let lines_path = dir.join("lines.json");
    let files_path = dir.join("files.json");
    fs::write(&lines_path, lines).unwrap();
    fs::write(&files_path, files).unwrap();

    let main = MainConfig {
        root_path: root.to_path_buf(),
        line_replacement_config_path: lines_path,
        file_replacement_config_path: files_path,
    };
    let main_path = dir.join("config.json");
    fs::write(&main_path, serde_json::to_string_pretty(&main).unwrap()).unwrap();
    main_path
}

#[test]
fn test_load_complete_configuration() {
    let (_temp_dir, dir) = create_test_config_dir();
    let root = dir.join("tree");
    fs::create_dir(&root).unwrap();

    let main_path = write_config(
        &dir,
        &root,
        r#"{"OLDTOKEN": "NEWTOKEN", "foo": "bar"}"#,
        &format!(r#"{{"config.dat": "{}"}}"#, dir.join("new.dat")),
    );

    let configuration = ConfigLoader::new(&main_path).load().unwrap();
    assert_eq!(configuration.root_path, root);

    let keys: Vec<&str> = configuration
        .text_substitutions
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["OLDTOKEN", "foo"]);
    assert_eq!(
        configuration.replacement_for("config.dat"),
        Some(&dir.join("new.dat"))
    );
}

#[test]
fn test_yaml_main_config() {
    let (_temp_dir, dir) = create_test_config_dir();
    let root = dir.join("tree");
    fs::create_dir(&root).unwrap();
    fs::write(dir.join("lines.yml"), "a: b\n").unwrap();
    fs::write(dir.join("files.yml"), "{}\n").unwrap();

    let main_path = dir.join("config.yaml");
    fs::write(
        &main_path,
        format!(
            "root_path: {}\nline_replacement_config_path: {}\nfile_replacement_config_path: {}\n",
            root,
            dir.join("lines.yml"),
            dir.join("files.yml")
        ),
    )
    .unwrap();

    let configuration = ConfigLoader::new(&main_path).load().unwrap();
    assert_eq!(configuration.text_substitutions.len(), 1);
    assert!(configuration.file_substitutions.is_empty());
}

#[test]
fn test_missing_main_config() {
    let (_temp_dir, dir) = create_test_config_dir();

    let result = ConfigLoader::new(dir.join("config.json")).load();

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_main_config_missing_key() {
    let (_temp_dir, dir) = create_test_config_dir();
    let main_path = dir.join("config.json");
    fs::write(&main_path, r#"{"root_path": "/tmp"}"#).unwrap();

    let result = ConfigLoader::new(&main_path).load();

    assert!(matches!(result, Err(ConfigError::Malformed { .. })));
}

#[test]
fn test_missing_substitution_document() {
    let (_temp_dir, dir) = create_test_config_dir();
    let main_path = write_config(&dir, &dir, "{}", "{}");
    fs::remove_file(dir.join("files.json")).unwrap();

    let result = ConfigLoader::new(&main_path).load();

    match result {
        Err(ConfigError::NotFound(path)) => assert_eq!(path, dir.join("files.json")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_root_path_missing() {
    let (_temp_dir, dir) = create_test_config_dir();
    let main_path = write_config(&dir, &dir.join("absent"), "{}", "{}");

    let result = ConfigLoader::new(&main_path).load();

    assert!(matches!(result, Err(ConfigError::RootPathMissing(_))));
}

#[test]
fn test_root_path_is_a_file() {
    let (_temp_dir, dir) = create_test_config_dir();
    let file = dir.join("not_a_dir.txt");
    fs::write(&file, "x").unwrap();
    let main_path = write_config(&dir, &file, "{}", "{}");

    let result = ConfigLoader::new(&main_path).load();

    assert!(matches!(result, Err(ConfigError::RootPathNotDirectory(_))));
}

#[test]
fn test_error_messages_name_the_path() {
    let (_temp_dir, dir) = create_test_config_dir();
    let main_path = dir.join("config.json");
    fs::write(&main_path, "[1, 2").unwrap();

    let error = ConfigLoader::new(&main_path).load().unwrap_err();

    assert!(error.to_string().contains(main_path.as_str()));
}
