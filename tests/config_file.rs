//! Config loading from disk.

use std::fs;

use tempfile::TempDir;

use chunk_weld::config::load_config;

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("weld.toml");
    fs::write(&path, contents).unwrap();
    (tmp, path)
}

#[test]
fn loads_full_config() {
    let (_tmp, path) = write_config(
        r#"
[store]
url = "postgres://weld_ro@localhost:5432/foundry"
table = "foundry.chunk_embeddings_view"
timeout_secs = 10

[aggregation]
min_tokens = 800
page_size = 50

[subgraphs]
web = ["WEB"]
"manual.seismic" = ["PK"]
"#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.aggregation.min_tokens, 800);
    assert_eq!(config.aggregation.page_size, 50);
    assert_eq!(config.store.timeout_secs, 10);
    assert_eq!(config.subgraphs["manual.seismic"], vec!["PK"]);
}

#[test]
fn rejects_zero_min_tokens_at_load() {
    let (_tmp, path) = write_config(
        r#"
[store]
url = "postgres://weld_ro@localhost:5432/foundry"
table = "chunks"

[aggregation]
min_tokens = 0
"#,
    );

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("min_tokens"));
}

#[test]
fn missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(load_config(&tmp.path().join("absent.toml")).is_err());
}
