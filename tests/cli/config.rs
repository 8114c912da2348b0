use crate::cli::*;

#[test]
fn test_cli_configured_id_field() -> std::io::Result<()> {
    let temp_dir = setup_temp_config_and_data_dir("[collections]\nid_field = \"sku\"")?;

    docsql(&temp_dir)
        .args(["create-database", "shop"])
        .assert()
        .success();
    docsql(&temp_dir)
        .args(["create", "shop", "items"])
        .assert()
        .success();
    docsql(&temp_dir)
        .args(["insert", "shop", "items", r#"{"sku":"x-1","qty":3}"#])
        .assert()
        .success();

    docsql(&temp_dir)
        .args(["remove", "shop", "items", r#"{"sku":"x-1"}"#])
        .assert()
        .success()
        .stdout("Removed document at position 1\n");

    // Without the configured field there is nothing to go by
    let output = docsql(&temp_dir)
        .args(["remove", "shop", "items", r#"{"_id":"x-1"}"#])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("is not supported"));

    Ok(())
}

#[test]
fn test_cli_environment_overrides_config() -> std::io::Result<()> {
    let temp_dir = setup_temp_config_and_data_dir("")?;

    docsql(&temp_dir)
        .args(["create-database", "shop"])
        .assert()
        .success();
    docsql(&temp_dir)
        .args(["create", "shop", "items"])
        .assert()
        .success();

    let output = docsql(&temp_dir)
        .env("DOCSQL__COLLECTIONS__ID_FIELD", "not a field")
        .args(["count", "shop", "items"])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Invalid collections.id_field"));

    Ok(())
}

#[test]
fn test_cli_missing_config() {
    let temp_dir = tempfile::tempdir().unwrap();

    let output = std::process::Command::cargo_bin("docsql")
        .unwrap()
        .arg("-c")
        .arg(temp_dir.path().join("nowhere.toml"))
        .args(["count", "shop", "items"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Error loading the config"));
}
