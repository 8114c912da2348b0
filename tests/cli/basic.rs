use crate::cli::*;

const DOC_A: &str = r#"{"_id":"a","total":5}"#;
const DOC_B: &str = r#"{"_id":"b","total":12}"#;
const DOC_C: &str = r#"{"_id":"c"}"#;

#[test]
fn test_cli_collection_lifecycle() -> std::io::Result<()> {
    let temp_dir = setup_temp_config_and_data_dir("")?;

    docsql(&temp_dir)
        .args(["create-database", "shop"])
        .assert()
        .success()
        .stdout("Created database shop\n");

    docsql(&temp_dir)
        .args(["create", "shop", "orders"])
        .assert()
        .success()
        .stdout("Created collection shop.orders\n");

    // Each invocation is a new process: everything below goes through the file
    docsql(&temp_dir)
        .args(["insert", "shop", "orders", DOC_A, DOC_B, DOC_C])
        .assert()
        .success()
        .stdout("1\n2\n3\n");

    docsql(&temp_dir)
        .args(["count", "shop", "orders"])
        .assert()
        .success()
        .stdout("3\n");

    // Missing sort fields come last
    docsql(&temp_dir)
        .args(["find", "shop", "orders", "--sort", r#"{"total": -1}"#])
        .assert()
        .success()
        .stdout(format!("{DOC_B}\n{DOC_A}\n{DOC_C}\n"));

    docsql(&temp_dir)
        .args(["find", "shop", "orders", "--skip", "1", "--limit", "1"])
        .assert()
        .success()
        .stdout(format!("{DOC_B}\n"));

    docsql(&temp_dir)
        .args(["find", "shop", "orders", "--query", r#"{"_id": "c"}"#])
        .assert()
        .success()
        .stdout(format!("{DOC_C}\n"));

    docsql(&temp_dir)
        .args(["size", "shop", "orders"])
        .assert()
        .success()
        .stdout(format!("{}\n", DOC_A.len() + DOC_B.len() + DOC_C.len()));

    docsql(&temp_dir)
        .args(["remove", "shop", "orders", r#"{"_id": "a"}"#])
        .assert()
        .success()
        .stdout("Removed document at position 1\n");

    docsql(&temp_dir)
        .args(["size", "shop", "orders"])
        .assert()
        .success()
        .stdout(format!("{}\n", DOC_B.len() + DOC_C.len()));

    let output = docsql(&temp_dir)
        .args(["remove", "shop", "orders", r#"{"_id": "a"}"#])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No document in shop.orders has _id = \"a\""));

    docsql(&temp_dir)
        .args(["rename", "shop", "orders", "orders.archived"])
        .assert()
        .success()
        .stdout("Renamed shop.orders to shop.orders.archived\n");

    let output = docsql(&temp_dir).args(["count", "shop", "orders"]).output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to count shop.orders: collection doesn't exist"));

    docsql(&temp_dir)
        .args(["count", "shop", "orders.archived"])
        .assert()
        .success()
        .stdout("2\n");

    docsql(&temp_dir)
        .args(["size", "shop", "orders.archived"])
        .assert()
        .success()
        .stdout(format!("{}\n", DOC_B.len() + DOC_C.len()));

    docsql(&temp_dir)
        .args(["insert", "shop", "orders.archived", DOC_A])
        .assert()
        .success();

    docsql(&temp_dir)
        .args(["size", "shop", "orders.archived"])
        .assert()
        .success()
        .stdout(format!("{}\n", DOC_A.len() + DOC_B.len() + DOC_C.len()));

    docsql(&temp_dir)
        .args(["drop", "shop", "orders.archived"])
        .assert()
        .success()
        .stdout("Dropped collection shop.orders.archived\n");

    let output = docsql(&temp_dir)
        .args(["count", "shop", "orders.archived"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));

    Ok(())
}

#[test]
fn test_cli_rejects_bad_input() -> std::io::Result<()> {
    let temp_dir = setup_temp_config_and_data_dir("")?;

    docsql(&temp_dir)
        .args(["create-database", "shop"])
        .assert()
        .success();

    // Never reaches the database
    let output = docsql(&temp_dir)
        .args(["create", "shop", "bad name"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Illegal collection name: \"bad name\""));

    let output = docsql(&temp_dir)
        .args(["create", "shop", "_meta"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("reserved table"));

    docsql(&temp_dir)
        .args(["create", "shop", "orders"])
        .assert()
        .success();

    let output = docsql(&temp_dir)
        .args(["create", "shop", "orders"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("collection already exists"));

    let output = docsql(&temp_dir)
        .args(["insert", "shop", "orders", "not json"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid document"));

    let output = docsql(&temp_dir)
        .args(["rename", "shop", "orders", "moved", "--new-database", "other"])
        .output()?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("is not supported"));

    // Nothing was inserted or moved
    let output = docsql(&temp_dir).args(["count", "shop", "orders"]).output()?;
    assert_eq!(stdout(&output), "0\n");

    Ok(())
}
