use assert_cmd::prelude::*; // Add methods on commands
use std::fs::File;
use std::io::Write;
use std::process::{Command, Output};
use tempfile::{Builder, TempDir};

mod basic;
mod config;

const TEST_CONFIG_FILE: &str = "docsql-test.toml";
const TEST_SQLITE_DB: &str = "docsql.sqlite";

fn setup_temp_config_and_data_dir(extra: &str) -> std::io::Result<TempDir> {
    let temp_dir = Builder::new()
        .prefix("docsql-test-dir")
        .rand_bytes(5)
        .tempdir()?;

    let file_path = temp_dir.path().join(TEST_CONFIG_FILE);
    let mut conf_file = File::create(file_path)?;

    let dsn = temp_dir.path().join(TEST_SQLITE_DB).display().to_string();

    let config_str = format!(
        r#"
[backend]
type = "sqlite"
dsn = "{}"
{extra}
"#,
        dsn.escape_default(),
    );

    write!(conf_file, "{config_str}")?;
    Ok(temp_dir)
}

fn docsql(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("docsql").expect("docsql bin exists");
    cmd.arg("-c").arg(temp_dir.path().join(TEST_CONFIG_FILE));
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
