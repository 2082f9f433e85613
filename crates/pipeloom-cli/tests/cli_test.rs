use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rstest::rstest;
use std::path::Path;

fn init_demo(dir: &Path) {
    cargo_bin_cmd!("pipeloom")
        .args(["init", dir.to_str().unwrap(), "--name", "demo", "--demo"])
        .assert()
        .success();
}

fn pipeloom(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    cargo_bin_cmd!("pipeloom")
        .args(["--config", dir.to_str().unwrap()])
        .args(args)
        .assert()
}

fn add_local_root(dir: &Path) {
    pipeloom(
        dir,
        &[
            "connection", "add", "--name", "local", "--host", "localhost", "--username", "root",
        ],
    )
    .success();
}

#[test]
fn test_init_creates_project() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());

    let config = std::fs::read_to_string(dir.path().join("pipeloom.yaml")).unwrap();
    assert!(config.contains("name: demo"));
    assert!(config.contains("mode: demo"));
    assert!(dir.path().join(".pipeloom").is_dir());

    // A second init refuses to overwrite
    cargo_bin_cmd!("pipeloom")
        .args(["init", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already contains"));
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    pipeloom(dir.path(), &["status"])
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_connection_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());
    add_local_root(dir.path());

    pipeloom(dir.path(), &["connection", "list"])
        .success()
        .stdout(predicate::str::contains("pending"));

    pipeloom(dir.path(), &["connection", "test", "local"])
        .success()
        .stdout(predicate::str::contains("Connection successful"));

    pipeloom(dir.path(), &["connection", "select-db", "local", "airportdb"])
        .success()
        .stdout(predicate::str::contains("Loaded 5 table(s) from airportdb"));

    pipeloom(dir.path(), &["connection", "show", "local"])
        .success()
        .stdout(predicate::str::contains("selected"))
        .stdout(predicate::str::contains("Database:  airportdb"));

    pipeloom(dir.path(), &["schema", "show", "local", "--schema", "airportdb"])
        .success()
        .stdout(predicate::str::contains("flight"))
        .stdout(predicate::str::contains("FK → airline.airline_id"));

    pipeloom(dir.path(), &["connection", "clear-db", "local"]).success();
    pipeloom(dir.path(), &["connection", "show", "local"])
        .success()
        .stdout(predicate::str::contains("connected"))
        .stdout(predicate::str::contains("Database:").not());

    pipeloom(dir.path(), &["connection", "remove", "local"]).success();
    pipeloom(dir.path(), &["connection", "list"])
        .success()
        .stdout(predicate::str::contains("No connections"));
}

#[test]
fn test_unreachable_connection_fails() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());
    pipeloom(
        dir.path(),
        &[
            "connection", "add", "--name", "remote", "--host", "unreachable.example", "--username",
            "x",
        ],
    )
    .success();

    pipeloom(dir.path(), &["connection", "test", "remote"])
        .failure()
        .stdout(predicate::str::contains("Connection failed"));

    pipeloom(dir.path(), &["connection", "list"])
        .success()
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn test_live_backend_falls_back_for_local_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("pipeloom.yaml"),
        "name: live\nbackend:\n  mode: live\n  base_url: \"http://127.0.0.1:9\"\n  connect_timeout_secs: 2\n",
    )
    .unwrap();
    add_local_root(dir.path());

    pipeloom(dir.path(), &["connection", "test", "local"])
        .success()
        .stdout(predicate::str::contains("3 database(s)"));
}

#[test]
fn test_preview_and_transform_selected_table() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());
    add_local_root(dir.path());
    pipeloom(dir.path(), &["connection", "test", "local"]).success();
    pipeloom(dir.path(), &["connection", "select-db", "local", "sakila"]).success();
    pipeloom(dir.path(), &["table", "select", "local", "sakila", "customer"])
        .success()
        .stdout(predicate::str::contains("5 columns"));

    let output = pipeloom(dir.path(), &["table", "preview"]).success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 50);

    pipeloom(dir.path(), &["transform", "run", "drop column nickname"])
        .failure()
        .stdout(predicate::str::contains("does not exist"));

    pipeloom(dir.path(), &["transform", "run", "rename email to contact"])
        .success()
        .stdout(predicate::str::contains("Planned 1 step(s) for sakila.customer"))
        .stdout(predicate::str::contains("Resulting columns:"))
        .stdout(predicate::str::contains("contact"));

    pipeloom(dir.path(), &["transform", "preview"])
        .success()
        .stdout(predicate::str::contains("\"contact\":\"email_1\""));

    pipeloom(dir.path(), &["transform", "commit"])
        .success()
        .stdout(predicate::str::contains("Transformation applied"));

    pipeloom(dir.path(), &["pipeline", "show"])
        .success()
        .stdout(predicate::str::contains("transform-1"));
}

#[test]
fn test_pipeline_editing_and_export() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());

    pipeloom(dir.path(), &["pipeline", "add-table"])
        .success()
        .stdout(predicate::str::contains("table-1"));
    pipeloom(dir.path(), &["pipeline", "add-table"])
        .success()
        .stdout(predicate::str::contains("table-2"));
    pipeloom(dir.path(), &["pipeline", "add-table"]).success();
    pipeloom(dir.path(), &["pipeline", "connect", "table-1", "table-2"])
        .success()
        .stdout(predicate::str::contains("etable-1-table-2"));
    pipeloom(dir.path(), &["pipeline", "connect", "table-2", "table-3"]).success();
    pipeloom(dir.path(), &["pipeline", "connect", "table-2", "table-9"]).failure();

    pipeloom(dir.path(), &["pipeline", "delete-selected"])
        .success()
        .stdout(predicate::str::contains("Nothing selected"));

    let export = dir.path().join("pipeline.json");
    pipeloom(
        dir.path(),
        &["pipeline", "export", "--output", export.to_str().unwrap()],
    )
    .success();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&export).unwrap()).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(json["edges"].as_array().unwrap().len(), 2);

    pipeloom(dir.path(), &["pipeline", "select", "table-3"]).success();
    pipeloom(dir.path(), &["pipeline", "delete-selected"])
        .success()
        .stdout(predicate::str::contains("Removed 1 node(s) and 1 edge(s)"));

    pipeloom(dir.path(), &["pipeline", "remove", "etable-1-table-2"])
        .success()
        .stdout(predicate::str::contains("Removed 1 edge(s)"));
    pipeloom(dir.path(), &["pipeline", "remove", "table-9"]).failure();

    pipeloom(dir.path(), &["pipeline", "import", export.to_str().unwrap()]).success();
    pipeloom(dir.path(), &["pipeline", "show"])
        .success()
        .stdout(predicate::str::contains("table-3"))
        .stdout(predicate::str::contains("etable-2-table-3"));
}

#[test]
fn test_seed_from_schema() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());
    add_local_root(dir.path());
    pipeloom(dir.path(), &["connection", "test", "local"]).success();
    pipeloom(dir.path(), &["connection", "select-db", "local", "employees"]).success();

    pipeloom(dir.path(), &["pipeline", "seed", "local", "employees"])
        .success()
        .stdout(predicate::str::contains("Added 4 table node(s)"));
    pipeloom(dir.path(), &["pipeline", "show"])
        .success()
        .stdout(predicate::str::contains("emp_no → employees.emp_no"));
}

#[test]
fn test_login_logout_persist() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());
    let prefs = dir.path().join(".pipeloom/preferences.json");

    pipeloom(dir.path(), &["login", "ada"]).success();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&prefs).unwrap()).unwrap();
    assert_eq!(json["isAuthenticated"], "true");

    pipeloom(dir.path(), &["logout"]).success();
    pipeloom(dir.path(), &["status"])
        .success()
        .stdout(predicate::str::contains("(logged out)"));
}

#[test]
fn test_proxy_set_and_clear() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());

    pipeloom(dir.path(), &["proxy", "set", "https://cors.example/"]).success();
    pipeloom(dir.path(), &["status"])
        .success()
        .stdout(predicate::str::contains("Proxy:    https://cors.example/"));
    pipeloom(dir.path(), &["proxy", "clear"])
        .success()
        .stdout(predicate::str::contains("Proxy cleared"));
}

#[rstest]
#[case("ftp://nope")]
#[case("cors.example")]
#[case("file:///tmp/proxy")]
fn test_proxy_requires_http_url(#[case] url: &str) {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());

    pipeloom(dir.path(), &["proxy", "set", url])
        .failure()
        .stderr(predicate::str::contains("must be an http(s) URL"));
}

#[test]
fn test_upload_csv() {
    let dir = tempfile::tempdir().unwrap();
    init_demo(dir.path());
    let file = dir.path().join("leads.csv");
    std::fs::write(&file, "id,email,score\n1,a@example.com,3.5\n2,b@example.com,4\n").unwrap();

    pipeloom(dir.path(), &["upload", file.to_str().unwrap()])
        .success()
        .stdout(predicate::str::contains("table-1"))
        .stdout(predicate::str::contains("decimal"));
}
