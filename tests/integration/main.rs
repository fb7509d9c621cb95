//! Integration tests for rateview

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;

    fn rateview() -> Command {
        cargo_bin_cmd!("rateview")
    }

    /// Config pointing at a closed local port, so a fetch fails fast
    /// without touching the network.
    fn unreachable_source_config(dir: &Path) -> String {
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
[source]
url = "http://127.0.0.1:9/rates"
pointer = "/rates/VND"
timeout_secs = 1

[display]
label = "USD/VND"
fallback = 25000.0
precision = 0
"#,
        )
        .unwrap();
        path.display().to_string()
    }

    #[test]
    fn help_displays() {
        rateview()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("shared exchange-rate viewer"));
    }

    #[test]
    fn version_displays() {
        rateview()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("rateview"));
    }

    #[test]
    fn config_path() {
        rateview()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("absent.toml").display().to_string();
        rateview()
            .args(["--config", &missing, "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[source]"))
            .stdout(predicate::str::contains("fallback = 25000"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let path_arg = path.display().to_string();

        rateview()
            .args(["--config", &path_arg, "config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(path.exists());

        // A second init refuses to overwrite without --force.
        rateview()
            .args(["--config", &path_arg, "config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn show_falls_back_when_source_unreachable() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = unreachable_source_config(temp.path());

        rateview()
            .args(["--config", &config, "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("25000"))
            .stdout(predicate::str::contains("fallback"));
    }

    #[test]
    fn show_many_consumers_share_one_cache() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = unreachable_source_config(temp.path());

        rateview()
            .args(["--config", &config, "show", "-n", "3", "--stats"])
            .assert()
            .success()
            .stdout(predicate::str::contains("consumers: 3"))
            .stdout(predicate::str::contains("fetches in flight: 0"));
    }
}
