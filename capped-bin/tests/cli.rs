#[cfg(test)]
mod cli {
    use assert_cmd::cargo::cargo_bin_cmd;
    use http::StatusCode;
    use predicates::str::contains;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::{error::Error, fs, time::Duration};
    use tempfile::tempdir;
    use test_utils::mock_server;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method},
    };

    type Result<T> = std::result::Result<T, Box<dyn Error>>;

    /// Run capped with the given arguments and parse its JSON report
    fn json_report(args: &[String]) -> Result<Value> {
        let output = cargo_bin_cmd!()
            .args(["--format", "json"])
            .args(args)
            .env_remove("RUST_LOG")
            .output()?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    #[test]
    fn test_help() {
        cargo_bin_cmd!()
            .arg("--help")
            .assert()
            .success()
            .stdout(contains("--max-concurrency"))
            .stdout(contains("--admission-timeout"))
            .stdout(contains("--config"));
    }

    #[test]
    fn test_urls_are_required() {
        cargo_bin_cmd!().assert().failure();
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = mock_server!(StatusCode::OK, set_body_string("capped"));

        cargo_bin_cmd!()
            .arg(mock_server.uri())
            .assert()
            .success()
            .stdout(contains("[200]"))
            .stdout(contains("6 bytes"))
            .stdout(contains("1 Total, 1 OK, 0 Failed"))
            .stdout(contains("Peak 1 of 128 connections"));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let mock_server = mock_server!(StatusCode::NOT_FOUND);

        cargo_bin_cmd!()
            .arg(mock_server.uri())
            .assert()
            .success()
            .stdout(contains("[404]"));
    }

    #[test]
    fn test_connection_failure() {
        cargo_bin_cmd!()
            .arg("http://127.0.0.1:1/")
            .assert()
            .failure()
            .code(2)
            .stdout(contains("[ERROR] http://127.0.0.1:1/"))
            .stdout(contains("1 Total, 0 OK, 1 Failed"));
    }

    #[test]
    fn test_invalid_url() {
        cargo_bin_cmd!()
            .arg("not a url")
            .assert()
            .code(2)
            .stdout(contains("Cannot parse not a url as a URL"));
    }

    #[tokio::test]
    async fn test_json_report_respects_limit() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK, set_delay(Duration::from_millis(200)));
        let mut args = vec!["-c".to_string(), "2".to_string()];
        args.extend(std::iter::repeat_n(mock_server.uri(), 6));

        let report = json_report(&args)?;

        assert_eq!(report["total"], 6);
        assert_eq!(report["successful"], 6);
        assert_eq!(report["limit"], 2);
        assert_eq!(report["peak"], 2);
        assert!(report["duration_secs"].as_f64().unwrap() >= 0.6);
        assert_eq!(report["results"].as_array().unwrap().len(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_means_no_limit() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK, set_delay(Duration::from_millis(300)));
        let mut args = vec!["--max-concurrency".to_string(), "0".to_string()];
        args.extend(std::iter::repeat_n(mock_server.uri(), 4));

        let report = json_report(&args)?;

        assert!(report["limit"].is_null());
        assert_eq!(report["peak"], 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-token", "secret"))
            .and(header("user-agent", "capped-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        cargo_bin_cmd!()
            .args(["-H", "X-Token: secret", "--user-agent", "capped-test"])
            .arg(mock_server.uri())
            .assert()
            .success();
    }

    #[tokio::test]
    async fn test_admission_timeout() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK, set_delay(Duration::from_millis(500)));
        let args = vec![
            "-c".to_string(),
            "1".to_string(),
            "--admission-timeout".to_string(),
            "100ms".to_string(),
            mock_server.uri(),
            mock_server.uri(),
        ];

        let report = json_report(&args)?;

        assert_eq!(report["successful"], 1);
        assert_eq!(report["failed"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_config_file() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK, set_delay(Duration::from_millis(100)));
        let dir = tempdir()?;
        let config = dir.path().join("custom.toml");
        fs::write(&config, "max_concurrency = 1\nformat = \"json\"\n")?;

        let output = cargo_bin_cmd!()
            .arg("--config")
            .arg(&config)
            .args([mock_server.uri(), mock_server.uri(), mock_server.uri()])
            .output()?;
        let report: Value = serde_json::from_slice(&output.stdout)?;

        assert!(output.status.success());
        assert_eq!(report["limit"], 1);
        assert_eq!(report["peak"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_default_config_file() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK);
        let dir = tempdir()?;
        fs::write(dir.path().join("capped.toml"), "max_concurrency = 7\n")?;

        cargo_bin_cmd!()
            .current_dir(dir.path())
            .arg(mock_server.uri())
            .assert()
            .success()
            .stdout(contains("Peak 1 of 7 connections"));
        Ok(())
    }

    #[tokio::test]
    async fn test_cli_overrides_config_file() -> Result<()> {
        let mock_server = mock_server!(StatusCode::OK);
        let dir = tempdir()?;
        fs::write(dir.path().join("capped.toml"), "max_concurrency = 7\n")?;

        cargo_bin_cmd!()
            .current_dir(dir.path())
            .args(["-c", "3"])
            .arg(mock_server.uri())
            .assert()
            .success()
            .stdout(contains("Peak 1 of 3 connections"));
        Ok(())
    }

    #[tokio::test]
    async fn test_cli_header_overrides_config_header() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("accept", "text/html"))
            .and(header("x-token", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempdir()?;
        fs::write(
            dir.path().join("capped.toml"),
            "[header]\nAccept = \"*/*\"\nX-Token = \"secret\"\n",
        )?;

        cargo_bin_cmd!()
            .current_dir(dir.path())
            .args(["-H", "Accept: text/html"])
            .arg(mock_server.uri())
            .assert()
            .success()
            .stdout(contains("[200]"));
        Ok(())
    }

    #[test]
    fn test_missing_config_file() {
        cargo_bin_cmd!()
            .args(["--config", "does-not-exist.toml", "http://127.0.0.1:1/"])
            .env_remove("RUST_LOG")
            .assert()
            .code(3)
            .stderr(contains("Cannot load configuration file"));
    }

    #[test]
    fn test_invalid_config_keys() -> Result<()> {
        let dir = tempdir()?;
        let config = dir.path().join("capped.toml");
        fs::write(&config, "max_connections = 3\n")?;

        cargo_bin_cmd!()
            .arg("--config")
            .arg(&config)
            .arg("http://127.0.0.1:1/")
            .env_remove("RUST_LOG")
            .assert()
            .code(3)
            .stderr(contains("Failed to parse configuration file"))
            .stderr(contains("unknown field"));
        Ok(())
    }
}
