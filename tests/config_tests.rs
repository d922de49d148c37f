use mc_runner::config::{validate_config, Config, ServerConfig};
use mc_runner::error::{Error, Result};
use std::path::PathBuf;
use tempfile::tempdir;

fn server(name: &str, directory: &str, public: bool) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        directory: directory.into(),
        public,
    }
}

#[test]
fn test_parse_config() -> Result<()> {
    let config_str = r#"{
        "serversRoot": "/srv/mc",
        "administrators": ["184467440737095516"],
        "maxRunningPublic": 3,
        "servers": [
            { "name": "Survival", "directory": "survival", "public": true },
            { "name": "Creative", "folder": "creative", "isPublic": false },
            { "name": "Modded", "directory": "/opt/modded" }
        ],
        "entryPoint": "start.sh",
        "shutdownCommand": "end",
        "readyMarker": "Server started",
        "restart": { "maxAttempts": 3 },
        "startupTimeoutSecs": 300,
        "statusHost": "10.0.0.5",
        "probeTimeoutMs": 500,
        "publicHost": "play.example.org",
        "addresses": { "25566": "creative.example.org" }
    }"#;

    let config = Config::parse_from_str(config_str)?;

    assert_eq!(config.servers.len(), 3);
    assert_eq!(config.servers[0], server("Survival", "survival", true));
    assert_eq!(config.servers[1], server("Creative", "creative", false));
    assert!(!config.servers[2].public);
    assert_eq!(config.max_running_public, 3);
    assert!(config.is_administrator("184467440737095516"));

    assert_eq!(
        config.server_directory(&config.servers[0]),
        PathBuf::from("/srv/mc/survival")
    );
    assert_eq!(
        config.server_directory(&config.servers[2]),
        PathBuf::from("/opt/modded")
    );

    let supervisor = &config.supervisor;
    assert_eq!(supervisor.entry_point, "start.sh");
    assert_eq!(supervisor.shutdown_command, "end");
    assert_eq!(supervisor.ready_marker, "Server started");
    assert_eq!(supervisor.restart.max_attempts, Some(3));
    assert_eq!(supervisor.startup_timeout_secs, Some(300));
    assert_eq!(supervisor.stop_timeout_secs, None);

    let status = &config.status;
    assert_eq!(status.status_host, "10.0.0.5");
    assert_eq!(status.probe_timeout_ms, 500);
    assert_eq!(status.public_host.as_deref(), Some("play.example.org"));
    assert_eq!(status.addresses["25566"], "creative.example.org");

    validate_config(&config)?;
    Ok(())
}

#[test]
fn test_parse_defaults() -> Result<()> {
    let config = Config::parse_from_str(
        r#"{ "servers": [{ "name": "Survival", "directory": "/srv/survival" }] }"#,
    )?;

    assert_eq!(config, Config::with_servers(vec![server("Survival", "/srv/survival", false)]));
    assert_eq!(config.max_running_public, 2);
    assert_eq!(config.supervisor.entry_point, "run.sh");
    assert_eq!(config.supervisor.shutdown_command, "stop");
    assert_eq!(config.supervisor.ready_marker, ")! For help, type");
    assert_eq!(config.status.status_host, "127.0.0.1");
    assert_eq!(config.status.probe_timeout_ms, 2000);
    assert_eq!(config.status.probe_timeout(), std::time::Duration::from_secs(2));
    assert!(config.administrators.is_empty());

    Ok(())
}

#[test]
fn test_parse_yaml_config() -> Result<()> {
    let config_str = r#"
serversRoot: /srv/mc
maxRunningPublic: 1
servers:
  - name: Survival
    directory: survival
    public: true
  - name: Creative
    folder: creative
restart:
  maxAttempts: 5
"#;

    let config = Config::parse_from_yaml_str(config_str)?;

    assert_eq!(config.servers.len(), 2);
    assert_eq!(config.servers[1], server("Creative", "creative", false));
    assert_eq!(config.max_running_public, 1);
    assert_eq!(config.supervisor.restart.max_attempts, Some(5));

    Ok(())
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        Config::parse_from_str("{ not json"),
        Err(Error::ConfigParse(_))
    ));
    // Servers need a name and a directory
    assert!(matches!(
        Config::parse_from_str(r#"{ "servers": [{ "name": "Survival" }] }"#),
        Err(Error::ConfigParse(_))
    ));
    assert!(matches!(
        Config::parse_from_yaml_str("servers: [ { name: Survival"),
        Err(Error::ConfigParse(_))
    ));
}

#[test]
fn test_from_file_resolves_root_against_file() -> Result<()> {
    let dir = tempdir().unwrap();

    let json_path = dir.path().join("runner.json");
    std::fs::write(
        &json_path,
        r#"{ "serversRoot": "servers", "servers": [{ "name": "a", "directory": "a" }] }"#,
    )
    .unwrap();
    let config = Config::from_file(&json_path)?;
    assert_eq!(
        config.server_directory(&config.servers[0]),
        dir.path().join("servers").join("a")
    );

    let yaml_path = dir.path().join("runner.yml");
    std::fs::write(
        &yaml_path,
        "serversRoot: /abs\nservers:\n  - name: a\n    directory: a\n",
    )
    .unwrap();
    let config = Config::from_file(&yaml_path)?;
    assert_eq!(config.server_directory(&config.servers[0]), PathBuf::from("/abs/a"));

    assert!(matches!(
        Config::from_file(dir.path().join("missing.json")),
        Err(Error::ConfigParse(_))
    ));

    Ok(())
}

#[test]
fn test_validate_config() -> Result<()> {
    let valid = Config::with_servers(vec![
        server("Survival", "/srv/survival", true),
        server("Creative", "/srv/creative", false),
    ]);
    validate_config(&valid)?;

    let empty = Config::with_servers(Vec::new());
    assert!(matches!(validate_config(&empty), Err(Error::ConfigInvalid(_))));

    let duplicate = Config::with_servers(vec![
        server("Survival", "/srv/a", true),
        server("SURVIVAL", "/srv/b", true),
    ]);
    assert!(matches!(validate_config(&duplicate), Err(Error::ConfigInvalid(_))));

    let unnamed = Config::with_servers(vec![server("  ", "/srv/a", true)]);
    assert!(matches!(validate_config(&unnamed), Err(Error::ConfigInvalid(_))));

    let no_directory = Config::with_servers(vec![server("a", "", true)]);
    assert!(matches!(validate_config(&no_directory), Err(Error::ConfigInvalid(_))));

    let mut no_cap = valid.clone();
    no_cap.max_running_public = 0;
    assert!(matches!(validate_config(&no_cap), Err(Error::ConfigInvalid(_))));

    let mut no_marker = valid.clone();
    no_marker.supervisor.ready_marker = String::new();
    assert!(matches!(validate_config(&no_marker), Err(Error::ConfigInvalid(_))));

    let mut zero_timeout = valid.clone();
    zero_timeout.supervisor.stop_timeout_secs = Some(0);
    assert!(matches!(validate_config(&zero_timeout), Err(Error::ConfigInvalid(_))));

    let mut zero_probe = valid;
    zero_probe.status.probe_timeout_ms = 0;
    assert!(matches!(validate_config(&zero_probe), Err(Error::ConfigInvalid(_))));

    Ok(())
}
