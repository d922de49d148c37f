// Shared fixtures for the integration tests: fake Minecraft servers written
// as shell scripts inside temporary directories.
#![allow(dead_code)]

use mc_runner::config::ServerConfig;
use mc_runner::{RuntimeState, ServerSupervisor};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Plays a vanilla server: prints the ready line, then exits on `stop`.
pub const SERVER_SCRIPT: &str = r#"#!/bin/sh
echo "[Server thread/INFO]: Starting minecraft server version 1.21.4"
echo '[Server thread/INFO]: Done (0.042s)! For help, type "help"'
while read -r line; do
  if [ "$line" = "stop" ]; then
    echo "[Server thread/INFO]: Stopping server"
    exit 0
  fi
done
"#;

/// Becomes ready, crashes once, and behaves on every later run.
pub const CRASH_ONCE_SCRIPT: &str = r#"#!/bin/sh
echo '[Server thread/INFO]: Done (0.042s)! For help, type "help"'
if [ ! -f crashed.marker ]; then
  touch crashed.marker
  sleep 0.3
  echo "[Server thread/ERROR]: Encountered an unexpected exception"
  exit 1
fi
while read -r line; do
  if [ "$line" = "stop" ]; then
    exit 0
  fi
done
"#;

/// Becomes ready, then crashes every time.
pub const ALWAYS_CRASH_SCRIPT: &str = r#"#!/bin/sh
echo '[Server thread/INFO]: Done (0.042s)! For help, type "help"'
sleep 0.3
exit 1
"#;

/// Dies before ever becoming ready.
pub const FAIL_SCRIPT: &str = r#"#!/bin/sh
echo "[main/ERROR]: You need to agree to the EULA in order to run the server."
exit 1
"#;

/// Never becomes ready.
pub const HANG_SCRIPT: &str = r#"#!/bin/sh
echo "[Server thread/INFO]: Preparing level \"world\""
while read -r line; do
  :
done
"#;

/// Becomes ready, then answers every command without ever shutting down.
pub const IGNORE_STOP_SCRIPT: &str = r#"#!/bin/sh
echo '[Server thread/INFO]: Done (0.042s)! For help, type "help"'
while read -r line; do
  echo "[Server thread/INFO]: Unknown command: $line"
done
"#;

/// Closes its console input before becoming ready, so commands cannot be sent.
pub const CLOSED_STDIN_SCRIPT: &str = r#"#!/bin/sh
exec 0<&-
echo '[Server thread/INFO]: Done (0.042s)! For help, type "help"'
exec sleep 30
"#;

/// Generates server.properties on its first run, like a real server.
pub const BOOTSTRAP_SCRIPT: &str = r#"#!/bin/sh
[ -f server.properties ] || printf 'server-port=25599\n' > server.properties
echo '[Server thread/INFO]: Done (0.042s)! For help, type "help"'
while read -r line; do
  if [ "$line" = "stop" ]; then
    exit 0
  fi
done
"#;

/// Create `root/name` holding `run.sh` and, when `port` is given, a
/// `server.properties` declaring it.
pub fn server_dir(root: &Path, name: &str, script: Option<&str>, port: Option<u16>) -> PathBuf {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();

    if let Some(script) = script {
        let script_path = dir.join("run.sh");
        std::fs::write(&script_path, script).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = std::fs::metadata(&script_path).unwrap().permissions();
            permissions.set_mode(0o755);
            std::fs::set_permissions(&script_path, permissions).unwrap();
        }
    }

    if let Some(port) = port {
        write_port(&dir, port);
    }

    dir
}

pub fn write_port(dir: &Path, port: u16) {
    std::fs::write(
        dir.join("server.properties"),
        format!("#Minecraft server properties\nmotd=Test\nserver-port={}\n", port),
    )
    .unwrap();
}

pub fn server_config(name: &str, directory: PathBuf, public: bool) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        directory,
        public,
    }
}

/// Poll until `server` reaches `state`; false on timeout.
pub async fn wait_for_state(server: &ServerSupervisor, state: RuntimeState, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if server.state() == state {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.state() == state
}

/// Upper bound for any single lifecycle step in these tests
pub const STEP: Duration = Duration::from_secs(10);
