//! Reading the port out of a server's `server.properties`.

use crate::error::{Error, Result};
use crate::server::Port;
use std::io::ErrorKind;
use std::num::NonZeroU16;
use std::path::Path;

/// Settings file generated by the server on its first run.
pub const SETTINGS_FILE: &str = "server.properties";

const PORT_KEY: &str = "server-port";

/// Reads the port from `directory/server.properties`.
///
/// A missing file means the server was never bootstrapped and yields
/// [`Port::Uninitialized`]. Any other read failure, a missing `server-port`
/// key or an out-of-range value is an [`Error::Settings`].
pub fn read_port(directory: &Path) -> Result<Port> {
    let path = directory.join(SETTINGS_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Port::Uninitialized),
        Err(e) => {
            return Err(Error::Settings(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    parse_port(&content).map_err(|msg| Error::Settings(format!("{}: {}", path.display(), msg)))
}

fn parse_port(content: &str) -> std::result::Result<Port, String> {
    let value = property(content, PORT_KEY)
        .ok_or_else(|| format!("missing '{}' key", PORT_KEY))?;

    value
        .parse::<NonZeroU16>()
        .map(Port::Assigned)
        .map_err(|_| format!("'{}' is not a valid port: {:?}", PORT_KEY, value))
}

/// Looks up `key` in Java properties text. The last assignment wins.
fn property<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let split = line.find(['=', ':'])?;
            let (k, v) = line.split_at(split);
            Some((k.trim_end(), v[1..].trim()))
        })
        .filter(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VANILLA: &str = "#Minecraft server properties\n\
        #Sat Mar 01 12:00:00 CET 2025\n\
        enable-command-block=false\n\
        motd=A Minecraft Server\n\
        server-port=25565\n\
        query.port=25565\n";

    #[test]
    fn test_parse_vanilla_properties() {
        assert_eq!(
            parse_port(VANILLA),
            Ok(Port::Assigned(NonZeroU16::new(25565).unwrap()))
        );
    }

    #[test]
    fn test_parse_tolerates_spacing_and_colon_separator() {
        assert_eq!(parse_port("server-port : 25570").unwrap().number(), Some(25570));
        assert_eq!(parse_port("  server-port= 1 ").unwrap().number(), Some(1));
    }

    #[test]
    fn test_parse_ignores_comments() {
        let content = "# server-port=1\nserver-port=25566\n";
        assert_eq!(parse_port(content).unwrap().number(), Some(25566));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(parse_port("motd=hi\n").is_err());
        assert!(parse_port("server-port=\n").is_err());
        assert!(parse_port("server-port=0\n").is_err());
        assert!(parse_port("server-port=70000\n").is_err());
        assert!(parse_port("server-port=abc\n").is_err());
    }

    #[test]
    fn test_read_port_missing_file_is_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_port(dir.path()).unwrap(), Port::Uninitialized);
    }

    #[test]
    fn test_read_port_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), VANILLA).unwrap();
        assert_eq!(read_port(dir.path()).unwrap().number(), Some(25565));
    }

    #[test]
    fn test_read_port_invalid_file_is_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "server-port=nope\n").unwrap();
        assert!(matches!(read_port(dir.path()), Err(Error::Settings(_))));
    }
}
