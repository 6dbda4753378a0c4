//! Host table persistence: JSON mapping of server name -> base URL plus the default base.
//! Stored under XDG config dir: $XDG_CONFIG_HOME/serverdeck/hosts.json (fallback ~/.config/serverdeck/hosts.json)

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf};
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};
use crate::routes::{is_host_base, HostTable, BUILTIN_HOSTS, DEFAULT_BASE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostsFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_base")]
    pub default_base: String,
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    1
}

fn default_base() -> String {
    DEFAULT_BASE.to_string()
}

impl Default for HostsFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_base: default_base(),
            hosts: BUILTIN_HOSTS
                .iter()
                .map(|(n, u)| (n.to_string(), u.to_string()))
                .collect(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("serverdeck")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("serverdeck")
    }
}

pub fn hosts_path() -> PathBuf {
    config_dir().join("hosts.json")
}

/// Missing file -> built-in hosts. A file that doesn't parse is logged and ignored.
pub fn load_hosts() -> HostsFile {
    let path = hosts_path();
    match fs::read_to_string(&path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring unreadable host file: {e}");
            HostsFile::default()
        }),
        Err(_) => HostsFile::default(),
    }
}

pub fn save_hosts(h: &HostsFile) -> Result<()> {
    let path = hosts_path();
    let io_err = |e: std::io::Error| Error::config(format!("{}: {e}", path.display()));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let data = serde_json::to_vec_pretty(h)
        .map_err(|e| Error::config(format!("cannot serialize host file: {e}")))?;
    fs::write(&path, data).map_err(io_err)
}

/// Values given on the command line, applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct HostOverrides {
    pub default_base: Option<String>,
    pub hosts: Vec<(String, String)>,
}

impl HostsFile {
    /// Apply overrides; returns whether anything changed.
    pub fn apply(&mut self, o: &HostOverrides) -> bool {
        let before = self.clone();
        if let Some(base) = &o.default_base {
            self.default_base = base.clone();
        }
        for (name, url) in &o.hosts {
            self.hosts.insert(name.clone(), url.clone());
        }
        *self != before
    }

    /// Validate every base and build the routing table.
    pub fn to_table(&self) -> Result<HostTable> {
        let mut table = HostTable::new(parse_base("default", &self.default_base)?);
        for (name, raw) in &self.hosts {
            table.insert(name.clone(), parse_base(name, raw)?);
        }
        Ok(table)
    }
}

fn parse_base(name: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::config(format!("host '{name}': invalid URL '{raw}': {e}")))?;
    if !is_host_base(&url) {
        return Err(Error::config(format!(
            "host '{name}': '{raw}' is not an http(s) base URL"
        )));
    }
    Ok(url)
}

/// `NAME=URL` as given to `--host`. The name may contain spaces; the split is on the first `=`.
pub fn parse_host_assignment(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
            Ok((name.trim().to_string(), url.trim().to_string()))
        }
        _ => Err(Error::config(format!("expected NAME=URL, got '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::Capability;

    #[test]
    fn default_file_matches_builtin_table() {
        let t = HostsFile::default().to_table().unwrap();
        assert_eq!(t, HostTable::default());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let h: HostsFile = serde_json::from_str(r#"{"hosts": {"lab": "http://10.1.1.1:5000"}}"#).unwrap();
        assert_eq!(h.version, 1);
        assert_eq!(h.default_base, DEFAULT_BASE);
        let t = h.to_table().unwrap();
        assert_eq!(
            t.resolve("lab", Capability::Logs).as_str(),
            "http://10.1.1.1:5000/logs"
        );
        assert_eq!(t.base_for("Dex Pi 2").as_str(), DEFAULT_BASE);
    }

    #[test]
    fn apply_reports_changes_only() {
        let mut h = HostsFile::default();
        assert!(!h.apply(&HostOverrides::default()));
        let same = HostOverrides {
            default_base: Some(DEFAULT_BASE.into()),
            hosts: vec![],
        };
        assert!(!h.apply(&same));
        let new = HostOverrides {
            default_base: None,
            hosts: vec![("lab".into(), "http://lab:1".into())],
        };
        assert!(h.apply(&new));
        assert_eq!(h.hosts["lab"], "http://lab:1");
    }

    #[test]
    fn invalid_bases_are_config_errors() {
        let mut h = HostsFile::default();
        h.hosts.insert("bad".into(), "mailto:ops@example.com".into());
        assert!(matches!(h.to_table(), Err(Error::Config { .. })));
        h.hosts.insert("bad".into(), "not a url".into());
        assert!(matches!(h.to_table(), Err(Error::Config { .. })));
    }

    #[test]
    fn host_assignment_splits_on_first_equals() {
        assert_eq!(
            parse_host_assignment("Dex Pi 2=http://pi2:8000/?a=b").unwrap(),
            ("Dex Pi 2".to_string(), "http://pi2:8000/?a=b".to_string())
        );
        assert!(parse_host_assignment("nourl=").is_err());
        assert!(parse_host_assignment("=http://x").is_err());
        assert!(parse_host_assignment("plain").is_err());
    }
}
