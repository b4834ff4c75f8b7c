use crate::error::{HarnessError, Result};
use crate::types::config::HarnessConfig;
use std::path::{Path, PathBuf};
use toml::map::Map;
use toml::Value;

pub const DEFAULT_CONFIG_FILE: &str = "sonar-harness.toml";
pub const DEFAULT_LOCAL_FILE: &str = ".sonar-harness/local.toml";
pub const DEFAULT_GLOBAL_CONFIG_FILE: &str = ".config/sonar-harness/config.toml";
pub const SERVER_URL_ENV: &str = "SONAR_HARNESS_URL";

pub fn load_config(root: &Path) -> Result<HarnessConfig> {
    let global = std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(DEFAULT_GLOBAL_CONFIG_FILE));
    let mut cfg = load_config_with_global(root, global.as_deref())?;
    if let Ok(url) = std::env::var(SERVER_URL_ENV) {
        if !url.trim().is_empty() {
            cfg.server.url = url.trim().to_string();
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Merges global, repo and local files in that order. Every layer is
/// optional; with none present the defaults apply.
pub(crate) fn load_config_with_global(
    root: &Path,
    global_path: Option<&Path>,
) -> Result<HarnessConfig> {
    let mut merged = Value::Table(Map::new());
    if let Some(path) = global_path {
        merge_file_if_exists(&mut merged, path)?;
    }
    merge_file_if_exists(&mut merged, &root.join(DEFAULT_CONFIG_FILE))?;
    merge_file_if_exists(&mut merged, &root.join(DEFAULT_LOCAL_FILE))?;

    merged
        .try_into()
        .map_err(|e: toml::de::Error| HarnessError::ConfigParse(e.to_string()))
}

fn merge_file_if_exists(merged: &mut Value, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let value = read_toml_value(path)?;
    merge_toml(merged, value);
    Ok(())
}

fn read_toml_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| HarnessError::ConfigParse(format!("{}: {}", path.display(), e)))
}

fn merge_toml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_table), Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::DEFAULT_SERVER_URL;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_config_falls_back_to_defaults_when_no_file_exists() {
        let dir = TempDir::new().expect("temp dir should be created");
        let cfg = load_config_with_global(dir.path(), None).expect("load should not fail");
        assert_eq!(cfg.server.url, DEFAULT_SERVER_URL);
        assert_eq!(cfg.poll.interval_ms, 1000);
    }

    #[test]
    fn load_config_merges_global_repo_and_local_in_order() {
        let root = TempDir::new().expect("root temp dir should be created");
        let global_root = TempDir::new().expect("global temp dir should be created");
        let global_path = global_root.path().join("config.toml");

        fs::write(
            &global_path,
            r#"
[server]
url = "http://global:9000"
user = "global-user"

[poll]
max_polls = 10
"#,
        )
        .expect("global config should write");

        fs::write(
            root.path().join(DEFAULT_CONFIG_FILE),
            r#"
[server]
url = "http://repo:9000"

[paths]
testdata = "fixtures"
"#,
        )
        .expect("repo config should write");

        fs::create_dir_all(root.path().join(".sonar-harness"))
            .expect("local harness dir should create");
        fs::write(
            root.path().join(DEFAULT_LOCAL_FILE),
            r#"
[poll]
interval_ms = 50
"#,
        )
        .expect("local override should write");

        let cfg = load_config_with_global(root.path(), Some(&global_path))
            .expect("load should succeed");

        assert_eq!(cfg.server.url, "http://repo:9000");
        assert_eq!(cfg.server.user, "global-user");
        assert_eq!(cfg.poll.max_polls, Some(10));
        assert_eq!(cfg.poll.interval_ms, 50);
        assert_eq!(cfg.paths.testdata, "fixtures");
    }

    #[test]
    fn load_config_reports_file_on_parse_error() {
        let root = TempDir::new().expect("root temp dir should be created");
        fs::write(root.path().join(DEFAULT_CONFIG_FILE), "[server\nurl = ")
            .expect("broken config should write");

        let err = load_config_with_global(root.path(), None).expect_err("parse should fail");
        assert!(err.to_string().contains(DEFAULT_CONFIG_FILE));
    }
}
