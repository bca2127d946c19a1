use std::error::Error;
use std::fs;
use std::io::ErrorKind;

use log::info;
use serde_json::Value;

use crate::modules::config::ConsoleConfig;
use crate::modules::i18n::TranslationBridge;
use crate::modules::schema::{FlagSchemas, SchemaRegistry};

pub fn load_config(path: &str) -> Result<ConsoleConfig, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let config: ConsoleConfig = toml::from_str(&text)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file means "all defaults".
pub fn load_config_or_default(path: &str) -> Result<ConsoleConfig, Box<dyn Error>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no config at {path}, using defaults");
            Ok(ConsoleConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn save_config(path: &str, config: &ConsoleConfig) -> Result<(), Box<dyn Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    fs::write(path, toml_str)?;
    Ok(())
}

pub fn load_schemas(path: &str) -> Result<FlagSchemas, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let file: FlagSchemas = toml::from_str(&text)?;
    Ok(file)
}

pub fn load_translations(path: &str) -> Result<Value, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let table: Value = serde_json::from_str(&text)?;
    Ok(table)
}

/// Built-in schemas with the configured overrides applied.
pub fn schema_registry(config: &ConsoleConfig) -> Result<SchemaRegistry, Box<dyn Error>> {
    match &config.schemas_file {
        Some(path) => Ok(SchemaRegistry::with_overrides(load_schemas(path)?)),
        None => Ok(SchemaRegistry::default()),
    }
}

/// English unless the config names a language and its translation file.
pub fn translation_bridge(config: &ConsoleConfig) -> Result<TranslationBridge, Box<dyn Error>> {
    match &config.translations_file {
        Some(path) => Ok(TranslationBridge::new(
            config.language.clone(),
            load_translations(path)?,
        )),
        None => Ok(TranslationBridge::english()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::types::Source;
    use std::path::PathBuf;

    fn scratch(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("crawler-console-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let path = scratch(
            "partial.toml",
            "base_url = \"http://admin.internal:8080\"\n[timings]\npoll_interval_ms = 1000\n",
        );
        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.base_url, "http://admin.internal:8080");
        assert_eq!(config.timings.poll_interval_ms, 1000);
        assert_eq!(config.timings.search_debounce_ms, 300);
        assert_eq!(config.http.retries, 2);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config_or_default("/nonexistent/console.toml").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert!(load_config("/nonexistent/console.toml").is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let path = std::env::temp_dir().join(format!("crawler-console-{}-saved.toml", std::process::id()));
        let path = path.to_str().unwrap();
        let mut config = ConsoleConfig::default();
        config.session_cookie = Some("oj_admin_session=abc".to_string());
        save_config(path, &config).unwrap();
        assert_eq!(load_config(path).unwrap(), config);
    }

    #[test]
    fn schema_file_overrides_one_source() {
        let path = scratch(
            "schemas.toml",
            r#"
[[schema]]
source = "luogu"

[[schema.flags]]
flag = "--only-new"
help = "Skip known problems"
kind = "checkbox"
"#,
        );
        let config = ConsoleConfig {
            schemas_file: Some(path.to_str().unwrap().to_string()),
            ..ConsoleConfig::default()
        };
        let registry = schema_registry(&config).unwrap();
        assert_eq!(registry.get(Source::Luogu).flags[0].flag, "--only-new");
        assert_eq!(registry.get(Source::Leetcode).flags[0].flag, "--init");
    }

    #[test]
    fn translation_file_replaces_english() {
        let path = scratch("zh.json", r#"{"problems": {"deleted": "已刪除"}}"#);
        let config = ConsoleConfig {
            language: "zh-TW".to_string(),
            translations_file: Some(path.to_str().unwrap().to_string()),
            ..ConsoleConfig::default()
        };
        let i18n = translation_bridge(&config).unwrap();
        assert_eq!(i18n.language(), "zh-TW");
        assert_eq!(i18n.t("problems.deleted"), "已刪除");
    }
}
