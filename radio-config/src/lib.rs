//! Configuration management for the radio engine.
//!
//! Loads an embedded default YAML, merges it with an optional external
//! `config.yaml`, then applies environment variable overrides under the
//! `RADIO_CONFIG__` prefix. The result is exposed as a process-wide
//! singleton via [`get_config`], plus typed getters/setters for the values
//! the engine actually reads.
//!
//! ```no_run
//! use radio_config::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("radio.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load radio engine configuration"));
}

const ENV_CONFIG_DIR: &str = "RADIO_CONFIG_DIR";
const ENV_PREFIX: &str = "RADIO_CONFIG__";

const DEFAULT_HTTP_PORT: u16 = 5000;
const DEFAULT_MIN_QUEUE_SIZE: usize = 2;
const DEFAULT_MAX_CACHE_BYTES: u64 = 1024 * 1024 * 1024;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Configuration manager for the radio engine.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(".radio-engine").exists() {
            return ".radio-engine".to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(".radio-engine");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".radio-engine".to_string()
    }

    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("configured path is not a directory"));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;
        fs::read_dir(path)?;

        Ok(())
    }

    /// Resolves the config directory, in order: explicit argument,
    /// `RADIO_CONFIG_DIR` env var, `./.radio-engine`, `~/.radio-engine`.
    /// Creates it if missing.
    pub fn config_dir(directory: &str) -> String {
        let dir_path = Self::find_config_dir(directory);
        let path = Path::new(&dir_path);

        Self::validate_config_dir(path).expect("could not validate config directory");

        dir_path
    }

    /// Loads configuration from `directory` (empty string to auto-resolve),
    /// merging the embedded default with `config.yaml` and env overrides.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using embedded default");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = Self::lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value.clone())?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key.clone());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("config node at this path is not a map"))
        }
    }

    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();
                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("path {} is not a config node", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<String> {
        let path = Path::new(dir_path);

        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(path)
        };

        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory = %absolute_path.display(), "Created managed directory");
        }

        Ok(absolute_path.to_string_lossy().to_string())
    }

    /// Fetches a directory path from config, resolving it relative to the
    /// config directory and creating it on disk if missing.
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<String> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) => s,
            _ => {
                self.set_managed_dir(path, default.to_string())?;
                default.to_string()
            }
        };
        self.resolve_and_create_dir(&dir_path)
    }

    pub fn set_managed_dir(&self, path: &[&str], directory: String) -> Result<()> {
        self.set_value(path, Value::String(directory))
    }

    pub fn get_base_url(&self) -> String {
        match self.get_value(&["host", "base_url"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => format!("http://0.0.0.0:{}", self.get_http_port()),
        }
    }

    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap() as u16,
            Ok(Value::String(s)) => s.parse::<u16>().unwrap_or(DEFAULT_HTTP_PORT),
            _ => DEFAULT_HTTP_PORT,
        }
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => s,
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    pub fn get_min_queue_size(&self) -> usize {
        match self.get_value(&["playback", "min_queue_size"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as usize,
            Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap() as usize,
            _ => DEFAULT_MIN_QUEUE_SIZE,
        }
    }

    pub fn get_default_playlist_genre(&self) -> String {
        match self.get_value(&["playback", "default_playlist_genre"]) {
            Ok(Value::String(s)) => s,
            _ => "all".to_string(),
        }
    }

    pub fn get_max_cache_bytes(&self) -> u64 {
        match self.get_value(&["cache", "max_bytes"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap(),
            Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap() as u64,
            _ => DEFAULT_MAX_CACHE_BYTES,
        }
    }

    pub fn get_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["cache", "directory"], "cache")
    }

    pub fn get_fallback_dir(&self) -> Result<String> {
        self.get_managed_dir(&["media", "fallback_directory"], "media/fallback")
    }

    pub fn get_tracks_dir(&self) -> Result<String> {
        self.get_managed_dir(&["media", "tracks_directory"], "media/tracks")
    }

    /// Reads the full Icecast upstream configuration block.
    pub fn get_icecast_config(&self) -> IcecastConfig {
        let s = |path: &[&str], default: &str| match self.get_value(path) {
            Ok(Value::String(v)) => v,
            _ => default.to_string(),
        };
        let n = |path: &[&str], default: u32| match self.get_value(path) {
            Ok(Value::Number(v)) => v.as_u64().map(|v| v as u32).unwrap_or(default),
            _ => default,
        };
        let b = |path: &[&str], default: bool| match self.get_value(path) {
            Ok(Value::Bool(v)) => v,
            _ => default,
        };

        IcecastConfig {
            enabled: b(&["icecast", "enabled"], false),
            host: s(&["icecast", "host"], "localhost"),
            port: n(&["icecast", "port"], 8000) as u16,
            password: s(&["icecast", "password"], ""),
            mount: s(&["icecast", "mount"], "/radio.mp3"),
            name: s(&["icecast", "name"], "radio-engine"),
            description: s(&["icecast", "description"], "Live stream"),
            genre: s(&["icecast", "genre"], "Various"),
            bitrate: n(&["icecast", "bitrate"], 128),
            sample_rate: n(&["icecast", "sample_rate"], 44100),
            channels: n(&["icecast", "channels"], 2) as u8,
        }
    }
}

/// Icecast upstream connection parameters, read from configuration.
#[derive(Debug, Clone)]
pub struct IcecastConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub mount: String,
    pub name: String,
    pub description: String,
    pub genre: String,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u8,
}

/// Returns the global configuration singleton, lazily loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_yaml_keeps_default_keys_not_present_in_external() {
        let mut default: Value = serde_yaml::from_str("a: 1\nb: 2").unwrap();
        let external: Value = serde_yaml::from_str("b: 3").unwrap();
        merge_yaml(&mut default, &external);
        assert_eq!(default["a"], Value::Number(1.into()));
        assert_eq!(default["b"], Value::Number(3.into()));
    }

    #[test]
    fn lower_keys_value_normalizes_map_keys() {
        let value: Value = serde_yaml::from_str("Host:\n  HTTP_Port: 9000").unwrap();
        let lowered = Config::lower_keys_value(value);
        assert!(lowered["host"]["http_port"].is_number());
    }
}
