use std::{fmt, path::Path, str::FromStr};

use toml::{Table, Value};

use crate::config_store::ConfigError;

/// On-disk encodings understood by the loader and the exporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    #[allow(missing_docs)]
    Yaml,
    #[allow(missing_docs)]
    Json,
    #[allow(missing_docs)]
    Toml,
}

impl Format {
    /// Recognised file extensions in lookup order.
    pub const EXTENSIONS: [&'static str; 4] = ["yml", "yaml", "json", "toml"];

    /// Maps a file extension (without the dot, case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Format implied by the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension written by [`ConfigStore::save_as`](crate::config_store::ConfigStore::save_as).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Json => "JSON",
            Self::Toml => "TOML",
        }
    }

    /// Parses `content` into a table.
    ///
    /// Null values are dropped, non-string YAML keys are stringified and an
    /// empty YAML document is an empty table. `location` only labels errors.
    ///
    /// # Errors
    /// * `ConfigError::Decode` - If the payload is not valid for the format
    /// * `ConfigError::StructuralMerge` - If the root is not a mapping or a
    ///   key cannot be turned into a string
    pub fn decode(self, content: &str, location: &str) -> Result<Table, ConfigError> {
        let decode_error = |details: String| ConfigError::Decode {
            format: self.name(),
            location: location.to_string(),
            details,
        };

        let root = match self {
            Self::Toml => return toml::from_str::<Table>(content).map_err(|e| decode_error(e.to_string())),
            Self::Json => {
                let parsed: serde_json::Value =
                    serde_json::from_str(content).map_err(|e| decode_error(e.to_string()))?;
                from_json(parsed)
            }
            Self::Yaml => {
                let parsed: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| decode_error(e.to_string()))?;
                from_yaml(parsed).map_err(|details| ConfigError::StructuralMerge {
                    what: location.to_string(),
                    details,
                })?
            }
        };

        match root {
            None => Ok(Table::new()),
            Some(Value::Table(table)) => Ok(table),
            Some(other) => Err(ConfigError::StructuralMerge {
                what: location.to_string(),
                details: format!("expected a mapping at the root, found {}", other.type_str()),
            }),
        }
    }

    /// Encodes `table` with key order preserved.
    ///
    /// YAML and JSON have no datetime type, so TOML datetimes are written as
    /// strings there.
    ///
    /// # Errors
    /// Returns `ConfigError::Encode` if the serializer fails.
    pub fn encode(self, table: &Table) -> Result<String, ConfigError> {
        let encode_error = |details: String| ConfigError::Encode {
            format: self.name(),
            details,
        };

        match self {
            Self::Toml => toml::to_string_pretty(table).map_err(|e| encode_error(e.to_string())),
            Self::Json => serde_json::to_string_pretty(&table_to_json(table))
                .map_err(|e| encode_error(e.to_string())),
            Self::Yaml => {
                serde_yaml::to_string(&table_to_json(table)).map_err(|e| encode_error(e.to_string()))
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown format '{s}' (yaml, json, toml)"))
    }
}

fn from_json(value: serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;

    match value {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Boolean(b)),
        Json::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        Json::String(s) => Some(Value::String(s)),
        Json::Array(items) => Some(Value::Array(items.into_iter().filter_map(from_json).collect())),
        Json::Object(map) => Some(Value::Table(
            map.into_iter()
                .filter_map(|(k, v)| from_json(v).map(|v| (k, v)))
                .collect(),
        )),
    }
}

fn from_yaml(value: serde_yaml::Value) -> Result<Option<Value>, String> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => None,
        Yaml::Bool(b) => Some(Value::Boolean(b)),
        Yaml::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        Yaml::String(s) => Some(Value::String(s)),
        Yaml::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(v) = from_yaml(item)? {
                    out.push(v);
                }
            }
            Some(Value::Array(out))
        }
        Yaml::Mapping(map) => {
            let mut table = Table::new();
            for (k, v) in map {
                let key = yaml_key(k)?;
                if let Some(v) = from_yaml(v)? {
                    table.insert(key, v);
                }
            }
            Some(Value::Table(table))
        }
        Yaml::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(format!("unsupported mapping key {other:?}")),
    }
}

fn table_to_json(table: &Table) -> serde_json::Value {
    serde_json::Value::Object(
        table
            .iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect(),
    )
}

fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Integer(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Boolean(b) => Json::Bool(*b),
        Value::Datetime(dt) => Json::String(dt.to_string()),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Table(table) => table_to_json(table),
    }
}
