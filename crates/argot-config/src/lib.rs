//! Config file readers that flatten a document into dotted keys.
//!
//! Nested maps join their keys with `.`; arrays of scalars become
//! multi-valued entries. Nothing else about the document survives.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
    /// `KEY=VALUE` lines, `#` comments, optional quotes.
    Env,
}

impl Format {
    /// Pick a reader from the file extension; unknown extensions read as `KEY=VALUE`.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "toml" => Self::Toml,
            _ => Self::Env,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Env => "env",
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file: {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {format} config file: {}", path.display())]
    Parse {
        format: Format,
        path: PathBuf,
        message: String,
    },
}

/// The flattened key space of one config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatConfig {
    pub scalars: IndexMap<String, String>,
    pub multi: IndexMap<String, Vec<String>>,
}

impl FlatConfig {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.multi.is_empty()
    }
}

/// Read and flatten the config file at `path`.
pub fn read(path: impl AsRef<Path>) -> Result<FlatConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let format = Format::from_path(path);
    let flat = parse(format, &text).map_err(|message| ConfigError::Parse {
        format,
        path: path.to_path_buf(),
        message,
    })?;
    tracing::debug!(
        path = %path.display(),
        %format,
        scalars = flat.scalars.len(),
        multi = flat.multi.len(),
        "read config file"
    );
    Ok(flat)
}

/// Flatten config text in the given format.
pub fn parse(format: Format, text: &str) -> Result<FlatConfig, String> {
    let root = match format {
        Format::Json => from_json(text)?,
        Format::Yaml => from_yaml(text)?,
        Format::Toml => from_toml(text)?,
        Format::Env => return from_env(text),
    };
    let mut out = FlatConfig::default();
    flatten("", root, &mut out);
    Ok(out)
}

enum Node {
    Scalar(String),
    List(Vec<Node>),
    Map(Vec<(String, Node)>),
}

fn flatten(prefix: &str, entries: Vec<(String, Node)>, out: &mut FlatConfig) {
    for (key, node) in entries {
        let full = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match node {
            Node::Scalar(v) => {
                out.scalars.insert(full, v);
            }
            Node::Map(children) => flatten(&full, children, out),
            Node::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Node::Scalar(v) => values.push(v),
                        // Arrays holding maps or arrays have no flag mapping.
                        _ => {
                            values.clear();
                            break;
                        }
                    }
                }
                if !values.is_empty() {
                    out.multi.insert(full, values);
                }
            }
        }
    }
}

fn from_json(text: &str) -> Result<Vec<(String, Node)>, String> {
    fn node(v: serde_json::Value) -> Node {
        use serde_json::Value;
        match v {
            Value::Null => Node::Scalar(String::new()),
            Value::Bool(b) => Node::Scalar(b.to_string()),
            Value::Number(n) => Node::Scalar(n.to_string()),
            Value::String(s) => Node::Scalar(s),
            Value::Array(items) => Node::List(items.into_iter().map(node).collect()),
            Value::Object(map) => Node::Map(map.into_iter().map(|(k, v)| (k, node(v))).collect()),
        }
    }

    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    match node(value) {
        Node::Map(entries) => Ok(entries),
        _ => Err("top-level value must be an object".to_string()),
    }
}

fn from_yaml(text: &str) -> Result<Vec<(String, Node)>, String> {
    use serde_yaml::Value;

    fn key(v: &Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn node(v: Value) -> Node {
        match v {
            Value::Null => Node::Scalar(String::new()),
            Value::Bool(b) => Node::Scalar(b.to_string()),
            Value::Number(n) => Node::Scalar(n.to_string()),
            Value::String(s) => Node::Scalar(s),
            Value::Sequence(items) => Node::List(items.into_iter().map(node).collect()),
            Value::Mapping(map) => Node::Map(
                map.into_iter()
                    .filter_map(|(k, v)| key(&k).map(|k| (k, node(v))))
                    .collect(),
            ),
            Value::Tagged(tagged) => node(tagged.value),
        }
    }

    let value: Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    match node(value) {
        Node::Map(entries) => Ok(entries),
        // An empty document.
        Node::Scalar(s) if s.is_empty() => Ok(Vec::new()),
        _ => Err("top-level value must be a mapping".to_string()),
    }
}

fn from_toml(text: &str) -> Result<Vec<(String, Node)>, String> {
    fn node(v: toml::Value) -> Node {
        use toml::Value;
        match v {
            Value::String(s) => Node::Scalar(s),
            Value::Integer(i) => Node::Scalar(i.to_string()),
            Value::Float(f) => Node::Scalar(f.to_string()),
            Value::Boolean(b) => Node::Scalar(b.to_string()),
            Value::Datetime(d) => Node::Scalar(d.to_string()),
            Value::Array(items) => Node::List(items.into_iter().map(node).collect()),
            Value::Table(table) => {
                Node::Map(table.into_iter().map(|(k, v)| (k, node(v))).collect())
            }
        }
    }

    let table: toml::Table = toml::from_str(text).map_err(|e| e.to_string())?;
    Ok(table.into_iter().map(|(k, v)| (k, node(v))).collect())
}

fn from_env(text: &str) -> Result<FlatConfig, String> {
    let mut out = FlatConfig::default();
    for item in dotenvy::from_read_iter(text.as_bytes()) {
        let (key, value) = item.map_err(|e| e.to_string())?;
        out.scalars.insert(key, value);
    }
    Ok(out)
}
