use std::{fmt, time::Duration};

use toml::Value;

use super::{Action, dedup::add_unique_all};
use crate::config_store::{FromValue, format_duration, parse_bool, parse_duration};

/// Arena index of a [`Command`] inside a [`CommandTree`](super::CommandTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

/// Arena index of a [`Flag`] inside a [`CommandTree`](super::CommandTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagId(pub(crate) usize);

impl CommandId {
    /// Position in the command arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl FlagId {
    /// Position in the flag arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Names a node answers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Titles {
    /// Single-token short name (`v`, `sh`), if any.
    pub short: Option<String>,
    /// Canonical name; also the node's segment in config keys.
    pub full: String,
    /// Extra names, deduplicated by value.
    pub aliases: Vec<String>,
}

impl Titles {
    /// Every name in lookup order: full, short, then aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.full.as_str())
            .chain(self.short.as_deref())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|name| !name.is_empty())
    }

    /// True when `name` is one of this node's names.
    pub fn answers_to(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    pub(crate) fn add_aliases<'a>(&mut self, aliases: impl IntoIterator<Item = &'a str>) {
        add_unique_all(
            &mut self.aliases,
            aliases.into_iter().filter(|a| !a.is_empty()).map(str::to_string),
        );
    }
}

impl fmt::Display for Titles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.short {
            Some(short) if !self.full.is_empty() => write!(f, "{}, {}", short, self.full),
            Some(short) => f.write_str(short),
            None => f.write_str(&self.full),
        }
    }
}

/// Descriptive metadata shared by commands and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    #[allow(missing_docs)]
    pub description: String,
    #[allow(missing_docs)]
    pub long_description: String,
    #[allow(missing_docs)]
    pub examples: String,
    /// Help group the node is listed under.
    pub group: String,
    /// Hidden nodes still resolve but are left out of listings.
    pub hidden: bool,
}

/// A command or sub-command.
#[derive(Debug, Clone, Default)]
pub struct Command {
    #[allow(missing_docs)]
    pub titles: Titles,
    #[allow(missing_docs)]
    pub meta: Meta,
    pub(crate) parent: Option<CommandId>,
    pub(crate) children: Vec<CommandId>,
    pub(crate) flags: Vec<FlagId>,
    /// Callback run by [`AppService::invoke`](crate::app::AppService::invoke).
    pub action: Option<Action>,
}

impl Command {
    /// The command this one is attached under.
    pub fn parent(&self) -> Option<CommandId> {
        self.parent
    }

    /// Attached sub-commands in attachment order.
    pub fn children(&self) -> &[CommandId] {
        &self.children
    }

    /// Attached flags in attachment order.
    pub fn flags(&self) -> &[FlagId] {
        &self.flags
    }
}

/// A typed flag value; the variant is the flag's declared type.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum FlagValue {
    Bool(bool),
    String(String),
    StringSlice(Vec<String>),
    Int(i64),
    IntSlice(Vec<i64>),
    Uint(u64),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Duration(Duration),
}

impl FlagValue {
    /// Type name used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::StringSlice(_) => "string slice",
            Self::Int(_) => "int",
            Self::IntSlice(_) => "int slice",
            Self::Uint(_) => "uint",
            Self::Int64(_) => "int64",
            Self::Uint64(_) => "uint64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Duration(_) => "duration",
        }
    }

    /// The value as stored in the configuration tree.
    ///
    /// Unsigned values above `i64::MAX` saturate and durations are written
    /// in their compact text form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Boolean(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::StringSlice(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            Self::Int(i) | Self::Int64(i) => Value::Integer(*i),
            Self::IntSlice(items) => Value::Array(items.iter().copied().map(Value::Integer).collect()),
            Self::Uint(u) | Self::Uint64(u) => Value::Integer(i64::try_from(*u).unwrap_or(i64::MAX)),
            Self::Float32(f) => Value::Float(f64::from(*f)),
            Self::Float64(f) => Value::Float(*f),
            Self::Duration(d) => Value::String(format_duration(*d)),
        }
    }

    /// Parses `raw` as a value of the same type as `self`.
    ///
    /// Slices accept comma separated text. Returns `None` when `raw` does not
    /// fit the type.
    pub fn parse_like(&self, raw: &str) -> Option<Self> {
        let text = Value::String(raw.trim().to_string());

        Some(match self {
            Self::Bool(_) => Self::Bool(parse_bool(raw)?),
            Self::String(_) => Self::String(raw.to_string()),
            Self::StringSlice(_) => Self::StringSlice(split_list(raw).map(str::to_string).collect()),
            Self::Int(_) => Self::Int(i64::from_value(&text)?),
            Self::IntSlice(_) => Self::IntSlice(
                split_list(raw)
                    .map(|part| i64::from_value(&Value::String(part.to_string())))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Self::Uint(_) => Self::Uint(u64::from_value(&text)?),
            Self::Int64(_) => Self::Int64(i64::from_value(&text)?),
            Self::Uint64(_) => Self::Uint64(u64::from_value(&text)?),
            Self::Float32(_) => Self::Float32(f32::from_value(&text)?),
            Self::Float64(_) => Self::Float64(f64::from_value(&text)?),
            Self::Duration(_) => Self::Duration(parse_duration(raw)?),
        })
    }

    /// Text form compared against a flag's valid values.
    pub fn display_value(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.clone(),
            Self::StringSlice(items) => items.join(","),
            Self::Int(i) | Self::Int64(i) => i.to_string(),
            Self::IntSlice(items) => items.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
            Self::Uint(u) | Self::Uint64(u) => u.to_string(),
            Self::Float32(f) => f.to_string(),
            Self::Float64(f) => f.to_string(),
            Self::Duration(d) => format_duration(*d),
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|part| !part.is_empty())
}

/// A flag, attached to at most one command.
#[derive(Debug, Clone)]
pub struct Flag {
    #[allow(missing_docs)]
    pub titles: Titles,
    #[allow(missing_docs)]
    pub meta: Meta,
    /// Default value; also fixes the flag's type.
    pub default: FlagValue,
    /// Enumerated valid values; empty means unrestricted.
    pub valid_args: Vec<String>,
    /// Environment variables read for this flag, first set one wins.
    pub env_vars: Vec<String>,
    /// Marked as required in help output.
    pub required: bool,
    pub(crate) owner: Option<CommandId>,
}

impl Flag {
    /// A detached flag with no names yet.
    pub fn new(default: FlagValue) -> Self {
        Self {
            titles: Titles::default(),
            meta: Meta::default(),
            default,
            valid_args: Vec::new(),
            env_vars: Vec::new(),
            required: false,
            owner: None,
        }
    }

    /// The command this flag is attached to.
    pub fn owner(&self) -> Option<CommandId> {
        self.owner
    }

    /// True when `value` is allowed by [`Flag::valid_args`].
    pub fn accepts(&self, value: &FlagValue) -> bool {
        self.valid_args.is_empty() || self.valid_args.contains(&value.display_value())
    }
}

/// Application identity carried by the root command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootMeta {
    #[allow(missing_docs)]
    pub app_name: String,
    #[allow(missing_docs)]
    pub version: String,
    /// Banner printed above help output.
    pub header: String,
    #[allow(missing_docs)]
    pub copyright: String,
    #[allow(missing_docs)]
    pub author: String,
}
