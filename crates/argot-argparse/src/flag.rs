//! Flag declarations and the ordered catalog they live in.

use std::fmt;

use indexmap::IndexMap;

use crate::value::{Millis, ValueKind};

pub const HELP_FLAG: &str = "help";
pub const VERSION_FLAG: &str = "version";

/// Annotation keys that narrow a flag's kind.
pub mod annotations {
    pub const COUNT: &str = "count";
    pub const BYTES: &str = "bytes";
    pub const IP: &str = "ip";
    pub const IP_MASK: &str = "ipmask";
    pub const CIDR: &str = "cidr";
    pub const IP_NET: &str = "ipnet";
    pub const URL: &str = "url";
    /// Comma-separated extensions offered when completing the flag's value.
    pub const FILENAME_EXT: &str = "filename_ext";
    pub const DIRNAME: &str = "dirname";
}

fn is_truthy(v: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|t| v.eq_ignore_ascii_case(t))
}

/// Add a `--` prefix if `raw` has no leading dash.
pub fn normalize_long(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        trimmed.to_string()
    } else {
        format!("--{trimmed}")
    }
}

/// Strip leading dashes: `--name` and `name` both become `name`.
pub fn bare_name(raw: &str) -> &str {
    raw.trim().trim_start_matches('-')
}

/// A flag's typed default. Its variant fixes the flag's base kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Duration(Millis),
    String(String),
}

impl DefaultValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Uint32(_) => ValueKind::Uint32,
            Self::Uint64(_) => ValueKind::Uint64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Duration(_) => ValueKind::Duration,
            Self::String(_) => ValueKind::String,
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Uint32(v) => write!(f, "{v}"),
            Self::Uint64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Duration(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

macro_rules! default_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for DefaultValue {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        })*
    };
}

default_from! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    Millis => Duration,
    String => String,
}

impl From<&str> for DefaultValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// A declared flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    name: String,
    short: Option<char>,
    description: String,
    default: DefaultValue,
    var_name: Option<String>,
    required: bool,
    hidden: bool,
    deprecated: Option<String>,
    no_opt_default: Option<String>,
    annotations: IndexMap<String, String>,
}

impl Flag {
    /// Declare a flag. `name` may be given with or without its `--` prefix.
    pub fn new(
        name: impl AsRef<str>,
        default: impl Into<DefaultValue>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: bare_name(name.as_ref()).to_string(),
            short: None,
            description: description.into(),
            default: default.into(),
            var_name: None,
            required: false,
            hidden: false,
            deprecated: None,
            no_opt_default: None,
            annotations: IndexMap::new(),
        }
    }

    pub fn bool(name: impl AsRef<str>, description: impl Into<String>) -> Self {
        Self::new(name, false, description)
    }

    pub fn string(
        name: impl AsRef<str>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::new(name, DefaultValue::String(default.into()), description)
    }

    /// A repeatable counter: `-vvv` counts three, `-v3` counts three.
    pub fn count(name: impl AsRef<str>, description: impl Into<String>) -> Self {
        Self::new(name, 0i32, description).annotate(annotations::COUNT, "true")
    }

    /// A byte size accepting unit suffixes such as `KiB` or `1.5G`.
    pub fn bytes(name: impl AsRef<str>, default: u64, description: impl Into<String>) -> Self {
        Self::new(name, default, description).annotate(annotations::BYTES, "true")
    }

    pub fn ip(
        name: impl AsRef<str>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::string(name, default, description).annotate(annotations::IP, "true")
    }

    pub fn ip_mask(
        name: impl AsRef<str>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::string(name, default, description).annotate(annotations::IP_MASK, "true")
    }

    pub fn cidr(
        name: impl AsRef<str>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::string(name, default, description).annotate(annotations::CIDR, "true")
    }

    pub fn ip_net(
        name: impl AsRef<str>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::string(name, default, description).annotate(annotations::IP_NET, "true")
    }

    pub fn url(
        name: impl AsRef<str>,
        default: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::string(name, default, description).annotate(annotations::URL, "true")
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Name used when mapping config keys onto this flag.
    pub fn var_name(mut self, var_name: impl Into<String>) -> Self {
        self.var_name = Some(var_name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    /// Value used when the flag appears bare, with no value following it.
    pub fn no_opt_default(mut self, value: impl Into<String>) -> Self {
        self.no_opt_default = Some(value.into());
        self
    }

    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn set_required(&mut self, required: bool) {
        self.required = required;
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn set_deprecated(&mut self, message: impl Into<String>) {
        self.deprecated = Some(message.into());
    }

    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    /// The long name without its `--` prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The long name as typed on the command line.
    pub fn long(&self) -> String {
        format!("--{}", self.name)
    }

    pub fn short_name(&self) -> Option<char> {
        self.short
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    pub fn default_string(&self) -> String {
        self.default.to_string()
    }

    pub fn variable_name(&self) -> Option<&str> {
        self.var_name.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecated.as_deref()
    }

    pub fn no_opt_default_value(&self) -> Option<&str> {
        self.no_opt_default.as_deref()
    }

    pub fn annotations(&self) -> &IndexMap<String, String> {
        &self.annotations
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    fn flagged(&self, key: &str) -> bool {
        self.annotation(key).is_some_and(is_truthy)
    }

    /// The effective kind: the default's kind, narrowed by annotations.
    pub fn kind(&self) -> ValueKind {
        let base = self.default.kind();
        match base {
            ValueKind::Int32 if self.flagged(annotations::COUNT) => ValueKind::Count,
            ValueKind::Uint64 if self.flagged(annotations::BYTES) => ValueKind::Bytes,
            ValueKind::String => [
                (annotations::IP, ValueKind::Ip),
                (annotations::IP_MASK, ValueKind::IpMask),
                (annotations::CIDR, ValueKind::Cidr),
                (annotations::IP_NET, ValueKind::IpNet),
                (annotations::URL, ValueKind::Url),
            ]
            .into_iter()
            .find(|(key, _)| self.flagged(key))
            .map_or(base, |(_, kind)| kind),
            _ => base,
        }
    }
}

/// An ordered collection of flags keyed by long name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSet {
    flags: IndexMap<String, Flag>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flag, replacing any earlier flag with the same long name.
    pub fn add(&mut self, flag: Flag) -> &mut Flag {
        let entry = self.flags.entry(flag.name.clone());
        match entry {
            indexmap::map::Entry::Occupied(mut o) => {
                o.insert(flag);
                o.into_mut()
            }
            indexmap::map::Entry::Vacant(v) => v.insert(flag),
        }
    }

    /// Insert every flag of `other` whose long name is not taken yet.
    pub fn extend_missing(&mut self, other: &FlagSet) {
        for flag in other.iter() {
            if !self.flags.contains_key(&flag.name) {
                self.flags.insert(flag.name.clone(), flag.clone());
            }
        }
    }

    /// Look up by long name, with or without the `--` prefix.
    pub fn get(&self, name: &str) -> Option<&Flag> {
        self.flags.get(bare_name(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Flag> {
        self.flags.get_mut(bare_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolve a command-line key (`--name` or `-n`) to its flag.
    pub fn lookup(&self, key: &str) -> Option<&Flag> {
        if let Some(long) = key.strip_prefix("--") {
            return self.flags.get(long);
        }
        let short = key.strip_prefix('-')?;
        let mut chars = short.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        self.flags.values().find(|f| f.short == Some(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// All spellings accepted on the command line, long names first.
    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.iter().map(Flag::long).collect();
        keys.extend(self.iter().filter_map(|f| f.short.map(|c| format!("-{c}"))));
        keys
    }

    /// This set plus the built-in `--help`/`-h` and `--version` flags.
    pub fn with_builtins(&self) -> FlagSet {
        let mut out = self.clone();
        if !out.contains(HELP_FLAG) {
            let mut help = Flag::bool(HELP_FLAG, "help for this command");
            if !out.iter().any(|f| f.short == Some('h')) {
                help = help.short('h');
            }
            out.add(help);
        }
        if !out.contains(VERSION_FLAG) {
            out.add(Flag::bool(VERSION_FLAG, "version for this command"));
        }
        out
    }
}

impl<'a> IntoIterator for &'a FlagSet {
    type Item = &'a Flag;
    type IntoIter = indexmap::map::Values<'a, String, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.values()
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        for flag in iter {
            set.add(flag);
        }
        set
    }
}
