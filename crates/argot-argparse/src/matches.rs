//! Per-invocation parse results and typed retrieval.

use std::fmt;
use std::net::IpAddr;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::ParseError;
use crate::flag::{Flag, FlagSet, bare_name};
use crate::value::{self, IpNetwork, Millis, ValueKind};

/// Rewrites a flag key (`--some_name`) before it is looked up.
pub type KeyNormalizer = Rc<dyn Fn(&str) -> String>;

/// Conversion from recorded flag text into a typed value.
pub trait FromFlagValue: Sized {
    fn from_flag_value(raw: &str) -> Option<Self>;
}

impl FromFlagValue for String {
    fn from_flag_value(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl FromFlagValue for bool {
    fn from_flag_value(raw: &str) -> Option<Self> {
        value::parse_bool(raw)
    }
}

impl FromFlagValue for Millis {
    fn from_flag_value(raw: &str) -> Option<Self> {
        value::parse_duration(raw)
    }
}

impl FromFlagValue for IpAddr {
    fn from_flag_value(raw: &str) -> Option<Self> {
        value::parse_ip(raw)
    }
}

impl FromFlagValue for IpNetwork {
    fn from_flag_value(raw: &str) -> Option<Self> {
        value::parse_cidr(raw)
    }
}

macro_rules! from_flag_value {
    ($($ty:ty => $parse:path),* $(,)?) => {
        $(impl FromFlagValue for $ty {
            fn from_flag_value(raw: &str) -> Option<Self> {
                $parse(raw)
            }
        })*
    };
}

from_flag_value! {
    i32 => value::parse_i32,
    i64 => value::parse_i64,
    u32 => value::parse_u32,
    u64 => value::parse_u64,
    f32 => value::parse_f32,
    f64 => value::parse_f64,
}

/// Flag values and positionals gathered for one invocation.
///
/// Values are stored as coerced text in occurrence order. Lookups go through
/// the CLI occurrences first, then external multi values, then the external
/// single value, then the declared default.
#[derive(Clone)]
pub struct Matches {
    flags: FlagSet,
    normalize_key: Option<KeyNormalizer>,
    values: IndexMap<String, Vec<String>>,
    external: IndexMap<String, String>,
    external_multi: IndexMap<String, Vec<String>>,
    positionals: Vec<String>,
    error: Option<ParseError>,
}

impl fmt::Debug for Matches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matches")
            .field("values", &self.values)
            .field("external", &self.external)
            .field("external_multi", &self.external_multi)
            .field("positionals", &self.positionals)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub(crate) name: String,
    pub(crate) kind: ValueKind,
    pub(crate) no_opt_default: Option<String>,
}

impl Matches {
    pub(crate) fn new(flags: FlagSet, normalize_key: Option<KeyNormalizer>) -> Self {
        Self {
            flags,
            normalize_key,
            values: IndexMap::new(),
            external: IndexMap::new(),
            external_multi: IndexMap::new(),
            positionals: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn record(&mut self, name: &str, value: String) {
        self.values.entry(name.to_string()).or_default().push(value);
    }

    pub(crate) fn push_positional(&mut self, value: &str) {
        self.positionals.push(value.to_string());
    }

    pub(crate) fn fail(&mut self, error: ParseError) {
        self.error = Some(error);
    }

    /// Resolve a command-line key (`--name`, `-n`) after key normalization.
    pub(crate) fn target(&self, key: &str) -> Option<Target> {
        let key = match &self.normalize_key {
            Some(normalize) => normalize(key),
            None => key.to_string(),
        };
        self.flags.lookup(&key).map(|f| Target {
            name: f.name().to_string(),
            kind: f.kind(),
            no_opt_default: f.no_opt_default_value().map(str::to_string),
        })
    }

    /// Resolve an accessor name (`name`, `--name` or `-n`) to a long name.
    fn resolve(&self, name: &str) -> Option<String> {
        let key = if name.starts_with('-') {
            name.to_string()
        } else {
            format!("--{name}")
        };
        self.target(&key)
            .map(|t| t.name)
            .or_else(|| self.flags.get(bare_name(name)).map(|f| f.name().to_string()))
    }

    pub fn ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    /// The flags this parse ran against, built-ins included.
    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.resolve(name).and_then(|n| self.flags.get(&n))
    }

    fn cli(&self, name: &str) -> Option<&[String]> {
        self.values
            .get(name)
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }

    fn multi(&self, name: &str) -> Option<&[String]> {
        self.external_multi
            .get(name)
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }

    /// Whether the flag was given on the command line.
    pub fn has_flag(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|n| self.cli(&n).is_some())
    }

    /// Whether the flag has a value from the command line or an external
    /// source. Defaults do not count; an empty external value does.
    pub fn has_value(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|n| {
            self.cli(&n).is_some() || self.multi(&n).is_some() || self.external.contains_key(&n)
        })
    }

    /// Number of command-line occurrences.
    pub fn occurrences(&self, name: &str) -> usize {
        self.resolve(name)
            .and_then(|n| self.values.get(&n).map(Vec::len))
            .unwrap_or(0)
    }

    /// Values from the command line or external sources, defaults excluded.
    pub fn explicit_values(&self, name: &str) -> Vec<String> {
        let Some(n) = self.resolve(name) else {
            return Vec::new();
        };
        if let Some(v) = self.cli(&n).or_else(|| self.multi(&n)) {
            return v.to_vec();
        }
        self.external.get(&n).cloned().into_iter().collect()
    }

    /// All values of the winning source, falling back to the default.
    pub fn values(&self, name: &str) -> Vec<String> {
        let explicit = self.explicit_values(name);
        if !explicit.is_empty() || self.has_value(name) {
            return explicit;
        }
        self.flag(name)
            .map(|f| vec![f.default_string()])
            .unwrap_or_default()
    }

    /// The single winning value as text.
    pub fn raw(&self, name: &str) -> Option<String> {
        let n = self.resolve(name)?;
        if let Some(last) = self.cli(&n).or_else(|| self.multi(&n)).and_then(<[String]>::last) {
            return Some(last.clone());
        }
        if let Some(v) = self.external.get(&n) {
            return Some(v.clone());
        }
        self.flags.get(&n).map(Flag::default_string)
    }

    /// The winning value converted to `T`.
    pub fn get<T: FromFlagValue>(&self, name: &str) -> Option<T> {
        self.raw(name).and_then(|raw| T::from_flag_value(&raw))
    }

    /// Sum of all occurrences of a count flag.
    pub fn count(&self, name: &str) -> i64 {
        let Some(n) = self.resolve(name) else {
            return 0;
        };
        if let Some(v) = self.cli(&n).or_else(|| self.multi(&n)) {
            return v.iter().filter_map(|s| value::parse_i64(s)).sum();
        }
        self.raw(&n).and_then(|s| value::parse_i64(&s)).unwrap_or(0)
    }

    /// One element per occurrence; an empty default yields no elements.
    pub fn array<T: FromFlagValue>(&self, name: &str) -> Vec<T> {
        let values = if self.has_value(name) {
            self.explicit_values(name)
        } else {
            self.values(name).into_iter().filter(|v| !v.is_empty()).collect()
        };
        values.iter().filter_map(|v| T::from_flag_value(v)).collect()
    }

    /// Every occurrence split on `sep`, empty pieces dropped.
    pub fn slice<T: FromFlagValue>(&self, name: &str, sep: char) -> Vec<T> {
        self.values(name)
            .iter()
            .flat_map(|v| v.split(sep))
            .filter(|part| !part.is_empty())
            .filter_map(T::from_flag_value)
            .collect()
    }

    /// `key=value` entries across all occurrences. Entries without the
    /// separator or with an empty key are skipped; later keys win.
    pub fn map<T: FromFlagValue>(
        &self,
        name: &str,
        entry_sep: char,
        kv_sep: char,
    ) -> IndexMap<String, T> {
        let mut out = IndexMap::new();
        for entry in self.slice::<String>(name, entry_sep) {
            let Some((key, val)) = entry.split_once(kv_sep) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            if let Some(v) = T::from_flag_value(val) {
                out.insert(key.to_string(), v);
            }
        }
        out
    }

    fn check_external(&self, name: &str, raw: &str) -> Result<String, ParseError> {
        let Some(flag) = self.flags.get(name) else {
            return Ok(raw.to_string());
        };
        let kind = flag.kind();
        value::coerce(kind, raw).map_err(|_| ParseError::InvalidValue {
            flag: flag.long(),
            value: raw.to_string(),
            kind,
        })
    }

    /// Install single external values, coercing each against its flag.
    ///
    /// Keys naming no declared flag are dropped.
    pub fn set_external_values(
        &mut self,
        values: IndexMap<String, String>,
    ) -> Result<(), ParseError> {
        let mut checked = IndexMap::with_capacity(values.len());
        for (key, raw) in values {
            let Some(name) = self.resolve(&key) else {
                tracing::trace!(key = %key, "dropping external value for undeclared flag");
                continue;
            };
            let v = self.check_external(&name, &raw)?;
            checked.insert(name, v);
        }
        self.external = checked;
        Ok(())
    }

    /// Install multi-valued external values, coercing each element.
    pub fn set_external_multi_values(
        &mut self,
        values: IndexMap<String, Vec<String>>,
    ) -> Result<(), ParseError> {
        let mut checked = IndexMap::with_capacity(values.len());
        for (key, raws) in values {
            let Some(name) = self.resolve(&key) else {
                tracing::trace!(key = %key, "dropping external values for undeclared flag");
                continue;
            };
            let v = raws
                .iter()
                .map(|raw| self.check_external(&name, raw))
                .collect::<Result<Vec<_>, _>>()?;
            checked.insert(name, v);
        }
        self.external_multi = checked;
        Ok(())
    }
}
