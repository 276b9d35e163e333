//! Token parser: turns an argument vector into [`Matches`].

use std::fmt;

use crate::error::ParseError;
use crate::flag::FlagSet;
use crate::matches::{KeyNormalizer, Matches, Target};
use crate::suggest::suggest;
use crate::value::{self, ValueKind};

/// Switches that change how tokens are read.
#[derive(Clone)]
pub struct ParserOptions {
    /// Ignore unknown flags instead of failing.
    pub allow_unknown_flags: bool,
    /// Read `-abc` as `-a -b -c`.
    pub short_flag_grouping: bool,
    /// Read `--no-name` as `--name=false` for boolean flags.
    pub bool_negation: bool,
    /// Attach "did you mean" suggestions to unknown-flag errors.
    pub suggestions: bool,
    pub suggestions_minimum_distance: usize,
    /// Treat every token as positional.
    pub disable_flag_parsing: bool,
    pub normalize_key: Option<KeyNormalizer>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            allow_unknown_flags: false,
            short_flag_grouping: true,
            bool_negation: true,
            suggestions: true,
            suggestions_minimum_distance: 2,
            disable_flag_parsing: false,
            normalize_key: None,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("allow_unknown_flags", &self.allow_unknown_flags)
            .field("short_flag_grouping", &self.short_flag_grouping)
            .field("bool_negation", &self.bool_negation)
            .field("suggestions", &self.suggestions)
            .field("suggestions_minimum_distance", &self.suggestions_minimum_distance)
            .field("disable_flag_parsing", &self.disable_flag_parsing)
            .field("normalize_key", &self.normalize_key.is_some())
            .finish()
    }
}

/// Whether a token is shaped like a flag: a dash followed by something.
pub fn is_flag_token(token: &str) -> bool {
    token.len() >= 2 && token.starts_with('-')
}

/// `-abc`: a single dash, two or more characters, no `=`.
pub fn is_short_group(token: &str) -> bool {
    token.len() >= 3
        && token.starts_with('-')
        && !token.starts_with("--")
        && !token.contains('=')
}

fn is_signed_digits(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse `args` against `flags` (plus the built-in help and version flags).
///
/// Parsing stops at the first error; whatever was recorded up to that point
/// stays in the returned [`Matches`] and [`Matches::ok`] turns false.
pub fn parse<S: AsRef<str>>(args: &[S], flags: &FlagSet, options: &ParserOptions) -> Matches {
    let mut matches = Matches::new(flags.with_builtins(), options.normalize_key.clone());
    if options.disable_flag_parsing {
        for arg in args {
            matches.push_positional(arg.as_ref());
        }
        return matches;
    }

    let mut parser = Parser {
        args,
        pos: 0,
        options,
        matches: &mut matches,
    };
    if let Err(err) = parser.run() {
        tracing::debug!(error = %err, "argument parsing failed");
        matches.fail(err);
    }
    matches
}

struct Parser<'a, S> {
    args: &'a [S],
    pos: usize,
    options: &'a ParserOptions,
    matches: &'a mut Matches,
}

impl<S: AsRef<str>> Parser<'_, S> {
    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(AsRef::as_ref)
    }

    fn run(&mut self) -> Result<(), ParseError> {
        let mut positional_only = false;
        while let Some(arg) = self.args.get(self.pos).map(|a| a.as_ref().to_string()) {
            self.pos += 1;

            if !positional_only && arg == "--" {
                positional_only = true;
                continue;
            }
            if positional_only || !is_flag_token(&arg) {
                self.matches.push_positional(&arg);
                continue;
            }

            if self.options.bool_negation {
                if let Some(base) = arg.strip_prefix("--no-") {
                    if let Some(target) = self.matches.target(&format!("--{base}")) {
                        if target.kind == ValueKind::Bool {
                            self.matches.record(&target.name, "false".to_string());
                            continue;
                        }
                    }
                }
            }

            if let Some((key, raw)) = arg.split_once('=') {
                match self.matches.target(key) {
                    Some(target) => self.record(&target, raw)?,
                    None if self.options.allow_unknown_flags => {}
                    None => return Err(self.unknown_flag(key)),
                }
                continue;
            }

            if self.options.short_flag_grouping && is_short_group(&arg) {
                self.short_group(&arg)?;
                continue;
            }

            let Some(target) = self.matches.target(&arg) else {
                if !self.options.allow_unknown_flags {
                    return Err(self.unknown_flag(&arg));
                }
                self.skip_unknown_value();
                continue;
            };

            let raw = match target.kind {
                ValueKind::Bool => match self.peek() {
                    Some(next) if value::is_bool_literal(next) => {
                        let next = next.to_string();
                        self.pos += 1;
                        next
                    }
                    _ => "true".to_string(),
                },
                ValueKind::Count => "1".to_string(),
                _ => self.take_value(&target, &arg)?,
            };
            self.record(&target, &raw)?;
        }
        Ok(())
    }

    /// Expand `-abc`. Only the final flag of the group may take the next
    /// token as its value. A value flag earlier in the group takes the rest
    /// of the token, so later letters are never read as flags.
    fn short_group(&mut self, group: &str) -> Result<(), ParseError> {
        for (offset, c) in group.char_indices().skip(1) {
            let key = format!("-{c}");
            let remainder = &group[offset + c.len_utf8()..];

            let Some(target) = self.matches.target(&key) else {
                if !self.options.allow_unknown_flags {
                    return Err(self.unknown_flag(&key));
                }
                if remainder.is_empty() {
                    self.skip_unknown_value();
                }
                continue;
            };

            match target.kind {
                ValueKind::Bool => self.matches.record(&target.name, "true".to_string()),
                ValueKind::Count => {
                    if is_signed_digits(remainder) {
                        return self.record(&target, remainder);
                    }
                    self.matches.record(&target.name, "1".to_string());
                }
                _ => {
                    let raw = if remainder.is_empty() {
                        self.take_value(&target, &key)?
                    } else {
                        remainder.to_string()
                    };
                    return self.record(&target, &raw);
                }
            }
        }
        Ok(())
    }

    /// The value for a flag that needs one: the next token, or the no-value
    /// default when the next token is another flag or there is none.
    fn take_value(&mut self, target: &Target, key: &str) -> Result<String, ParseError> {
        match (self.peek(), target.no_opt_default.as_deref()) {
            (Some(next), Some(fallback)) if is_flag_token(next) => Ok(fallback.to_string()),
            (Some(next), _) => {
                let next = next.to_string();
                self.pos += 1;
                Ok(next)
            }
            (None, Some(fallback)) => Ok(fallback.to_string()),
            (None, None) => Err(ParseError::MissingValue {
                flag: key.to_string(),
            }),
        }
    }

    fn skip_unknown_value(&mut self) {
        if self.peek().is_some_and(|next| !is_flag_token(next)) {
            self.pos += 1;
        }
    }

    fn record(&mut self, target: &Target, raw: &str) -> Result<(), ParseError> {
        let canonical = value::coerce(target.kind, raw).map_err(|_| ParseError::InvalidValue {
            flag: format!("--{}", target.name),
            value: raw.to_string(),
            kind: target.kind,
        })?;
        self.matches.record(&target.name, canonical);
        Ok(())
    }

    fn unknown_flag(&self, key: &str) -> ParseError {
        let suggestions = if self.options.suggestions {
            suggest(
                key,
                &self.matches.flags().known_keys(),
                self.options.suggestions_minimum_distance,
            )
        } else {
            Vec::new()
        };
        ParseError::UnknownFlag {
            flag: key.to_string(),
            suggestions,
        }
    }
}
