//! Coercion of raw flag text into typed values.
//!
//! Every flag kind has a pure coercion function. [`coerce`] validates a raw
//! string against a kind and returns the canonical text that gets recorded;
//! the typed `parse_*` helpers are used again at retrieval time.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::CoerceError;

/// The value kind of a flag.
///
/// The first nine kinds mirror the type of a flag's default value. The rest
/// are specialized kinds selected through flag annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Duration,
    String,
    Count,
    Bytes,
    Ip,
    IpMask,
    Cidr,
    IpNet,
    Url,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Duration => "duration",
            Self::String => "string",
            Self::Count => "count",
            Self::Bytes => "bytes",
            Self::Ip => "ip",
            Self::IpMask => "ipMask",
            Self::Cidr => "cidr",
            Self::IpNet => "ipNet",
            Self::Url => "url",
        }
    }

    /// Whether a lone occurrence of the flag never consumes the next token as
    /// its value.
    pub fn is_bool_like(self) -> bool {
        matches!(self, Self::Bool | Self::Count)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate `raw` against `kind` and return the text to record.
///
/// Booleans, byte sizes and the network/URL kinds are canonicalized. Numeric
/// and duration kinds keep the literal as written; retrieval re-reads it.
pub fn coerce(kind: ValueKind, raw: &str) -> Result<String, CoerceError> {
    let canonical = match kind {
        ValueKind::Bool => parse_bool(raw).map(|b| b.to_string()),
        ValueKind::Int32 | ValueKind::Count => parse_i32(raw).map(|_| raw.to_string()),
        ValueKind::Int64 => parse_i64(raw).map(|_| raw.to_string()),
        ValueKind::Uint32 => parse_u32(raw).map(|_| raw.to_string()),
        ValueKind::Uint64 => parse_u64(raw).map(|_| raw.to_string()),
        ValueKind::Float32 => parse_f32(raw).map(|_| raw.to_string()),
        ValueKind::Float64 => parse_f64(raw).map(|_| raw.to_string()),
        ValueKind::Duration => parse_duration(raw).map(|_| raw.to_string()),
        ValueKind::String => Some(raw.to_string()),
        ValueKind::Bytes => parse_bytes(raw).map(|n| n.to_string()),
        ValueKind::Ip => parse_ip(raw).map(format_ip),
        ValueKind::IpMask => canonical_ip_mask(raw),
        ValueKind::Cidr | ValueKind::IpNet => parse_cidr(raw).map(|net| net.to_string()),
        ValueKind::Url => canonical_url(raw),
    };
    canonical.ok_or_else(|| CoerceError {
        kind,
        value: raw.to_string(),
    })
}

const TRUE_LITERALS: [&str; 4] = ["1", "true", "on", "yes"];
const FALSE_LITERALS: [&str; 4] = ["0", "false", "off", "no"];

/// Parse a boolean literal, ignoring case and surrounding whitespace.
pub fn parse_bool(raw: &str) -> Option<bool> {
    let t = raw.trim();
    if TRUE_LITERALS.iter().any(|l| t.eq_ignore_ascii_case(l)) {
        Some(true)
    } else if FALSE_LITERALS.iter().any(|l| t.eq_ignore_ascii_case(l)) {
        Some(false)
    } else {
        None
    }
}

/// Whether a token, taken verbatim, is a boolean literal.
///
/// A lone boolean flag consumes the following token only when this holds.
pub fn is_bool_literal(token: &str) -> bool {
    TRUE_LITERALS
        .iter()
        .chain(FALSE_LITERALS.iter())
        .any(|l| token.eq_ignore_ascii_case(l))
}

fn split_radix(digits: &str) -> (u32, &str) {
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    }
}

fn parse_magnitude(digits: &str) -> Option<u128> {
    let (radix, body) = split_radix(digits);
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u128::from_str_radix(body, radix).ok()
}

fn parse_signed(raw: &str) -> Option<i128> {
    let t = raw.trim();
    let (negative, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let magnitude = i128::try_from(parse_magnitude(digits)?).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_unsigned(raw: &str) -> Option<u128> {
    let t = raw.trim();
    if t.starts_with('-') {
        return None;
    }
    parse_magnitude(t.strip_prefix('+').unwrap_or(t))
}

/// Parse a signed 32-bit integer; `0x` and leading-`0` prefixes select hex and octal.
pub fn parse_i32(raw: &str) -> Option<i32> {
    parse_signed(raw).and_then(|v| i32::try_from(v).ok())
}

pub fn parse_i64(raw: &str) -> Option<i64> {
    parse_signed(raw).and_then(|v| i64::try_from(v).ok())
}

pub fn parse_u32(raw: &str) -> Option<u32> {
    parse_unsigned(raw).and_then(|v| u32::try_from(v).ok())
}

pub fn parse_u64(raw: &str) -> Option<u64> {
    parse_unsigned(raw).and_then(|v| u64::try_from(v).ok())
}

fn mentions_infinity(t: &str) -> bool {
    t.to_ascii_lowercase().contains("inf")
}

pub fn parse_f64(raw: &str) -> Option<f64> {
    let t = raw.trim();
    let v: f64 = t.parse().ok()?;
    // Overflowing literals parse to infinity; only spelled-out infinities are accepted.
    (!v.is_infinite() || mentions_infinity(t)).then_some(v)
}

pub fn parse_f32(raw: &str) -> Option<f32> {
    let t = raw.trim();
    let v: f32 = t.parse().ok()?;
    (!v.is_infinite() || mentions_infinity(t)).then_some(v)
}

/// A duration in whole milliseconds.
///
/// Renders as `<n>ms`, which parses back to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millis(pub i64);

impl Millis {
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Convert to a [`std::time::Duration`]; negative durations have no equivalent.
    pub fn to_std(self) -> Option<std::time::Duration> {
        u64::try_from(self.0)
            .ok()
            .map(std::time::Duration::from_millis)
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// `ms` must be tried before `m`.
const DURATION_UNITS: [(&str, f64); 7] = [
    ("ns", 0.000_001),
    ("us", 0.001),
    ("µs", 0.001),
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
];

fn duration_number_len(s: &str) -> usize {
    let mut seen_dot = false;
    s.bytes()
        .take_while(|&b| {
            if b == b'.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                b.is_ascii_digit()
            }
        })
        .count()
}

/// Parse a duration such as `1h30m`, `-1.5s` or `250ms` into milliseconds.
///
/// A bare `0` needs no unit. Results are rounded half away from zero.
pub fn parse_duration(raw: &str) -> Option<Millis> {
    let t = raw.trim();
    let (sign, mut rest) = match t.chars().next()? {
        '-' => (-1.0, &t[1..]),
        '+' => (1.0, &t[1..]),
        _ => (1.0, t),
    };
    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(Millis(0));
    }

    let mut total = 0.0f64;
    while !rest.is_empty() {
        let len = duration_number_len(rest);
        let number = &rest[..len];
        if !number.bytes().any(|b| b.is_ascii_digit()) {
            return None;
        }
        rest = &rest[len..];
        let (unit, scale) = DURATION_UNITS
            .iter()
            .find(|(unit, _)| rest.starts_with(unit))?;
        let value: f64 = number.parse().ok()?;
        total += value * scale;
        rest = &rest[unit.len()..];
    }

    total *= sign;
    if total > i64::MAX as f64 || total < i64::MIN as f64 {
        return None;
    }
    Some(Millis(total.round() as i64))
}

fn float_prefix_len(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'+')) {
        i += 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < b.len() && b[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        i = j;
    }
    if digits == 0 {
        return 0;
    }
    if i < b.len() && matches!(b[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < b.len() && matches!(b[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Parse a byte size: a plain integer (`4096`, `0x10`) or a number with a
/// binary unit (`1.5MiB`, `2g`, `512 KB`).
pub fn parse_bytes(raw: &str) -> Option<u64> {
    let t = raw.trim();
    if t.is_empty() || t.starts_with('-') {
        return None;
    }
    if let Some(n) = parse_u64(t) {
        return Some(n);
    }

    let len = float_prefix_len(t);
    if len == 0 {
        return None;
    }
    let value: f64 = t[..len].parse().ok()?;
    let power = match t[len..].trim().to_ascii_uppercase().as_str() {
        "" | "B" => 0,
        "K" | "KB" | "KI" | "KIB" => 1,
        "M" | "MB" | "MI" | "MIB" => 2,
        "G" | "GB" | "GI" | "GIB" => 3,
        "T" | "TB" | "TI" | "TIB" => 4,
        "P" | "PB" | "PI" | "PIB" => 5,
        "E" | "EB" | "EI" | "EIB" => 6,
        _ => return None,
    };
    let bytes = value * 1024f64.powi(power);
    if !(bytes >= 0.0) || bytes > u64::MAX as f64 {
        return None;
    }
    Some((bytes + 0.5) as u64)
}

/// Parse a dotted-quad IPv4 or colon-hex IPv6 address.
///
/// Leading zeros in IPv4 octets are accepted. IPv6 zone ids are rejected.
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let t = raw.trim();
    if t.contains(':') {
        parse_ipv6(t).map(IpAddr::V6)
    } else {
        parse_ipv4(t).map(IpAddr::V4)
    }
}

fn parse_ipv4(t: &str) -> Option<Ipv4Addr> {
    let t = t.trim();
    if t.is_empty() || t.contains(':') {
        return None;
    }
    let mut octets = [0u8; 4];
    let mut count = 0;
    for part in t.split('.') {
        if count == octets.len() || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        octets[count] = part.parse().ok()?;
        count += 1;
    }
    (count == octets.len()).then(|| Ipv4Addr::from(octets))
}

fn hextets(part: &str, allow_v4_tail: bool) -> Option<Vec<u16>> {
    if part.is_empty() {
        return Some(Vec::new());
    }
    let pieces: Vec<&str> = part.split(':').collect();
    let last = pieces.len() - 1;
    let mut groups = Vec::with_capacity(pieces.len() + 1);
    for (idx, piece) in pieces.iter().enumerate() {
        if piece.contains('.') {
            if !allow_v4_tail || idx != last {
                return None;
            }
            let [a, b, c, d] = parse_ipv4(piece)?.octets();
            groups.push(u16::from_be_bytes([a, b]));
            groups.push(u16::from_be_bytes([c, d]));
            continue;
        }
        if piece.is_empty() || piece.len() > 4 || !piece.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        groups.push(u16::from_str_radix(piece, 16).ok()?);
    }
    Some(groups)
}

fn parse_ipv6(t: &str) -> Option<Ipv6Addr> {
    let t = t.trim();
    if t.is_empty() || t.contains('%') {
        return None;
    }
    let groups = match t.split_once("::") {
        Some((head, tail)) => {
            if tail.contains("::") {
                return None;
            }
            let head = hextets(head, false)?;
            let tail = hextets(tail, true)?;
            // `::` has to stand for at least one zero group.
            if head.len() + tail.len() >= 8 {
                return None;
            }
            let mut all = head;
            all.resize(8 - tail.len(), 0);
            all.extend(tail);
            all
        }
        None => hextets(t, true)?,
    };
    let segments: [u16; 8] = groups.try_into().ok()?;
    Some(Ipv6Addr::from(segments))
}

fn join_hex(groups: &[u16]) -> String {
    groups
        .iter()
        .map(|g| format!("{g:x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn format_ipv6(addr: Ipv6Addr) -> String {
    let groups = addr.segments();
    let (mut best_start, mut best_len) = (0, 0);
    let mut i = 0;
    while i < groups.len() {
        if groups[i] != 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < groups.len() && groups[i] == 0 {
            i += 1;
        }
        let len = i - start;
        if len >= 2 && len > best_len {
            best_start = start;
            best_len = len;
        }
    }
    if best_len == 0 {
        return join_hex(&groups);
    }
    format!(
        "{}::{}",
        join_hex(&groups[..best_start]),
        join_hex(&groups[best_start + best_len..])
    )
}

/// Canonical text of an address: dotted quad, or lowercase IPv6 with the
/// longest run of zero groups compressed.
pub fn format_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format_ipv6(v6),
    }
}

/// Validate an IPv4 netmask (contiguous leading ones). Empty input stays empty.
pub fn canonical_ip_mask(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Some(String::new());
    }
    let addr = parse_ipv4(t)?;
    let inverted = !u32::from(addr);
    (inverted & inverted.wrapping_add(1) == 0).then(|| addr.to_string())
}

/// A network in CIDR notation with its host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNetwork {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_ip(self.addr), self.prefix)
    }
}

pub fn parse_cidr(raw: &str) -> Option<IpNetwork> {
    let (ip_part, prefix_part) = raw.trim().split_once('/')?;
    let (ip_part, prefix_part) = (ip_part.trim(), prefix_part.trim());
    if ip_part.is_empty()
        || prefix_part.is_empty()
        || !prefix_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let prefix: u32 = prefix_part.parse().ok()?;

    let addr = if ip_part.contains(':') {
        if prefix > 128 {
            return None;
        }
        let bits = u128::from(parse_ipv6(ip_part)?);
        let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
        IpAddr::V6(Ipv6Addr::from(bits & mask))
    } else {
        if prefix > 32 {
            return None;
        }
        let bits = u32::from(parse_ipv4(ip_part)?);
        let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
        IpAddr::V4(Ipv4Addr::from(bits & mask))
    };
    Some(IpNetwork {
        addr,
        prefix: u8::try_from(prefix).ok()?,
    })
}

fn is_scheme(scheme: &str) -> bool {
    scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Best-effort URL normalization.
///
/// Input without `://` passes through. Otherwise the scheme and host are
/// lowercased; userinfo, port and everything after the authority are kept
/// as written.
pub fn canonical_url(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.chars().any(char::is_whitespace) {
        return None;
    }
    let Some((scheme, after)) = t.split_once("://") else {
        return Some(t.to_string());
    };
    if !is_scheme(scheme) {
        return None;
    }

    let authority_end = after.find(['/', '?', '#']).unwrap_or(after.len());
    let (authority, rest) = after.split_at(authority_end);
    if authority.is_empty() {
        return None;
    }
    let (userinfo, hostport) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };
    if hostport.is_empty() {
        return None;
    }

    let host = if let Some(inner) = hostport.strip_prefix('[') {
        let close = inner.find(']')?;
        format!(
            "[{}]{}",
            inner[..close].to_ascii_lowercase(),
            &inner[close + 1..]
        )
    } else {
        match hostport.split_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                format!("{}:{port}", host.to_ascii_lowercase())
            }
            _ => hostport.to_ascii_lowercase(),
        }
    };

    Some(format!(
        "{}://{userinfo}{host}{rest}",
        scheme.to_ascii_lowercase()
    ))
}
