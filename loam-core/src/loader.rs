//! Typed loader: tag-driven conversion of node trees into plain values.
//!
//! The builder produces structural trees; this layer materializes them
//! as `Value`s, dispatching on each node's type tag through a registry
//! of constructors. The builtin table covers the `tag:yaml.org,2002:`
//! scalar and collection types; callers register their own constructors
//! with `add_type` and friends. Untagged and unknown-tagged nodes
//! convert structurally.
//!
//! All scalar codecs are hand-rolled over bytes; no locale, no
//! allocation beyond the output value.

use std::collections::HashMap;
use std::rc::Rc;

use memchr::memchr_iter;

use crate::engine::GrammarEngine;
use crate::error::LoadError;
use crate::node::{Node, NodeKind};
use crate::parser::Parser;

/// A materialized plain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Insertion-ordered dictionary. Duplicate keys collapse,
    /// last write wins.
    Map(Vec<(Value, Value)>),
    Timestamp(Timestamp),
    /// The merge key sentinel (`<<`).
    Merge,
    /// The default key sentinel (`=`).
    Default,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Dictionary lookup by string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Broken-down UTC timestamp; any zone offset in the source has been
/// folded in. Microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub micro: u32,
}

/// Builtin constructor: dispatched by tag suffix from the static table.
type BuiltinCtor = fn(&Node, Value) -> Result<Value, LoadError>;

/// Caller-registered constructor.
pub type Constructor = Box<dyn Fn(&Node, Value) -> Result<Value, LoadError>>;

/// Tag-driven value loader.
pub struct Loader {
    tags: HashMap<String, Constructor>,
}

impl Loader {
    pub fn new() -> Self {
        Loader {
            tags: HashMap::new(),
        }
    }

    /// Register a constructor for a full tag URI. Registrations shadow
    /// the builtin table.
    pub fn add_type(
        &mut self,
        tag: impl Into<String>,
        ctor: impl Fn(&Node, Value) -> Result<Value, LoadError> + 'static,
    ) {
        self.tags.insert(tag.into(), Box::new(ctor));
    }

    /// Register under `tag:{domain}:{name}`.
    pub fn add_domain_type(
        &mut self,
        domain: &str,
        name: &str,
        ctor: impl Fn(&Node, Value) -> Result<Value, LoadError> + 'static,
    ) {
        self.add_type(format!("tag:{domain}:{name}"), ctor);
    }

    /// Register under `tag:yaml.org,2002:{name}`.
    pub fn add_builtin_type(
        &mut self,
        name: &str,
        ctor: impl Fn(&Node, Value) -> Result<Value, LoadError> + 'static,
    ) {
        self.add_type(format!("tag:yaml.org,2002:{name}"), ctor);
    }

    /// Register under `x-private:{name}`.
    pub fn add_private_type(
        &mut self,
        name: &str,
        ctor: impl Fn(&Node, Value) -> Result<Value, LoadError> + 'static,
    ) {
        self.add_type(format!("x-private:{name}"), ctor);
    }

    /// Convert a node tree to a plain value.
    ///
    /// Conversion is bottom-up and memoized per node, so a node shared
    /// through aliases converts exactly once.
    pub fn load(&self, node: &Rc<Node>) -> Result<Value, LoadError> {
        let mut memo = HashMap::new();
        self.convert(node, &mut memo)
    }

    /// Parse and convert the next document.
    pub fn load_next<E: GrammarEngine>(
        &self,
        parser: &mut Parser<E>,
    ) -> Result<Option<Value>, LoadError> {
        match parser.parse_one()? {
            Some(node) => Ok(Some(self.load(&node)?)),
            None => Ok(None),
        }
    }

    /// Parse and convert every remaining document.
    pub fn load_all<E: GrammarEngine>(
        &self,
        parser: &mut Parser<E>,
    ) -> Result<Vec<Value>, LoadError> {
        let mut values = Vec::new();
        while let Some(value) = self.load_next(parser)? {
            values.push(value);
        }
        Ok(values)
    }

    fn convert(
        &self,
        node: &Rc<Node>,
        memo: &mut HashMap<*const Node, Value>,
    ) -> Result<Value, LoadError> {
        let key = Rc::as_ptr(node);
        if let Some(value) = memo.get(&key) {
            return Ok(value.clone());
        }

        let structural = match node.kind() {
            NodeKind::Scalar { text, .. } => Value::Str(text.clone()),
            NodeKind::Seq(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(self.convert(item, memo)?);
                }
                Value::List(list)
            }
            NodeKind::Map(entries) => self.convert_map(entries, memo)?,
        };

        let value = self.construct(node, structural)?;
        memo.insert(key, value.clone());
        Ok(value)
    }

    /// Dictionary policy: duplicate keys collapse with last write wins;
    /// merge keys splice in referenced mappings, the map's own keys
    /// taking precedence, then earlier merge sources over later ones.
    fn convert_map(
        &self,
        entries: &[(Rc<Node>, Rc<Node>)],
        memo: &mut HashMap<*const Node, Value>,
    ) -> Result<Value, LoadError> {
        let mut own: Vec<(Value, Value)> = Vec::new();
        let mut merged: Vec<(Value, Value)> = Vec::new();

        for (key_node, value_node) in entries {
            let key = self.convert(key_node, memo)?;
            let value = self.convert(value_node, memo)?;
            if key == Value::Merge {
                collect_merge(value, &mut merged)?;
            } else {
                upsert(&mut own, key, value);
            }
        }

        for (key, value) in merged {
            if !own.iter().any(|(k, _)| *k == key) {
                own.push((key, value));
            }
        }
        Ok(Value::Map(own))
    }

    fn construct(&self, node: &Node, structural: Value) -> Result<Value, LoadError> {
        let Some(tag) = node.tag() else {
            return Ok(structural);
        };
        if let Some(ctor) = self.tags.get(tag) {
            return ctor(node, structural);
        }
        if let Some(suffix) = tag.strip_prefix("tag:yaml.org,2002:") {
            if let Some(ctor) = BUILTIN.get(suffix) {
                return ctor(node, structural);
            }
        }
        // Unknown tag: hand back the structural value.
        Ok(structural)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new()
    }
}

fn upsert(pairs: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    if let Some(slot) = pairs.iter_mut().find(|(k, _)| *k == key) {
        slot.1 = value;
    } else {
        pairs.push((key, value));
    }
}

fn collect_merge(value: Value, merged: &mut Vec<(Value, Value)>) -> Result<(), LoadError> {
    let merge_pairs = |pairs: Vec<(Value, Value)>, merged: &mut Vec<(Value, Value)>| {
        for (key, value) in pairs {
            if !merged.iter().any(|(k, _)| *k == key) {
                merged.push((key, value));
            }
        }
    };
    match value {
        Value::Map(pairs) => {
            merge_pairs(pairs, merged);
            Ok(())
        }
        Value::List(items) => {
            for item in items {
                match item {
                    Value::Map(pairs) => merge_pairs(pairs, merged),
                    _ => {
                        return Err(LoadError::construct(
                            "tag:yaml.org,2002:merge",
                            "merge sequence may contain only mappings",
                        ))
                    }
                }
            }
            Ok(())
        }
        _ => Err(LoadError::construct(
            "tag:yaml.org,2002:merge",
            "merge value must be a mapping or a sequence of mappings",
        )),
    }
}

// ============================================================================
// Builtin constructors
// ============================================================================

static BUILTIN: phf::Map<&'static str, BuiltinCtor> = phf::phf_map! {
    "str" => (construct_str as BuiltinCtor),
    "null" => (construct_null as BuiltinCtor),
    "bool#yes" => (construct_true as BuiltinCtor),
    "bool#no" => (construct_false as BuiltinCtor),
    "int" => (construct_int as BuiltinCtor),
    "int#hex" => (construct_int_hex as BuiltinCtor),
    "int#oct" => (construct_int_oct as BuiltinCtor),
    "int#base60" => (construct_int_base60 as BuiltinCtor),
    "float#fix" => (construct_float as BuiltinCtor),
    "float#exp" => (construct_float as BuiltinCtor),
    "float#base60" => (construct_float_base60 as BuiltinCtor),
    "float#inf" => (construct_inf as BuiltinCtor),
    "float#neginf" => (construct_neginf as BuiltinCtor),
    "float#nan" => (construct_nan as BuiltinCtor),
    "binary" => (construct_binary as BuiltinCtor),
    "timestamp" => (construct_timestamp as BuiltinCtor),
    "timestamp#ymd" => (construct_timestamp as BuiltinCtor),
    "timestamp#iso8601" => (construct_timestamp as BuiltinCtor),
    "timestamp#spaced" => (construct_timestamp as BuiltinCtor),
    "merge" => (construct_merge as BuiltinCtor),
    "default" => (construct_default as BuiltinCtor),
    "seq" => (construct_identity as BuiltinCtor),
    "map" => (construct_identity as BuiltinCtor),
    "omap" => (construct_pairs as BuiltinCtor),
    "pairs" => (construct_pairs as BuiltinCtor),
    "set" => (construct_set as BuiltinCtor),
};

fn tag_of(node: &Node) -> &str {
    node.tag().unwrap_or("")
}

fn scalar_text(node: &Node, structural: Value) -> Result<String, LoadError> {
    match structural {
        Value::Str(text) => Ok(text),
        _ => Err(LoadError::construct(
            tag_of(node),
            format!("expects a scalar, got a {}", node.kind_name()),
        )),
    }
}

fn construct_identity(_node: &Node, structural: Value) -> Result<Value, LoadError> {
    Ok(structural)
}

fn construct_str(node: &Node, structural: Value) -> Result<Value, LoadError> {
    scalar_text(node, structural).map(Value::Str)
}

fn construct_null(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Null)
}

fn construct_true(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Bool(true))
}

fn construct_false(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Bool(false))
}

fn construct_merge(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Merge)
}

fn construct_default(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Default)
}

fn construct_int(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    text.trim()
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| LoadError::construct(tag_of(node), format!("invalid integer '{text}'")))
}

fn construct_int_hex(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    parse_radix(text.trim(), 16, "0x", "0X")
        .map(Value::Int)
        .ok_or_else(|| LoadError::construct(tag_of(node), format!("invalid hex integer '{text}'")))
}

fn construct_int_oct(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    parse_radix(text.trim(), 8, "0o", "0O")
        .map(Value::Int)
        .ok_or_else(|| {
            LoadError::construct(tag_of(node), format!("invalid octal integer '{text}'"))
        })
}

fn parse_radix(text: &str, radix: u32, prefix: &str, prefix_upper: &str) -> Option<i64> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let digits = rest
        .strip_prefix(prefix)
        .or_else(|| rest.strip_prefix(prefix_upper))
        .unwrap_or(rest);
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

fn construct_int_base60(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    let mut value: i64 = 0;
    let mut base: i64 = 1;
    for part in base60_parts(&text).into_iter().rev() {
        let digit = part.trim().parse::<i64>().map_err(|_| {
            LoadError::construct(tag_of(node), format!("invalid base-60 integer '{text}'"))
        })?;
        value += digit * base;
        base *= 60;
    }
    Ok(Value::Int(value))
}

fn construct_float(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    text.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| LoadError::construct(tag_of(node), format!("invalid float '{text}'")))
}

fn construct_float_base60(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    let mut value: f64 = 0.0;
    let mut base: f64 = 1.0;
    for part in base60_parts(&text).into_iter().rev() {
        let digit = part.trim().parse::<f64>().map_err(|_| {
            LoadError::construct(tag_of(node), format!("invalid base-60 float '{text}'"))
        })?;
        value += digit * base;
        base *= 60.0;
    }
    Ok(Value::Float(value))
}

fn construct_inf(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Float(f64::INFINITY))
}

fn construct_neginf(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Float(f64::NEG_INFINITY))
}

fn construct_nan(_node: &Node, _structural: Value) -> Result<Value, LoadError> {
    Ok(Value::Float(f64::NAN))
}

fn construct_binary(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    decode_base64(tag_of(node), &text).map(Value::Bytes)
}

fn construct_timestamp(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let text = scalar_text(node, structural)?;
    parse_timestamp(tag_of(node), &text).map(Value::Timestamp)
}

/// `omap` and `pairs`: a sequence of mappings flattens to a list of
/// `[key, value]` pairs, entry order preserved.
fn construct_pairs(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let Value::List(maps) = structural else {
        return Err(LoadError::construct(
            tag_of(node),
            "expects a sequence of mappings",
        ));
    };
    let mut out = Vec::new();
    for item in maps {
        let Value::Map(pairs) = item else {
            return Err(LoadError::construct(
                tag_of(node),
                "expects a sequence of mappings",
            ));
        };
        for (key, value) in pairs {
            out.push(Value::List(vec![key, value]));
        }
    }
    Ok(Value::List(out))
}

/// `set`: the keys of a mapping, in order.
fn construct_set(node: &Node, structural: Value) -> Result<Value, LoadError> {
    let Value::Map(pairs) = structural else {
        return Err(LoadError::construct(tag_of(node), "expects a mapping"));
    };
    Ok(Value::List(pairs.into_iter().map(|(k, _)| k).collect()))
}

// ============================================================================
// Scalar codecs
// ============================================================================

/// Split on `:`, keeping empty parts (they fail digit parsing later).
fn base60_parts(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    for colon in memchr_iter(b':', bytes) {
        parts.push(&text[start..colon]);
        start = colon + 1;
    }
    parts.push(&text[start..]);
    parts
}

fn decode_base64(tag: &str, text: &str) -> Result<Vec<u8>, LoadError> {
    fn sextet(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let bad = |what: &str| LoadError::construct(tag, format!("invalid base64 data: {what}"));

    let mut out = Vec::new();
    let mut quad = [0u8; 4];
    let mut filled = 0usize;
    let mut padding = 0usize;

    for &c in text.as_bytes() {
        if c.is_ascii_whitespace() {
            continue;
        }
        if c == b'=' {
            padding += 1;
            quad[filled] = 0;
            filled += 1;
        } else {
            if padding > 0 {
                return Err(bad("data after padding"));
            }
            match sextet(c) {
                Some(v) => {
                    quad[filled] = v;
                    filled += 1;
                }
                None => return Err(bad("unexpected character")),
            }
        }
        if filled == 4 {
            out.push((quad[0] << 2) | (quad[1] >> 4));
            out.push((quad[1] << 4) | (quad[2] >> 2));
            out.push((quad[2] << 6) | quad[3]);
            filled = 0;
        }
    }

    if filled != 0 {
        return Err(bad("truncated group"));
    }
    if padding > 2 {
        return Err(bad("excess padding"));
    }
    out.truncate(out.len() - padding);
    Ok(out)
}

/// Parse `YYYY-MM-DD`, optionally followed by a time part
/// (`[Tt]` or whitespace separator, `hh:mm:ss`, optional fractional
/// seconds) and an optional zone (`Z` or `+-h[h][:mm]`), folding the
/// zone offset into UTC.
fn parse_timestamp(tag: &str, text: &str) -> Result<Timestamp, LoadError> {
    let bad = || LoadError::construct(tag, format!("malformed timestamp '{text}'"));
    let b = text.trim().as_bytes();

    if b.len() < 10 || b[4] != b'-' || b[7] != b'-' {
        return Err(bad());
    }
    let year = ascii_number(&b[0..4]).ok_or_else(bad)? as i32;
    let month = ascii_number(&b[5..7]).ok_or_else(bad)? as u8;
    let day = ascii_number(&b[8..10]).ok_or_else(bad)? as u8;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(bad());
    }

    let mut ts = Timestamp {
        year,
        month,
        day,
        hour: 0,
        minute: 0,
        second: 0,
        micro: 0,
    };

    let mut i = 10;
    if i == b.len() {
        return Ok(ts);
    }

    match b[i] {
        b'T' | b't' => i += 1,
        b' ' | b'\t' => {
            while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
                i += 1;
            }
        }
        _ => return Err(bad()),
    }

    if i + 8 > b.len() || b[i + 2] != b':' || b[i + 5] != b':' {
        return Err(bad());
    }
    ts.hour = ascii_number(&b[i..i + 2]).ok_or_else(bad)? as u8;
    ts.minute = ascii_number(&b[i + 3..i + 5]).ok_or_else(bad)? as u8;
    ts.second = ascii_number(&b[i + 6..i + 8]).ok_or_else(bad)? as u8;
    if ts.hour > 23 || ts.minute > 59 || ts.second > 59 {
        return Err(bad());
    }
    i += 8;

    // Fractional seconds: dot with zero or more digits.
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        let frac = &b[start..i.min(start + 6)];
        if !frac.is_empty() {
            let mut micro = ascii_number(frac).ok_or_else(bad)?;
            while 10 * micro < 1_000_000 {
                micro *= 10;
            }
            ts.micro = micro;
        }
    }

    while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
        i += 1;
    }

    let mut offset_minutes: i64 = 0;
    if i < b.len() {
        match b[i] {
            b'Z' => i += 1,
            b'+' | b'-' => {
                let negative = b[i] == b'-';
                i += 1;
                let start = i;
                while i < b.len() && b[i].is_ascii_digit() {
                    i += 1;
                }
                if i - start == 0 || i - start > 2 {
                    return Err(bad());
                }
                let zhour = ascii_number(&b[start..i]).ok_or_else(bad)? as i64;
                let mut zminute: i64 = 0;
                if i < b.len() && b[i] == b':' {
                    if i + 3 > b.len() {
                        return Err(bad());
                    }
                    zminute = ascii_number(&b[i + 1..i + 3]).ok_or_else(bad)? as i64;
                    i += 3;
                }
                let zhour = if negative { -zhour } else { zhour };
                offset_minutes = zhour * 60 + zminute;
            }
            _ => return Err(bad()),
        }
    }
    if i != b.len() {
        return Err(bad());
    }

    Ok(apply_zone_offset(ts, offset_minutes))
}

fn ascii_number(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for &d in digits {
        if !d.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add((d - b'0') as u32)?;
    }
    Some(value)
}

/// Fold a zone offset into the timestamp, rolling the date as needed.
fn apply_zone_offset(ts: Timestamp, offset_minutes: i64) -> Timestamp {
    if offset_minutes == 0 {
        return ts;
    }
    let day_seconds =
        ts.hour as i64 * 3600 + ts.minute as i64 * 60 + ts.second as i64 - offset_minutes * 60;
    let day_shift = day_seconds.div_euclid(86_400);
    let day_seconds = day_seconds.rem_euclid(86_400);

    let days = days_from_civil(ts.year as i64, ts.month as i64, ts.day as i64) + day_shift;
    let (year, month, day) = civil_from_days(days);
    Timestamp {
        year: year as i32,
        month,
        day,
        hour: (day_seconds / 3600) as u8,
        minute: (day_seconds % 3600 / 60) as u8,
        second: (day_seconds % 60) as u8,
        micro: ts.micro,
    }
}

// Proleptic Gregorian civil-date conversion.

fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (
        if month <= 2 { y + 1 } else { y },
        month as u8,
        day as u8,
    )
}
