//! Compile-time constant definitions and their `-D` option form.
//!
//! Macro names and numeric spelling are part of the kernel ABI: unsigned
//! integers carry a `u` suffix, floats are single precision with an `f` suffix,
//! signed integers are written plain.

use std::fmt;

use snafu::ensure;

use crate::error::{MalformedOptionSnafu, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefineValue {
    /// Bare `NAME`, tested with `#ifdef`.
    Flag,
    UInt(u64),
    Int(i64),
    Float(f32),
}

impl fmt::Display for DefineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => Ok(()),
            Self::UInt(v) => write!(f, "{v}u"),
            Self::Int(v) => write!(f, "{v}"),
            // Debug gives the shortest round-trip form and always keeps a `.0` or exponent.
            Self::Float(v) => write!(f, "{v:?}f"),
        }
    }
}

/// One `NAME[=value]` build macro.
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub name: String,
    pub value: DefineValue,
}

impl Define {
    pub fn flag(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: DefineValue::Flag }
    }

    pub fn uint(name: impl Into<String>, value: impl Into<u64>) -> Self {
        Self { name: name.into(), value: DefineValue::UInt(value.into()) }
    }

    pub fn int(name: impl Into<String>, value: impl Into<i64>) -> Self {
        Self { name: name.into(), value: DefineValue::Int(value.into()) }
    }

    /// Narrowed to single precision; callers validate finiteness first.
    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value: DefineValue::Float(value as f32) }
    }

    /// Parse one option body such as `NX=128u`, `DEBUG` or `COMBO_FACTOR=-1.0f`.
    pub fn parse(text: &str) -> Result<Self> {
        let (name, value) = match text.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (text, None),
        };
        ensure!(is_identifier(name), MalformedOptionSnafu { option: text });

        let value = match value {
            None => DefineValue::Flag,
            Some(v) => parse_value(v).ok_or_else(|| MalformedOptionSnafu { option: text }.build())?,
        };
        Ok(Self { name: name.to_string(), value })
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            DefineValue::Flag => f.write_str(&self.name),
            value => write!(f, "{}={value}", self.name),
        }
    }
}

fn parse_value(text: &str) -> Option<DefineValue> {
    if let Some(digits) = text.strip_suffix('u') {
        return digits.parse().ok().map(DefineValue::UInt);
    }
    if let Some(number) = text.strip_suffix('f') {
        return number.parse::<f32>().ok().filter(|v| v.is_finite()).map(DefineValue::Float);
    }
    text.parse().ok().map(DefineValue::Int)
}

/// Macro names are C identifiers.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Flatten defines into compiler arguments: `["-D", "NAME=value", ...]`.
pub fn build_options(defines: &[Define]) -> Vec<String> {
    defines.iter().flat_map(|d| ["-D".to_string(), d.to_string()]).collect()
}

/// Read a `-D` argument list back into defines.
///
/// Accepts both the split form (`-D`, `NAME=v`) and the joined form (`-DNAME=v`).
/// Anything else is a `MalformedOption`.
pub fn parse_build_options(options: &[String]) -> Result<Vec<Define>> {
    let mut defines = Vec::with_capacity(options.len() / 2);
    let mut args = options.iter();
    while let Some(arg) = args.next() {
        let body = match arg.strip_prefix("-D") {
            Some("") => args.next().ok_or_else(|| MalformedOptionSnafu { option: arg.as_str() }.build())?.as_str(),
            Some(joined) => joined,
            None => return MalformedOptionSnafu { option: arg.as_str() }.fail(),
        };
        defines.push(Define::parse(body)?);
    }
    Ok(defines)
}
