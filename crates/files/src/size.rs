//! Byte-count conversion into human units.

use crate::{FilesError, FilesResult};
use std::fmt;
use std::str::FromStr;

/// Unit a byte count is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    #[default]
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl SizeUnit {
    fn exponent(self) -> u32 {
        match self {
            SizeUnit::Bytes => 0,
            SizeUnit::Kilobytes => 1,
            SizeUnit::Megabytes => 2,
            SizeUnit::Gigabytes => 3,
        }
    }
}

impl FromStr for SizeUnit {
    type Err = FilesError;

    /// Accepts `bytes|b`, `kilobytes|kb`, `megabytes|mb`, `gigabytes|gb`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bytes" | "b" => Ok(SizeUnit::Bytes),
            "kilobytes" | "kb" => Ok(SizeUnit::Kilobytes),
            "megabytes" | "mb" => Ok(SizeUnit::Megabytes),
            "gigabytes" | "gb" => Ok(SizeUnit::Gigabytes),
            _ => Err(FilesError::InvalidArgument(format!(
                "Invalid measure unit '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeUnit::Bytes => "bytes",
            SizeUnit::Kilobytes => "kilobytes",
            SizeUnit::Megabytes => "megabytes",
            SizeUnit::Gigabytes => "gigabytes",
        };
        f.write_str(name)
    }
}

/// Whether a kilobyte is 1024 bytes (`Binary`) or 1000 bytes (`Decimal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeBase {
    #[default]
    Binary,
    Decimal,
}

impl FromStr for SizeBase {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(SizeBase::Binary),
            "decimal" => Ok(SizeBase::Decimal),
            _ => Err(FilesError::InvalidArgument(format!(
                "Invalid conversion type '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for SizeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeBase::Binary => f.write_str("binary"),
            SizeBase::Decimal => f.write_str("decimal"),
        }
    }
}

/// Converts `size_bytes` into `unit`.
///
/// Binary divides by `1024^exp`, decimal by `10^(3 * exp)`; no rounding beyond the
/// floating-point division itself.
pub fn convert(size_bytes: u64, unit: SizeUnit, base: SizeBase) -> f64 {
    let exponent = unit.exponent();
    let divisor = match base {
        SizeBase::Binary => 1024u64.pow(exponent),
        SizeBase::Decimal => 10u64.pow(3 * exponent),
    };
    size_bytes as f64 / divisor as f64
}

/// String-facing form of [`convert`].
///
/// # Errors
///
/// Returns [`FilesError::InvalidArgument`] if `unit` or `base` is not recognised.
pub fn convert_named(size_bytes: u64, unit: &str, base: &str) -> FilesResult<f64> {
    Ok(convert(size_bytes, unit.parse()?, base.parse()?))
}
