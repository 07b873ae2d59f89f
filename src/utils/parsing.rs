//! Parsing helpers for CLI arguments and JSON-RPC values.

use byte_unit::Byte;
use std::str::FromStr;

/// Parses a human readable size ("1GB", "500MiB", ...) into bytes.
pub fn parse_string_to_bytes_size(s: &str) -> Result<u64, String> {
	match Byte::from_str(s) {
		Ok(byte) => Ok(byte.as_u64()),
		Err(e) => Err(format!("Invalid size format: '{}'. Error: {}", s, e)),
	}
}

/// Parses a JSON-RPC hex quantity such as `"0x1b4"`.
pub fn parse_hex_quantity(s: &str) -> Result<u64, String> {
	let digits = s
		.strip_prefix("0x")
		.or_else(|| s.strip_prefix("0X"))
		.ok_or_else(|| format!("Quantity '{}' is missing the 0x prefix", s))?;
	u64::from_str_radix(digits, 16).map_err(|e| format!("Invalid quantity '{}': {}", s, e))
}

/// Trims and lower-cases a name before comparing it with others.
pub fn normalize_string(input: &str) -> String {
	input.trim().to_lowercase()
}
