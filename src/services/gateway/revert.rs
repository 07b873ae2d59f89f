//! Decoding of `Error(string)` revert payloads.

use alloy::primitives::hex;

/// Selector of `Error(string)`
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decodes the reason of an `Error(string)` revert from its `0x` hex payload.
///
/// Returns `None` for anything else (custom errors, panics, empty output).
pub fn decode_revert_reason(data: &str) -> Option<String> {
	let bytes = hex::decode(data.trim_start_matches("0x")).ok()?;
	let payload = bytes.strip_prefix(&ERROR_SELECTOR[..])?;

	// offset word, length word, then the utf-8 bytes
	let length_word = payload.get(32..64)?;
	if length_word[..24].iter().any(|b| *b != 0) {
		return None;
	}
	let mut length_bytes = [0u8; 8];
	length_bytes.copy_from_slice(&length_word[24..]);
	let length = usize::try_from(u64::from_be_bytes(length_bytes)).ok()?;

	let reason = payload.get(64..64usize.checked_add(length)?)?;
	String::from_utf8(reason.to_vec()).ok()
}
