//! Signature hashing for events and functions.
//!
//! The Vite VM hashes signatures with blake2b-256 where the EVM would use keccak-256.

use super::{AbiError, Fragment, codec};
use blake2::{Blake2b, Digest, digest::consts::U32};
use serde_json::Value;

/// blake2b with a 32-byte digest.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
	Blake2b::<U32>::digest(data).into()
}

/// Topic of a non-anonymous event, lowercase hex without prefix.
pub fn encode_log_signature(fragment: &Fragment) -> String {
	hex::encode(blake2b_256(fragment.signature().as_bytes()))
}

/// Four-byte selector of a function.
pub fn encode_function_signature(fragment: &Fragment) -> [u8; 4] {
	let hash = blake2b_256(fragment.signature().as_bytes());
	[hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by the ABI-encoded arguments.
pub fn encode_function_call(fragment: &Fragment, params: &[Value]) -> Result<Vec<u8>, AbiError> {
	let types = fragment.input_types()?;
	let mut data = encode_function_signature(fragment).to_vec();
	data.extend(codec::encode_params(&types, params)?);
	Ok(data)
}
