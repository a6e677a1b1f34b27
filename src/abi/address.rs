//! Text encodings of Vite addresses and token ids.
//!
//! An address is `vite_` + hex(20-byte hash) + hex(5-byte blake2b checksum). Contract addresses
//! carry the bitwise complement of the checksum; in ABI words the same information is a trailing
//! flag byte (`0` user, `1` contract), giving the 21-byte "original address".
//! A token id is `tti_` + hex(10 bytes) + hex(2-byte blake2b checksum).

use super::AbiError;
use blake2::{
	Blake2b, Digest,
	digest::consts::{U2, U5},
};

pub const ADDRESS_PREFIX: &str = "vite_";
pub const TOKEN_ID_PREFIX: &str = "tti_";

/// Length of the address as it appears in ABI words
pub const ORIGINAL_ADDRESS_LEN: usize = 21;
pub const TOKEN_ID_LEN: usize = 10;

fn address_checksum(hash: &[u8]) -> [u8; 5] {
	Blake2b::<U5>::digest(hash).into()
}

fn token_id_checksum(bytes: &[u8]) -> [u8; 2] {
	Blake2b::<U2>::digest(bytes).into()
}

/// Render a 21-byte original address as `vite_...`.
pub fn address_from_original(original: &[u8; ORIGINAL_ADDRESS_LEN]) -> String {
	let (hash, flag) = original.split_at(20);
	let mut checksum = address_checksum(hash);
	if flag[0] == 1 {
		checksum.iter_mut().for_each(|byte| *byte = !*byte);
	}
	format!("{}{}{}", ADDRESS_PREFIX, hex::encode(hash), hex::encode(checksum))
}

/// Parse a `vite_...` address into its 21-byte original form, validating the checksum.
pub fn original_address(address: &str) -> Result<[u8; ORIGINAL_ADDRESS_LEN], AbiError> {
	let invalid = || AbiError::InvalidAddress(address.to_string());

	let body = address.strip_prefix(ADDRESS_PREFIX).ok_or_else(invalid)?;
	if body.len() != 50 {
		return Err(invalid());
	}
	let bytes = hex::decode(body).map_err(|_| invalid())?;
	let (hash, checksum) = bytes.split_at(20);

	let expected = address_checksum(hash);
	let flag = if checksum == expected {
		0u8
	} else if checksum.iter().zip(expected.iter()).all(|(a, b)| *a == !*b) {
		1u8
	} else {
		return Err(invalid());
	};

	let mut original = [0u8; ORIGINAL_ADDRESS_LEN];
	original[..20].copy_from_slice(hash);
	original[20] = flag;
	Ok(original)
}

/// True when the string is a well-formed address with a valid checksum.
pub fn is_valid_address(address: &str) -> bool {
	original_address(address).is_ok()
}

/// True for contract addresses (complemented checksum).
pub fn is_contract_address(address: &str) -> bool {
	matches!(original_address(address), Ok(original) if original[20] == 1)
}

/// Render 10 raw bytes as `tti_...`.
pub fn token_id_from_bytes(bytes: &[u8; TOKEN_ID_LEN]) -> String {
	format!(
		"{}{}{}",
		TOKEN_ID_PREFIX,
		hex::encode(bytes),
		hex::encode(token_id_checksum(bytes))
	)
}

/// Parse a `tti_...` token id, validating the checksum.
pub fn token_id_bytes(token_id: &str) -> Result<[u8; TOKEN_ID_LEN], AbiError> {
	let invalid = || AbiError::InvalidTokenId(token_id.to_string());

	let body = token_id.strip_prefix(TOKEN_ID_PREFIX).ok_or_else(invalid)?;
	if body.len() != 24 {
		return Err(invalid());
	}
	let bytes = hex::decode(body).map_err(|_| invalid())?;
	let (raw, checksum) = bytes.split_at(TOKEN_ID_LEN);
	if checksum != token_id_checksum(raw) {
		return Err(invalid());
	}

	let mut out = [0u8; TOKEN_ID_LEN];
	out.copy_from_slice(raw);
	Ok(out)
}
