//! ABI word codec.
//!
//! Values cross the codec as `serde_json::Value`, matching how parameters arrive from
//! configuration and how decoded records are handed to consumers:
//! integers are decimal strings, booleans decode to `"1"`/`"0"`, addresses and token ids use
//! their checksummed text forms, byte strings are lowercase hex.

use super::address::{
	ORIGINAL_ADDRESS_LEN, TOKEN_ID_LEN, address_from_original, original_address,
	token_id_bytes, token_id_from_bytes,
};
use super::{AbiError, ParamType};
use num_bigint::{BigInt, BigUint, Sign};
use serde_json::Value;

const WORD: usize = 32;

/// Encode `values` as a tuple of `types`.
pub fn encode_params(types: &[ParamType], values: &[Value]) -> Result<Vec<u8>, AbiError> {
	if types.len() != values.len() {
		return Err(AbiError::ParamCount {
			expected: types.len(),
			got: values.len(),
		});
	}

	let head_size: usize = types.iter().map(ParamType::head_len).sum();
	let mut head = Vec::with_capacity(head_size);
	let mut tail = Vec::new();

	for (type_, value) in types.iter().zip(values) {
		let encoded = encode_value(type_, value)?;
		if type_.is_dynamic() {
			head.extend(usize_word(head_size + tail.len()));
			tail.extend(encoded);
		} else {
			head.extend(encoded);
		}
	}

	head.extend(tail);
	Ok(head)
}

/// Decode a tuple of `types` from `data`.
pub fn decode_params(types: &[ParamType], data: &[u8]) -> Result<Vec<Value>, AbiError> {
	decode_tuple(types, data, 0)
}

/// Decode a single indexed event argument from its topic.
///
/// Reference types (strings, bytes, arrays) are stored in topics as their hash, which cannot be
/// inverted, so the raw topic is returned as hex.
pub fn decode_topic(type_: &ParamType, topic: &str) -> Result<Value, AbiError> {
	let topic = topic.trim_start_matches("0x");
	match type_ {
		ParamType::String | ParamType::Bytes | ParamType::Array(_) | ParamType::FixedArray(..) => {
			Ok(Value::String(topic.to_lowercase()))
		}
		_ => {
			let bytes = hex::decode(topic)?;
			if bytes.len() != WORD {
				return Err(AbiError::DataTooShort { offset: 0 });
			}
			decode_value(type_, &bytes, 0)
		}
	}
}

fn encode_value(type_: &ParamType, value: &Value) -> Result<Vec<u8>, AbiError> {
	let invalid = || AbiError::InvalidValue {
		type_: type_.to_string(),
		value: value.to_string(),
	};

	match type_ {
		ParamType::Uint(bits) => {
			let number = value_to_bigint(value).ok_or_else(invalid)?;
			let (sign, bytes) = number.to_bytes_be();
			if sign == Sign::Minus || number.bits() > *bits as u64 {
				return Err(invalid());
			}
			Ok(left_pad(&bytes, 0))
		}
		ParamType::Int(bits) => {
			let number = value_to_bigint(value).ok_or_else(invalid)?;
			let limit = BigInt::from(1u8) << (*bits - 1);
			if number >= limit || number < -limit {
				return Err(invalid());
			}
			let fill = if number.sign() == Sign::Minus { 0xff } else { 0 };
			Ok(left_pad(&number.to_signed_bytes_be(), fill))
		}
		ParamType::Address => {
			let address = value.as_str().ok_or_else(invalid)?;
			Ok(left_pad(&original_address(address)?, 0))
		}
		ParamType::TokenId => {
			let token_id = value.as_str().ok_or_else(invalid)?;
			Ok(left_pad(&token_id_bytes(token_id)?, 0))
		}
		ParamType::Gid => {
			let gid = hex_value(value).ok_or_else(invalid)?;
			if gid.len() != TOKEN_ID_LEN {
				return Err(invalid());
			}
			Ok(left_pad(&gid, 0))
		}
		ParamType::Bool => {
			let flag = match value {
				Value::Bool(flag) => *flag,
				Value::Number(n) if n.as_u64() == Some(0) => false,
				Value::Number(n) if n.as_u64() == Some(1) => true,
				Value::String(s) if s == "1" || s == "true" => true,
				Value::String(s) if s == "0" || s == "false" => false,
				_ => return Err(invalid()),
			};
			Ok(left_pad(&[flag as u8], 0))
		}
		ParamType::String => {
			let text = value.as_str().ok_or_else(invalid)?;
			Ok(encode_dynamic_bytes(text.as_bytes()))
		}
		ParamType::Bytes => {
			let bytes = hex_value(value).ok_or_else(invalid)?;
			Ok(encode_dynamic_bytes(&bytes))
		}
		ParamType::FixedBytes(len) => {
			let bytes = hex_value(value).ok_or_else(invalid)?;
			if bytes.len() != *len {
				return Err(invalid());
			}
			Ok(right_pad(&bytes))
		}
		ParamType::Array(inner) => {
			let items = value.as_array().ok_or_else(invalid)?;
			let types = vec![(**inner).clone(); items.len()];
			let mut out = usize_word(items.len()).to_vec();
			out.extend(encode_params(&types, items)?);
			Ok(out)
		}
		ParamType::FixedArray(inner, size) => {
			let items = value.as_array().ok_or_else(invalid)?;
			if items.len() != *size {
				return Err(invalid());
			}
			let types = vec![(**inner).clone(); *size];
			encode_params(&types, items)
		}
	}
}

fn decode_tuple(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Value>, AbiError> {
	let mut values = Vec::with_capacity(types.len());
	let mut offset = base;

	for type_ in types {
		if type_.is_dynamic() {
			let pointer = read_usize(data, offset)?;
			let target = base
				.checked_add(pointer)
				.ok_or(AbiError::DataTooShort { offset })?;
			values.push(decode_value(type_, data, target)?);
			offset += WORD;
		} else {
			values.push(decode_value(type_, data, offset)?);
			offset += type_.head_len();
		}
	}

	Ok(values)
}

fn decode_value(type_: &ParamType, data: &[u8], at: usize) -> Result<Value, AbiError> {
	match type_ {
		ParamType::Uint(_) => {
			let word = read_word(data, at)?;
			Ok(Value::String(BigUint::from_bytes_be(word).to_string()))
		}
		ParamType::Int(_) => {
			let word = read_word(data, at)?;
			Ok(Value::String(BigInt::from_signed_bytes_be(word).to_string()))
		}
		ParamType::Address => {
			let word = read_word(data, at)?;
			let mut original = [0u8; ORIGINAL_ADDRESS_LEN];
			original.copy_from_slice(&word[WORD - ORIGINAL_ADDRESS_LEN..]);
			Ok(Value::String(address_from_original(&original)))
		}
		ParamType::TokenId => {
			let word = read_word(data, at)?;
			let mut raw = [0u8; TOKEN_ID_LEN];
			raw.copy_from_slice(&word[WORD - TOKEN_ID_LEN..]);
			Ok(Value::String(token_id_from_bytes(&raw)))
		}
		ParamType::Gid => {
			let word = read_word(data, at)?;
			Ok(Value::String(hex::encode(&word[WORD - TOKEN_ID_LEN..])))
		}
		ParamType::Bool => {
			let word = read_word(data, at)?;
			let flag = word.iter().any(|byte| *byte != 0);
			Ok(Value::String(if flag { "1" } else { "0" }.to_string()))
		}
		ParamType::String => {
			let bytes = read_dynamic_bytes(data, at)?;
			let text = String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)?;
			Ok(Value::String(text))
		}
		ParamType::Bytes => Ok(Value::String(hex::encode(read_dynamic_bytes(data, at)?))),
		ParamType::FixedBytes(len) => {
			let word = read_word(data, at)?;
			Ok(Value::String(hex::encode(&word[..*len])))
		}
		ParamType::Array(inner) => {
			let len = read_usize(data, at)?;
			if len > data.len() {
				return Err(AbiError::DataTooShort { offset: at });
			}
			let types = vec![(**inner).clone(); len];
			Ok(Value::Array(decode_tuple(&types, data, at + WORD)?))
		}
		ParamType::FixedArray(inner, size) => {
			let types = vec![(**inner).clone(); *size];
			Ok(Value::Array(decode_tuple(&types, data, at)?))
		}
	}
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
	at.checked_add(WORD)
		.and_then(|end| data.get(at..end))
		.ok_or(AbiError::DataTooShort { offset: at })
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
	let word = read_word(data, at)?;
	let (high, low) = word.split_at(WORD - 8);
	if high.iter().any(|byte| *byte != 0) {
		return Err(AbiError::DataTooShort { offset: at });
	}
	let mut buf = [0u8; 8];
	buf.copy_from_slice(low);
	usize::try_from(u64::from_be_bytes(buf)).map_err(|_| AbiError::DataTooShort { offset: at })
}

fn read_dynamic_bytes(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
	let len = read_usize(data, at)?;
	let start = at + WORD;
	start
		.checked_add(len)
		.and_then(|end| data.get(start..end))
		.ok_or(AbiError::DataTooShort { offset: start })
}

fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
	let mut out = usize_word(bytes.len()).to_vec();
	out.extend(right_pad(bytes));
	out
}

fn usize_word(value: usize) -> [u8; WORD] {
	let mut word = [0u8; WORD];
	word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
	word
}

fn left_pad(bytes: &[u8], fill: u8) -> Vec<u8> {
	let mut word = vec![fill; WORD.saturating_sub(bytes.len())];
	word.extend_from_slice(bytes);
	word
}

fn right_pad(bytes: &[u8]) -> Vec<u8> {
	let mut out = bytes.to_vec();
	let padded = bytes.len().div_ceil(WORD) * WORD;
	out.resize(padded, 0);
	out
}

fn value_to_bigint(value: &Value) -> Option<BigInt> {
	match value {
		Value::String(s) => match s.strip_prefix("0x") {
			Some(hex) => BigInt::parse_bytes(hex.as_bytes(), 16),
			None => BigInt::parse_bytes(s.as_bytes(), 10),
		},
		Value::Number(n) => n
			.as_u64()
			.map(BigInt::from)
			.or_else(|| n.as_i64().map(BigInt::from)),
		_ => None,
	}
}

fn hex_value(value: &Value) -> Option<Vec<u8>> {
	let text = value.as_str()?;
	hex::decode(text.trim_start_matches("0x")).ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn types(list: &[&str]) -> Vec<ParamType> {
		list.iter().map(|t| ParamType::parse(t).unwrap()).collect()
	}

	#[test]
	fn encodes_static_words() {
		let encoded = encode_params(&types(&["uint256", "bool"]), &[json!("7"), json!(true)])
			.unwrap();
		assert_eq!(encoded.len(), 64);
		assert_eq!(encoded[31], 7);
		assert_eq!(encoded[63], 1);
	}

	#[test]
	fn negative_ints_are_sign_extended() {
		let encoded = encode_params(&types(&["int8"]), &[json!(-1)]).unwrap();
		assert!(encoded.iter().all(|byte| *byte == 0xff));
		let decoded = decode_params(&types(&["int8"]), &encoded).unwrap();
		assert_eq!(decoded, vec![json!("-1")]);
	}

	#[test]
	fn rejects_out_of_range_numbers() {
		assert!(encode_params(&types(&["uint8"]), &[json!("256")]).is_err());
		assert!(encode_params(&types(&["uint256"]), &[json!("-1")]).is_err());
		assert!(encode_params(&types(&["int8"]), &[json!("128")]).is_err());
		assert!(encode_params(&types(&["uint256"]), &[json!("abc")]).is_err());
	}

	#[test]
	fn dynamic_string_goes_to_tail() {
		let encoded =
			encode_params(&types(&["string", "uint256"]), &[json!("https://example/"), json!(3)])
				.unwrap();
		// offset word, uint word, length word, one padded data word
		assert_eq!(encoded.len(), 128);
		assert_eq!(encoded[31], 64);
		assert_eq!(encoded[63], 3);
		assert_eq!(encoded[95], 16);
		assert_eq!(&encoded[96..112], b"https://example/");

		let decoded = decode_params(&types(&["string", "uint256"]), &encoded).unwrap();
		assert_eq!(decoded, vec![json!("https://example/"), json!("3")]);
	}

	#[test]
	fn decodes_bool_as_numeric_string() {
		let mut word = [0u8; 32];
		word[31] = 1;
		assert_eq!(decode_params(&types(&["bool"]), &word).unwrap(), vec![json!("1")]);
	}

	#[test]
	fn arrays_of_addresses() {
		let zero = "vite_0000000000000000000000000000000000000000a4f3a0cb58";
		let other = "vite_0102030405060708090a0b0c0d0e0f10111213149bfa21dd52";
		let value = json!([zero, other]);
		let encoded = encode_params(&types(&["address[]"]), &[value.clone()]).unwrap();
		assert_eq!(encoded.len(), 32 * 4);
		assert_eq!(decode_params(&types(&["address[]"]), &encoded).unwrap(), vec![value]);
	}

	#[test]
	fn truncated_data_is_an_error() {
		let encoded = encode_params(&types(&["string"]), &[json!("hello")]).unwrap();
		let result = decode_params(&types(&["string"]), &encoded[..40]);
		assert!(matches!(result, Err(AbiError::DataTooShort { .. })));
	}

	#[test]
	fn indexed_reference_types_keep_the_topic_hash() {
		let topic = "AB".repeat(32);
		let value = decode_topic(&ParamType::String, &topic).unwrap();
		assert_eq!(value, json!("ab".repeat(32)));
	}

	#[test]
	fn param_count_mismatch() {
		let err = encode_params(&types(&["uint256"]), &[]).unwrap_err();
		assert!(matches!(err, AbiError::ParamCount { expected: 1, got: 0 }));
	}
}
