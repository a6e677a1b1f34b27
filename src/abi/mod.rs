//! Contract ABI support for the Vite VM.
//!
//! This module covers everything needed to talk to a contract through its ABI: the fragment
//! model loaded from JSON, the parameter type grammar, the word codec, signature hashing,
//! subscription filters and VM log decoding.

/// Checksummed text forms of addresses and token ids
pub mod address;
/// ABI word encoding and decoding
pub mod codec;
/// Subscription filter construction
mod filter;
/// Fragment model and lookup helpers
mod fragment;
/// VM log decoding
mod log;
/// Parameter type grammar
mod param_type;
/// Event and function signature hashing
mod signature;

pub use address::{is_valid_address, ADDRESS_PREFIX, TOKEN_ID_PREFIX};
pub use codec::{decode_params, encode_params};
pub use filter::{FilterSpec, build_filter};
pub use fragment::*;
pub use log::{decode_log, decode_log_as};
pub use param_type::ParamType;
pub use signature::{
	blake2b_256, encode_function_call, encode_function_signature, encode_log_signature,
};

/// Errors raised while parsing ABIs or encoding and decoding values
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
	#[error("Invalid ABI type: {0}")]
	InvalidType(String),

	#[error("Invalid address: {0}")]
	InvalidAddress(String),

	#[error("Invalid token id: {0}")]
	InvalidTokenId(String),

	#[error("Invalid value {value} for type {type_}")]
	InvalidValue { type_: String, value: String },

	#[error("Expected {expected} parameters, got {got}")]
	ParamCount { expected: usize, got: usize },

	#[error("ABI data too short at offset {offset}")]
	DataTooShort { offset: usize },

	#[error("ABI string is not valid UTF-8")]
	InvalidUtf8,

	#[error("Missing topic at position {0}")]
	MissingTopic(usize),

	#[error("Fragment {0} is not an event")]
	NotAnEvent(String),

	#[error("Unknown fragment: {0}")]
	UnknownFragment(String),

	#[error("Hex decode error: {0}")]
	HexError(#[from] hex::FromHexError),

	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
}
