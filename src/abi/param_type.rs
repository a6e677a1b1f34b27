use super::AbiError;
use std::fmt;

/// Parameter type grammar understood by the codec.
///
/// Besides the usual Solidity types, the Vite VM knows `tokenId` (10 bytes) and `gid`
/// (10 bytes), and its `address` is 21 bytes: 20 bytes of hash plus a contract flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
	Uint(usize),
	Int(usize),
	Address,
	TokenId,
	Gid,
	Bool,
	String,
	Bytes,
	FixedBytes(usize),
	Array(Box<ParamType>),
	FixedArray(Box<ParamType>, usize),
}

impl ParamType {
	/// Parse a type string such as `uint256`, `address[]` or `bytes32[2]`.
	pub fn parse(type_: &str) -> Result<Self, AbiError> {
		let type_ = type_.trim();
		let invalid = || AbiError::InvalidType(type_.to_string());

		if let Some(without_bracket) = type_.strip_suffix(']') {
			let open = without_bracket.rfind('[').ok_or_else(invalid)?;
			let inner = Self::parse(&without_bracket[..open])?;
			let size = &without_bracket[open + 1..];
			return if size.is_empty() {
				Ok(ParamType::Array(Box::new(inner)))
			} else {
				let size = size.parse::<usize>().map_err(|_| invalid())?;
				Ok(ParamType::FixedArray(Box::new(inner), size))
			};
		}

		match type_ {
			"address" => return Ok(ParamType::Address),
			"tokenId" => return Ok(ParamType::TokenId),
			"gid" => return Ok(ParamType::Gid),
			"bool" => return Ok(ParamType::Bool),
			"string" => return Ok(ParamType::String),
			"bytes" => return Ok(ParamType::Bytes),
			"uint" => return Ok(ParamType::Uint(256)),
			"int" => return Ok(ParamType::Int(256)),
			_ => {}
		}

		if let Some(bits) = type_.strip_prefix("uint") {
			return Self::parse_bits(bits).map(ParamType::Uint).ok_or_else(invalid);
		}
		if let Some(bits) = type_.strip_prefix("int") {
			return Self::parse_bits(bits).map(ParamType::Int).ok_or_else(invalid);
		}
		if let Some(len) = type_.strip_prefix("bytes") {
			return match len.parse::<usize>() {
				Ok(len) if (1..=32).contains(&len) => Ok(ParamType::FixedBytes(len)),
				_ => Err(invalid()),
			};
		}

		Err(invalid())
	}

	fn parse_bits(bits: &str) -> Option<usize> {
		let bits = bits.parse::<usize>().ok()?;
		(bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
	}

	/// Dynamic types are encoded out of line behind an offset word.
	pub fn is_dynamic(&self) -> bool {
		match self {
			ParamType::String | ParamType::Bytes | ParamType::Array(_) => true,
			ParamType::FixedArray(inner, _) => inner.is_dynamic(),
			_ => false,
		}
	}

	/// Number of bytes this type occupies in the head of a tuple.
	pub fn head_len(&self) -> usize {
		match self {
			ParamType::FixedArray(inner, size) if !self.is_dynamic() => inner.head_len() * size,
			_ => 32,
		}
	}
}

impl fmt::Display for ParamType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ParamType::Uint(bits) => write!(f, "uint{}", bits),
			ParamType::Int(bits) => write!(f, "int{}", bits),
			ParamType::Address => write!(f, "address"),
			ParamType::TokenId => write!(f, "tokenId"),
			ParamType::Gid => write!(f, "gid"),
			ParamType::Bool => write!(f, "bool"),
			ParamType::String => write!(f, "string"),
			ParamType::Bytes => write!(f, "bytes"),
			ParamType::FixedBytes(len) => write!(f, "bytes{}", len),
			ParamType::Array(inner) => write!(f, "{}[]", inner),
			ParamType::FixedArray(inner, size) => write!(f, "{}[{}]", inner, size),
		}
	}
}
