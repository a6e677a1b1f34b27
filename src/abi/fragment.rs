//! ABI fragment model.
//!
//! A contract ABI is an ordered list of [`Fragment`]s, each describing one function, event or
//! special entry point. ABIs are loaded once from JSON and never mutated afterwards.

use super::{AbiError, ParamType};
use serde::{Deserialize, Serialize};

/// Kind of ABI entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FragmentType {
	Function,
	Event,
	Constructor,
	/// Read-only getter executed off chain by the node
	Offchain,
	Fallback,
	Receive,
}

/// One input parameter of a function or event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FragmentInput {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "type")]
	pub type_: String,
	/// Only meaningful for event inputs
	#[serde(default)]
	pub indexed: bool,
}

/// One output parameter of a function
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FragmentOutput {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "type")]
	pub type_: String,
}

/// A single ABI entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Fragment {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "type")]
	pub type_: FragmentType,
	#[serde(default)]
	pub anonymous: bool,
	#[serde(default)]
	pub inputs: Vec<FragmentInput>,
	#[serde(default)]
	pub outputs: Vec<FragmentOutput>,
	#[serde(rename = "stateMutability", default, skip_serializing_if = "Option::is_none")]
	pub state_mutability: Option<String>,
}

impl Fragment {
	/// Canonical signature `Name(type1,type2,...)` used for hashing.
	pub fn signature(&self) -> String {
		let types = self
			.inputs
			.iter()
			.map(|input| input.type_.as_str())
			.collect::<Vec<_>>()
			.join(",");
		format!("{}({})", self.name, types)
	}

	/// True for non-anonymous events, the only kind that can be subscribed to.
	pub fn is_subscribable_event(&self) -> bool {
		self.type_ == FragmentType::Event && !self.anonymous
	}

	/// Parsed input types in declaration order.
	pub fn input_types(&self) -> Result<Vec<ParamType>, AbiError> {
		self.inputs
			.iter()
			.map(|input| ParamType::parse(&input.type_))
			.collect()
	}

	/// Parsed output types in declaration order.
	pub fn output_types(&self) -> Result<Vec<ParamType>, AbiError> {
		self.outputs
			.iter()
			.map(|output| ParamType::parse(&output.type_))
			.collect()
	}
}

/// Parse a JSON ABI document.
pub fn parse_abi(json: &str) -> Result<Vec<Fragment>, AbiError> {
	Ok(serde_json::from_str(json)?)
}

/// Find the first fragment of the given type and name.
pub fn find_fragment<'a>(
	abi: &'a [Fragment],
	type_: FragmentType,
	name: &str,
) -> Option<&'a Fragment> {
	abi.iter()
		.find(|fragment| fragment.type_ == type_ && fragment.name == name)
}

/// Find a callable fragment: a function, or an offchain getter with that name.
pub fn find_method<'a>(abi: &'a [Fragment], name: &str) -> Option<&'a Fragment> {
	find_fragment(abi, FragmentType::Function, name)
		.or_else(|| find_fragment(abi, FragmentType::Offchain, name))
}

#[cfg(test)]
mod tests {
	use super::*;

	const ABI: &str = r#"[
		{"type":"event","name":"Transfer","anonymous":false,"inputs":[
			{"name":"from","type":"address","indexed":true},
			{"name":"to","type":"address","indexed":true},
			{"name":"tokenId","type":"uint256","indexed":true}]},
		{"type":"function","name":"ownerOf","inputs":[{"name":"tokenId","type":"uint256"}],
			"outputs":[{"name":"","type":"address"}],"stateMutability":"view"}
	]"#;

	#[test]
	fn parses_json_abi() {
		let abi = parse_abi(ABI).expect("valid abi");
		assert_eq!(abi.len(), 2);
		assert_eq!(abi[0].type_, FragmentType::Event);
		assert!(abi[0].inputs[2].indexed);
		assert_eq!(abi[1].state_mutability.as_deref(), Some("view"));
		assert!(!abi[1].inputs[0].indexed);
	}

	#[test]
	fn builds_canonical_signature() {
		let abi = parse_abi(ABI).unwrap();
		assert_eq!(abi[0].signature(), "Transfer(address,address,uint256)");
		assert_eq!(abi[1].signature(), "ownerOf(uint256)");
	}

	#[test]
	fn finds_methods_by_name() {
		let abi = parse_abi(ABI).unwrap();
		assert!(find_method(&abi, "ownerOf").is_some());
		assert!(find_method(&abi, "Transfer").is_none());
		assert!(find_fragment(&abi, FragmentType::Event, "Transfer").is_some());
	}
}
