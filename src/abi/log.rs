//! VM log decoding.

use super::{AbiError, Fragment, FragmentType, ParamType, codec};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode one raw VM log against an event fragment.
///
/// Indexed inputs are read from `topics` in declaration order, skipping the signature topic of
/// non-anonymous events. Non-indexed inputs are decoded from `data_hex`, again in declaration
/// order. Each value is stored under the input name and under its positional index.
pub fn decode_log(
	fragment: &Fragment,
	data_hex: Option<&str>,
	topics: &[String],
) -> Result<Map<String, Value>, AbiError> {
	if fragment.type_ != FragmentType::Event {
		return Err(AbiError::NotAnEvent(fragment.name.clone()));
	}

	let types = fragment.input_types()?;
	let first_topic = if fragment.anonymous { 0 } else { 1 };

	let mut indexed_values = Vec::new();
	let mut topic_index = first_topic;
	let mut payload_types: Vec<ParamType> = Vec::new();
	for (input, type_) in fragment.inputs.iter().zip(&types) {
		if input.indexed {
			let topic = topics
				.get(topic_index)
				.ok_or(AbiError::MissingTopic(topic_index))?;
			indexed_values.push(codec::decode_topic(type_, topic)?);
			topic_index += 1;
		} else {
			payload_types.push(type_.clone());
		}
	}

	let payload_values = if payload_types.is_empty() {
		Vec::new()
	} else {
		let data = hex::decode(data_hex.unwrap_or_default().trim_start_matches("0x"))?;
		codec::decode_params(&payload_types, &data)?
	};

	let mut indexed_values = indexed_values.into_iter();
	let mut payload_values = payload_values.into_iter();
	let mut record = Map::new();
	for (position, input) in fragment.inputs.iter().enumerate() {
		let value = if input.indexed {
			indexed_values.next()
		} else {
			payload_values.next()
		}
		.unwrap_or(Value::Null);

		if !input.name.is_empty() {
			record.insert(input.name.clone(), value.clone());
		}
		record.insert(position.to_string(), value);
	}

	Ok(record)
}

/// Decode a VM log straight into a typed record.
pub fn decode_log_as<T: DeserializeOwned>(
	fragment: &Fragment,
	data_hex: Option<&str>,
	topics: &[String],
) -> Result<T, AbiError> {
	let record = decode_log(fragment, data_hex, topics)?;
	Ok(serde_json::from_value(Value::Object(record))?)
}
