//! Subscription filters derived from an ABI.

use super::{Fragment, encode_log_signature};
use crate::provider::{HeightRange, VmLogFilter};
use std::collections::BTreeMap;
use tracing::warn;

/// The event fragments selected for one contract plus their signature topics.
///
/// Built deterministically from `(contract address, event names)`. An empty spec is valid and
/// simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
	pub contract_address: String,
	/// Selected fragments in ABI order
	pub fragments: Vec<Fragment>,
	/// One topic per fragment, same order
	pub topics: Vec<String>,
}

impl FilterSpec {
	pub fn is_empty(&self) -> bool {
		self.fragments.is_empty()
	}

	/// Wire filter covering the whole height range of the contract.
	///
	/// `0..0` is unbounded: used for a live subscription it follows the chain tail, used for a
	/// one-shot query it spans everything since genesis.
	pub fn vm_log_filter(&self) -> VmLogFilter {
		let mut address_height_range = BTreeMap::new();
		address_height_range.insert(self.contract_address.clone(), HeightRange::unbounded());
		VmLogFilter {
			address_height_range,
			topics: vec![self.topics.clone()],
		}
	}

	/// The fragment whose signature matches `topic`.
	pub fn fragment_for_topic(&self, topic: &str) -> Option<&Fragment> {
		self.topics
			.iter()
			.position(|candidate| candidate.eq_ignore_ascii_case(topic))
			.map(|index| &self.fragments[index])
	}
}

/// Select the subscribable event fragments named in `event_names`.
///
/// Names without a matching non-anonymous event are dropped with a warning; callers treat an
/// empty result as "nothing to decode", never as an error.
pub fn build_filter<S: AsRef<str>>(
	contract_address: &str,
	abi: &[Fragment],
	event_names: &[S],
) -> FilterSpec {
	let fragments: Vec<Fragment> = abi
		.iter()
		.filter(|fragment| {
			fragment.is_subscribable_event()
				&& event_names
					.iter()
					.any(|name| name.as_ref() == fragment.name)
		})
		.cloned()
		.collect();

	for name in event_names {
		let name = name.as_ref();
		if !fragments.iter().any(|fragment| fragment.name == name) {
			warn!("unknown fragment: {}", name);
		}
	}

	let topics = fragments.iter().map(encode_log_signature).collect();

	FilterSpec {
		contract_address: contract_address.to_string(),
		fragments,
		topics,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::abi::parse_abi;
	use crate::test_support::capture_logs;

	const CONTRACT: &str = "vite_0102030405060708090a0b0c0d0e0f10111213146405de22ad";

	fn abi() -> Vec<Fragment> {
		parse_abi(
			r#"[
			{"type":"event","name":"OfferUpdated","inputs":[
				{"name":"tokenId","type":"uint256","indexed":true},
				{"name":"offeror","type":"address","indexed":true},
				{"name":"minimumOffer","type":"uint256","indexed":false}]},
			{"type":"event","name":"Hidden","anonymous":true,"inputs":[]},
			{"type":"function","name":"Traded","inputs":[]},
			{"type":"event","name":"Traded","inputs":[
				{"name":"tokenId","type":"uint256","indexed":true},
				{"name":"value","type":"uint256","indexed":false},
				{"name":"offeror","type":"address","indexed":true},
				{"name":"bidder","type":"address","indexed":true}]}
		]"#,
		)
		.unwrap()
	}

	#[test]
	fn selects_only_named_non_anonymous_events() {
		let spec = build_filter(CONTRACT, &abi(), &["Traded", "OfferUpdated", "Hidden"]);
		let names: Vec<&str> = spec.fragments.iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["OfferUpdated", "Traded"]);
		assert_eq!(spec.topics.len(), 2);
		assert_eq!(
			spec.topics[0],
			"0c888856bdb74be5efd9ce000ce118d217d938e4c41dc0d0d4b40f60b7a458b4"
		);
		assert_eq!(
			spec.topics[1],
			"cad41ef4fa670e355426b38e3933813fb8ae1f3a524ceae9b4e7e499fd49cd6a"
		);
	}

	#[test]
	fn unknown_names_warn_once_each() {
		let (spec, output) = capture_logs(|| {
			build_filter(
				CONTRACT,
				&abi(),
				&["OfferUpdatedEvent", "TradedEvent", "OfferUpdated"],
			)
		});
		assert_eq!(spec.fragments.len(), 1);
		assert_eq!(spec.topics.len(), 1);
		assert_eq!(output.matches("unknown fragment: OfferUpdatedEvent").count(), 1);
		assert_eq!(output.matches("unknown fragment: TradedEvent").count(), 1);
		assert_eq!(output.matches("unknown fragment:").count(), 2);

		let (spec, output) = capture_logs(|| build_filter(CONTRACT, &abi(), &["Hidden"]));
		assert!(spec.is_empty());
		assert_eq!(output.matches("unknown fragment: Hidden").count(), 1);
	}

	#[test]
	fn wire_filter_is_unbounded_for_the_contract() {
		let spec = build_filter(CONTRACT, &abi(), &["OfferUpdated"]);
		let filter = spec.vm_log_filter();
		let json = serde_json::to_value(&filter).unwrap();
		assert_eq!(json["addressHeightRange"][CONTRACT]["fromHeight"], "0");
		assert_eq!(json["addressHeightRange"][CONTRACT]["toHeight"], "0");
		assert_eq!(json["topics"][0][0], spec.topics[0].as_str());
	}

	#[test]
	fn maps_topics_back_to_fragments() {
		let spec = build_filter(CONTRACT, &abi(), &["Traded", "OfferUpdated"]);
		let upper = spec.topics[1].to_uppercase();
		assert_eq!(spec.fragment_for_topic(&upper).unwrap().name, "Traded");
		assert!(spec.fragment_for_topic("00").is_none());
	}
}
