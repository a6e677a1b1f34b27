//! Conversion between base-unit integers and human decimal amounts.

use num_bigint::BigUint;

/// Decimals of the native VITE token.
pub const VITE_DECIMALS: u32 = 18;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UnitsError {
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),

	#[error("Amount {amount} has more than {decimals} decimals")]
	TooPrecise { amount: String, decimals: u32 },
}

fn parse_digits(digits: &str, original: &str) -> Result<BigUint, UnitsError> {
	if digits.is_empty() {
		return Ok(BigUint::from(0u32));
	}
	BigUint::parse_bytes(digits.as_bytes(), 10)
		.ok_or_else(|| UnitsError::InvalidAmount(original.to_string()))
}

/// Parse a decimal amount such as `"1.5"` into base units.
pub fn parse_units(amount: &str, decimals: u32) -> Result<BigUint, UnitsError> {
	let amount = amount.trim();
	let invalid = || UnitsError::InvalidAmount(amount.to_string());
	if amount.is_empty() || amount == "." {
		return Err(invalid());
	}

	let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
	if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
		return Err(invalid());
	}
	let fraction = fraction.trim_end_matches('0');
	if fraction.len() > decimals as usize {
		return Err(UnitsError::TooPrecise {
			amount: amount.to_string(),
			decimals,
		});
	}

	let scale = BigUint::from(10u32).pow(decimals);
	let fraction_scale = BigUint::from(10u32).pow(decimals - fraction.len() as u32);
	Ok(parse_digits(whole, amount)? * scale + parse_digits(fraction, amount)? * fraction_scale)
}

/// Render base units with exactly `precision` fractional digits, rounding half up.
pub fn format_units(value: &str, decimals: u32, precision: u32) -> Result<String, UnitsError> {
	let value = parse_digits(value.trim(), value)?;
	let precision = precision.min(decimals);

	let drop = BigUint::from(10u32).pow(decimals - precision);
	let half = &drop / 2u32;
	let rounded = if drop > BigUint::from(1u32) {
		(value + half) / &drop
	} else {
		value
	};

	let keep = BigUint::from(10u32).pow(precision);
	let whole = &rounded / &keep;
	let fraction = &rounded % &keep;
	if precision == 0 {
		return Ok(whole.to_string());
	}
	Ok(format!(
		"{}.{:0>width$}",
		whole,
		fraction.to_string(),
		width = precision as usize
	))
}
