//! Local postal code pre-validation.
//!
//! Runs before any remote address validation: a postal code must be exactly
//! five digits, and when a U.S. state is selected it must also fall within
//! that state's numeric ZIP range. Out-of-range codes block the Save action
//! without a network call.

use super::AddressError;

/// Numeric ZIP ranges per U.S. state (and DC), inclusive.
const ZIP_RANGES: &[(&str, u32, u32)] = &[
    ("AL", 35004, 36925),
    ("AK", 99501, 99950),
    ("AZ", 85001, 86556),
    ("AR", 71601, 72959),
    ("CA", 90001, 96162),
    ("CO", 80001, 81658),
    ("CT", 6001, 6928),
    ("DC", 20001, 20799),
    ("DE", 19701, 19980),
    ("FL", 32004, 34997),
    ("GA", 30001, 31999),
    ("HI", 96701, 96898),
    ("ID", 83201, 83876),
    ("IL", 60001, 62999),
    ("IN", 46001, 47997),
    ("IA", 50001, 52809),
    ("KS", 66002, 67954),
    ("KY", 40003, 42788),
    ("LA", 70001, 71497),
    ("ME", 3901, 4992),
    ("MD", 20601, 21930),
    ("MA", 1001, 2791),
    ("MI", 48001, 49971),
    ("MN", 55001, 56763),
    ("MS", 38601, 39776),
    ("MO", 63001, 65899),
    ("MT", 59001, 59937),
    ("NE", 68001, 69367),
    ("NV", 88901, 89883),
    ("NH", 3031, 3897),
    ("NJ", 7001, 8989),
    ("NM", 87001, 88441),
    ("NY", 10001, 11999),
    ("NC", 27006, 28909),
    ("ND", 58001, 58856),
    ("OH", 43001, 45999),
    ("OK", 73001, 74966),
    ("OR", 97001, 97920),
    ("PA", 15001, 19640),
    ("RI", 2801, 2940),
    ("SC", 29001, 29948),
    ("SD", 57001, 57799),
    ("TN", 37010, 38589),
    ("TX", 75001, 79999),
    ("UT", 84001, 84790),
    ("VT", 5001, 5907),
    ("VA", 20101, 24658),
    ("WA", 98001, 99403),
    ("WV", 24701, 26886),
    ("WI", 53001, 54990),
    ("WY", 82001, 83128),
];

/// Look up the ZIP range for a two-letter state code.
#[must_use]
pub fn range_for(state: &str) -> Option<(u32, u32)> {
    let state = state.trim().to_ascii_uppercase();
    ZIP_RANGES
        .iter()
        .find(|(code, _, _)| *code == state)
        .map(|(_, min, max)| (*min, *max))
}

/// Validate a postal code against the format rule and, when the state is in
/// the lookup table, that state's ZIP range.
///
/// # Errors
///
/// Returns [`AddressError::PostalFormat`] for anything that is not exactly
/// five ASCII digits, and [`AddressError::PostalOutOfRange`] (citing the
/// valid range) when the code falls outside the selected state's range.
pub fn validate(postal: &str, state: &str) -> Result<(), AddressError> {
    let postal = postal.trim();
    if postal.len() != 5 || !postal.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::PostalFormat);
    }

    let Some((min, max)) = range_for(state) else {
        // Not a U.S. state we know; the format rule is all we can apply.
        return Ok(());
    };

    let code: u32 = postal.parse().map_err(|_| AddressError::PostalFormat)?;
    if code < min || code > max {
        return Err(AddressError::PostalOutOfRange {
            postal: postal.to_string(),
            state: state.trim().to_ascii_uppercase(),
            min,
            max,
        });
    }

    Ok(())
}
