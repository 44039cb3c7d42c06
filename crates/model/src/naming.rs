//! Positional compartment and parameter names.
//!
//! A stratified name is its base name followed by one `X<stratification>_<stratum>`
//! token per applied stratification, in application order:
//!
//! ```text
//! infectiousXage_15Xstrain_mdr
//! ```
//!
//! Stratification names may not contain `_` or `X`, and strata may not contain
//! `X`, so every name splits back into its parts unambiguously.

use crate::StructuralError;

/// Separates the base name from each stratification token.
pub const DELIMITER: char = 'X';

/// Separates a stratification name from its stratum inside a token.
pub const STRATUM_SEPARATOR: char = '_';

/// Appends one stratification token to `name`.
#[must_use]
pub fn stratified_name(name: &str, stratification: &str, stratum: &str) -> String {
    format!("{name}{DELIMITER}{stratification}{STRATUM_SEPARATOR}{stratum}")
}

/// Returns the base name, without any stratification tokens.
#[must_use]
pub fn base_name(name: &str) -> &str {
    name.split(DELIMITER).next().unwrap_or(name)
}

/// Splits a name into its base and its `(stratification, stratum)` pairs.
#[must_use]
pub fn parse(name: &str) -> (&str, Vec<(&str, &str)>) {
    let mut tokens = name.split(DELIMITER);
    let base = tokens.next().unwrap_or(name);
    let strata = tokens
        .map(|token| {
            token
                .split_once(STRATUM_SEPARATOR)
                .unwrap_or((token, ""))
        })
        .collect();
    (base, strata)
}

/// Returns the stratum `name` belongs to in `stratification`, if stratified by it.
#[must_use]
pub fn stratum_of<'a>(name: &'a str, stratification: &str) -> Option<&'a str> {
    parse(name)
        .1
        .into_iter()
        .find_map(|(applied, stratum)| (applied == stratification).then_some(stratum))
}

/// Whether `name` is selected by `query`.
///
/// A query selects a name when their bases are equal and every token of the
/// query also appears in the name. A bare base name therefore selects all of
/// its strata, and a full name selects exactly itself.
#[must_use]
pub fn matches(name: &str, query: &str) -> bool {
    if name == query {
        return true;
    }
    let (base, strata) = parse(name);
    let (query_base, query_strata) = parse(query);
    base == query_base && query_strata.iter().all(|token| strata.contains(token))
}

/// Checks a base compartment or parameter name.
pub(crate) fn validate_base(name: &str) -> Result<(), StructuralError> {
    if name.is_empty() || name.contains(DELIMITER) {
        return Err(StructuralError::InvalidName {
            name: name.to_owned(),
            reason: "base names must be non-empty and may not contain 'X'",
        });
    }
    Ok(())
}

pub(crate) fn validate_stratification(name: &str) -> Result<(), StructuralError> {
    if name.is_empty() || name.contains(DELIMITER) || name.contains(STRATUM_SEPARATOR) {
        return Err(StructuralError::InvalidName {
            name: name.to_owned(),
            reason: "stratification names must be non-empty and may not contain 'X' or '_'",
        });
    }
    Ok(())
}

pub(crate) fn validate_stratum(stratum: &str) -> Result<(), StructuralError> {
    if stratum.is_empty() || stratum.contains(DELIMITER) {
        return Err(StructuralError::InvalidName {
            name: stratum.to_owned(),
            reason: "strata must be non-empty and may not contain 'X'",
        });
    }
    Ok(())
}
