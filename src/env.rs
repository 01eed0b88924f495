//! Environment knobs shared by the harness and the property tests.

use std::str::FromStr;

/// Parses `value`, treating a missing or unparsable value as unset.
pub(crate) fn parse<T: FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|value| value.trim().parse().ok())
}

pub(crate) fn var<T: FromStr>(name: &str) -> Option<T> {
    parse(std::env::var(name).ok().as_deref())
}
