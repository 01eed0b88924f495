use crate::env;

pub const ENV_PROPTEST_CASES: &str = "PROPTEST_CASES";

/// Case count for a proptest block: `PROPTEST_CASES` if set, else `default`.
pub fn proptest_cases(default: u32) -> u32 {
    env::var(ENV_PROPTEST_CASES).unwrap_or(default).max(1)
}
