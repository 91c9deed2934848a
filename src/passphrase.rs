//! The passphrase-generation utility: a policy-driven character picker
//!.
//!
//! Pools are fixed by the specification, not configurable; `easyview` swaps
//! in the pools with visually confusable characters removed (no `0`/`O`,
//! `1`/`l`/`I`, etc).

use crate::error::{Error, Result};
use crate::random::fill_random;

const DIGITS: &str = "0123456789";
const DIGITS_EASYVIEW: &str = "346789";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const LOWERCASE_EASYVIEW: &str = "abcdefghijkmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const UPPERCASE_EASYVIEW: &str = "ABCDEFGHJKLMNPQRTUVWXY";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.<>/?";

/// Configuration for [`make_password`]: which character classes to draw
/// from, the desired output length, and whether to avoid visually
/// confusable characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    pub use_digits: bool,
    pub use_lowercase: bool,
    pub use_uppercase: bool,
    pub use_symbols: bool,
    pub easyview: bool,
}

impl PasswordPolicy {
    fn pools(&self) -> Vec<&'static str> {
        let mut pools = Vec::new();
        if self.use_digits {
            pools.push(if self.easyview { DIGITS_EASYVIEW } else { DIGITS });
        }
        if self.use_lowercase {
            pools.push(if self.easyview { LOWERCASE_EASYVIEW } else { LOWERCASE });
        }
        if self.use_uppercase {
            pools.push(if self.easyview { UPPERCASE_EASYVIEW } else { UPPERCASE });
        }
        if self.use_symbols {
            pools.push(SYMBOLS);
        }
        pools
    }
}

/// Picks a random index into `pool` and returns the character there.
///
/// Only tracks the character classes the policy actually enables, not all
/// four unconditionally — the termination condition below depends on this:
/// a policy with, say, only digits enabled must not wait for an uppercase
/// letter that can never be drawn.
fn pick(pool: &str) -> char {
    let chars: Vec<char> = pool.chars().collect();
    let mut index_bytes = [0u8; 4];
    fill_random(&mut index_bytes);
    let index = u32::from_le_bytes(index_bytes) as usize % chars.len();
    chars[index]
}

/// Generates a password satisfying `policy`: exactly `policy.length`
/// characters, at least one drawn from each enabled class, every character
/// drawn from an enabled pool.
///
/// Fails with `Error::InvalidPassphrasePolicy` if no character class is
/// enabled, or if `length` is too short to fit one character from each
/// enabled class.
pub fn make_password(policy: &PasswordPolicy) -> Result<String> {
    let pools = policy.pools();
    if pools.is_empty() || policy.length < pools.len() {
        return Err(Error::InvalidPassphrasePolicy);
    }

    let mut chars: Vec<char> = pools.iter().map(|pool| pick(pool)).collect();
    let combined: String = pools.concat();
    while chars.len() < policy.length {
        chars.push(pick(&combined));
    }

    // Shuffle (Fisher-Yates) so the guaranteed one-per-class characters
    // aren't always in the same leading positions.
    for i in (1..chars.len()).rev() {
        let mut index_bytes = [0u8; 4];
        fill_random(&mut index_bytes);
        let j = u32::from_le_bytes(index_bytes) as usize % (i + 1);
        chars.swap(i, j);
    }

    Ok(chars.into_iter().collect())
}

/// A password is weak unless it is at least 4 characters long and contains
/// at least one lowercase letter, one uppercase letter, and one digit-or-
/// symbol character.
pub fn is_weak(password: &str) -> bool {
    if password.chars().count() < 4 {
        return true;
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit_or_symbol = password.chars().any(|c| c.is_ascii_digit() || !c.is_ascii_alphanumeric());
    !(has_lower && has_upper && has_digit_or_symbol)
}
