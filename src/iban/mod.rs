use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::kv::KvStore;

const COUNTRY_CODE: &str = "BG";
const IBAN_LENGTH: usize = 22;
const VALID_MOD_RESULT: u64 = 1;
const CACHE_KEY_PREFIX: &str = "iban:valid:";
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

// MOD 97-10 is folded over fixed-size chunks so no intermediate
// exceeds u64: remainder < 97, chunk < 10^9.
const MOD97_CHUNK_DIGITS: usize = 9;

const REASON_CHECKSUM: &str = "Invalid IBAN checksum";

/// Outcome of a single IBAN validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbanCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl IbanCheck {
    fn valid() -> Self {
        IbanCheck { valid: true, reason: None }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        IbanCheck {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Bulgarian IBAN validator with a KV-cached checksum result.
///
/// Cache traffic is best-effort in both directions: a KV failure never
/// changes the returned result.
pub struct IbanValidator {
    kv: Arc<dyn KvStore>,
}

impl IbanValidator {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        IbanValidator { kv }
    }

    /// Trim, uppercase, and strip all whitespace.
    pub fn normalize(raw: &str) -> String {
        raw.trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    pub async fn validate(&self, raw: &str) -> IbanCheck {
        let iban = Self::normalize(raw);

        if iban.is_empty() {
            return IbanCheck::invalid("IBAN cannot be null or empty");
        }

        if let Some(cached) = self.check_cache(&iban).await {
            debug!(iban = %mask(&iban), "IBAN cache hit");
            return if cached {
                IbanCheck::valid()
            } else {
                IbanCheck::invalid(REASON_CHECKSUM)
            };
        }

        if !iban.starts_with(COUNTRY_CODE) {
            return IbanCheck::invalid("IBAN must start with BG");
        }

        // Char-wise so arbitrary input cannot trip a slice boundary;
        // after these checks the string is known ASCII.
        let chars: Vec<char> = iban.chars().collect();

        if chars.len() != IBAN_LENGTH {
            return IbanCheck::invalid(format!(
                "Bulgarian IBAN must be exactly {IBAN_LENGTH} characters, got {}",
                chars.len()
            ));
        }

        if !chars[2..4].iter().all(char::is_ascii_digit) {
            return IbanCheck::invalid("Check digits must be numeric");
        }

        if !chars[4..]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return IbanCheck::invalid("IBAN contains invalid characters");
        }

        let is_valid = checksum_is_valid(&iban);
        self.cache_result(&iban, is_valid).await;

        if is_valid {
            IbanCheck::valid()
        } else {
            IbanCheck::invalid(REASON_CHECKSUM)
        }
    }

    async fn check_cache(&self, iban: &str) -> Option<bool> {
        let key = format!("{CACHE_KEY_PREFIX}{iban}");
        match self.kv.get(&key).await {
            Ok(Some(value)) => value.parse::<bool>().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "IBAN cache read failed");
                None
            }
        }
    }

    async fn cache_result(&self, iban: &str, is_valid: bool) {
        let key = format!("{CACHE_KEY_PREFIX}{iban}");
        if let Err(e) = self.kv.set(&key, if is_valid { "true" } else { "false" }, CACHE_TTL).await
        {
            warn!(error = %e, "IBAN cache write failed");
        }
    }
}

/// ISO 7064 MOD 97-10: move the first four characters to the end,
/// substitute letters by ordinal + 9, and fold the digit string mod 97.
fn checksum_is_valid(iban: &str) -> bool {
    let rearranged: String = iban[4..].chars().chain(iban[..4].chars()).collect();

    let mut digits = String::with_capacity(rearranged.len() * 2);
    for c in rearranged.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            let value = (c as u8 - b'A') as u32 + 10;
            digits.push_str(&value.to_string());
        }
    }

    mod97(&digits) == VALID_MOD_RESULT
}

fn mod97(digits: &str) -> u64 {
    let bytes = digits.as_bytes();
    let mut remainder: u64 = 0;

    for chunk in bytes.chunks(MOD97_CHUNK_DIGITS) {
        for &b in chunk {
            remainder = remainder * 10 + u64::from(b - b'0');
        }
        remainder %= 97;
    }

    remainder
}

/// Keep full IBANs out of log lines.
pub fn mask(iban: &str) -> String {
    let chars: Vec<char> = iban.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}
