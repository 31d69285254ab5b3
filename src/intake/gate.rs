//! Entry gate — a five-digit ZIP code unlocks the questionnaire.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::GateError;

/// ASCII digits only; `\d` would also admit other Unicode digits.
static ZIP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}$").unwrap());

/// Validates the ZIP code that starts a quote flow.
#[derive(Debug, Clone, Copy)]
pub struct EntryGate {
    pattern: &'static Regex,
}

impl EntryGate {
    pub fn new() -> Self {
        Self {
            pattern: &ZIP_PATTERN,
        }
    }

    /// Return the normalized ZIP if `input` passes, surrounding whitespace
    /// ignored.
    pub fn check(&self, input: &str) -> Result<String, GateError> {
        let zip = input.trim();
        if self.pattern.is_match(zip) {
            Ok(zip.to_string())
        } else {
            Err(GateError::InvalidZip {
                input: input.to_string(),
            })
        }
    }
}

impl Default for EntryGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_five_digits() {
        let gate = EntryGate::new();
        for zip in ["00000", "90210", "10001", " 62701 "] {
            assert_eq!(gate.check(zip).unwrap(), zip.trim());
        }
    }

    #[test]
    fn gates_share_one_compiled_pattern() {
        let a = EntryGate::new();
        let b = EntryGate::default();
        assert!(std::ptr::eq(a.pattern, b.pattern));
    }

    #[test]
    fn rejects_everything_else() {
        let gate = EntryGate::new();
        for zip in ["", "1234", "123456", "12a45", "12345-6789", "١٢٣٤٥", "12 45"] {
            assert_eq!(
                gate.check(zip),
                Err(GateError::InvalidZip {
                    input: zip.to_string()
                }),
                "{zip:?} should be rejected"
            );
        }
    }
}
