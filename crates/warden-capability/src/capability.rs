//! Capability tokens.
//!
//! A capability is an opaque, namespaced permission string of the form
//! `scope:resource` (for example `execute:calculations`). Tokens are
//! compared by exact string equality; there is no hierarchical or wildcard
//! matching.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, CapabilityResult};

/// A namespaced permission token.
///
/// Construct tokens with [`Capability::parse`] (or `str::parse`), which
/// enforces the `scope:resource` grammar. Each half is a non-empty run of
/// ASCII letters, digits, `_`, `-` or `.`.
///
/// # Example
///
/// ```
/// use warden_capability::Capability;
///
/// let cap = Capability::parse("execute:calculations").unwrap();
/// assert_eq!(cap.scope(), "execute");
/// assert_eq!(cap.resource(), "calculations");
///
/// assert!(Capability::parse("execute").is_err());
/// assert!(Capability::parse("execute:*").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// Parse and validate a capability token.
    pub fn parse(token: impl Into<Cow<'static, str>>) -> CapabilityResult<Self> {
        let token = token.into();
        validate_token(&token)?;
        Ok(Self(token))
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `:`.
    pub fn scope(&self) -> &str {
        self.0.split_once(':').map(|(scope, _)| scope).unwrap_or("")
    }

    /// The part after the `:`.
    pub fn resource(&self) -> &str {
        self.0
            .split_once(':')
            .map(|(_, resource)| resource)
            .unwrap_or("")
    }
}

fn validate_token(token: &str) -> CapabilityResult<()> {
    let invalid = |reason: &str| CapabilityError::InvalidToken {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    if token.is_empty() {
        return Err(invalid("token is empty"));
    }

    let Some((scope, resource)) = token.split_once(':') else {
        return Err(invalid("expected the form 'scope:resource'"));
    };

    if scope.is_empty() {
        return Err(invalid("scope is empty"));
    }
    if resource.is_empty() {
        return Err(invalid("resource is empty"));
    }
    if resource.contains(':') {
        return Err(invalid("more than one ':' separator"));
    }

    for part in [scope, resource] {
        if let Some(bad) = part.chars().find(|c| !is_token_char(*c)) {
            return Err(invalid(&format!("character '{}' is not allowed", bad)));
        }
    }

    Ok(())
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Capability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.to_string())
    }
}

impl TryFrom<String> for Capability {
    type Error = CapabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&'static str> for Capability {
    type Error = CapabilityError;

    fn try_from(value: &'static str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> Self {
        cap.0.into_owned()
    }
}

/// Well-known capability tokens used by the standard library.
pub mod standard {
    use super::Capability;
    use std::borrow::Cow;

    /// Numeric computation beyond trivial arithmetic.
    pub const EXECUTE_CALCULATIONS: Capability =
        Capability(Cow::Borrowed("execute:calculations"));

    /// Reading the system clock.
    pub const SYSTEM_CLOCK: Capability = Capability(Cow::Borrowed("system:clock"));

    /// Serializing guest values to external formats.
    pub const DATA_SERIALIZE: Capability = Capability(Cow::Borrowed("data:serialize"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let cap = Capability::parse("execute:calculations").unwrap();
        assert_eq!(cap.as_str(), "execute:calculations");
        assert_eq!(cap.scope(), "execute");
        assert_eq!(cap.resource(), "calculations");

        assert!(Capability::parse("fs.read:user-data_v2").is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for token in [
            "",
            "execute",
            ":calculations",
            "execute:",
            "a:b:c",
            "execute:*",
            "exe cute:x",
            "execute:calc/ulations",
        ] {
            let result = Capability::parse(token);
            assert!(
                matches!(result, Err(CapabilityError::InvalidToken { .. })),
                "expected '{}' to be rejected",
                token
            );
        }
    }

    #[test]
    fn test_exact_equality() {
        let a: Capability = "execute:calculations".parse().unwrap();
        let b = Capability::parse(String::from("execute:calculations")).unwrap();
        let c: Capability = "execute:other".parse().unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_standard_tokens_are_valid() {
        for cap in [
            standard::EXECUTE_CALCULATIONS,
            standard::SYSTEM_CLOCK,
            standard::DATA_SERIALIZE,
        ] {
            assert!(Capability::parse(cap.as_str().to_string()).is_ok());
        }
    }

    #[test]
    fn test_serde_validates() {
        let cap: Capability = serde_json::from_str("\"system:clock\"").unwrap();
        assert_eq!(cap, standard::SYSTEM_CLOCK);
        assert_eq!(serde_json::to_string(&cap).unwrap(), "\"system:clock\"");

        let bad: Result<Capability, _> = serde_json::from_str("\"clock\"");
        assert!(bad.is_err());
    }
}
