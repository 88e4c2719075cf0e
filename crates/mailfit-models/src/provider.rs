//! Destination provider classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Email provider bucket that selects the attachment size ceiling.
///
/// Unknown provider strings degrade to [`Provider::Other`] instead of
/// failing; a budget must exist for every job regardless of what the
/// upload form sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Outlook,
    #[default]
    #[serde(other)]
    Other,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gmail => "gmail",
            Provider::Outlook => "outlook",
            Provider::Other => "other",
        }
    }
}

impl FromStr for Provider {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "gmail" => Provider::Gmail,
            "outlook" => Provider::Outlook,
            _ => Provider::Other,
        })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers_round_trip() {
        for provider in [Provider::Gmail, Provider::Outlook, Provider::Other] {
            let parsed: Provider = provider.as_str().parse().unwrap();
            assert_eq!(parsed, provider);
        }
    }

    #[test]
    fn test_unknown_string_parses_as_other() {
        let parsed: Provider = "yahoo".parse().unwrap();
        assert_eq!(parsed, Provider::Other);

        let parsed: Provider = "  GMAIL ".parse().unwrap();
        assert_eq!(parsed, Provider::Gmail);
    }

    #[test]
    fn test_serde_tolerates_unknown_provider() {
        let provider: Provider = serde_json::from_str("\"protonmail\"").unwrap();
        assert_eq!(provider, Provider::Other);

        let provider: Provider = serde_json::from_str("\"outlook\"").unwrap();
        assert_eq!(provider, Provider::Outlook);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Gmail).unwrap(), "\"gmail\"");
    }
}
