//! Configuration key decoding
//!
//! Experiment directories and artifact files embed their protocol parameters
//! as `<tag>-<int>` substrings, e.g.
//! `2022-05-11 16:52:16+08:00_round-50_echo-20` or `round-50_pi5x5_echo-20`.
//! Parameters are located by tag, never by position, so extra segments and
//! reordered tags decode the same way.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tag carrying the round interval (ms)
pub const ROUND_TAG: &str = "round-";
/// Tag carrying the batched echo interval (ms)
pub const ECHO_TAG: &str = "echo-";
/// Tag carrying the payload size (bytes)
pub const PAYLOAD_TAG: &str = "payload-";

/// Find the integer following `tag` in `identifier`.
///
/// A tag only counts when it starts the identifier or follows a
/// non-alphanumeric delimiter (`_`, `/`, space, ...), and must be followed by
/// at least one digit. When the tag occurs more than once the last occurrence
/// wins, which is the one closest to the file in a path. If that occurrence
/// does not fit in a `u64` the tag counts as absent.
///
/// # Example
///
/// ```rust
/// use rb_bench_analysis::config_key::{find_tag, ECHO_TAG};
///
/// assert_eq!(find_tag("round-50_pi5x5_echo-20", ECHO_TAG), Some(20));
/// assert_eq!(find_tag("round-50", ECHO_TAG), None);
/// ```
#[must_use]
pub fn find_tag(identifier: &str, tag: &str) -> Option<u64> {
    let mut found = None;
    for (start, _) in identifier.match_indices(tag) {
        let at_boundary = identifier[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        if !at_boundary {
            continue;
        }

        let rest = &identifier[start + tag.len()..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            continue;
        }
        found = rest[..digits].parse::<u64>().ok();
    }
    found
}

/// Like [`find_tag`], but a missing tag is a [`Error::MalformedKey`].
///
/// # Errors
///
/// Returns `MalformedKey` when `tag` followed by an integer is not present.
pub fn require_tag(identifier: &str, tag: &str) -> Result<u64> {
    find_tag(identifier, tag).ok_or_else(|| Error::MalformedKey {
        identifier: identifier.to_string(),
        tag: tag.to_string(),
    })
}

/// Protocol parameters an observation was produced under.
///
/// Ordering follows the declared numeric order: baseline runs first, then
/// protocol runs by round interval and echo interval.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationKey {
    /// Plain pub/sub run without reliable broadcast
    #[default]
    Baseline,
    /// Reliable-broadcast run
    Protocol {
        /// Round interval (ms)
        round_interval: u64,
        /// Batched echo interval (ms)
        echo_interval: u64,
    },
}

impl ConfigurationKey {
    /// Key for a reliable-broadcast run.
    #[must_use]
    pub const fn protocol(round_interval: u64, echo_interval: u64) -> Self {
        Self::Protocol {
            round_interval,
            echo_interval,
        }
    }

    /// Decode a protocol key from an artifact identifier.
    ///
    /// Both `round-<int>` and `echo-<int>` are required.
    ///
    /// # Errors
    ///
    /// Returns `MalformedKey` naming the first missing tag.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rb_bench_analysis::config_key::ConfigurationKey;
    ///
    /// let a = ConfigurationKey::decode("round-50_echo-20")?;
    /// let b = ConfigurationKey::decode("round-50_pi5x5_echo-20")?;
    /// assert_eq!(a, b);
    /// assert_eq!(a, ConfigurationKey::protocol(50, 20));
    /// # Ok::<(), rb_bench_analysis::Error>(())
    /// ```
    pub fn decode(identifier: &str) -> Result<Self> {
        let round_interval = require_tag(identifier, ROUND_TAG)?;
        let echo_interval = require_tag(identifier, ECHO_TAG)?;
        Ok(Self::protocol(round_interval, echo_interval))
    }

    /// Round interval, if this is a protocol key.
    #[must_use]
    pub const fn round_interval(&self) -> Option<u64> {
        match self {
            Self::Baseline => None,
            Self::Protocol { round_interval, .. } => Some(*round_interval),
        }
    }

    /// Echo interval, if this is a protocol key.
    #[must_use]
    pub const fn echo_interval(&self) -> Option<u64> {
        match self {
            Self::Baseline => None,
            Self::Protocol { echo_interval, .. } => Some(*echo_interval),
        }
    }

    /// Whether this key marks a baseline run.
    #[must_use]
    pub const fn is_baseline(&self) -> bool {
        matches!(self, Self::Baseline)
    }
}

impl fmt::Display for ConfigurationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => f.write_str("baseline"),
            Self::Protocol {
                round_interval,
                echo_interval,
            } => write!(f, "{round_interval}-{echo_interval}"),
        }
    }
}

/// Parameters decoded from one artifact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParameters {
    /// Protocol parameters of the run
    pub configuration_key: ConfigurationKey,
    /// Payload size from a `payload-<int>` tag, if the identifier has one
    pub payload_size: Option<u64>,
}

impl RunParameters {
    /// Decode every tag of `identifier`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedKey` when `round-` or `echo-` is missing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rb_bench_analysis::config_key::{ConfigurationKey, RunParameters};
    ///
    /// let params = RunParameters::decode("round-50_echo-20/payload-128/exp_sub_3.json")?;
    /// assert_eq!(params.configuration_key, ConfigurationKey::protocol(50, 20));
    /// assert_eq!(params.payload_size, Some(128));
    /// # Ok::<(), rb_bench_analysis::Error>(())
    /// ```
    pub fn decode(identifier: &str) -> Result<Self> {
        Ok(Self {
            configuration_key: ConfigurationKey::decode(identifier)?,
            payload_size: find_tag(identifier, PAYLOAD_TAG),
        })
    }
}

/// Where the loader takes an artifact's configuration key from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Decode `round-`/`echo-` tags from the artifact path
    #[default]
    Decode,
    /// Use the same key for every artifact (e.g. a baseline directory)
    Fixed(ConfigurationKey),
}

impl KeySource {
    /// Resolve the parameters of one artifact identifier.
    ///
    /// The payload tag is read from the identifier for either source.
    ///
    /// # Errors
    ///
    /// Returns `MalformedKey` when decoding and a tag is missing.
    pub fn resolve(&self, identifier: &str) -> Result<RunParameters> {
        match self {
            Self::Decode => RunParameters::decode(identifier),
            Self::Fixed(key) => Ok(RunParameters {
                configuration_key: *key,
                payload_size: find_tag(identifier, PAYLOAD_TAG),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_extra_segments() {
        let plain = ConfigurationKey::decode("round-50_echo-20").unwrap();
        let extra = ConfigurationKey::decode("round-50_pi5x5_echo-20").unwrap();
        assert_eq!(plain, extra);
        assert_eq!(plain.round_interval(), Some(50));
        assert_eq!(plain.echo_interval(), Some(20));
    }

    #[test]
    fn test_decode_reordered_tags() {
        let key = ConfigurationKey::decode("echo-40_round-100").unwrap();
        assert_eq!(key, ConfigurationKey::protocol(100, 40));
    }

    #[test]
    fn test_decode_full_path_uses_last_occurrence() {
        let path = "./rb/2022-05-11 21:42:43+08:00_round-50_echo-20_1/exp_logs/test/payload/128/exp_sub_0.json";
        let key = ConfigurationKey::decode(path).unwrap();
        assert_eq!(key, ConfigurationKey::protocol(50, 20));

        assert_eq!(find_tag("round-1/round-7", ROUND_TAG), Some(7));
    }

    #[test]
    fn test_overflowing_closest_tag_is_malformed() {
        let path = "round-50_echo-20/round-99999999999999999999_echo-20/exp_sub_0.json";
        assert_eq!(find_tag(path, ROUND_TAG), None);
        match ConfigurationKey::decode(path).unwrap_err() {
            Error::MalformedKey { tag, .. } => assert_eq!(tag, ROUND_TAG),
            other => panic!("unexpected error: {other}"),
        }

        // A later usable occurrence still wins.
        assert_eq!(find_tag("round-99999999999999999999/round-5", ROUND_TAG), Some(5));
    }

    #[test]
    fn test_run_parameters_carry_payload_tag() {
        let params = RunParameters::decode("round-50_echo-20/payload-128/exp_sub_3.json").unwrap();
        assert_eq!(params.configuration_key, ConfigurationKey::protocol(50, 20));
        assert_eq!(params.payload_size, Some(128));

        let untagged = RunParameters::decode("round-50_echo-20/payload/128/exp_sub_3.json").unwrap();
        assert_eq!(untagged.payload_size, None);
    }

    #[test]
    fn test_missing_tag_is_malformed() {
        let err = ConfigurationKey::decode("round-50_pi5x5").unwrap_err();
        match err {
            Error::MalformedKey { tag, .. } => assert_eq!(tag, ECHO_TAG),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tag_requires_boundary_and_digits() {
        assert_eq!(find_tag("background-5", ROUND_TAG), None);
        assert_eq!(find_tag("round-_echo-3", ROUND_TAG), None);
        assert_eq!(find_tag("payload-4096", PAYLOAD_TAG), Some(4096));
        assert!(require_tag("payload-", PAYLOAD_TAG).is_err());
    }

    #[test]
    fn test_key_ordering_is_numeric() {
        let mut keys = vec![
            ConfigurationKey::protocol(100, 40),
            ConfigurationKey::protocol(50, 20),
            ConfigurationKey::Baseline,
            ConfigurationKey::protocol(50, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ConfigurationKey::Baseline,
                ConfigurationKey::protocol(50, 1),
                ConfigurationKey::protocol(50, 20),
                ConfigurationKey::protocol(100, 40),
            ]
        );
    }

    #[test]
    fn test_display_label() {
        assert_eq!(ConfigurationKey::protocol(50, 20).to_string(), "50-20");
        assert_eq!(ConfigurationKey::Baseline.to_string(), "baseline");
    }

    #[test]
    fn test_key_source_fixed() {
        let source = KeySource::Fixed(ConfigurationKey::Baseline);
        let params = source.resolve("payload-64/no protocol tags").unwrap();
        assert_eq!(params.configuration_key, ConfigurationKey::Baseline);
        assert_eq!(params.payload_size, Some(64));
        assert!(KeySource::Decode.resolve("no tags here").is_err());
    }
}
