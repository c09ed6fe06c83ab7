use serde::{Deserialize, Deserializer, de};
use std::str::FromStr;
use std::time::Duration;

/// Treat an empty string the same as an absent value.
///
/// Flags like `--metrics-exporter.license ""` or `LICENSE=` in an env file
/// should behave as if the option was never given.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `deserialize_with` counterpart of [`non_empty`] for TOML config files.
pub fn deserialize_non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(non_empty(value))
}

/// Parse a duration given either as bare seconds (`30`) or with units
/// (`30s`, `3m`, `1h2m`).
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(seconds) = u64::from_str(value) {
        return Ok(Duration::from_secs(seconds));
    }
    humanize_rs::duration::parse(value)
        .map_err(|e| format!("invalid duration '{value}': {e}"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Fractional(f64),
    Text(String),
}

/// `deserialize_with` for durations in TOML: integer or float seconds, or a
/// string accepted by [`parse_duration`].
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
        RawDuration::Fractional(seconds) => {
            Duration::try_from_secs_f64(seconds).map_err(de::Error::custom)
        }
        RawDuration::Text(text) => parse_duration(&text).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Timing {
        #[serde(deserialize_with = "super::deserialize_duration")]
        interval: Duration,
    }

    #[derive(serde::Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "super::deserialize_non_empty")]
        license: Option<String>,
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some("abc".to_string())), Some("abc".to_string()));
    }

    #[test]
    fn test_deserialize_non_empty() {
        let parsed: Wrapper = toml::from_str(r#"license = """#).unwrap();
        assert_eq!(parsed.license, None);

        let parsed: Wrapper = toml::from_str(r#"license = "tok""#).unwrap();
        assert_eq!(parsed.license.as_deref(), Some("tok"));

        let parsed: Wrapper = toml::from_str("").unwrap();
        assert_eq!(parsed.license, None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("1h2m").unwrap(), Duration::from_secs(3720));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_deserialize_duration() {
        let parsed: Timing = toml::from_str("interval = 20").unwrap();
        assert_eq!(parsed.interval, Duration::from_secs(20));

        let parsed: Timing = toml::from_str("interval = 7.5").unwrap();
        assert_eq!(parsed.interval, Duration::from_millis(7500));

        let parsed: Timing = toml::from_str(r#"interval = "2m""#).unwrap();
        assert_eq!(parsed.interval, Duration::from_secs(120));

        assert!(toml::from_str::<Timing>(r#"interval = "soon""#).is_err());
        assert!(toml::from_str::<Timing>("interval = -3").is_err());
    }
}
