use chrono::{NaiveDate, NaiveTime, Timelike};

/// This is the standard way of converting a date to a string in ramadan-planner.
pub fn date_to_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Wall clock minute used when matching reminders. Seconds are dropped.
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(time)
}

pub fn parse_hhmm(value: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| anyhow::anyhow!("`{value}` is not a HH:MM time: {e}"))
}

/// Times are stored as `HH:MM` strings so that backups stay readable.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_hhmm(&s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{self, Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            // Older exports store an empty string for "no time".
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if s.trim().is_empty() => Ok(None),
                Some(s) => super::super::parse_hhmm(&s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_seconds() {
        let time = NaiveTime::from_hms_opt(5, 30, 42).unwrap();
        assert_eq!(
            truncate_to_minute(time),
            NaiveTime::from_hms_opt(5, 30, 0).unwrap()
        );
    }

    #[test]
    fn parses_hhmm() {
        assert_eq!(
            parse_hhmm(" 04:45 ").unwrap(),
            NaiveTime::from_hms_opt(4, 45, 0).unwrap()
        );
        assert!(parse_hhmm("25:00").is_err());
    }
}
