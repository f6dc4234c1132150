use chrono::{DateTime, TimeDelta, Utc};
use nexus_extensibility::data_model::SamplePeriod;

/// Time arithmetic on the canonical integer axis: nanoseconds since the Unix
/// epoch ("ticks"), which is also the on-disk representation of the cache
/// interval index.
pub struct TimeUtilities;

impl TimeUtilities {
    /// The number of ticks since the Unix epoch.
    pub fn ticks_of(value: DateTime<Utc>) -> i64 {
        value.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    /// The instant at the given number of ticks since the Unix epoch.
    pub fn from_ticks(ticks: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(ticks)
    }

    /// Rounds down to the previous multiple of the period.
    pub fn floor(value: DateTime<Utc>, period: &SamplePeriod) -> DateTime<Utc> {
        Self::floor_ticks(value, period.as_nanos())
    }

    /// Rounds down to the previous multiple of the period given in ticks.
    pub fn floor_ticks(value: DateTime<Utc>, period_ticks: i64) -> DateTime<Utc> {
        let ticks = Self::ticks_of(value);

        Self::from_ticks(ticks.div_euclid(period_ticks) * period_ticks)
    }

    /// Rounds up to the next multiple of the period.
    pub fn ceil(value: DateTime<Utc>, period: &SamplePeriod) -> DateTime<Utc> {
        let ticks = Self::ticks_of(value);
        let period_ticks = period.as_nanos();
        let remainder = ticks.rem_euclid(period_ticks);

        if remainder == 0 {
            value
        } else {
            Self::from_ticks(ticks - remainder + period_ticks)
        }
    }

    /// Whether the instant is aligned to a multiple of the period.
    pub fn is_aligned(value: DateTime<Utc>, period: &SamplePeriod) -> bool {
        Self::ticks_of(value).rem_euclid(period.as_nanos()) == 0
    }

    /// The number of whole periods between begin and end.
    pub fn element_count(
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        period: &SamplePeriod,
    ) -> usize {
        let duration = Self::ticks_of(end) - Self::ticks_of(begin);

        (duration / period.as_nanos()).max(0) as usize
    }

    /// One UTC day, the length of a cache file bucket.
    pub fn one_day() -> TimeDelta {
        TimeDelta::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    #[test]
    fn floors_and_ceils_to_period_multiples() {
        let period = SamplePeriod::from_unit_string("1_h").unwrap();
        let value = instant("2020-01-01T10:30:00Z");

        assert_eq!(
            TimeUtilities::floor(value, &period),
            instant("2020-01-01T10:00:00Z")
        );
        assert_eq!(
            TimeUtilities::ceil(value, &period),
            instant("2020-01-01T11:00:00Z")
        );

        let aligned = instant("2020-01-01T10:00:00Z");
        assert_eq!(TimeUtilities::ceil(aligned, &period), aligned);
    }

    #[test]
    fn counts_elements() {
        let period = SamplePeriod::from_unit_string("10_ms").unwrap();

        assert_eq!(
            TimeUtilities::element_count(
                instant("2020-01-01T00:00:00Z"),
                instant("2020-01-01T00:00:01Z"),
                &period
            ),
            100
        );
    }
}
