use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const HOUR_SECS: i64 = 3_600;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlaBucket {
    #[serde(rename = "<=24h")]
    Within24h,
    #[serde(rename = "<=48h")]
    Within48h,
    #[serde(rename = ">48h")]
    Over48h,
}

impl SlaBucket {
    /// Upper bounds are inclusive: exactly 24h is `<=24h`, exactly 48h is `<=48h`.
    pub fn classify(elapsed_secs: i64) -> Self {
        if elapsed_secs <= 24 * HOUR_SECS {
            Self::Within24h
        } else if elapsed_secs <= 48 * HOUR_SECS {
            Self::Within48h
        } else {
            Self::Over48h
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::classify(elapsed_secs(start, end))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaSummary {
    pub count: usize,
    pub within_24h: usize,
    pub within_48h: usize,
    pub over_48h: usize,
    pub average_hours: f64,
    /// Share of the sample that landed in the `<=24h` bucket, in percent.
    pub compliance_rate: f64,
}

/// Running accumulator for one SLA measurement.
#[derive(Clone, Debug, Default)]
pub struct SlaAccumulator {
    count: usize,
    within_24h: usize,
    within_48h: usize,
    over_48h: usize,
    total_secs: i64,
}

impl SlaAccumulator {
    pub fn record(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> SlaBucket {
        let secs = elapsed_secs(start, end);
        let bucket = SlaBucket::classify(secs);
        self.count += 1;
        self.total_secs += secs;
        match bucket {
            SlaBucket::Within24h => self.within_24h += 1,
            SlaBucket::Within48h => self.within_48h += 1,
            SlaBucket::Over48h => self.over_48h += 1,
        }
        bucket
    }

    pub fn summary(&self) -> SlaSummary {
        if self.count == 0 {
            return SlaSummary::default();
        }

        let average_hours = self.total_secs as f64 / HOUR_SECS as f64 / self.count as f64;
        SlaSummary {
            count: self.count,
            within_24h: self.within_24h,
            within_48h: self.within_48h,
            over_48h: self.over_48h,
            average_hours: round_one(average_hours),
            compliance_rate: percentage(self.within_24h, self.count),
        }
    }
}

/// Elapsed seconds, clamped so clock skew never yields a negative duration.
fn elapsed_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().max(0)
}

pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_one(part as f64 / whole as f64 * 100.0)
}

pub(crate) fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
