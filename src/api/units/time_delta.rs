/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Deserializer};

// TimeDelta represents the difference between two timestamps. Commonly this can
// be a duration, ex. the congested hangover period or a trend validity window.
// Configuration spells it the human way: "3s", "200ms", "1m 30s".
super::relative_unit!(TimeDelta);

impl TimeDelta {
    pub const fn from_seconds(value: i64) -> Self {
        Self::from_fraction(1_000_000, value)
    }

    pub const fn from_millis(value: i64) -> Self {
        Self::from_fraction(1_000, value)
    }

    pub const fn from_micros(value: i64) -> Self {
        Self::from_value(value)
    }

    pub const fn seconds(&self) -> i64 {
        self.to_fraction(1_000_000)
    }

    pub const fn ms(&self) -> i64 {
        self.to_fraction(1_000)
    }

    pub const fn us(&self) -> i64 {
        self.to_value()
    }
}

/// Sub-microsecond precision is dropped; durations past the i64 range become
/// plus infinity.
impl From<Duration> for TimeDelta {
    fn from(duration: Duration) -> Self {
        match i64::try_from(duration.as_micros()) {
            Ok(us) if us < i64::MAX => Self::from_micros(us),
            _ => Self::plus_infinity(),
        }
    }
}

impl FromStr for TimeDelta {
    type Err = humantime::DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        humantime::parse_duration(s.trim()).map(Self::from)
    }
}

impl<'de> Deserialize<'de> for TimeDelta {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let duration: Duration = humantime_serde::deserialize(deserializer)?;
        Ok(Self::from(duration))
    }
}

impl fmt::Debug for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_plus_infinity() {
            write!(f, "+inf")
        } else if self.is_minus_infinity() {
            write!(f, "-inf")
        } else if self.us() == 0 || (self.us() % 1000) != 0 {
            write!(f, "{}us", self.us())
        } else if self.ms() % 1000 != 0 {
            write!(f, "{}ms", self.ms())
        } else {
            write!(f, "{}s", self.seconds())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_conversions() {
        const VALUE: i64 = 3000000;
        assert_eq!(TimeDelta::from_micros(VALUE).seconds(), VALUE / 1000000);
        assert_eq!(TimeDelta::from_millis(VALUE).seconds(), VALUE / 1000);
        assert_eq!(TimeDelta::from_micros(VALUE).ms(), VALUE / 1000);
        assert_eq!(TimeDelta::from_millis(VALUE).us(), VALUE * 1000);
        assert_eq!(TimeDelta::from_seconds(VALUE).ms(), VALUE * 1000);
    }

    #[test]
    fn comparison_and_math() {
        let small = TimeDelta::from_millis(450);
        let large = TimeDelta::from_millis(451);
        assert!(small < large);
        assert!(TimeDelta::zero() > TimeDelta::from_millis(-450));
        assert!(TimeDelta::plus_infinity() > large);
        assert_eq!((large - small).us(), 1000);
        assert_eq!(-small, TimeDelta::from_millis(-450));
    }

    #[test]
    fn from_std_duration() {
        assert_eq!(
            TimeDelta::from(Duration::from_millis(1500)),
            TimeDelta::from_millis(1500)
        );
        assert_eq!(TimeDelta::from(Duration::from_nanos(2_999)), TimeDelta::from_micros(2));
        assert!(TimeDelta::from(Duration::MAX).is_plus_infinity());
    }

    #[test]
    fn parses_config_durations() {
        assert_eq!("3s".parse(), Ok(TimeDelta::from_seconds(3)));
        assert_eq!("200ms".parse(), Ok(TimeDelta::from_millis(200)));
        assert_eq!("1m 30s".parse(), Ok(TimeDelta::from_seconds(90)));
        assert_eq!("1m30s".parse(), Ok(TimeDelta::from_seconds(90)));
        assert_eq!("250us".parse(), Ok(TimeDelta::from_micros(250)));
        assert_eq!("500ns".parse(), Ok(TimeDelta::zero()));
        assert_eq!("1500000ns".parse(), Ok(TimeDelta::from_micros(1500)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!("".parse::<TimeDelta>().is_err());
        assert!("10".parse::<TimeDelta>().is_err());
        assert!("10parsecs".parse::<TimeDelta>().is_err());
        assert!("soon".parse::<TimeDelta>().is_err());
    }

    #[test]
    fn formats_for_logs() {
        assert_eq!(format!("{:?}", TimeDelta::from_seconds(3)), "3s");
        assert_eq!(format!("{:?}", TimeDelta::from_millis(200)), "200ms");
        assert_eq!(format!("{:?}", TimeDelta::from_micros(1500)), "1500us");
    }
}
