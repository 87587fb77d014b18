/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

// DataRate represents a given data rate, ex. a receiver estimate or the
// expected bandwidth usage of a sender. The internal storage is bits per second
// (bps). Values are not required to be positive; feedback is trusted as-is.

use std::fmt;

super::relative_unit!(DataRate);

impl DataRate {
    pub const fn from_bits_per_sec(value: i64) -> Self {
        Self::from_value(value)
    }

    /// Truncates towards zero.
    pub fn from_bits_per_sec_float(value: f64) -> Self {
        Self::from_value_float(value)
    }

    pub const fn from_kilobits_per_sec(value: i64) -> Self {
        Self::from_fraction(1_000, value)
    }

    pub const fn from_megabits_per_sec(value: i64) -> Self {
        Self::from_fraction(1_000_000, value)
    }

    pub const fn bps(&self) -> i64 {
        self.to_value()
    }

    pub fn bps_float(&self) -> f64 {
        self.to_value_float()
    }

    pub const fn kbps(&self) -> i64 {
        self.to_fraction(1_000)
    }
}

impl fmt::Debug for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_plus_infinity() {
            write!(f, "+inf bps")
        } else if self.is_minus_infinity() {
            write!(f, "-inf bps")
        } else if self.bps() == 0 || self.bps() % 1000 != 0 {
            write!(f, "{} bps", self.bps())
        } else {
            write!(f, "{} kbps", self.kbps())
        }
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn const_expr() {
        const VALUE: i64 = 12345;
        const RATE_ZERO: DataRate = DataRate::zero();
        const RATE_INF: DataRate = DataRate::plus_infinity();
        assert_eq!(DataRate::default(), RATE_ZERO);
        assert!(RATE_ZERO.is_zero());
        assert!(RATE_INF.is_infinite());
        assert!(RATE_INF > RATE_ZERO);

        const RATE_BPS: DataRate = DataRate::from_bits_per_sec(VALUE);
        const RATE_KBPS: DataRate = DataRate::from_kilobits_per_sec(VALUE);
        assert_eq!(RATE_BPS.bps(), VALUE);
        assert_eq!(RATE_KBPS.kbps(), VALUE);
        assert_eq!(DataRate::from_megabits_per_sec(100).bps(), 100_000_000);
    }

    #[test]
    fn float_conversion_truncates() {
        assert_relative_eq!(DataRate::from_bits_per_sec(128).bps_float(), 128.0);
        assert_eq!(DataRate::from_bits_per_sec_float(128.9).bps(), 128);
        assert_eq!(DataRate::from_bits_per_sec_float(919_999.99).bps(), 919_999);
        assert_eq!(DataRate::from_bits_per_sec_float(-2.7).bps(), -2);
        assert!(DataRate::from_bits_per_sec_float(f64::INFINITY).is_plus_infinity());
    }

    #[test]
    fn negative_rates_are_representable() {
        let rate = DataRate::from_bits_per_sec(-500);
        assert!(rate < DataRate::zero());
        assert_eq!(std::cmp::min(rate, DataRate::from_bits_per_sec(10)), rate);
    }

    #[test]
    fn math_operations() {
        let rate_a = DataRate::from_bits_per_sec(450);
        let rate_b = DataRate::from_bits_per_sec(267);

        assert_eq!((rate_a + rate_b).bps(), 717);
        assert_eq!((rate_a - rate_b).bps(), 183);
        assert_eq!((rate_a * 3).bps(), 1350);
        assert_eq!((rate_a * 0.95).bps(), 427);
        assert_eq!((rate_a / 10).bps(), 45);
        assert_relative_eq!(rate_a / rate_b, 450.0 / 267.0);

        let mut rate = rate_a;
        rate += rate_b;
        assert_eq!(rate.bps(), 717);
        rate -= rate_a;
        assert_eq!(rate, rate_b);
    }

    #[test]
    fn formats_for_logs() {
        assert_eq!(format!("{:?}", DataRate::from_kilobits_per_sec(300)), "300 kbps");
        assert_eq!(format!("{:?}", DataRate::from_bits_per_sec(1234)), "1234 bps");
        assert_eq!(format!("{}", DataRate::plus_infinity()), "+inf bps");
    }
}
