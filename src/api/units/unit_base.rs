/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

// An i64 backed unit with +/- infinity sentinels.
// Traits don't support const fns, so the shared parts are stamped out by macro.
macro_rules! unit_base {
    ($ty:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $ty(i64);

        impl $ty {
            pub const fn zero() -> Self {
                Self(0)
            }

            pub const fn plus_infinity() -> Self {
                Self(i64::MAX)
            }

            pub const fn minus_infinity() -> Self {
                Self(i64::MIN)
            }

            pub const fn is_zero(&self) -> bool {
                self.0 == 0
            }

            pub const fn is_finite(&self) -> bool {
                !self.is_infinite()
            }

            pub const fn is_infinite(&self) -> bool {
                self.0 == i64::MAX || self.0 == i64::MIN
            }

            pub const fn is_plus_infinity(&self) -> bool {
                self.0 == i64::MAX
            }

            pub const fn is_minus_infinity(&self) -> bool {
                self.0 == i64::MIN
            }

            const fn from_value(value: i64) -> Self {
                assert!(value != i64::MAX && value != i64::MIN);
                Self(value)
            }

            fn from_value_float(value: f64) -> Self {
                assert!(!value.is_nan());
                if value == f64::INFINITY {
                    Self::plus_infinity()
                } else if value == f64::NEG_INFINITY {
                    Self::minus_infinity()
                } else {
                    // Truncates towards zero, saturating at the sentinels.
                    Self::from_value((value as i64).clamp(i64::MIN + 1, i64::MAX - 1))
                }
            }

            const fn from_fraction(denominator: i64, value: i64) -> Self {
                assert!(denominator > 0);
                Self::from_value(value * denominator)
            }

            const fn to_value(&self) -> i64 {
                assert!(self.is_finite());
                self.0
            }

            fn to_value_float(&self) -> f64 {
                if self.is_plus_infinity() {
                    f64::INFINITY
                } else if self.is_minus_infinity() {
                    f64::NEG_INFINITY
                } else {
                    self.0 as f64
                }
            }

            const fn to_fraction(&self, denominator: i64) -> i64 {
                self.divide_round_to_nearest(denominator)
            }

            const fn divide_round_to_nearest(&self, d: i64) -> i64 {
                assert!(d > 0);

                let v = self.to_value();
                let mut result = v / d;
                let remainder = v % d;
                if remainder.abs() * 2 >= d {
                    if v < 0 {
                        result -= 1;
                    } else {
                        result += 1;
                    }
                }
                result
            }
        }
    };
}

// A unit where the difference of two values is the same unit, ex. DataRate.
macro_rules! relative_unit {
    ($ty:ident) => {
        crate::api::units::unit_base!($ty);

        impl ::std::ops::Add for $ty {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                if self.is_plus_infinity() || rhs.is_plus_infinity() {
                    assert!(!self.is_minus_infinity());
                    assert!(!rhs.is_minus_infinity());
                    return Self::plus_infinity();
                } else if self.is_minus_infinity() || rhs.is_minus_infinity() {
                    assert!(!self.is_plus_infinity());
                    assert!(!rhs.is_plus_infinity());
                    return Self::minus_infinity();
                }
                Self::from_value(self.to_value() + rhs.to_value())
            }
        }

        impl ::std::ops::Sub for $ty {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                if self.is_plus_infinity() || rhs.is_minus_infinity() {
                    assert!(!self.is_minus_infinity());
                    assert!(!rhs.is_plus_infinity());
                    return Self::plus_infinity();
                } else if self.is_minus_infinity() || rhs.is_plus_infinity() {
                    assert!(!self.is_plus_infinity());
                    assert!(!rhs.is_minus_infinity());
                    return Self::minus_infinity();
                }
                Self::from_value(self.to_value() - rhs.to_value())
            }
        }

        impl ::std::ops::AddAssign for $ty {
            fn add_assign(&mut self, rhs: Self) {
                *self = *self + rhs;
            }
        }

        impl ::std::ops::SubAssign for $ty {
            fn sub_assign(&mut self, rhs: Self) {
                *self = *self - rhs;
            }
        }

        impl ::std::ops::Div for $ty {
            type Output = f64;

            fn div(self, rhs: Self) -> Self::Output {
                self.to_value_float() / rhs.to_value_float()
            }
        }

        impl ::std::ops::Div<i64> for $ty {
            type Output = Self;

            fn div(self, rhs: i64) -> Self::Output {
                Self::from_value(self.to_value() / rhs)
            }
        }

        impl ::std::ops::Mul<f64> for $ty {
            type Output = Self;

            fn mul(self, rhs: f64) -> Self::Output {
                Self::from_value_float(self.to_value_float() * rhs)
            }
        }

        impl ::std::ops::Mul<i64> for $ty {
            type Output = Self;

            fn mul(self, rhs: i64) -> Self::Output {
                Self::from_value(self.to_value() * rhs)
            }
        }

        impl ::std::ops::Mul<$ty> for f64 {
            type Output = $ty;

            fn mul(self, rhs: $ty) -> Self::Output {
                rhs * self
            }
        }

        impl ::std::ops::Neg for $ty {
            type Output = Self;

            fn neg(self) -> Self::Output {
                if self.is_plus_infinity() {
                    Self::minus_infinity()
                } else if self.is_minus_infinity() {
                    Self::plus_infinity()
                } else {
                    Self::from_value(-self.to_value())
                }
            }
        }
    };
}

pub(crate) use relative_unit;
pub(crate) use unit_base;

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use crate::api::units::{DataRate, TimeDelta};

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(DataRate::from_bits_per_sec(1499).kbps(), 1);
        assert_eq!(DataRate::from_bits_per_sec(1500).kbps(), 2);
        assert_eq!(DataRate::from_bits_per_sec(-1499).kbps(), -1);
        assert_eq!(DataRate::from_bits_per_sec(-1500).kbps(), -2);
        assert_eq!(TimeDelta::from_micros(2500).ms(), 3);
    }

    #[test]
    fn float_conversion_saturates() {
        assert!(DataRate::from_bits_per_sec_float(f64::NEG_INFINITY).is_minus_infinity());
        assert!(DataRate::from_bits_per_sec_float(1e300).is_finite());
        assert!((TimeDelta::from_seconds(1) * f64::INFINITY).is_plus_infinity());
    }

    #[test]
    #[should_panic]
    fn crashes_when_created_from_nan() {
        DataRate::from_bits_per_sec_float(f64::NAN);
    }

    #[test]
    #[should_panic]
    fn crashes_when_created_from_sentinel() {
        TimeDelta::from_micros(i64::MAX);
    }

    #[test]
    fn infinity_operations() {
        let finite = TimeDelta::from_micros(267);
        assert!((TimeDelta::plus_infinity() + finite).is_plus_infinity());
        assert!((finite - TimeDelta::plus_infinity()).is_minus_infinity());
        assert!((TimeDelta::minus_infinity() + finite).is_minus_infinity());
        assert_eq!(-TimeDelta::plus_infinity(), TimeDelta::minus_infinity());
        assert_eq!(-finite, TimeDelta::from_micros(-267));
    }

    #[test]
    fn scalar_operations() {
        let value = DataRate::from_bits_per_sec(450);
        assert_eq!(value * 2, DataRate::from_bits_per_sec(900));
        assert_eq!(value * 0.5, DataRate::from_bits_per_sec(225));
        assert_eq!(0.5 * value, value * 0.5);
        assert_eq!(value / 4, DataRate::from_bits_per_sec(112));
        assert_relative_eq!(value / DataRate::from_bits_per_sec(900), 0.5);
    }
}
