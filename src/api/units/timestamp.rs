/*
 *  Copyright (c) 2018 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use std::{
    fmt,
    ops::{Add, AddAssign, Sub},
    time::Instant,
};

use super::TimeDelta;

/// A point in time, stored as the time elapsed since the estimator's epoch.
/// The difference of two Timestamps is a [TimeDelta].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(TimeDelta);

impl Timestamp {
    pub const fn from_seconds(value: i64) -> Self {
        Self(TimeDelta::from_seconds(value))
    }

    pub const fn from_millis(value: i64) -> Self {
        Self(TimeDelta::from_millis(value))
    }

    pub const fn from_micros(value: i64) -> Self {
        Self(TimeDelta::from_micros(value))
    }

    // Saturates to the epoch if `now` is earlier.
    pub fn since(epoch: Instant, now: Instant) -> Self {
        Self(TimeDelta::from(now.saturating_duration_since(epoch)))
    }

    pub const fn elapsed(&self) -> TimeDelta {
        self.0
    }

    pub const fn ms(&self) -> i64 {
        self.0.ms()
    }

    pub const fn us(&self) -> i64 {
        self.0.us()
    }
}

impl Add<TimeDelta> for Timestamp {
    type Output = Self;

    fn add(self, delta: TimeDelta) -> Self {
        Self(self.0 + delta)
    }
}

impl AddAssign<TimeDelta> for Timestamp {
    fn add_assign(&mut self, delta: TimeDelta) {
        self.0 += delta;
    }
}

impl Sub<TimeDelta> for Timestamp {
    type Output = Self;

    fn sub(self, delta: TimeDelta) -> Self {
        Self(self.0 - delta)
    }
}

impl Sub for Timestamp {
    type Output = TimeDelta;

    fn sub(self, other: Self) -> TimeDelta {
        self.0 - other.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{:?}", self.0)
    }
}
