// Copyright 2023 LiveKit, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::Deserialize;

use crate::api::units::{TimeDelta, Timestamp};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NackTrackerConfig {
    // The window must be open at least this long before it can trigger.
    pub window_min_duration: TimeDelta,
    // Counts are restarted once the window is open longer than this. Zero
    // keeps the window open forever.
    pub window_max_duration: TimeDelta,
    pub ratio_threshold: f64,
}

impl NackTrackerConfig {
    pub fn probe() -> Self {
        Self {
            window_min_duration: TimeDelta::from_millis(500),
            window_max_duration: TimeDelta::from_seconds(1),
            ratio_threshold: 0.04,
        }
    }

    pub fn non_probe() -> Self {
        Self {
            window_min_duration: TimeDelta::from_seconds(2),
            window_max_duration: TimeDelta::from_seconds(3),
            ratio_threshold: 0.08,
        }
    }

    pub fn validate(&mut self) {
        if self.window_min_duration < TimeDelta::zero() {
            tracing::warn!("NACK window min duration can't be negative");
            self.window_min_duration = TimeDelta::zero();
        }
        if self.window_max_duration < TimeDelta::zero() {
            tracing::warn!("NACK window max duration can't be negative");
            self.window_max_duration = TimeDelta::zero();
        }
        if !(0.0..=1.0).contains(&self.ratio_threshold) {
            tracing::warn!(
                "NACK ratio threshold must be between 0 and 1, got {}",
                self.ratio_threshold
            );
            self.ratio_threshold = self.ratio_threshold.clamp(0.0, 1.0);
        }
    }
}

impl Default for NackTrackerConfig {
    fn default() -> Self {
        Self::non_probe()
    }
}

// Tracks the share of sent packets that had to be retransmitted more than once.
// The window opens with the first repeated NACK.
#[derive(Debug)]
pub struct NackTracker {
    name: &'static str,
    config: NackTrackerConfig,

    window_start: Option<Timestamp>,
    last_update: Option<Timestamp>,
    packets: u64,
    repeated_nacks: u64,
}

impl NackTracker {
    pub fn new(name: &'static str, config: NackTrackerConfig) -> Self {
        Self {
            name,
            config,
            window_start: None,
            last_update: None,
            packets: 0,
            repeated_nacks: 0,
        }
    }

    pub fn add(&mut self, packets: u32, repeated_nacks: u32, at: Timestamp) {
        if let Some(window_start) = self.window_start {
            if self.config.window_max_duration > TimeDelta::zero()
                && at - window_start > self.config.window_max_duration
            {
                tracing::trace!(
                    "NACK window expired [name: {}, packets: {}, repeated nacks: {}]",
                    self.name,
                    self.packets,
                    self.repeated_nacks
                );
                self.window_start = None;
                self.packets = 0;
                self.repeated_nacks = 0;
            }
        }

        if repeated_nacks > 0 && self.window_start.is_none() {
            self.window_start = Some(at);
        }

        self.packets += u64::from(packets);
        self.repeated_nacks += u64::from(repeated_nacks);
        self.last_update = Some(at);
    }

    pub fn ratio(&self) -> f64 {
        if self.packets == 0 {
            return 0.0;
        }
        (self.repeated_nacks as f64 / self.packets as f64).min(1.0)
    }

    pub fn is_triggered(&self) -> bool {
        let (Some(window_start), Some(last_update)) = (self.window_start, self.last_update) else {
            return false;
        };
        last_update - window_start > self.config.window_min_duration
            && self.ratio() > self.config.ratio_threshold
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use test_trace::test;

    use super::*;

    #[test]
    fn empty_tracker() {
        let tracker = NackTracker::new("test", NackTrackerConfig::non_probe());
        assert_eq!(tracker.ratio(), 0.0);
        assert!(!tracker.is_triggered());
    }

    #[test]
    fn no_window_without_repeated_nacks() {
        let mut tracker = NackTracker::new("test", NackTrackerConfig::non_probe());
        let mut at = Timestamp::from_seconds(1);
        for _ in 0..50 {
            tracker.add(100, 0, at);
            at += TimeDelta::from_millis(100);
        }
        assert_eq!(tracker.ratio(), 0.0);
        assert!(tracker.window_start.is_none());
        assert!(!tracker.is_triggered());
    }

    #[test]
    fn triggers_after_min_duration() {
        let mut tracker = NackTracker::new("test", NackTrackerConfig::non_probe());
        let start = Timestamp::from_seconds(1);
        for k in 0..=20 {
            tracker.add(100, 20, start + TimeDelta::from_millis(100 * k));
        }
        // Window open exactly two seconds.
        assert!(!tracker.is_triggered());

        tracker.add(100, 20, start + TimeDelta::from_millis(2100));
        assert_relative_eq!(tracker.ratio(), 0.2);
        assert!(tracker.is_triggered());
    }

    #[test]
    fn low_ratio_does_not_trigger() {
        let mut tracker = NackTracker::new("test", NackTrackerConfig::non_probe());
        let start = Timestamp::from_seconds(1);
        for k in 0..25 {
            tracker.add(100, 5, start + TimeDelta::from_millis(100 * k));
        }
        assert_relative_eq!(tracker.ratio(), 0.05);
        assert!(!tracker.is_triggered());
    }

    #[test]
    fn window_restarts_after_max_duration() {
        let mut tracker = NackTracker::new("test", NackTrackerConfig::probe());
        let start = Timestamp::from_seconds(1);
        tracker.add(10, 10, start);
        tracker.add(10, 0, start + TimeDelta::from_millis(600));
        assert!(tracker.is_triggered());

        tracker.add(100, 0, start + TimeDelta::from_millis(1100));
        assert_eq!(tracker.ratio(), 0.0);
        assert!(!tracker.is_triggered());
    }

    #[test]
    fn ratio_is_capped() {
        let mut tracker = NackTracker::new("test", NackTrackerConfig::probe());
        tracker.add(1, 10, Timestamp::from_seconds(1));
        assert_eq!(tracker.ratio(), 1.0);
    }
}
