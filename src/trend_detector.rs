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

use std::collections::VecDeque;

use serde::Deserialize;

use crate::api::units::{DataRate, TimeDelta, Timestamp};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrendDetectorConfig {
    // Size (in samples) of the window the trend is computed over.
    pub required_samples: usize,
    // Below this many samples the trend is always neutral.
    pub required_samples_min: usize,
    // Kendall's tau below which the trend is downward, in [-1, 1].
    pub downward_trend_threshold: f64,
    // A downward trend is reported before `required_samples` are collected once
    // the window spans longer than this.
    pub downward_trend_max_wait: TimeDelta,
    // Repeats of the last value arriving within this duration are not kept.
    pub collapse_threshold: TimeDelta,
    // Samples older than this, relative to the newest one, are dropped. Zero
    // disables the age limit.
    pub validity_window: TimeDelta,
}

impl TrendDetectorConfig {
    /// Probes are short, a few consistent samples are enough.
    pub fn probe() -> Self {
        Self {
            required_samples: 3,
            required_samples_min: 3,
            downward_trend_threshold: 0.0,
            downward_trend_max_wait: TimeDelta::from_seconds(5),
            collapse_threshold: TimeDelta::zero(),
            validity_window: TimeDelta::from_seconds(10),
        }
    }

    pub fn non_probe() -> Self {
        Self {
            required_samples: 12,
            required_samples_min: 8,
            downward_trend_threshold: -0.6,
            downward_trend_max_wait: TimeDelta::from_seconds(5),
            collapse_threshold: TimeDelta::from_millis(500),
            validity_window: TimeDelta::from_seconds(10),
        }
    }

    pub fn validate(&mut self) {
        if self.required_samples == 0 {
            tracing::warn!("Required samples must be at least 1");
            self.required_samples = 1;
        }
        if self.required_samples_min > self.required_samples {
            tracing::warn!(
                "Minimum required samples can't exceed the required samples ({})",
                self.required_samples
            );
            self.required_samples_min = self.required_samples;
        }
        if !(-1.0..=1.0).contains(&self.downward_trend_threshold) {
            tracing::warn!("Downward trend threshold must be between -1 and 1");
            self.downward_trend_threshold = self.downward_trend_threshold.clamp(-1.0, 1.0);
        }
        for (name, duration) in [
            ("downward trend max wait", &mut self.downward_trend_max_wait),
            ("collapse threshold", &mut self.collapse_threshold),
            ("validity window", &mut self.validity_window),
        ] {
            if *duration < TimeDelta::zero() {
                tracing::warn!("Trend detector {} can't be negative", name);
                *duration = TimeDelta::zero();
            }
        }
    }
}

impl Default for TrendDetectorConfig {
    fn default() -> Self {
        Self::non_probe()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrendDirection {
    Neutral,
    Upward,
    Downward,
}

#[derive(Clone, Copy, Debug)]
struct TrendSample {
    value: DataRate,
    at: Timestamp,
}

// Judges the direction of a series of estimates with Kendall's tau, a rank
// correlation that only looks at the order of pairs and so is robust to the
// jumpy values receivers report.
#[derive(Debug)]
pub struct TrendDetector {
    name: &'static str,
    config: TrendDetectorConfig,

    num_samples: usize,
    samples: VecDeque<TrendSample>,
    lowest_value: Option<DataRate>,
    highest_value: Option<DataRate>,

    direction: TrendDirection,
}

impl TrendDetector {
    pub fn new(name: &'static str, config: TrendDetectorConfig) -> Self {
        Self {
            name,
            config,
            num_samples: 0,
            samples: VecDeque::new(),
            lowest_value: None,
            highest_value: None,
            direction: TrendDirection::Neutral,
        }
    }

    // Places a reference point the next samples are judged against. Does not
    // count as a sample and does not move the lowest/highest values.
    pub fn seed(&mut self, value: DataRate, at: Timestamp) {
        if !self.samples.is_empty() {
            return;
        }
        self.samples.push_back(TrendSample { value, at });
    }

    pub fn add_value(&mut self, value: DataRate, at: Timestamp) {
        self.num_samples += 1;
        if self.lowest_value.map_or(true, |lowest| value < lowest) {
            self.lowest_value = Some(value);
        }
        if self.highest_value.map_or(true, |highest| value > highest) {
            self.highest_value = Some(value);
        }

        if let Some(last) = self.samples.back() {
            if last.value == value && at - last.at < self.config.collapse_threshold {
                return;
            }
        }

        self.samples.push_back(TrendSample { value, at });
        self.prune();
        self.update_direction();
    }

    pub fn direction(&self) -> TrendDirection {
        self.direction
    }

    pub fn has_enough_samples(&self) -> bool {
        self.num_samples >= self.config.required_samples
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn lowest_value(&self) -> Option<DataRate> {
        self.lowest_value
    }

    pub fn highest_value(&self) -> Option<DataRate> {
        self.highest_value
    }

    fn prune(&mut self) {
        while self.samples.len() > self.config.required_samples {
            self.samples.pop_front();
        }

        if let Some(newest) = self.samples.back().map(|s| s.at) {
            if self.config.validity_window > TimeDelta::zero() {
                while let Some(oldest) = self.samples.front() {
                    if newest - oldest.at < self.config.validity_window {
                        break;
                    }
                    self.samples.pop_front();
                }
            }
        }

        // A run of identical values at the front carries no order information,
        // keep only the last of them.
        while self.samples.len() > 1 && self.samples[0].value == self.samples[1].value {
            self.samples.pop_front();
        }
    }

    fn update_direction(&mut self) {
        self.direction = TrendDirection::Neutral;
        if self.samples.len() < self.config.required_samples_min {
            return;
        }

        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return;
        };
        let span = newest.at - oldest.at;
        let full_window = self.samples.len() >= self.config.required_samples;

        let tau = self.kendalls_tau();
        if tau > 0.0 && full_window {
            self.direction = TrendDirection::Upward;
        } else if tau < self.config.downward_trend_threshold
            && (full_window || span > self.config.downward_trend_max_wait)
        {
            self.direction = TrendDirection::Downward;
        }
    }

    fn kendalls_tau(&self) -> f64 {
        let mut concordant_pairs: i64 = 0;
        let mut discordant_pairs: i64 = 0;
        for (i, earlier) in self.samples.iter().enumerate() {
            for later in self.samples.iter().skip(i + 1) {
                if earlier.value < later.value {
                    concordant_pairs += 1;
                } else if earlier.value > later.value {
                    discordant_pairs += 1;
                }
            }
        }

        if concordant_pairs + discordant_pairs == 0 {
            return 0.0;
        }
        (concordant_pairs - discordant_pairs) as f64 / (concordant_pairs + discordant_pairs) as f64
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use test_trace::test;

    use super::*;

    fn feed(detector: &mut TrendDetector, values_kbps: &[i64], start: Timestamp, step: TimeDelta) {
        let mut at = start;
        for value in values_kbps {
            detector.add_value(DataRate::from_kilobits_per_sec(*value), at);
            at += step;
        }
    }

    #[test]
    fn neutral_until_min_samples() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::non_probe());
        feed(
            &mut detector,
            &[1000, 950, 900, 850, 800, 750, 700],
            Timestamp::from_seconds(1),
            TimeDelta::from_millis(100),
        );
        assert_eq!(detector.direction(), TrendDirection::Neutral);
        assert!(!detector.has_enough_samples());
    }

    #[test]
    fn sustained_drop_is_downward() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::non_probe());
        let values: Vec<i64> = (0..12).map(|i| 1050 - 50 * i).collect();
        feed(&mut detector, &values, Timestamp::from_seconds(1), TimeDelta::from_millis(100));
        assert_eq!(detector.direction(), TrendDirection::Downward);
        assert!(detector.has_enough_samples());
        assert_eq!(detector.lowest_value(), Some(DataRate::from_kilobits_per_sec(500)));
        assert_eq!(detector.highest_value(), Some(DataRate::from_kilobits_per_sec(1050)));
    }

    #[test]
    fn slow_drop_is_downward_after_max_wait() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::non_probe());
        // Eight samples, spanning more than the five second max wait.
        feed(
            &mut detector,
            &[1000, 950, 900, 850, 800, 750, 700, 650],
            Timestamp::from_seconds(1),
            TimeDelta::from_millis(800),
        );
        assert_eq!(detector.direction(), TrendDirection::Downward);
    }

    #[test]
    fn rising_estimates_are_upward() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::probe());
        feed(
            &mut detector,
            &[900, 1300, 1800],
            Timestamp::from_seconds(1),
            TimeDelta::from_millis(100),
        );
        assert_eq!(detector.direction(), TrendDirection::Upward);
        assert_eq!(detector.highest_value(), Some(DataRate::from_kilobits_per_sec(1800)));
    }

    #[test]
    fn seed_is_a_reference_not_a_sample() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::probe());
        detector.seed(DataRate::from_kilobits_per_sec(2000), Timestamp::from_seconds(1));
        feed(
            &mut detector,
            &[1500, 1400],
            Timestamp::from_millis(1100),
            TimeDelta::from_millis(100),
        );
        // The seed makes three ordered samples: a drop from the reference.
        assert_eq!(detector.direction(), TrendDirection::Downward);
        assert_eq!(detector.num_samples(), 2);
        assert!(!detector.has_enough_samples());
        assert_eq!(detector.highest_value(), Some(DataRate::from_kilobits_per_sec(1500)));
    }

    #[test]
    fn repeated_values_collapse() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::non_probe());
        feed(
            &mut detector,
            &[1000; 20],
            Timestamp::from_seconds(1),
            TimeDelta::from_millis(100),
        );
        assert_eq!(detector.samples.len(), 1);
        assert_eq!(detector.num_samples(), 20);
        assert_eq!(detector.direction(), TrendDirection::Neutral);
    }

    #[test]
    fn old_samples_expire() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::non_probe());
        feed(
            &mut detector,
            &[1000, 900, 800],
            Timestamp::from_seconds(1),
            TimeDelta::from_millis(100),
        );
        detector.add_value(DataRate::from_kilobits_per_sec(700), Timestamp::from_seconds(20));
        assert_eq!(detector.samples.len(), 1);
    }

    #[test]
    fn kendalls_tau_of_mixed_series() {
        let mut detector = TrendDetector::new("test", TrendDetectorConfig::non_probe());
        // Pairs: (1,3)+ (1,2)+ (3,2)-  => (2 - 1) / 3
        feed(&mut detector, &[1, 3, 2], Timestamp::from_seconds(1), TimeDelta::from_seconds(1));
        assert_relative_eq!(detector.kendalls_tau(), 1.0 / 3.0);
    }

    #[test]
    fn validate_fixes_inconsistent_config() {
        let mut config = TrendDetectorConfig {
            required_samples: 4,
            required_samples_min: 10,
            downward_trend_threshold: -3.0,
            collapse_threshold: TimeDelta::from_millis(-5),
            ..TrendDetectorConfig::non_probe()
        };
        config.validate();
        assert_eq!(config.required_samples_min, 4);
        assert_relative_eq!(config.downward_trend_threshold, -1.0);
        assert_eq!(config.collapse_threshold, TimeDelta::zero());
    }
}
