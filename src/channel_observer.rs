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

use std::fmt;

use serde::Deserialize;

use crate::{
    api::units::{DataRate, Timestamp},
    nack_tracker::{NackTracker, NackTrackerConfig},
    trend_detector::{TrendDetector, TrendDetectorConfig, TrendDirection},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelTrend {
    Neutral,
    Clearing,
    Congesting,
}

impl fmt::Display for ChannelTrend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Neutral => write!(f, "neutral"),
            Self::Clearing => write!(f, "clearing"),
            Self::Congesting => write!(f, "congesting"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelCongestionReason {
    None,
    BandwidthEstimate,
    Loss,
}

impl fmt::Display for ChannelCongestionReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::BandwidthEstimate => write!(f, "bandwidth_estimate"),
            Self::Loss => write!(f, "loss"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChannelObserverConfig {
    pub estimate: TrendDetectorConfig,
    pub nack: NackTrackerConfig,
}

impl ChannelObserverConfig {
    pub fn probe() -> Self {
        Self {
            estimate: TrendDetectorConfig::probe(),
            nack: NackTrackerConfig::probe(),
        }
    }

    pub fn non_probe() -> Self {
        Self {
            estimate: TrendDetectorConfig::non_probe(),
            nack: NackTrackerConfig::non_probe(),
        }
    }

    pub fn validate(&mut self) {
        self.estimate.validate();
        self.nack.validate();
    }
}

/// Accumulates estimate and loss samples for one observation period and judges
/// whether the channel is congesting, clearing or neither.
///
/// An observer is never reconfigured. The controller drops it and starts a new
/// one whenever the period ends (a capacity commit, a probe start or a probe
/// end).
#[derive(Debug)]
pub struct ChannelObserver {
    name: &'static str,
    estimate_trend: TrendDetector,
    nack_tracker: NackTracker,
}

impl ChannelObserver {
    pub fn new(name: &'static str, config: &ChannelObserverConfig) -> Self {
        Self {
            name,
            estimate_trend: TrendDetector::new(name, config.estimate.clone()),
            nack_tracker: NackTracker::new(name, config.nack.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Places a reference estimate that later samples are compared with.
    pub fn seed_estimate(&mut self, estimate: DataRate, at_time: Timestamp) {
        self.estimate_trend.seed(estimate, at_time);
    }

    pub fn add_estimate(&mut self, estimate: DataRate, at_time: Timestamp) {
        self.estimate_trend.add_value(estimate, at_time);
    }

    pub fn add_nack(&mut self, sent_packets: u32, repeated_nacks: u32, at_time: Timestamp) {
        self.nack_tracker.add(sent_packets, repeated_nacks, at_time);
    }

    pub fn get_trend(&self) -> (ChannelTrend, ChannelCongestionReason) {
        match self.estimate_trend.direction() {
            TrendDirection::Downward => {
                (ChannelTrend::Congesting, ChannelCongestionReason::BandwidthEstimate)
            }
            _ if self.nack_tracker.is_triggered() => {
                (ChannelTrend::Congesting, ChannelCongestionReason::Loss)
            }
            TrendDirection::Upward => (ChannelTrend::Clearing, ChannelCongestionReason::None),
            TrendDirection::Neutral => (ChannelTrend::Neutral, ChannelCongestionReason::None),
        }
    }

    pub fn get_nack_ratio(&self) -> f64 {
        self.nack_tracker.ratio()
    }

    pub fn has_enough_estimate_samples(&self) -> bool {
        self.estimate_trend.has_enough_samples()
    }

    pub fn get_highest_estimate(&self) -> DataRate {
        self.estimate_trend.highest_value().unwrap_or(DataRate::zero())
    }
}
