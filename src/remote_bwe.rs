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

use std::{sync::Arc, time::Instant};

use parking_lot::RwLock;
use serde::Deserialize;

use crate::{
    api::{
        bwe::{Bwe, BweListener, CongestionState, ProbeSignal},
        probe::ProbeClusterInfo,
        units::{DataRate, TimeDelta, Timestamp},
    },
    channel_observer::{ChannelCongestionReason, ChannelObserver, ChannelObserverConfig, ChannelTrend},
};

// Capacity assumed before any congestion was detected.
const DEFAULT_CHANNEL_CAPACITY: DataRate = DataRate::from_megabits_per_sec(100);

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteBweConfig {
    // How strongly the NACK ratio discounts the expected usage on loss based
    // congestion.
    pub nack_ratio_attenuator: f64,
    // A new capacity is only committed when it is at most this fraction of the
    // expected usage.
    pub expected_usage_threshold: f64,
    pub channel_observer_probe: ChannelObserverConfig,
    pub channel_observer_non_probe: ChannelObserverConfig,
    // Minimum time spent in hangover before returning to no congestion.
    pub congested_min_duration: TimeDelta,
    pub periodic_check_interval: TimeDelta,
    pub periodic_check_interval_congested: TimeDelta,
}

impl Default for RemoteBweConfig {
    fn default() -> Self {
        Self {
            nack_ratio_attenuator: 0.4,
            expected_usage_threshold: 0.95,
            channel_observer_probe: ChannelObserverConfig::probe(),
            channel_observer_non_probe: ChannelObserverConfig::non_probe(),
            congested_min_duration: TimeDelta::from_seconds(3),
            periodic_check_interval: TimeDelta::from_seconds(2),
            periodic_check_interval_congested: TimeDelta::from_millis(200),
        }
    }
}

impl RemoteBweConfig {
    pub fn validate(&mut self) {
        let defaults = Self::default();
        if !(0.0..=1.0).contains(&self.nack_ratio_attenuator) {
            tracing::warn!(
                "NACK ratio attenuator must be between 0 and 1, got {}",
                self.nack_ratio_attenuator
            );
            self.nack_ratio_attenuator = defaults.nack_ratio_attenuator;
        }
        if !(self.expected_usage_threshold > 0.0 && self.expected_usage_threshold <= 1.0) {
            tracing::warn!(
                "Expected usage threshold must be in (0, 1], got {}",
                self.expected_usage_threshold
            );
            self.expected_usage_threshold = defaults.expected_usage_threshold;
        }
        if self.congested_min_duration < TimeDelta::zero() {
            tracing::warn!("Congested min duration can't be negative");
            self.congested_min_duration = defaults.congested_min_duration;
        }
        if self.periodic_check_interval <= TimeDelta::zero() {
            tracing::warn!("Periodic check interval must be positive");
            self.periodic_check_interval = defaults.periodic_check_interval;
        }
        if self.periodic_check_interval_congested <= TimeDelta::zero() {
            tracing::warn!("Periodic check interval while congested must be positive");
            self.periodic_check_interval_congested = defaults.periodic_check_interval_congested;
        }
        self.channel_observer_probe.validate();
        self.channel_observer_non_probe.validate();
    }
}

struct RemoteBweState {
    last_received_estimate: DataRate,
    last_expected_bandwidth_usage: DataRate,
    committed_channel_capacity: DataRate,

    is_in_probe: bool,
    channel_observer: ChannelObserver,

    congestion_state: CongestionState,
    congestion_state_switched_at: Timestamp,

    bwe_listener: Option<Arc<dyn BweListener>>,
}

impl RemoteBweState {
    fn new(config: &RemoteBweConfig, at_time: Timestamp) -> Self {
        Self {
            last_received_estimate: DataRate::zero(),
            last_expected_bandwidth_usage: DataRate::zero(),
            committed_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            is_in_probe: false,
            channel_observer: ChannelObserver::new("non-probe", &config.channel_observer_non_probe),
            congestion_state: CongestionState::None,
            congestion_state_switched_at: at_time,
            bwe_listener: None,
        }
    }

    fn new_channel_observer(&self, config: &RemoteBweConfig, at_time: Timestamp) -> ChannelObserver {
        if self.is_in_probe {
            let mut channel_observer = ChannelObserver::new("probe", &config.channel_observer_probe);
            channel_observer.seed_estimate(self.committed_channel_capacity, at_time);
            channel_observer
        } else {
            ChannelObserver::new("non-probe", &config.channel_observer_non_probe)
        }
    }

    // Returns the state and capacity to notify the listener with, if any.
    fn congestion_detection_state_machine(
        &mut self,
        config: &RemoteBweConfig,
        at_time: Timestamp,
    ) -> Option<(CongestionState, DataRate)> {
        let from_state = self.congestion_state;
        let mut to_state = from_state;
        let mut recommitted = false;

        let (trend, reason) = self.channel_observer.get_trend();
        if trend == ChannelTrend::Congesting {
            tracing::debug!(
                "Channel congesting [reason: {}] [state: {}] [channel: {:?}]",
                reason,
                from_state,
                self.channel_observer
            );
        }

        match from_state {
            CongestionState::None => {
                if trend == ChannelTrend::Congesting {
                    let committed = self.estimate_available_channel_capacity(config, reason, at_time);
                    if committed || self.is_in_probe {
                        to_state = CongestionState::Congested;
                    }
                }
            }
            CongestionState::Congested => {
                if trend == ChannelTrend::Congesting {
                    recommitted = self.estimate_available_channel_capacity(config, reason, at_time);
                } else {
                    to_state = CongestionState::CongestedHangover;
                }
            }
            CongestionState::CongestedHangover => {
                if trend == ChannelTrend::Congesting {
                    if self.estimate_available_channel_capacity(config, reason, at_time) {
                        to_state = CongestionState::Congested;
                    }
                } else if at_time - self.congestion_state_switched_at >= config.congested_min_duration {
                    to_state = CongestionState::None;
                }
            }
        }

        if to_state == from_state && !recommitted {
            return None;
        }

        self.update_congestion_state(to_state, at_time);
        Some((to_state, self.committed_channel_capacity))
    }

    fn estimate_available_channel_capacity(
        &mut self,
        config: &RemoteBweConfig,
        reason: ChannelCongestionReason,
        at_time: Timestamp,
    ) -> bool {
        let nack_ratio = self.channel_observer.get_nack_ratio();
        let mut estimate_to_commit = if reason == ChannelCongestionReason::Loss {
            DataRate::from_bits_per_sec_float(
                self.last_expected_bandwidth_usage.bps_float()
                    * (1.0 - config.nack_ratio_attenuator * nack_ratio),
            )
        } else {
            self.last_received_estimate
        };
        if estimate_to_commit > self.last_received_estimate {
            estimate_to_commit = self.last_received_estimate;
        }

        let commit_threshold = DataRate::from_bits_per_sec_float(
            self.last_expected_bandwidth_usage.bps_float() * config.expected_usage_threshold,
        );
        if estimate_to_commit > commit_threshold {
            tracing::debug!(
                "Not committing channel capacity, estimate above threshold [reason: {}] [old: {:?}] [new: {:?}] [last received: {:?}] [expected usage: {:?}] [threshold: {:?}] [nack ratio: {:.3}] [channel: {:?}]",
                reason,
                self.committed_channel_capacity,
                estimate_to_commit,
                self.last_received_estimate,
                self.last_expected_bandwidth_usage,
                commit_threshold,
                nack_ratio,
                self.channel_observer
            );
            return false;
        }

        tracing::info!(
            "Committing channel capacity [reason: {}] [old: {:?}] [new: {:?}] [last received: {:?}] [expected usage: {:?}] [nack ratio: {:.3}] [in probe: {}] [channel: {:?}]",
            reason,
            self.committed_channel_capacity,
            estimate_to_commit,
            self.last_received_estimate,
            self.last_expected_bandwidth_usage,
            nack_ratio,
            self.is_in_probe,
            self.channel_observer
        );
        self.committed_channel_capacity = estimate_to_commit;
        self.channel_observer = self.new_channel_observer(config, at_time);
        true
    }

    fn update_congestion_state(&mut self, state: CongestionState, at_time: Timestamp) {
        tracing::info!(
            "Congestion state change [from: {}] [to: {}] [committed channel capacity: {:?}]",
            self.congestion_state,
            state,
            self.committed_channel_capacity
        );
        self.congestion_state = state;
        self.congestion_state_switched_at = at_time;
    }
}

/// Turns receiver estimated maximum bitrate reports and NACK counts into a
/// committed channel capacity and a congestion state.
///
/// Capacity is only ever lowered by congestion evidence (a downward trend of
/// receiver estimates, or a sustained repeated NACK ratio) and only raised by a
/// probe whose estimates trend upward. After congestion clears the estimator
/// stays in [CongestionState::CongestedHangover] for
/// [RemoteBweConfig::congested_min_duration] before returning to
/// [CongestionState::None].
///
/// All methods take `&self`; the state lives behind a single lock. Listener
/// callbacks run after the lock is released.
pub struct RemoteBwe {
    config: RemoteBweConfig,
    epoch: Instant,
    state: RwLock<RemoteBweState>,
}

impl RemoteBwe {
    pub fn new(mut config: RemoteBweConfig) -> Self {
        config.validate();
        let state = RwLock::new(RemoteBweState::new(&config, Timestamp::from_micros(0)));
        Self {
            config,
            epoch: Instant::now(),
            state,
        }
    }

    /// The time used by the methods that don't take an explicit timestamp.
    pub fn now(&self) -> Timestamp {
        Timestamp::since(self.epoch, Instant::now())
    }

    pub fn config(&self) -> &RemoteBweConfig {
        &self.config
    }

    pub fn set_bwe_listener(&self, bwe_listener: Option<Arc<dyn BweListener>>) {
        self.state.write().bwe_listener = bwe_listener;
    }

    pub fn reset(&self) {
        self.reset_at(self.now());
    }

    pub fn reset_at(&self, at_time: Timestamp) {
        let mut state = self.state.write();
        let bwe_listener = state.bwe_listener.take();
        *state = RemoteBweState::new(&self.config, at_time);
        state.bwe_listener = bwe_listener;
    }

    pub fn handle_remb(
        &self,
        received_estimate: DataRate,
        expected_bandwidth_usage: DataRate,
        sent_packets: u32,
        repeated_nacks: u32,
    ) {
        self.handle_remb_at(
            self.now(),
            received_estimate,
            expected_bandwidth_usage,
            sent_packets,
            repeated_nacks,
        );
    }

    pub fn handle_remb_at(
        &self,
        at_time: Timestamp,
        received_estimate: DataRate,
        expected_bandwidth_usage: DataRate,
        sent_packets: u32,
        repeated_nacks: u32,
    ) {
        let notification = {
            let mut state = self.state.write();
            state.last_received_estimate = received_estimate;
            state.last_expected_bandwidth_usage = expected_bandwidth_usage;

            // Once a probe caused congestion nothing changes until the probe ends.
            if state.is_in_probe && state.congestion_state != CongestionState::None {
                return;
            }

            state.channel_observer.add_estimate(received_estimate, at_time);
            state.channel_observer.add_nack(sent_packets, repeated_nacks, at_time);

            match state.congestion_detection_state_machine(&self.config, at_time) {
                Some((congestion_state, committed_channel_capacity)) => state
                    .bwe_listener
                    .clone()
                    .map(|listener| (listener, congestion_state, committed_channel_capacity)),
                None => None,
            }
        };

        if let Some((listener, congestion_state, committed_channel_capacity)) = notification {
            listener.on_congestion_state_change(congestion_state, committed_channel_capacity);
        }
    }

    pub fn congestion_state(&self) -> CongestionState {
        self.state.read().congestion_state
    }

    pub fn committed_channel_capacity(&self) -> DataRate {
        self.state.read().committed_channel_capacity
    }

    /// How often the owner should re-evaluate the estimate, faster while congested.
    pub fn periodic_check_interval(&self) -> TimeDelta {
        if self.state.read().congestion_state == CongestionState::None {
            self.config.periodic_check_interval
        } else {
            self.config.periodic_check_interval_congested
        }
    }

    pub fn probe_cluster_starting(&self, probe_cluster_info: &ProbeClusterInfo) {
        self.probe_cluster_starting_at(self.now(), probe_cluster_info);
    }

    pub fn probe_cluster_starting_at(&self, at_time: Timestamp, probe_cluster_info: &ProbeClusterInfo) {
        let mut state = self.state.write();
        state.last_expected_bandwidth_usage = probe_cluster_info.goal.expected_usage;
        state.is_in_probe = true;
        state.channel_observer = state.new_channel_observer(&self.config, at_time);

        tracing::debug!(
            "Probe cluster starting [cluster id: {}] [desired rate: {:?}] [expected usage: {:?}] [desired bytes: {}] [duration: {:?}] [committed channel capacity: {:?}] [channel: {:?}]",
            probe_cluster_info.id,
            probe_cluster_info.goal.desired_rate,
            probe_cluster_info.goal.expected_usage,
            probe_cluster_info.goal.desired_bytes,
            probe_cluster_info.goal.duration,
            state.committed_channel_capacity,
            state.channel_observer
        );
    }

    pub fn probe_cluster_done(&self, probe_cluster_info: &ProbeClusterInfo) -> (ProbeSignal, DataRate) {
        self.probe_cluster_done_at(self.now(), probe_cluster_info)
    }

    pub fn probe_cluster_done_at(
        &self,
        at_time: Timestamp,
        probe_cluster_info: &ProbeClusterInfo,
    ) -> (ProbeSignal, DataRate) {
        let mut state = self.state.write();

        let probe_congestion_state = state.congestion_state;
        state.is_in_probe = false;
        let new_channel_observer = state.new_channel_observer(&self.config, at_time);
        let probe_channel_observer = std::mem::replace(&mut state.channel_observer, new_channel_observer);
        if state.congestion_state != CongestionState::None {
            state.update_congestion_state(CongestionState::None, at_time);
        }

        let (trend, _) = probe_channel_observer.get_trend();
        let probe_signal = if probe_congestion_state != CongestionState::None {
            ProbeSignal::Congesting
        } else if !probe_channel_observer.has_enough_estimate_samples() || trend == ChannelTrend::Neutral {
            ProbeSignal::Inconclusive
        } else {
            let highest_estimate = probe_channel_observer.get_highest_estimate();
            if highest_estimate > state.committed_channel_capacity {
                state.committed_channel_capacity = highest_estimate;
            }
            ProbeSignal::Clearing
        };

        tracing::debug!(
            "Probe cluster done [cluster id: {}] [signal: {}] [trend: {}] [probe congestion state: {}] [committed channel capacity: {:?}] [channel: {:?}]",
            probe_cluster_info.id,
            probe_signal,
            trend,
            probe_congestion_state,
            state.committed_channel_capacity,
            probe_channel_observer
        );

        (probe_signal, state.committed_channel_capacity)
    }
}

impl Default for RemoteBwe {
    fn default() -> Self {
        Self::new(RemoteBweConfig::default())
    }
}

impl Bwe for RemoteBwe {
    fn set_bwe_listener(&self, bwe_listener: Option<Arc<dyn BweListener>>) {
        RemoteBwe::set_bwe_listener(self, bwe_listener)
    }

    fn reset(&self) {
        RemoteBwe::reset(self)
    }

    fn handle_remb(
        &self,
        received_estimate: DataRate,
        expected_bandwidth_usage: DataRate,
        sent_packets: u32,
        repeated_nacks: u32,
    ) {
        RemoteBwe::handle_remb(
            self,
            received_estimate,
            expected_bandwidth_usage,
            sent_packets,
            repeated_nacks,
        )
    }

    fn probe_cluster_starting(&self, probe_cluster_info: &ProbeClusterInfo) {
        RemoteBwe::probe_cluster_starting(self, probe_cluster_info)
    }

    fn probe_cluster_done(&self, probe_cluster_info: &ProbeClusterInfo) -> (ProbeSignal, DataRate) {
        RemoteBwe::probe_cluster_done(self, probe_cluster_info)
    }

    fn congestion_state(&self) -> CongestionState {
        RemoteBwe::congestion_state(self)
    }
}
