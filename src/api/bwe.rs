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

use std::{fmt, sync::Arc};

use super::{probe::ProbeClusterInfo, units::DataRate};

/// The congestion mode of a bandwidth estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CongestionState {
    #[default]
    None,
    Congested,
    // Congestion appears to have cleared; held for a minimum duration to avoid flapping.
    CongestedHangover,
}

impl fmt::Display for CongestionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Congested => write!(f, "congested"),
            Self::CongestedHangover => write!(f, "congested_hangover"),
        }
    }
}

/// The verdict on a finished probe cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeSignal {
    Inconclusive,
    Congesting,
    Clearing,
}

impl fmt::Display for ProbeSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Inconclusive => write!(f, "inconclusive"),
            Self::Congesting => write!(f, "congesting"),
            Self::Clearing => write!(f, "clearing"),
        }
    }
}

// Receives congestion state changes from a bandwidth estimator. Called
// synchronously on the thread that delivered the triggering feedback, after the
// estimator released its internal lock, so it may call back into the estimator.
pub trait BweListener: Send + Sync {
    fn on_congestion_state_change(
        &self,
        congestion_state: CongestionState,
        committed_channel_capacity: DataRate,
    );
}

// Bwe is implemented by bandwidth estimators driven by receiver feedback. All
// methods take `&self`; implementations synchronize internally and may be
// shared across the feedback and probe scheduling threads.
pub trait Bwe: Send + Sync {
    // Replaces the listener, `None` drops notifications.
    fn set_bwe_listener(&self, bwe_listener: Option<Arc<dyn BweListener>>);
    // Returns all estimation state to defaults. The listener is kept.
    fn reset(&self);
    // Called with every REMB style report: the receiver estimate, the bandwidth
    // the sender expected to use, and the packet / repeated NACK counts since the
    // previous report.
    fn handle_remb(
        &self,
        received_estimate: DataRate,
        expected_bandwidth_usage: DataRate,
        sent_packets: u32,
        repeated_nacks: u32,
    );
    // Called when the probe scheduler starts a probe cluster.
    fn probe_cluster_starting(&self, probe_cluster_info: &ProbeClusterInfo);
    // Called when the probe scheduler finishes a probe cluster. Returns the
    // verdict and the committed channel capacity after applying it.
    fn probe_cluster_done(&self, probe_cluster_info: &ProbeClusterInfo) -> (ProbeSignal, DataRate);
    fn congestion_state(&self) -> CongestionState;
}
