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

use super::units::{DataRate, TimeDelta, Timestamp};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProbeClusterId(pub u32);

impl fmt::Display for ProbeClusterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the probe scheduler is aiming for with a cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProbeClusterGoal {
    /// The rate the probe tries to reach.
    pub desired_rate: DataRate,
    /// The total bandwidth expected to be used while probing, media included.
    pub expected_usage: DataRate,
    pub desired_bytes: u64,
    /// Duration of a probe.
    pub duration: TimeDelta,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeClusterInfo {
    pub id: ProbeClusterId,
    pub created_at: Timestamp,
    pub goal: ProbeClusterGoal,
}

impl ProbeClusterInfo {
    pub fn new(id: ProbeClusterId, created_at: Timestamp, goal: ProbeClusterGoal) -> Self {
        Self {
            id,
            created_at,
            goal,
        }
    }
}
