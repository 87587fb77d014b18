/// The bandwidth estimator interface: [Bwe](bwe::Bwe) and [BweListener](bwe::BweListener).
pub mod bwe;

/// Probe cluster descriptions handed over by the probe scheduler.
pub mod probe;

/// Some unit types, such as [DataRate](units::DataRate) and [TimeDelta](units::TimeDelta).
pub mod units;
