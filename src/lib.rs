//! Receiver feedback driven bandwidth estimation.
//!
//! [RemoteBwe] consumes receiver estimated maximum bitrate reports and repeated
//! NACK counts, and reports a committed channel capacity plus a congestion state
//! to a [api::bwe::BweListener].

mod channel_observer;
mod nack_tracker;
mod remote_bwe;
mod trend_detector;

pub use channel_observer::*;
pub use nack_tracker::*;
pub use remote_bwe::*;
pub use trend_detector::*;

pub mod api;
