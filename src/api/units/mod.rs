mod data_rate;
mod time_delta;
mod timestamp;
mod unit_base;

pub use data_rate::*;
pub use time_delta::*;
pub use timestamp::*;

use unit_base::{relative_unit, unit_base};
