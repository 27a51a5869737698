//! Client-side synchronization core: aggregates derived from store rows and the
//! live views that keep them fresh.

pub mod board;
pub mod keywords;
pub mod live;
pub mod tally;
pub mod task;
pub mod timer;
