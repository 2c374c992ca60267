//! Wire and cache data types.

pub mod build_result;
pub mod event;
pub mod status;
