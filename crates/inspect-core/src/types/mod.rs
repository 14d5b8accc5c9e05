//! 공통 값 타입.

pub mod timestamp;

pub use timestamp::{
    format_timestamp, parse_date, parse_timestamp, synthetic_epoch, SYNTHETIC_EPOCH,
    TIMESTAMP_FORMAT,
};
