//! API 공용 유틸리티.

pub mod format;

pub use format::{format_rfc3339, sample_id};
