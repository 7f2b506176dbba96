//! Range math and fragment planning.
//!
//! Splits a resource into fixed-size fragments and computes the HTTP Range
//! header bounds for each one.

mod range;

pub use range::{Fragment, FragmentPlan, DEFAULT_CONCURRENCY};
