//! Property-based tests for the recall model.
//!
//! - predicted recall stays in [0, 1] and never increases with elapsed time
//! - a success never lowers recall at the quiz time, a failure never raises it
//! - passive refresh touches only `last_seen`
