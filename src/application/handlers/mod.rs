//! Application command and query handlers, grouped by bounded context.

pub mod membership;
