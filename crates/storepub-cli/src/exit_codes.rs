//! Process exit codes. Part of the public contract for CI callers.

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Publish, login or config failure with a message on stderr
pub const INTERNAL_ERROR: i32 = 2; // Unexpected error outside the publish flow
