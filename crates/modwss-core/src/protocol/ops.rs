//! Known operation tags.
//!
//! Tags are opaque strings to the dispatcher; these constants only name the
//! ones the device-login flow uses. New tags need no protocol change.

/// Begin a device login (request and response share the tag).
pub const DEVICE_LOGIN: &str = "device-login";

/// Server push carrying the access token once the user confirms the code.
pub const ACCESS_TOKEN: &str = "access-token";

/// Server-side error notification about another operation.
pub const FAILED_OPERATION: &str = "failed-operation";
