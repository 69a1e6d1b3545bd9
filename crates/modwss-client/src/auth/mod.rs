//! Device login over the WSS dispatcher.
//!
//! Two dispatcher steps: a `device-login` handshake that yields a code to show
//! the user, then a wait for the `access-token` push sent once the user enters
//! the code on another device. The socket is closed when the attempt ends.

pub mod device_login;
pub mod session;

pub use device_login::{AuthCanceller, AuthFailure, AuthState, DeviceLogin, DeviceLoginToken};
pub use session::{CodePrompter, InMemorySession, SessionStore};
