//! Typed payloads, each bound to the operation tag it travels under.
//!
//! Decoding goes through `Envelope::decode_as::<P>()`, which rejects an
//! envelope whose tag differs from `P::OPERATION` instead of guessing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ops;

/// A payload shape keyed by its operation tag.
pub trait Payload: Serialize + DeserializeOwned {
    const OPERATION: &'static str;
}

/// Client -> server: start a device login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLoginRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
}

impl Payload for DeviceLoginRequest {
    const OPERATION: &'static str = ops::DEVICE_LOGIN;
}

/// Server -> client: the code to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLoginResponse {
    /// Short human-readable code.
    pub code: String,
    /// Page where the user types the code.
    pub login_url: String,
    /// Page that pre-fills the code.
    #[serde(default)]
    pub auto_login_url: String,
    /// Unix timestamp (seconds) after which the code is void.
    pub date_expires: i64,
}

impl Payload for DeviceLoginResponse {
    const OPERATION: &'static str = ops::DEVICE_LOGIN;
}

/// Server -> client: login completed on the other device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub date_expires: i64,
}

impl Payload for AccessToken {
    const OPERATION: &'static str = ops::ACCESS_TOKEN;
}

/// Server -> client: an earlier operation failed server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOperation {
    /// Tag of the operation the error refers to.
    pub operation: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub error_ref: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Payload for FailedOperation {
    const OPERATION: &'static str = ops::FAILED_OPERATION;
}
