//! Message redirect switches

use serde::Deserialize;

/// Where messages received from a registered client are routed.
///
/// The two switches are independent; both may be on at once.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RedirectConfig {
    /// Mirror the message back to the front-end through the hub
    #[serde(default)]
    pub redirect_to_frontend: bool,

    /// Forward the message to the client's registered callback URL
    #[serde(default = "default_redirect_to_callback")]
    pub redirect_to_callback: bool,
}

impl RedirectConfig {
    pub fn new(redirect_to_frontend: bool, redirect_to_callback: bool) -> Self {
        Self {
            redirect_to_frontend,
            redirect_to_callback,
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            redirect_to_frontend: false,
            redirect_to_callback: default_redirect_to_callback(),
        }
    }
}

fn default_redirect_to_callback() -> bool {
    true
}
