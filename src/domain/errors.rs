//! Client protocol errors.

use thiserror::Error;

/// Errors raised while dispatching a client frame.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unable to register: blank from")]
    BlankFrom,

    #[error("unable to register: blank callback")]
    BlankCallback,

    #[error("unable to redirect: id and callback are blank")]
    NeedRegistration,

    #[error("unable to redirect: all redirects are deactivated")]
    NoRedirects,

    #[error("hub is no longer running")]
    HubUnavailable,
}

impl ProtocolError {
    /// Whether the error ends the client's session.
    ///
    /// A malformed `register` or disabled redirects only drop the frame at
    /// hand; messaging before registering or a stopped hub close the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::BlankFrom | ProtocolError::BlankCallback | ProtocolError::NoRedirects
        )
    }
}
