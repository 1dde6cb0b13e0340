//! Outcome of routing one message.

use std::fmt;

/// Which channels a redirected message was sent to.
///
/// The legacy integer encoding is kept through [`Redirects::code`]:
/// bit 0 is the front-end mirror, bit 1 the callback webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redirects {
    pub frontend: bool,
    pub callback: bool,
}

impl Redirects {
    pub const FRONTEND_BIT: u8 = 1;
    pub const CALLBACK_BIT: u8 = 2;

    /// Returns true if at least one channel fired.
    pub fn any(&self) -> bool {
        self.frontend || self.callback
    }

    /// 0 (none), 1 (frontend), 2 (callback) or 3 (both).
    pub fn code(&self) -> u8 {
        let mut code = 0;
        if self.frontend {
            code += Self::FRONTEND_BIT;
        }
        if self.callback {
            code += Self::CALLBACK_BIT;
        }
        code
    }

    pub fn from_code(code: u8) -> Self {
        Self {
            frontend: code & Self::FRONTEND_BIT != 0,
            callback: code & Self::CALLBACK_BIT != 0,
        }
    }
}

impl fmt::Display for Redirects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.frontend, self.callback) {
            (false, false) => write!(f, "none"),
            (true, false) => write!(f, "frontend"),
            (false, true) => write!(f, "callback"),
            (true, true) => write!(f, "frontend+callback"),
        }
    }
}
