//! The Abandon operation (RFC 4511 section 4.11): cancels an outstanding
//! operation. Abandon itself has no response.

use crate::ldap::{Ldap, RequestId};
use crate::result::Result;

impl Ldap {
    /// Abandon the operation identified by `msgid`.
    pub fn abandon(&mut self, msgid: RequestId) -> Result<()> {
        self.abandon_msgid(msgid)
    }
}
