//! The Unbind operation (RFC 4511 section 4.3): tells the server the
//! client is ending the session. Unbind has no response; the caller is
//! expected to close the connection right after sending it.

use ber_codec::common::TagClass;
use ber_codec::structures::{Null, Tag};

use crate::ldap::Ldap;
use crate::result::Result;

impl Ldap {
    /// Send an UnbindRequest. Does not wait for a response.
    pub fn unbind(&mut self) -> Result<()> {
        let req = Tag::Null(Null {
            id: 2,
            class: TagClass::Application,
            inner: (),
        });

        self.solo_op(req)
    }
}
