use super::Oid;

pub const RELAX_RULES_OID: &str = "1.3.6.1.4.1.4203.666.5.12";

/// Relax Rules control.
///
/// Asks the server to relax some schema and model enforcement that would
/// otherwise reject the request, e.g. when restoring from an export.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelaxRules;

impl Oid for RelaxRules {
    fn oid(&self) -> &'static str {
        RELAX_RULES_OID
    }

    fn value(&self) -> Option<Vec<u8>> {
        None
    }
}
