//! Shared identities for unit tests.
//!
//! RSA-4096 generation dominates test time, so each identity is generated
//! once per test binary.

use std::sync::OnceLock;

use crate::crypto::IdentityKeys;

fn cached(cell: &'static OnceLock<IdentityKeys>) -> &'static IdentityKeys {
    cell.get_or_init(|| IdentityKeys::generate().expect("test identity generation"))
}

pub(crate) fn alice() -> &'static IdentityKeys {
    static ALICE: OnceLock<IdentityKeys> = OnceLock::new();
    cached(&ALICE)
}

pub(crate) fn bob() -> &'static IdentityKeys {
    static BOB: OnceLock<IdentityKeys> = OnceLock::new();
    cached(&BOB)
}

pub(crate) fn mallory() -> &'static IdentityKeys {
    static MALLORY: OnceLock<IdentityKeys> = OnceLock::new();
    cached(&MALLORY)
}
