//! The lifecycle hook, run by the collector exactly once per unreachable handle.

use crate::descriptor::{BufferDescriptor, Ownership};
use crate::heap::HandleId;
use crate::registry::{OwnershipRegistry, RegistryKey};

/// What finalizing a handle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    /// An owner's memory was freed.
    Freed { bytes: usize },
    /// A view released its registry edge. `last_use` is set when that was the
    /// last view of the owner.
    Released { key: RegistryKey, last_use: bool },
    /// External pointer, nothing to do.
    Ignored,
}

/// Consumes the descriptor of an unreachable handle.
///
/// Owners free their memory; views only give back their registry use and
/// never touch memory; external pointers are left alone. The descriptor is
/// taken by value, so a second finalization of the same handle cannot be
/// expressed.
pub(crate) fn finalize(
    id: HandleId,
    descriptor: BufferDescriptor,
    registry: &mut OwnershipRegistry,
) -> Finalized {
    match descriptor.into_ownership() {
        Ownership::Owner(block) => {
            let bytes = block.len();
            drop(block);
            log::trace!("finalize {id}: freed {bytes} bytes");
            Finalized::Freed { bytes }
        }
        Ownership::View(key) => match registry.release(key) {
            Ok(owner) => {
                log::trace!("finalize {id}: released registry key {}", key.get());
                Finalized::Released {
                    key,
                    last_use: owner.is_some(),
                }
            }
            Err(e) => {
                log::error!("finalize {id}: registry bookkeeping violated: {e}");
                Finalized::Ignored
            }
        },
        Ownership::External => Finalized::Ignored,
    }
}
