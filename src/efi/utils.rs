//! EFI utility functions

use r_efi::efi::Guid;

/// Raw bytes of a GUID, in its in-memory (mixed-endian) layout
pub fn guid_bytes(guid: &Guid) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    // SAFETY: Guid is a 16-byte repr(C) struct and the slice does not
    // outlive the reference.
    let raw = unsafe { core::slice::from_raw_parts(guid as *const Guid as *const u8, 16) };
    bytes.copy_from_slice(raw);
    bytes
}
