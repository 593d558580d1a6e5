//! EFI Device Path for the SDMMC host
//!
//! The MMC host protocol identifies the controller with a single vendor
//! hardware node carrying the driver's GUID, terminated by an End node.

use r_efi::efi::Guid;
use r_efi::protocols::device_path::{End, Protocol, TYPE_END};

use crate::efi::utils::guid_bytes;

/// Type for Hardware device paths
const TYPE_HARDWARE: u8 = 0x01;
/// Sub-type for vendor-defined hardware device paths
const SUBTYPE_VENDOR: u8 = 0x04;

/// Vendor hardware device path node (UEFI Spec 10.3.2.4)
#[repr(C, packed)]
pub struct VendorDevicePathNode {
    pub r#type: u8,
    pub sub_type: u8,
    pub length: [u8; 2],
    /// Vendor GUID, in its in-memory byte order
    pub guid: [u8; 16],
}

/// Controller device path: Vendor HW + End
#[repr(C, packed)]
pub struct SdmmcDevicePath {
    pub vendor: VendorDevicePathNode,
    pub end: End,
}

/// Size of [`SdmmcDevicePath`] in bytes
pub const SDMMC_DEVICE_PATH_SIZE: usize = core::mem::size_of::<SdmmcDevicePath>();

impl SdmmcDevicePath {
    /// Serialize the path as firmware consumers read it
    pub fn to_bytes(&self) -> [u8; SDMMC_DEVICE_PATH_SIZE] {
        let vendor_len = core::mem::size_of::<VendorDevicePathNode>();
        let guid = self.vendor.guid;

        let mut bytes = [0u8; SDMMC_DEVICE_PATH_SIZE];
        bytes[0] = self.vendor.r#type;
        bytes[1] = self.vendor.sub_type;
        bytes[2..4].copy_from_slice(&self.vendor.length);
        bytes[4..vendor_len].copy_from_slice(&guid);
        bytes[vendor_len] = self.end.header.r#type;
        bytes[vendor_len + 1] = self.end.header.sub_type;
        bytes[vendor_len + 2..].copy_from_slice(&self.end.header.length);
        bytes
    }

    /// Vendor GUID carried by the path
    pub fn vendor_guid(&self) -> [u8; 16] {
        self.vendor.guid
    }
}

/// Build the device path published for the controller
pub fn build_sdmmc_device_path(vendor_guid: &Guid) -> SdmmcDevicePath {
    let path = SdmmcDevicePath {
        vendor: VendorDevicePathNode {
            r#type: TYPE_HARDWARE,
            sub_type: SUBTYPE_VENDOR,
            length: (core::mem::size_of::<VendorDevicePathNode>() as u16).to_le_bytes(),
            guid: guid_bytes(vendor_guid),
        },
        end: end_node(),
    };

    log::debug!("Created SDMMC vendor device path");
    path
}

/// End Entire device path node
#[inline]
fn end_node() -> End {
    End {
        header: Protocol {
            r#type: TYPE_END,
            sub_type: End::SUBTYPE_ENTIRE,
            length: (core::mem::size_of::<End>() as u16).to_le_bytes(),
        },
    }
}
