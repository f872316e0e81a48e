//! RADIUS wire format helpers for the pool proxy
//!
//! This crate holds the protocol-level pieces the proxy needs to look inside
//! datagrams without fully decoding them:
//!
//! - Fixed header constants and packet codes (RFC 2865 Section 3, RFC 2866)
//! - A zero-copy attribute walker that never reads past its input
//! - Vendor-Specific attribute (type 26) parsing
//! - Device serial number extraction from the OpenWiFi vendor attribute
//! - An owned packet/attribute encoder for building datagrams
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{Code, Packet, extract_device_id, serial_number_attribute};
//!
//! let mut packet = Packet::new(Code::AccountingRequest, 7, [0u8; 16]);
//! packet.add_attribute(serial_number_attribute("aa-bb-cc-dd-ee-ff").unwrap());
//! let bytes = packet.encode().unwrap();
//!
//! let attrs = radius_proto::attribute_region(&bytes).unwrap();
//! assert_eq!(extract_device_id(attrs).as_deref(), Some("aabbccddeeff"));
//! ```

pub mod attributes;
pub mod packet;
pub mod vendor;

pub use attributes::{Attribute, AttributeType, RawAttribute, RawAttributes};
pub use packet::{attribute_region, Code, Packet, PacketError};
pub use vendor::{
    extract_device_id, serial_number_attribute, VendorSpecific, OPENWIFI_VENDOR_ID,
};
