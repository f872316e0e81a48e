//! Vendor-Specific attributes and device identification
//!
//! Access points managed by OpenWiFi tag their RADIUS traffic with a
//! Vendor-Specific attribute (RFC 2865 Section 5.26) under vendor id 58888.
//! The device serial number sits two TLV levels deep inside it:
//!
//! ```text
//! [26][len][vendor-id: 4 bytes = 58888]
//!          [71][len]            device information
//!                   [1][len][serial, optionally '-' separated]
//! ```

use crate::attributes::{Attribute, AttributeType, RawAttributes};
use crate::packet::PacketError;

/// IANA private enterprise number used by OpenWiFi access points
pub const OPENWIFI_VENDOR_ID: u32 = 58888;
/// Vendor sub-attribute carrying device information
pub const DEVICE_INFO_SUBATTR: u8 = 71;
/// Device information entry carrying the serial number
pub const SERIAL_NUMBER_SUBATTR: u8 = 1;
/// Serial numbers are 12 characters once separators are removed
pub const SERIAL_NUMBER_LENGTH: usize = 12;

const VENDOR_ID_LENGTH: usize = 4;

/// Parsed Vendor-Specific attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorSpecific<'a> {
    pub vendor_id: u32,
    /// Vendor-defined payload following the vendor id
    pub data: &'a [u8],
}

impl<'a> VendorSpecific<'a> {
    /// Parse the value of a type 26 attribute
    pub fn parse(value: &'a [u8]) -> Result<Self, PacketError> {
        let (id, data) = value
            .split_first_chunk::<VENDOR_ID_LENGTH>()
            .ok_or(PacketError::Truncated {
                offset: 0,
                needed: VENDOR_ID_LENGTH,
                available: value.len(),
            })?;

        Ok(VendorSpecific {
            vendor_id: u32::from_be_bytes(*id),
            data,
        })
    }

    /// Build a Vendor-Specific attribute around a vendor payload
    pub fn to_attribute(vendor_id: u32, data: &[u8]) -> Result<Attribute, PacketError> {
        let mut value = Vec::with_capacity(VENDOR_ID_LENGTH + data.len());
        value.extend_from_slice(&vendor_id.to_be_bytes());
        value.extend_from_slice(data);
        Attribute::new(AttributeType::VendorSpecific.as_u8(), value)
    }
}

/// Extract the device serial number from a packet's attribute region.
///
/// `attributes` is everything after the 20-byte header. Returns `None` when
/// no OpenWiFi device information is present, when the first serial number
/// entry is not exactly 12 characters after stripping `-`, or when any
/// length field along the way is malformed.
pub fn extract_device_id(attributes: &[u8]) -> Option<String> {
    find_serial_number(attributes).ok().flatten()
}

fn find_serial_number(attributes: &[u8]) -> Result<Option<String>, PacketError> {
    for attr in RawAttributes::new(attributes) {
        let attr = attr?;
        if attr.attr_type != AttributeType::VendorSpecific.as_u8() {
            continue;
        }

        let vsa = VendorSpecific::parse(attr.value)?;
        if vsa.vendor_id != OPENWIFI_VENDOR_ID {
            continue;
        }

        for sub in RawAttributes::new(vsa.data) {
            let sub = sub?;
            if sub.attr_type != DEVICE_INFO_SUBATTR {
                continue;
            }
            // The first serial entry decides, valid or not.
            if let Some(serial) = RawAttributes::new(sub.value).find(SERIAL_NUMBER_SUBATTR)? {
                return Ok(normalize_serial(serial.value));
            }
        }
    }

    Ok(None)
}

fn normalize_serial(raw: &[u8]) -> Option<String> {
    let serial: Vec<u8> = raw.iter().copied().filter(|&b| b != b'-').collect();
    if serial.len() != SERIAL_NUMBER_LENGTH || !serial.is_ascii() {
        return None;
    }
    String::from_utf8(serial).ok()
}

/// Build the OpenWiFi Vendor-Specific attribute carrying `serial`.
///
/// The serial is written as given, separators included.
pub fn serial_number_attribute(serial: &str) -> Result<Attribute, PacketError> {
    let serial_entry = Attribute::new(SERIAL_NUMBER_SUBATTR, serial.as_bytes().to_vec())?;
    let device_info = Attribute::new(DEVICE_INFO_SUBATTR, serial_entry.encode()?)?;
    VendorSpecific::to_attribute(OPENWIFI_VENDOR_ID, &device_info.encode()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(attrs: &[Attribute]) -> Vec<u8> {
        attrs
            .iter()
            .flat_map(|a| a.encode().unwrap())
            .collect()
    }

    #[test]
    fn test_vendor_specific_parse() {
        let vsa = VendorSpecific::parse(&[0, 0, 0xe6, 0x08, 71, 2]).unwrap();
        assert_eq!(vsa.vendor_id, 58888);
        assert_eq!(vsa.data, [71, 2]);

        assert!(VendorSpecific::parse(&[0, 0, 0xe6]).is_err());
    }

    #[test]
    fn test_extract_plain_serial() {
        let data = encode(&[serial_number_attribute("903cb3bb2472").unwrap()]);
        assert_eq!(extract_device_id(&data).as_deref(), Some("903cb3bb2472"));
    }

    #[test]
    fn test_extract_strips_separators() {
        let data = encode(&[
            Attribute::string(AttributeType::UserName.as_u8(), "alice").unwrap(),
            serial_number_attribute("90-3c-b3-bb-24-72").unwrap(),
        ]);
        assert_eq!(extract_device_id(&data).as_deref(), Some("903cb3bb2472"));
    }

    #[test]
    fn test_wrong_length_serial() {
        let short = encode(&[serial_number_attribute("903cb3bb247").unwrap()]);
        assert_eq!(extract_device_id(&short), None);

        let long = encode(&[serial_number_attribute("903cb3bb24721").unwrap()]);
        assert_eq!(extract_device_id(&long), None);
    }

    #[test]
    fn test_non_ascii_serial_rejected() {
        // Twelve bytes once separators go, but not twelve ASCII characters
        let serial = "\u{e9}903cb3bb24";
        assert_eq!(serial.len(), SERIAL_NUMBER_LENGTH);
        let data = encode(&[serial_number_attribute(serial).unwrap()]);
        assert_eq!(extract_device_id(&data), None);

        let mut raw = serial_number_attribute("903cb3bb2472").unwrap().encode().unwrap();
        let last = raw.len() - 1;
        raw[last] = 0xb2;
        assert_eq!(extract_device_id(&raw), None);
    }

    #[test]
    fn test_first_serial_entry_decides() {
        let bad = serial_number_attribute("abc").unwrap();
        let good = serial_number_attribute("903cb3bb2472").unwrap();
        assert_eq!(extract_device_id(&encode(&[bad, good])), None);
    }

    #[test]
    fn test_other_vendor_ignored() {
        let device_info = [71, 16, 1, 14, b'9', b'0', b'3', b'c', b'b', b'3', b'b', b'b', b'2', b'4', b'7', b'2'];
        let other = VendorSpecific::to_attribute(9, &device_info).unwrap();
        assert_eq!(extract_device_id(&encode(&[other.clone()])), None);

        let ours = VendorSpecific::to_attribute(OPENWIFI_VENDOR_ID, &device_info).unwrap();
        assert_eq!(
            extract_device_id(&encode(&[other, ours])).as_deref(),
            Some("903cb3bb2472")
        );
    }

    #[test]
    fn test_device_info_after_other_subattributes() {
        let mut payload = vec![5, 4, 0xaa, 0xbb];
        payload.extend_from_slice(&[71, 19, 7, 3, 0, 1, 14]);
        payload.extend_from_slice(b"903cb3bb2472");
        let attr = VendorSpecific::to_attribute(OPENWIFI_VENDOR_ID, &payload).unwrap();
        assert_eq!(extract_device_id(&attr.encode().unwrap()).as_deref(), Some("903cb3bb2472"));
    }

    #[test]
    fn test_missing_vendor_attribute() {
        let data = encode(&[Attribute::string(AttributeType::UserName.as_u8(), "bob").unwrap()]);
        assert_eq!(extract_device_id(&data), None);
        assert_eq!(extract_device_id(&[]), None);
    }

    #[test]
    fn test_truncated_inputs_never_panic() {
        let full = encode(&[serial_number_attribute("903cb3bb2472").unwrap()]);
        for end in 0..full.len() {
            assert_eq!(extract_device_id(&full[..end]), None, "prefix of {} bytes", end);
        }
    }

    #[test]
    fn test_corrupted_length_bytes() {
        let full = encode(&[serial_number_attribute("903cb3bb2472").unwrap()]);
        // Outer, device-info and serial length fields
        for index in [1usize, 7, 9] {
            for value in [0u8, 1, 255] {
                let mut data = full.clone();
                data[index] = value;
                let _ = extract_device_id(&data);
            }
        }

        let mut zero_len = full.clone();
        zero_len[1] = 0;
        assert_eq!(extract_device_id(&zero_len), None);
    }

    #[test]
    fn test_vendor_attribute_too_short_for_id() {
        let data = [26, 4, 0, 0];
        assert_eq!(extract_device_id(&data), None);
    }
}
