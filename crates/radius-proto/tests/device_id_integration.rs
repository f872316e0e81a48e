//! Integration tests for device identification on complete datagrams
//!
//! These tests build whole RADIUS packets the way access points send them
//! and run the same path the proxy listener uses: strip the header with
//! `attribute_region`, then `extract_device_id`.

use radius_proto::{
    attribute_region, extract_device_id, serial_number_attribute, Attribute, AttributeType, Code,
    Packet, RawAttributes, VendorSpecific, OPENWIFI_VENDOR_ID,
};

fn accounting_start(serial: &str) -> Vec<u8> {
    let mut packet = Packet::new(Code::AccountingRequest, 17, [0x5a; 16]);
    packet.add_attribute(Attribute::new(AttributeType::AcctStatusType.as_u8(), vec![0, 0, 0, 1]).unwrap());
    packet.add_attribute(Attribute::string(AttributeType::UserName.as_u8(), "guest@example.net").unwrap());
    packet.add_attribute(Attribute::new(AttributeType::NasIpAddress.as_u8(), vec![192, 0, 2, 10]).unwrap());
    packet.add_attribute(
        Attribute::string(AttributeType::CalledStationId.as_u8(), "90-3C-B3-BB-24-72:Guest").unwrap(),
    );
    packet.add_attribute(Attribute::string(AttributeType::AcctSessionId.as_u8(), "8D1E2C3F").unwrap());
    // Another vendor's attribute ahead of ours
    packet.add_attribute(VendorSpecific::to_attribute(14122, &[1, 6, b'w', b'i', b's', b'p']).unwrap());
    packet.add_attribute(serial_number_attribute(serial).unwrap());
    packet.encode().unwrap()
}

fn device_id(datagram: &[u8]) -> Option<String> {
    attribute_region(datagram).and_then(extract_device_id)
}

#[test]
fn test_accounting_start_identifies_device() {
    let datagram = accounting_start("90-3c-b3-bb-24-72");
    assert_eq!(device_id(&datagram).as_deref(), Some("903cb3bb2472"));
}

#[test]
fn test_serial_case_is_preserved() {
    let datagram = accounting_start("90-3C-B3-BB-24-72");
    assert_eq!(device_id(&datagram).as_deref(), Some("903CB3BB2472"));
}

#[test]
fn test_vendor_attribute_is_walkable() {
    let datagram = accounting_start("903cb3bb2472");
    let attrs = attribute_region(&datagram).unwrap();

    let vendor: Vec<_> = RawAttributes::new(attrs)
        .filter_map(Result::ok)
        .filter(|a| a.attr_type == AttributeType::VendorSpecific.as_u8())
        .map(|a| VendorSpecific::parse(a.value).unwrap().vendor_id)
        .collect();
    assert_eq!(vendor, vec![14122, OPENWIFI_VENDOR_ID]);
}

#[test]
fn test_device_info_with_extra_entries() {
    // Device information carrying a model entry before the serial
    let mut device_info = vec![2, 8];
    device_info.extend_from_slice(b"eap101");
    device_info.extend_from_slice(&[1, 14]);
    device_info.extend_from_slice(b"903cb3bb2472");

    let mut payload = vec![71, (device_info.len() + 2) as u8];
    payload.extend_from_slice(&device_info);

    let mut packet = Packet::new(Code::AccessRequest, 3, [0u8; 16]);
    packet.add_attribute(VendorSpecific::to_attribute(OPENWIFI_VENDOR_ID, &payload).unwrap());
    let datagram = packet.encode().unwrap();

    assert_eq!(device_id(&datagram).as_deref(), Some("903cb3bb2472"));
}

#[test]
fn test_every_single_byte_corruption_is_safe() {
    let datagram = accounting_start("90-3c-b3-bb-24-72");
    for index in 20..datagram.len() {
        for value in [0u8, 1, 2, 0x7f, 0xff] {
            let mut corrupted = datagram.clone();
            corrupted[index] = value;
            if let Some(id) = device_id(&corrupted) {
                assert_eq!(id.len(), 12, "byte {} = {}", index, value);
            }
        }
    }
}

#[test]
fn test_truncated_datagrams() {
    let datagram = accounting_start("903cb3bb2472");
    for end in 0..datagram.len() {
        assert_eq!(device_id(&datagram[..end]), None, "truncated at {}", end);
    }
    assert!(device_id(&datagram).is_some());
}
