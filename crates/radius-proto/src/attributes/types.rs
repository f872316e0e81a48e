/// RADIUS attribute types the proxy inspects or emits
///
/// Only a subset of RFC 2865/2866 is listed; everything else is relayed
/// untouched and identified by its raw type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// NAS-IP-Address (4) - RFC 2865
    NasIpAddress = 4,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// Vendor-Specific (26) - RFC 2865
    VendorSpecific = 26,
    /// Called-Station-Id (30) - RFC 2865
    CalledStationId = 30,
    /// Acct-Status-Type (40) - RFC 2866
    AcctStatusType = 40,
    /// Acct-Session-Id (44) - RFC 2866
    AcctSessionId = 44,
}

impl AttributeType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
