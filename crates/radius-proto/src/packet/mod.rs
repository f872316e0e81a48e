mod code;
#[allow(clippy::module_inception)]
mod packet;

pub use code::Code;
pub use packet::{attribute_region, Packet, PacketError, HEADER_LENGTH, MAX_PACKET_SIZE};
