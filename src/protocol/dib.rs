//! Description Information Blocks (DIB).
//!
//! A [`Dib`] is the raw structure; the typed wrappers below validate one
//! description type each and give access to its fields. Wrappers are only
//! created through `from_dib`, which returns `None` for blocks that do not
//! match their layout, so every accessor on a wrapper is infallible.

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use crate::protocol::constants::{DescriptionType, KnxMedium, ServiceFamily};
use crate::protocol::structure::Struct;
use bytes::{BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

/// Raw description information block
pub type Dib = Struct<DescriptionType>;

/// Largest payload a short-form DIB can carry
const MAX_SHORT_PAYLOAD: usize = 252;

/// Upper bound of (family, version) pairs in one DIB
pub const MAX_SERVICE_INFOS: usize = MAX_SHORT_PAYLOAD / 2;

/// Upper bound of addresses in one KNX addresses DIB
pub const MAX_KNX_ADDRESSES: usize = MAX_SHORT_PAYLOAD / 2;

fn ipv4_at(data: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(data[offset], data[offset + 1], data[offset + 2], data[offset + 3])
}

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn checked(dib: &Dib, code: DescriptionType, valid_size: impl Fn(usize) -> bool) -> bool {
    dib.code() == code && valid_size(dib.data_size())
}

/// Walk the blocks filling `data` from `offset` to its end.
///
/// `None` as soon as one block header is inconsistent.
pub(crate) fn scan_dibs(data: &Bytes, offset: usize) -> Option<Vec<Dib>> {
    if offset > data.len() {
        return None;
    }
    Dib::parse_all(&data.slice(offset..)).ok()
}

/// Keep the first occurrence of every block, in order.
pub(crate) fn dedup_dibs(dibs: impl IntoIterator<Item = Dib>) -> Vec<Dib> {
    let mut unique: Vec<Dib> = Vec::new();
    for dib in dibs {
        if !unique.contains(&dib) {
            unique.push(dib);
        }
    }
    unique
}

// =============================================================================
// Device Information
// =============================================================================

/// Device information DIB (54 bytes).
///
/// ```text
/// [0x36][0x01][medium][status][address:2][project id:2][serial:6]
/// [routing multicast:4][mac:6][friendly name:30]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfoDib(Dib);

impl DeviceInfoDib {
    /// Total size of the block
    pub const SIZE: usize = 54;
    /// Length of the zero padded friendly name
    pub const NAME_LEN: usize = 30;

    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::DeviceInfo, |len| len == Self::SIZE - 2).then_some(Self(dib))
    }

    /// Start building a device information block
    pub fn builder() -> DeviceInfoBuilder {
        DeviceInfoBuilder::default()
    }

    fn data(&self) -> Bytes {
        self.0.data()
    }

    /// KNX medium, `None` for unknown codes
    pub fn medium(&self) -> Option<KnxMedium> {
        KnxMedium::from_raw(self.data()[0])
    }

    /// Raw device status byte
    pub fn device_status(&self) -> u8 {
        self.data()[1]
    }

    /// Programming mode bit of the device status
    pub fn programming_mode(&self) -> bool {
        self.device_status() & 0x01 != 0
    }

    /// Individual address of the device
    pub fn individual_address(&self) -> IndividualAddress {
        IndividualAddress::from(u16_at(&self.data(), 2))
    }

    /// Project installation identifier
    pub fn project_installation_id(&self) -> u16 {
        u16_at(&self.data(), 4)
    }

    /// KNX serial number
    pub fn serial_number(&self) -> [u8; 6] {
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&self.data()[6..12]);
        serial
    }

    /// Routing multicast address
    pub fn multicast_address(&self) -> Ipv4Addr {
        ipv4_at(&self.data(), 12)
    }

    /// MAC address
    pub fn mac_address(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.data()[16..22]);
        mac
    }

    /// Friendly name up to the first zero byte.
    ///
    /// Invalid UTF-8 is replaced; the result is cut to 30 bytes.
    pub fn device_name(&self) -> heapless::String<30> {
        let data = self.data();
        let raw = &data[22..22 + Self::NAME_LEN];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());

        let mut name = heapless::String::new();
        for ch in String::from_utf8_lossy(&raw[..end]).chars() {
            if name.push(ch).is_err() {
                break;
            }
        }
        name
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }

    /// Unwrap into the raw block
    pub fn into_dib(self) -> Dib {
        self.0
    }
}

/// Builder for [`DeviceInfoDib`].
#[derive(Debug, Clone, Default)]
pub struct DeviceInfoBuilder {
    medium: u8,
    status: u8,
    address: u16,
    project_id: u16,
    serial: [u8; 6],
    multicast: [u8; 4],
    mac: [u8; 6],
    name: heapless::String<30>,
}

impl DeviceInfoBuilder {
    /// Set the KNX medium
    #[must_use]
    pub fn medium(mut self, medium: KnxMedium) -> Self {
        self.medium = medium.to_raw();
        self
    }

    /// Set the programming mode bit
    #[must_use]
    pub fn programming_mode(mut self, active: bool) -> Self {
        self.status = u8::from(active);
        self
    }

    /// Set the individual address
    #[must_use]
    pub fn individual_address(mut self, address: IndividualAddress) -> Self {
        self.address = address.raw();
        self
    }

    /// Set the project installation identifier
    #[must_use]
    pub fn project_installation_id(mut self, id: u16) -> Self {
        self.project_id = id;
        self
    }

    /// Set the serial number
    #[must_use]
    pub fn serial_number(mut self, serial: [u8; 6]) -> Self {
        self.serial = serial;
        self
    }

    /// Set the routing multicast address
    #[must_use]
    pub fn multicast_address(mut self, address: Ipv4Addr) -> Self {
        self.multicast = address.octets();
        self
    }

    /// Set the MAC address
    #[must_use]
    pub fn mac_address(mut self, mac: [u8; 6]) -> Self {
        self.mac = mac;
        self
    }

    /// Set the friendly name, cut at 30 bytes on a character boundary
    #[must_use]
    pub fn device_name(mut self, name: &str) -> Self {
        self.name.clear();
        for c in name.chars() {
            if self.name.push(c).is_err() {
                break;
            }
        }
        self
    }

    /// Emit the block
    pub fn build(self) -> DeviceInfoDib {
        let mut payload = [0u8; DeviceInfoDib::SIZE - 2];
        {
            // The name stays zero padded to its 30 bytes
            let mut buf = &mut payload[..];
            buf.put_u8(self.medium);
            buf.put_u8(self.status);
            buf.put_u16(self.address);
            buf.put_u16(self.project_id);
            buf.put_slice(&self.serial);
            buf.put_slice(&self.multicast);
            buf.put_slice(&self.mac);
            buf.put_slice(self.name.as_bytes());
        }
        DeviceInfoDib(Dib::from_array(DescriptionType::DeviceInfo, payload))
    }
}

// =============================================================================
// Service Families
// =============================================================================

/// One (service family, version) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceInfo {
    /// Service family
    pub family: ServiceFamily,
    /// Family version (or required security version)
    pub version: u8,
}

impl ServiceInfo {
    /// Create a new pair
    pub const fn new(family: ServiceFamily, version: u8) -> Self {
        Self { family, version }
    }
}

fn service_infos(data: &[u8]) -> heapless::Vec<ServiceInfo, MAX_SERVICE_INFOS> {
    data.chunks_exact(2)
        .filter_map(|pair| ServiceFamily::from_raw(pair[0]).map(|family| ServiceInfo::new(family, pair[1])))
        .take(MAX_SERVICE_INFOS)
        .collect()
}

fn service_payload(infos: &[ServiceInfo]) -> Result<Vec<u8>> {
    if infos.len() > MAX_SERVICE_INFOS {
        return Err(KnxError::payload_too_large());
    }
    Ok(infos.iter().flat_map(|info| [info.family.to_raw(), info.version]).collect())
}

fn all_families_known(data: &[u8], allow_security: bool) -> bool {
    data.len() % 2 == 0
        && data.len() <= MAX_SHORT_PAYLOAD
        && data.chunks_exact(2).all(|pair| match ServiceFamily::from_raw(pair[0]) {
            Some(ServiceFamily::Security) => allow_security,
            Some(_) => true,
            None => false,
        })
}

/// Supported service families DIB.
///
/// The security family is announced through
/// [`SecuredServiceFamiliesDib`] instead; a supported families block that
/// lists it is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceFamiliesDib(Dib);

impl ServiceFamiliesDib {
    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        let valid = dib.code() == DescriptionType::SupportedServiceFamilies
            && all_families_known(&dib.data(), false);
        valid.then_some(Self(dib))
    }

    /// Build a block from `(family, version)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` if a pair names the security family.
    pub fn build(infos: &[ServiceInfo]) -> Result<Self> {
        if infos.iter().any(|info| info.family >= ServiceFamily::Security) {
            return Err(KnxError::invalid_structure());
        }
        let payload = service_payload(infos)?;
        Dib::from_payload(DescriptionType::SupportedServiceFamilies, &payload).map(Self)
    }

    /// All advertised pairs, in wire order
    pub fn service_infos(&self) -> heapless::Vec<ServiceInfo, MAX_SERVICE_INFOS> {
        service_infos(&self.0.data())
    }

    /// Highest version advertised for `family`
    pub fn version(&self, family: ServiceFamily) -> Option<u8> {
        self.service_infos()
            .iter()
            .filter(|info| info.family == family)
            .map(|info| info.version)
            .max()
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }

    /// Unwrap into the raw block
    pub fn into_dib(self) -> Dib {
        self.0
    }
}

/// Secured service families DIB, pairs of family and required security
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecuredServiceFamiliesDib(Dib);

impl SecuredServiceFamiliesDib {
    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        let valid = dib.code() == DescriptionType::SecuredServiceFamilies
            && all_families_known(&dib.data(), true);
        valid.then_some(Self(dib))
    }

    /// Build a block from `(family, security version)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` for more pairs than fit one block.
    pub fn build(infos: &[ServiceInfo]) -> Result<Self> {
        let payload = service_payload(infos)?;
        Dib::from_payload(DescriptionType::SecuredServiceFamilies, &payload).map(Self)
    }

    /// All advertised pairs, in wire order
    pub fn service_infos(&self) -> heapless::Vec<ServiceInfo, MAX_SERVICE_INFOS> {
        service_infos(&self.0.data())
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }
}

// =============================================================================
// IP Configuration
// =============================================================================

/// IP configuration DIB (16 bytes).
///
/// ```text
/// [0x10][0x03][ip:4][mask:4][gateway:4][capabilities][assignment methods]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpConfigDib(Dib);

impl IpConfigDib {
    /// Total size of the block
    pub const SIZE: usize = 16;
    /// Device can obtain its address through BootP
    pub const CAPABILITY_BOOTP: u8 = 0x01;
    /// Device can obtain its address through DHCP
    pub const CAPABILITY_DHCP: u8 = 0x02;
    /// Device can pick an AutoIP address
    pub const CAPABILITY_AUTO_IP: u8 = 0x04;

    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::IpConfig, |len| len == Self::SIZE - 2).then_some(Self(dib))
    }

    /// Build a block.
    ///
    /// `assignment_methods` is a mask of
    /// [`AssignmentMethod`](crate::protocol::constants::AssignmentMethod)
    /// values.
    pub fn new(ip: Ipv4Addr, mask: Ipv4Addr, gateway: Ipv4Addr, capabilities: u8, assignment_methods: u8) -> Self {
        let mut payload = [0u8; Self::SIZE - 2];
        payload[0..4].copy_from_slice(&ip.octets());
        payload[4..8].copy_from_slice(&mask.octets());
        payload[8..12].copy_from_slice(&gateway.octets());
        payload[12] = capabilities;
        payload[13] = assignment_methods;
        Self(Dib::from_array(DescriptionType::IpConfig, payload))
    }

    /// Configured IP address
    pub fn ip_address(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 0)
    }

    /// Configured subnet mask
    pub fn subnet_mask(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 4)
    }

    /// Configured default gateway
    pub fn default_gateway(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 8)
    }

    /// Capability mask
    pub fn capabilities(&self) -> u8 {
        self.0.data()[12]
    }

    /// Enabled assignment method mask
    pub fn assignment_methods(&self) -> u8 {
        self.0.data()[13]
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }

    /// Unwrap into the raw block
    pub fn into_dib(self) -> Dib {
        self.0
    }
}

/// Current IP configuration DIB (20 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrentIpConfigDib(Dib);

impl CurrentIpConfigDib {
    /// Total size of the block
    pub const SIZE: usize = 20;

    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::CurrentIpConfig, |len| len == Self::SIZE - 2).then_some(Self(dib))
    }

    /// Build a block
    pub fn new(
        ip: Ipv4Addr,
        mask: Ipv4Addr,
        gateway: Ipv4Addr,
        dhcp_server: Ipv4Addr,
        assignment_method: u8,
    ) -> Self {
        let mut payload = [0u8; Self::SIZE - 2];
        payload[0..4].copy_from_slice(&ip.octets());
        payload[4..8].copy_from_slice(&mask.octets());
        payload[8..12].copy_from_slice(&gateway.octets());
        payload[12..16].copy_from_slice(&dhcp_server.octets());
        payload[16] = assignment_method;
        Self(Dib::from_array(DescriptionType::CurrentIpConfig, payload))
    }

    /// Current IP address
    pub fn ip_address(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 0)
    }

    /// Current subnet mask
    pub fn subnet_mask(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 4)
    }

    /// Current default gateway
    pub fn default_gateway(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 8)
    }

    /// DHCP server that handed out the address
    pub fn dhcp_server(&self) -> Ipv4Addr {
        ipv4_at(&self.0.data(), 12)
    }

    /// Assignment method in use
    pub fn assignment_method(&self) -> u8 {
        self.0.data()[16]
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }
}

// =============================================================================
// KNX Addresses
// =============================================================================

/// KNX individual addresses DIB
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnxAddressesDib(Dib);

impl KnxAddressesDib {
    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::KnxAddresses, |len| {
            len >= 2 && len % 2 == 0 && len <= MAX_SHORT_PAYLOAD
        })
        .then_some(Self(dib))
    }

    /// Build a block.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` for an empty list and `PayloadTooLarge`
    /// for more addresses than fit one block.
    pub fn build(addresses: &[IndividualAddress]) -> Result<Self> {
        if addresses.is_empty() {
            return Err(KnxError::invalid_structure());
        }
        if addresses.len() > MAX_KNX_ADDRESSES {
            return Err(KnxError::payload_too_large());
        }
        let payload: Vec<u8> = addresses.iter().flat_map(|a| a.to_bytes()).collect();
        Dib::from_payload(DescriptionType::KnxAddresses, &payload).map(Self)
    }

    /// Assigned addresses, in wire order
    pub fn addresses(&self) -> heapless::Vec<IndividualAddress, MAX_KNX_ADDRESSES> {
        self.0
            .data()
            .chunks_exact(2)
            .map(|pair| IndividualAddress::from(u16::from_be_bytes([pair[0], pair[1]])))
            .take(MAX_KNX_ADDRESSES)
            .collect()
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }
}

// =============================================================================
// Tunneling Information
// =============================================================================

/// One tunneling slot of a [`TunnelingInfoDib`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelingSlot {
    /// Individual address of the slot
    pub address: IndividualAddress,
    /// Slot status bits
    pub status: u16,
}

impl TunnelingSlot {
    /// Slot is free
    pub const FREE: u16 = 0x0001;
    /// Client is authorised for the slot
    pub const AUTHORIZED: u16 = 0x0002;
    /// Slot is usable
    pub const USABLE: u16 = 0x0004;

    /// Whether the slot can take a new connection
    pub fn is_available(&self) -> bool {
        self.status & (Self::FREE | Self::USABLE) == Self::FREE | Self::USABLE
    }
}

/// Tunneling information DIB.
///
/// Only legal inside an extended search response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TunnelingInfoDib(Dib);

impl TunnelingInfoDib {
    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::TunnelingInfo, |len| len >= 2 && (len - 2) % 4 == 0).then_some(Self(dib))
    }

    /// Build a block.
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` for more slots than fit one block.
    pub fn build(max_apdu_length: u16, slots: &[TunnelingSlot]) -> Result<Self> {
        if 2 + slots.len() * 4 > MAX_SHORT_PAYLOAD {
            return Err(KnxError::payload_too_large());
        }
        let mut payload = BytesMut::with_capacity(2 + slots.len() * 4);
        payload.put_u16(max_apdu_length);
        for slot in slots {
            payload.put_u16(slot.address.raw());
            payload.put_u16(slot.status);
        }
        Dib::from_payload(DescriptionType::TunnelingInfo, &payload).map(Self)
    }

    /// Maximum APDU length
    pub fn max_apdu_length(&self) -> u16 {
        u16_at(&self.0.data(), 0)
    }

    /// Tunneling slots
    pub fn slots(&self) -> Vec<TunnelingSlot> {
        self.0.data()[2..]
            .chunks_exact(4)
            .map(|slot| TunnelingSlot {
                address: IndividualAddress::from(u16::from_be_bytes([slot[0], slot[1]])),
                status: u16::from_be_bytes([slot[2], slot[3]]),
            })
            .collect()
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }

    /// Unwrap into the raw block
    pub fn into_dib(self) -> Dib {
        self.0
    }
}

// =============================================================================
// Extended Device Information / Manufacturer Data
// =============================================================================

/// Extended device information DIB (8 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtendedDeviceInfoDib(Dib);

impl ExtendedDeviceInfoDib {
    /// Total size of the block
    pub const SIZE: usize = 8;

    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::ExtendedDeviceInfo, |len| len == Self::SIZE - 2).then_some(Self(dib))
    }

    /// Build a block
    pub fn new(medium_status: u8, max_local_apdu_length: u16, device_descriptor: u16) -> Self {
        let mut payload = [0u8; Self::SIZE - 2];
        payload[0] = medium_status;
        payload[2..4].copy_from_slice(&max_local_apdu_length.to_be_bytes());
        payload[4..6].copy_from_slice(&device_descriptor.to_be_bytes());
        Self(Dib::from_array(DescriptionType::ExtendedDeviceInfo, payload))
    }

    /// Medium status byte
    pub fn medium_status(&self) -> u8 {
        self.0.data()[0]
    }

    /// Maximum local APDU length
    pub fn max_local_apdu_length(&self) -> u16 {
        u16_at(&self.0.data(), 2)
    }

    /// Device descriptor type 0
    pub fn device_descriptor(&self) -> u16 {
        u16_at(&self.0.data(), 4)
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }
}

/// Manufacturer data DIB
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManufacturerDataDib(Dib);

impl ManufacturerDataDib {
    /// Validate a raw block
    pub fn from_dib(dib: Dib) -> Option<Self> {
        checked(&dib, DescriptionType::ManufacturerData, |len| len >= 2).then_some(Self(dib))
    }

    /// Build a block
    ///
    /// # Errors
    ///
    /// Returns `PayloadTooLarge` if the data does not fit one block.
    pub fn build(manufacturer_id: u16, data: &[u8]) -> Result<Self> {
        Dib::builder(DescriptionType::ManufacturerData)
            .push_u16(manufacturer_id)
            .extend(data)
            .build()
            .map(Self)
    }

    /// KNX manufacturer identifier
    pub fn manufacturer_id(&self) -> u16 {
        u16_at(&self.0.data(), 0)
    }

    /// Opaque manufacturer data
    pub fn data(&self) -> Bytes {
        self.0.data().slice(2..)
    }

    /// Raw block
    pub fn as_dib(&self) -> &Dib {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::AssignmentMethod;

    fn sample_device_info() -> DeviceInfoDib {
        DeviceInfoDib::builder()
            .medium(KnxMedium::NetIp)
            .programming_mode(true)
            .individual_address(IndividualAddress::from(0xFFFF))
            .project_installation_id(0x1111)
            .serial_number([0x12, 0x34, 0x56, 0x12, 0x34, 0x56])
            .multicast_address(Ipv4Addr::UNSPECIFIED)
            .mac_address([0xBC, 0xAE, 0xC5, 0x66, 0x90, 0xF9])
            .device_name("qt.io KNX device")
            .build()
    }

    #[test]
    fn test_device_info_layout() {
        let dib = sample_device_info();
        let bytes = dib.as_dib().bytes();
        assert_eq!(bytes.len(), 54);
        assert_eq!(
            &bytes[..24],
            &[
                0x36, 0x01, 0x20, 0x01, 0xFF, 0xFF, 0x11, 0x11, 0x12, 0x34, 0x56, 0x12, 0x34, 0x56, 0x00, 0x00, 0x00,
                0x00, 0xBC, 0xAE, 0xC5, 0x66, 0x90, 0xF9
            ]
        );
        assert_eq!(&bytes[24..40], b"qt.io KNX device");
        assert!(bytes[40..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_device_info_accessors() {
        let dib = DeviceInfoDib::from_dib(sample_device_info().into_dib()).unwrap();
        assert_eq!(dib.medium(), Some(KnxMedium::NetIp));
        assert!(dib.programming_mode());
        assert_eq!(dib.project_installation_id(), 0x1111);
        assert_eq!(dib.mac_address(), [0xBC, 0xAE, 0xC5, 0x66, 0x90, 0xF9]);
        assert_eq!(dib.device_name().as_str(), "qt.io KNX device");
    }

    #[test]
    fn test_device_name_truncated() {
        let dib = DeviceInfoDib::builder().device_name("a very long device name that exceeds thirty bytes").build();
        assert_eq!(dib.device_name().len(), 30);
        assert_eq!(dib.as_dib().size(), 54);
    }

    #[test]
    fn test_device_name_cut_on_char_boundary() {
        let name = format!("{}é", "x".repeat(29));
        let dib = DeviceInfoDib::builder().device_name(&name).build();
        assert_eq!(dib.device_name().as_str(), "x".repeat(29));
        assert_eq!(dib.as_dib().size(), 54);
    }

    #[test]
    fn test_wrong_code_rejected() {
        let families = ServiceFamiliesDib::build(&[ServiceInfo::new(ServiceFamily::Core, 1)]).unwrap();
        assert!(DeviceInfoDib::from_dib(families.into_dib()).is_none());
    }

    #[test]
    fn test_service_families() {
        let dib = ServiceFamiliesDib::build(&[
            ServiceInfo::new(ServiceFamily::Core, 1),
            ServiceInfo::new(ServiceFamily::IpTunneling, 1),
            ServiceInfo::new(ServiceFamily::IpTunneling, 2),
        ])
        .unwrap();
        assert_eq!(&dib.as_dib().bytes()[..], &[0x08, 0x02, 0x02, 0x01, 0x04, 0x01, 0x04, 0x02]);
        assert_eq!(dib.service_infos().len(), 3);
        assert_eq!(dib.version(ServiceFamily::IpTunneling), Some(2));
        assert_eq!(dib.version(ServiceFamily::IpRouting), None);
    }

    #[test]
    fn test_security_family_rejected() {
        assert!(ServiceFamiliesDib::build(&[ServiceInfo::new(ServiceFamily::Security, 1)]).is_err());

        let raw = Dib::builder(DescriptionType::SupportedServiceFamilies).extend(&[0x02, 0x01, 0x09, 0x01]).build().unwrap();
        assert!(ServiceFamiliesDib::from_dib(raw).is_none());

        let secured = SecuredServiceFamiliesDib::build(&[ServiceInfo::new(ServiceFamily::Security, 1)]).unwrap();
        assert_eq!(secured.service_infos()[0].family, ServiceFamily::Security);
    }

    #[test]
    fn test_ip_config_bytes() {
        let dib = IpConfigDib::new(
            Ipv4Addr::new(192, 168, 2, 12),
            Ipv4Addr::new(255, 255, 255, 0),
            Ipv4Addr::new(192, 168, 2, 1),
            IpConfigDib::CAPABILITY_AUTO_IP | IpConfigDib::CAPABILITY_DHCP,
            AssignmentMethod::Manual.to_raw() | AssignmentMethod::AutoIp.to_raw() | AssignmentMethod::Dhcp.to_raw(),
        );
        assert_eq!(
            &dib.as_dib().bytes()[..],
            &[0x10, 0x03, 0xC0, 0xA8, 0x02, 0x0C, 0xFF, 0xFF, 0xFF, 0x00, 0xC0, 0xA8, 0x02, 0x01, 0x06, 0x0D]
        );
        assert_eq!(dib.default_gateway(), Ipv4Addr::new(192, 168, 2, 1));
    }

    #[test]
    fn test_knx_addresses() {
        let a = IndividualAddress::new(1, 1, 1).unwrap();
        let b = IndividualAddress::new(1, 1, 2).unwrap();
        let dib = KnxAddressesDib::build(&[a, b]).unwrap();
        assert_eq!(dib.addresses().as_slice(), &[a, b]);
        assert!(KnxAddressesDib::build(&[]).is_err());
    }

    #[test]
    fn test_tunneling_info() {
        let slot = TunnelingSlot {
            address: IndividualAddress::new(1, 1, 10).unwrap(),
            status: TunnelingSlot::FREE | TunnelingSlot::USABLE,
        };
        let dib = TunnelingInfoDib::build(254, &[slot]).unwrap();
        assert_eq!(&dib.as_dib().bytes()[..], &[0x08, 0x07, 0x00, 0xFE, 0x11, 0x0A, 0x00, 0x05]);
        assert_eq!(dib.max_apdu_length(), 254);
        assert!(dib.slots()[0].is_available());
    }

    #[test]
    fn test_manufacturer_data() {
        let dib = ManufacturerDataDib::build(0x00C5, &[0xAA, 0xBB]).unwrap();
        assert_eq!(dib.manufacturer_id(), 0x00C5);
        assert_eq!(&dib.data()[..], &[0xAA, 0xBB]);
    }
}
