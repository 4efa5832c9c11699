//! Snapshot of a KNXnet/IP server as seen by discovery or a description
//! request.

use crate::addressing::IndividualAddress;
use crate::net::IpEndpoint;
use crate::protocol::constants::{DescriptionType, ServiceFamily};
use crate::protocol::description::DescriptionResponse;
use crate::protocol::dib::{
    CurrentIpConfigDib, DeviceInfoDib, Dib, ExtendedDeviceInfoDib, IpConfigDib, KnxAddressesDib,
    ManufacturerDataDib, SecuredServiceFamiliesDib, ServiceFamiliesDib, TunnelingInfoDib,
};
use crate::protocol::hpai::Hpai;
use crate::protocol::search::SearchResponse;
use core::fmt;

/// Control endpoint, device information, service families and every
/// optional description block of one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerInfo {
    control_endpoint: Hpai,
    hardware: DeviceInfoDib,
    families: ServiceFamiliesDib,
    optional: Vec<Dib>,
}

impl ServerInfo {
    /// Assemble from already validated parts
    pub fn new(control_endpoint: Hpai, hardware: DeviceInfoDib, families: ServiceFamiliesDib, optional: Vec<Dib>) -> Self {
        Self { control_endpoint, hardware, families, optional }
    }

    /// Snapshot of a valid search response, `None` otherwise
    pub fn from_search_response(response: &SearchResponse) -> Option<Self> {
        if !response.is_valid() {
            return None;
        }
        Some(Self::new(
            response.control_endpoint()?,
            response.device_hardware()?,
            response.supported_families()?,
            response.optional_dibs(),
        ))
    }

    /// Snapshot of a valid description response from the server at
    /// `control_endpoint`, `None` otherwise
    pub fn from_description_response(control_endpoint: Hpai, response: &DescriptionResponse) -> Option<Self> {
        if !response.is_valid() || !control_endpoint.is_valid() {
            return None;
        }
        Some(Self::new(
            control_endpoint,
            response.device_hardware()?,
            response.supported_families()?,
            response.optional_dibs(),
        ))
    }

    /// Same server reached through `endpoint`.
    ///
    /// Used when the server answered with a route-back descriptor and the
    /// datagram source is the only usable address.
    #[must_use]
    pub fn with_control_endpoint(mut self, endpoint: IpEndpoint) -> Self {
        self.control_endpoint = Hpai::new(self.control_endpoint.protocol(), endpoint);
        self
    }

    /// Control endpoint descriptor
    pub fn control_endpoint(&self) -> &Hpai {
        &self.control_endpoint
    }

    /// Control endpoint address and port
    pub fn endpoint(&self) -> Option<IpEndpoint> {
        self.control_endpoint.endpoint()
    }

    /// Friendly name
    pub fn device_name(&self) -> heapless::String<30> {
        self.hardware.device_name()
    }

    /// KNX individual address of the server
    pub fn individual_address(&self) -> IndividualAddress {
        self.hardware.individual_address()
    }

    /// Device information block
    pub fn hardware(&self) -> &DeviceInfoDib {
        &self.hardware
    }

    /// Supported service families block
    pub fn supported_families(&self) -> &ServiceFamiliesDib {
        &self.families
    }

    /// Advertised version of `family`
    pub fn version(&self, family: ServiceFamily) -> Option<u8> {
        self.families.version(family)
    }

    /// Whether `family` is advertised
    pub fn supports(&self, family: ServiceFamily) -> bool {
        self.version(family).is_some()
    }

    /// Optional blocks in wire order
    pub fn optional_dibs(&self) -> &[Dib] {
        &self.optional
    }

    fn find<T>(&self, code: DescriptionType, view: impl Fn(Dib) -> Option<T>) -> Option<T> {
        self.optional.iter().filter(|dib| dib.code() == code).find_map(|dib| view(dib.clone()))
    }

    /// IP configuration block
    pub fn ip_config(&self) -> Option<IpConfigDib> {
        self.find(DescriptionType::IpConfig, IpConfigDib::from_dib)
    }

    /// Current IP configuration block
    pub fn current_ip_config(&self) -> Option<CurrentIpConfigDib> {
        self.find(DescriptionType::CurrentIpConfig, CurrentIpConfigDib::from_dib)
    }

    /// KNX addresses block
    pub fn knx_addresses(&self) -> Option<KnxAddressesDib> {
        self.find(DescriptionType::KnxAddresses, KnxAddressesDib::from_dib)
    }

    /// Secured service families block
    pub fn secured_families(&self) -> Option<SecuredServiceFamiliesDib> {
        self.find(DescriptionType::SecuredServiceFamilies, SecuredServiceFamiliesDib::from_dib)
    }

    /// Tunneling info block (extended search responses only)
    pub fn tunneling_info(&self) -> Option<TunnelingInfoDib> {
        self.find(DescriptionType::TunnelingInfo, TunnelingInfoDib::from_dib)
    }

    /// Extended device information block
    pub fn extended_device_info(&self) -> Option<ExtendedDeviceInfoDib> {
        self.find(DescriptionType::ExtendedDeviceInfo, ExtendedDeviceInfoDib::from_dib)
    }

    /// Manufacturer data block
    pub fn manufacturer_data(&self) -> Option<ManufacturerDataDib> {
        self.find(DescriptionType::ManufacturerData, ManufacturerDataDib::from_dib)
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint() {
            Some(endpoint) => write!(f, "{} ({}) at {}", self.device_name(), self.individual_address(), endpoint),
            None => write!(f, "{} ({})", self.device_name(), self.individual_address()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::KnxMedium;
    use crate::protocol::dib::{ServiceInfo, TunnelingSlot};
    use std::net::Ipv4Addr;

    fn response(extended: bool) -> SearchResponse {
        let builder = if extended { SearchResponse::extended_builder() } else { SearchResponse::builder() };
        let slot = TunnelingSlot { address: IndividualAddress::from(0x1105), status: TunnelingSlot::FREE };
        let frame = builder
            .control_endpoint(Hpai::udp(IpEndpoint::new(Ipv4Addr::new(192, 168, 1, 10), 3671)))
            .device_hardware(
                DeviceInfoDib::builder()
                    .medium(KnxMedium::Tp1)
                    .individual_address(IndividualAddress::from(0x1100))
                    .device_name("IP Interface")
                    .build()
                    .into_dib(),
            )
            .supported_families(
                ServiceFamiliesDib::build(&[
                    ServiceInfo::new(ServiceFamily::Core, 2),
                    ServiceInfo::new(ServiceFamily::IpTunneling, 2),
                ])
                .unwrap()
                .into_dib(),
            )
            .optional_dibs([TunnelingInfoDib::build(248, &[slot]).unwrap().into_dib()])
            .build()
            .unwrap();
        SearchResponse::parse(&frame).unwrap()
    }

    #[test]
    fn test_from_search_response() {
        let info = ServerInfo::from_search_response(&response(true)).unwrap();
        assert_eq!(info.device_name().as_str(), "IP Interface");
        assert_eq!(info.individual_address().to_string(), "1.1.0");
        assert_eq!(info.endpoint(), Some(IpEndpoint::new(Ipv4Addr::new(192, 168, 1, 10), 3671)));
        assert!(info.supports(ServiceFamily::IpTunneling));
        assert!(!info.supports(ServiceFamily::IpRouting));
        assert_eq!(info.tunneling_info().unwrap().max_apdu_length(), 248);
        assert!(info.ip_config().is_none());
        assert_eq!(info.to_string(), "IP Interface (1.1.0) at 192.168.1.10:3671");
    }

    #[test]
    fn test_normal_response_has_no_tunneling_info() {
        let info = ServerInfo::from_search_response(&response(false)).unwrap();
        assert!(info.tunneling_info().is_none());
        assert!(info.optional_dibs().is_empty());
    }

    #[test]
    fn test_route_back_replaced() {
        let info = ServerInfo::from_search_response(&response(false))
            .unwrap()
            .with_control_endpoint(IpEndpoint::new(Ipv4Addr::new(10, 0, 0, 7), 3671));
        assert_eq!(info.endpoint().unwrap().to_string(), "10.0.0.7:3671");
    }
}
