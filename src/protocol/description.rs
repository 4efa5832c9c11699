//! Description request and description response.
//!
//! Once a server is known, a client can ask it directly for its description
//! blocks. The response body has no endpoint, only blocks:
//!
//! ```text
//! [device info DIB (54)][service families DIB][optional DIBs...]
//! ```

use crate::error::{KnxError, Result};
use crate::protocol::constants::{DescriptionType, ServiceType};
use crate::protocol::dib::{dedup_dibs, scan_dibs, DeviceInfoDib, Dib, ServiceFamiliesDib};
use crate::protocol::frame::{Frame, FrameHeader};
use crate::protocol::hpai::Hpai;

/// `DESCRIPTION_REQUEST` service (0x0203)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionRequest {
    /// Where the response should be sent
    pub control_endpoint: Hpai,
}

impl DescriptionRequest {
    /// Create a new `DESCRIPTION_REQUEST`
    pub const fn new(control_endpoint: Hpai) -> Self {
        Self { control_endpoint }
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        Frame::builder(ServiceType::DescriptionRequest).extend(self.control_endpoint.bytes()).build()
    }

    /// Parse from a frame
    pub fn parse(frame: &Frame) -> Result<Self> {
        if frame.service_type() != ServiceType::DescriptionRequest {
            return Err(KnxError::unsupported_service_type());
        }
        let body = frame.body();
        if body.len() != Hpai::SIZE {
            return Err(KnxError::size_mismatch());
        }
        let control_endpoint = Hpai::parse(&body, 0)?;
        if !control_endpoint.is_valid() {
            return Err(KnxError::invalid_structure());
        }
        Ok(Self { control_endpoint })
    }
}

/// Read view over a `DESCRIPTION_RESPONSE` frame (0x0204).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionResponse {
    frame: Frame,
}

impl DescriptionResponse {
    /// Smallest valid frame: header, device info and a one-family block
    pub const MIN_SIZE: usize = FrameHeader::SIZE + DeviceInfoDib::SIZE + 4;

    /// Wrap a description response frame
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedServiceType` for any other service.
    pub fn parse(frame: &Frame) -> Result<Self> {
        if frame.service_type() != ServiceType::DescriptionResponse {
            return Err(KnxError::unsupported_service_type());
        }
        Ok(Self { frame: frame.clone() })
    }

    /// Start building a response
    pub fn builder() -> DescriptionResponseBuilder {
        DescriptionResponseBuilder::default()
    }

    /// Underlying frame
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Device information block at the start of the body
    pub fn device_hardware(&self) -> Option<DeviceInfoDib> {
        Dib::parse(&self.frame.body(), 0).ok().and_then(DeviceInfoDib::from_dib)
    }

    /// Supported service families block following the device info
    pub fn supported_families(&self) -> Option<ServiceFamiliesDib> {
        Dib::parse(&self.frame.body(), DeviceInfoDib::SIZE).ok().and_then(ServiceFamiliesDib::from_dib)
    }

    /// Blocks after the service families, empty if one is malformed
    pub fn optional_dibs(&self) -> Vec<Dib> {
        self.optional_scan().unwrap_or_default()
    }

    fn optional_scan(&self) -> Option<Vec<Dib>> {
        let body = self.frame.body();
        let families = Dib::parse(&body, DeviceInfoDib::SIZE).ok()?;
        scan_dibs(&body, DeviceInfoDib::SIZE + families.size())
    }

    /// Layout check; tunneling info is never valid here
    pub fn is_valid(&self) -> bool {
        if !self.frame.is_valid() || self.frame.size() < Self::MIN_SIZE {
            return false;
        }
        let Some(optional) = self.optional_scan() else {
            return false;
        };
        self.device_hardware().is_some()
            && self.supported_families().is_some()
            && optional.iter().all(|dib| dib.code() != DescriptionType::TunnelingInfo)
    }
}

/// Builder for description responses.
#[derive(Debug, Clone, Default)]
pub struct DescriptionResponseBuilder {
    hardware: Option<Dib>,
    families: Option<Dib>,
    optional: Vec<Dib>,
}

impl DescriptionResponseBuilder {
    /// Device information block
    #[must_use]
    pub fn device_hardware(mut self, dib: Dib) -> Self {
        self.hardware = Some(dib);
        self
    }

    /// Supported service families block
    #[must_use]
    pub fn supported_families(mut self, dib: Dib) -> Self {
        self.families = Some(dib);
        self
    }

    /// Additional blocks; tunneling info and duplicates are skipped
    #[must_use]
    pub fn optional_dibs(mut self, dibs: impl IntoIterator<Item = Dib>) -> Self {
        self.optional.extend(dibs);
        self
    }

    /// Build the frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` if the device info block is missing or
    /// malformed, or the service families block is missing or lists the
    /// security family.
    pub fn build(self) -> Result<Frame> {
        let hardware = self
            .hardware
            .and_then(DeviceInfoDib::from_dib)
            .ok_or_else(KnxError::invalid_structure)?;
        let families = self
            .families
            .and_then(ServiceFamiliesDib::from_dib)
            .ok_or_else(KnxError::invalid_structure)?;

        let optional = dedup_dibs(self.optional.into_iter().filter(|dib| dib.code() != DescriptionType::TunnelingInfo));
        optional
            .iter()
            .fold(
                Frame::builder(ServiceType::DescriptionResponse).append(hardware.as_dib()).append(families.as_dib()),
                |builder, dib| builder.append(dib),
            )
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::IndividualAddress;
    use crate::net::IpEndpoint;
    use crate::protocol::constants::{KnxMedium, ServiceFamily};
    use crate::protocol::dib::{CurrentIpConfigDib, ServiceInfo, TunnelingInfoDib, TunnelingSlot};
    use std::net::Ipv4Addr;

    fn device_info() -> Dib {
        DeviceInfoDib::builder()
            .medium(KnxMedium::Tp1)
            .individual_address(IndividualAddress::new(1, 1, 0).unwrap())
            .device_name("gateway")
            .build()
            .into_dib()
    }

    fn families() -> Dib {
        ServiceFamiliesDib::build(&[
            ServiceInfo::new(ServiceFamily::Core, 1),
            ServiceInfo::new(ServiceFamily::DeviceManagement, 1),
            ServiceInfo::new(ServiceFamily::IpTunneling, 1),
        ])
        .unwrap()
        .into_dib()
    }

    #[test]
    fn test_description_request() {
        let hpai = Hpai::udp(IpEndpoint::new(Ipv4Addr::new(192, 168, 1, 5), 50_000));
        let frame = DescriptionRequest::new(hpai.clone()).build().unwrap();
        assert_eq!(&frame.bytes()[..6], &[0x06, 0x10, 0x02, 0x03, 0x00, 0x0E]);
        assert_eq!(DescriptionRequest::parse(&frame).unwrap().control_endpoint, hpai);
    }

    #[test]
    fn test_description_response_layout() {
        let current = CurrentIpConfigDib::new(
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(255, 255, 255, 0),
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 1),
            0x04,
        );
        let frame = DescriptionResponse::builder()
            .device_hardware(device_info())
            .supported_families(families())
            .optional_dibs([current.as_dib().clone()])
            .build()
            .unwrap();

        assert_eq!(frame.size(), 6 + 54 + 8 + 20);
        assert_eq!(frame.body_byte(54), Some(0x08));
        assert_eq!(frame.body_byte(55), Some(0x02));

        let response = DescriptionResponse::parse(&frame).unwrap();
        assert!(response.is_valid());
        assert_eq!(response.device_hardware().unwrap().device_name().as_str(), "gateway");
        assert_eq!(response.supported_families().unwrap().service_infos().len(), 3);
        assert_eq!(response.optional_dibs().len(), 1);
    }

    #[test]
    fn test_builder_drops_tunneling_info() {
        let slot = TunnelingSlot { address: IndividualAddress::from(0x1101), status: TunnelingSlot::FREE };
        let tunneling = TunnelingInfoDib::build(254, &[slot]).unwrap().into_dib();
        let frame = DescriptionResponse::builder()
            .device_hardware(device_info())
            .supported_families(families())
            .optional_dibs([tunneling])
            .build()
            .unwrap();
        let response = DescriptionResponse::parse(&frame).unwrap();
        assert!(response.optional_dibs().is_empty());
        assert!(response.is_valid());
    }

    #[test]
    fn test_tunneling_info_makes_response_invalid() {
        let slot = TunnelingSlot { address: IndividualAddress::from(0x1101), status: TunnelingSlot::FREE };
        let frame = Frame::builder(ServiceType::DescriptionResponse)
            .append(&device_info())
            .append(&families())
            .append(TunnelingInfoDib::build(254, &[slot]).unwrap().as_dib())
            .build()
            .unwrap();
        assert!(!DescriptionResponse::parse(&frame).unwrap().is_valid());
    }

    #[test]
    fn test_builder_rejects_security_family() {
        let secure = Dib::builder(DescriptionType::SupportedServiceFamilies).extend(&[0x02, 0x01, 0x09, 0x01]).build().unwrap();
        let result = DescriptionResponse::builder().device_hardware(device_info()).supported_families(secure).build();
        assert!(result.is_err());
        assert!(DescriptionResponse::builder().supported_families(families()).build().is_err());
    }

    #[test]
    fn test_short_frame_is_invalid() {
        let frame = Frame::builder(ServiceType::DescriptionResponse).append(&device_info()).build().unwrap();
        let response = DescriptionResponse::parse(&frame).unwrap();
        assert!(!response.is_valid());
        assert!(response.device_hardware().is_some());
        assert!(response.supported_families().is_none());
    }
}
