//! Search request and search response.
//!
//! A client multicasts a `SEARCH_REQUEST` carrying the endpoint it wants the
//! answers on. Every server replies with a `SEARCH_RESPONSE`:
//!
//! ```text
//! [control endpoint HPAI][device info DIB][service families DIB][optional DIBs...]
//! ```
//!
//! The extended variants (`SEARCH_REQUEST_EXT` / `SEARCH_RESPONSE_EXT`) add
//! search parameter blocks to the request and allow more description blocks,
//! among them the tunneling info block, in the response.

use crate::error::{KnxError, Result};
use crate::protocol::constants::{DescriptionType, HostProtocol, ServiceType};
use crate::protocol::dib::{dedup_dibs, scan_dibs, DeviceInfoDib, Dib, ServiceFamiliesDib};
use crate::protocol::frame::Frame;
use crate::protocol::hpai::Hpai;
use crate::protocol::srp::Srp;

/// `SEARCH_REQUEST` (0x0201) or `SEARCH_REQUEST_EXT` (0x020B)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Where responses should be sent
    pub discovery_endpoint: Hpai,
    /// Search parameter blocks (extended form only)
    pub parameters: Vec<Srp>,
    /// Extended form
    pub extended: bool,
}

impl SearchRequest {
    /// Normal search request
    pub fn new(discovery_endpoint: Hpai) -> Self {
        Self { discovery_endpoint, parameters: Vec::new(), extended: false }
    }

    /// Extended search request carrying `parameters`
    pub fn extended(discovery_endpoint: Hpai, parameters: Vec<Srp>) -> Self {
        Self { discovery_endpoint, parameters, extended: true }
    }

    /// Whether this is the extended form
    pub fn is_extended(&self) -> bool {
        self.extended || !self.parameters.is_empty()
    }

    /// Build the complete frame
    pub fn build(&self) -> Result<Frame> {
        if self.is_extended() {
            self.parameters
                .iter()
                .fold(Frame::builder(ServiceType::SearchRequestExtended).extend(self.discovery_endpoint.bytes()), |b, srp| {
                    b.extend(srp.bytes())
                })
                .build()
        } else {
            Frame::builder(ServiceType::SearchRequest).extend(self.discovery_endpoint.bytes()).build()
        }
    }

    /// Parse from a frame.
    ///
    /// A body longer than one HPAI is read as the extended form even under
    /// the normal service type.
    pub fn parse(frame: &Frame) -> Result<Self> {
        let extended = match frame.service_type() {
            ServiceType::SearchRequest => false,
            ServiceType::SearchRequestExtended => true,
            _ => return Err(KnxError::unsupported_service_type()),
        };
        let body = frame.body();
        let discovery_endpoint = Hpai::parse(&body, 0)?;
        if !discovery_endpoint.is_valid() {
            return Err(KnxError::invalid_structure());
        }
        let parameters = Srp::parse_all(&body.slice(Hpai::SIZE..))?;
        Ok(Self {
            discovery_endpoint,
            extended: extended || body.len() > Hpai::SIZE,
            parameters,
        })
    }
}

/// Read view over a `SEARCH_RESPONSE` or `SEARCH_RESPONSE_EXT` frame.
///
/// Malformed responses still produce a view; check
/// [`is_valid`](Self::is_valid) before trusting the accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    frame: Frame,
}

/// Offset of the device info DIB in the body
const HARDWARE_OFFSET: usize = Hpai::SIZE;
/// Offset of the service families DIB in the body
const FAMILIES_OFFSET: usize = HARDWARE_OFFSET + DeviceInfoDib::SIZE;

impl SearchResponse {
    /// Wrap a search response frame
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedServiceType` for any other service.
    pub fn parse(frame: &Frame) -> Result<Self> {
        match frame.service_type() {
            ServiceType::SearchResponse | ServiceType::SearchResponseExtended => Ok(Self { frame: frame.clone() }),
            _ => Err(KnxError::unsupported_service_type()),
        }
    }

    /// Builder for the normal response; tunneling info blocks are dropped
    pub fn builder() -> SearchResponseBuilder {
        SearchResponseBuilder::new(false)
    }

    /// Builder for the extended response
    pub fn extended_builder() -> SearchResponseBuilder {
        SearchResponseBuilder::new(true)
    }

    /// Underlying frame
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Extended response service type
    pub fn is_extended(&self) -> bool {
        self.frame.service_type() == ServiceType::SearchResponseExtended
    }

    /// Server control endpoint
    pub fn control_endpoint(&self) -> Option<Hpai> {
        Hpai::parse(&self.frame.body(), 0).ok().filter(Hpai::is_valid)
    }

    /// Device information block
    pub fn device_hardware(&self) -> Option<DeviceInfoDib> {
        Dib::parse(&self.frame.body(), HARDWARE_OFFSET).ok().and_then(DeviceInfoDib::from_dib)
    }

    /// Supported service families block; `None` if it lists an unknown or
    /// the security family
    pub fn supported_families(&self) -> Option<ServiceFamiliesDib> {
        Dib::parse(&self.frame.body(), FAMILIES_OFFSET).ok().and_then(ServiceFamiliesDib::from_dib)
    }

    /// Every block after the control endpoint, empty if one is malformed
    pub fn variable_dibs(&self) -> Vec<Dib> {
        scan_dibs(&self.frame.body(), Hpai::SIZE).unwrap_or_default()
    }

    /// Blocks after the service families block, empty if one is malformed
    pub fn optional_dibs(&self) -> Vec<Dib> {
        self.optional_scan().unwrap_or_default()
    }

    fn optional_scan(&self) -> Option<Vec<Dib>> {
        let body = self.frame.body();
        let families = Dib::parse(&body, FAMILIES_OFFSET).ok()?;
        scan_dibs(&body, FAMILIES_OFFSET + families.size())
    }

    /// Full layout check.
    ///
    /// The control endpoint must be a UDP descriptor, device info and
    /// service families must be well formed, every optional block must
    /// parse, and only the extended response may carry tunneling info.
    pub fn is_valid(&self) -> bool {
        if !self.frame.is_valid() || self.frame.body().len() < FAMILIES_OFFSET + 2 {
            return false;
        }
        let udp = self.control_endpoint().is_some_and(|hpai| hpai.protocol() == HostProtocol::Ipv4Udp);
        let Some(optional) = self.optional_scan() else {
            return false;
        };
        udp && self.device_hardware().is_some()
            && self.supported_families().is_some()
            && (self.is_extended() || !optional.iter().any(|dib| dib.code() == DescriptionType::TunnelingInfo))
    }
}

/// Builder for search responses.
///
/// Blocks are de-duplicated: a block equal to one already added is skipped.
#[derive(Debug, Clone)]
pub struct SearchResponseBuilder {
    extended: bool,
    control_endpoint: Option<Hpai>,
    hardware: Option<Dib>,
    families: Option<Dib>,
    optional: Vec<Dib>,
}

impl SearchResponseBuilder {
    fn new(extended: bool) -> Self {
        Self { extended, control_endpoint: None, hardware: None, families: None, optional: Vec::new() }
    }

    /// Server control endpoint
    #[must_use]
    pub fn control_endpoint(mut self, hpai: Hpai) -> Self {
        self.control_endpoint = Some(hpai);
        self
    }

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

    /// Additional description blocks
    #[must_use]
    pub fn optional_dibs(mut self, dibs: impl IntoIterator<Item = Dib>) -> Self {
        self.optional.extend(dibs);
        self
    }

    /// Build the frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` if the control endpoint, device info or
    /// service families block is missing.
    pub fn build(self) -> Result<Frame> {
        let (Some(hpai), Some(hardware), Some(families)) = (self.control_endpoint, self.hardware, self.families) else {
            return Err(KnxError::invalid_structure());
        };

        let (service, dibs): (ServiceType, Vec<Dib>) = if self.extended {
            (ServiceType::SearchResponseExtended, dedup_dibs([hardware, families].into_iter().chain(self.optional)))
        } else {
            let optional = self.optional.into_iter().filter(|dib| dib.code() != DescriptionType::TunnelingInfo);
            (ServiceType::SearchResponse, [hardware, families].into_iter().chain(dedup_dibs(optional)).collect())
        };

        dibs.iter()
            .fold(Frame::builder(service).extend(hpai.bytes()), |builder, dib| builder.append(dib))
            .build()
    }
}
