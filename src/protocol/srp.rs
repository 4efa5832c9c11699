//! Search Request Parameter blocks (SRP) for extended searches.
//!
//! ```text
//! [length in 2-byte units][M|type:7][payload...]
//! ```
//!
//! A server must drop an extended search request carrying a mandatory SRP it
//! does not understand.

use crate::error::Result;
use crate::protocol::constants::{DescriptionType, SearchParameterType, ServiceFamily};
use crate::protocol::dib::ServiceInfo;
use crate::protocol::structure::Struct;
use bytes::Bytes;

/// Search request parameter block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Srp(Struct<SearchParameterType>);

impl Srp {
    /// Only servers currently in programming mode answer
    pub fn programming_mode(mandatory: bool) -> Self {
        Self(Struct::flagged_from_array(SearchParameterType::SelectByProgrammingMode, mandatory, []))
    }

    /// Only the server with this MAC address answers
    pub fn mac_address(mac: [u8; 6], mandatory: bool) -> Self {
        Self(Struct::flagged_from_array(SearchParameterType::SelectByMacAddress, mandatory, mac))
    }

    /// Only servers supporting at least `info.version` of `info.family`
    /// answer
    pub fn supported_service(info: ServiceInfo, mandatory: bool) -> Self {
        Self(Struct::flagged_from_array(
            SearchParameterType::SelectByService,
            mandatory,
            [info.family.to_raw(), info.version],
        ))
    }

    /// Ask the server to include these DIBs in its response.
    ///
    /// An odd number of types is padded with a zero byte.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if the list does not fit one block.
    pub fn request_dibs(types: &[DescriptionType], mandatory: bool) -> Result<Self> {
        let payload: Vec<u8> = types.iter().map(|ty| ty.to_raw()).collect();
        Struct::flagged_from_payload(SearchParameterType::RequestDibs, mandatory, &payload).map(Self)
    }

    /// Parse an SRP starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the structure header is invalid.
    pub fn parse(data: &Bytes, offset: usize) -> Result<Self> {
        Struct::parse(data, offset).map(Self)
    }

    /// Parse back-to-back SRPs filling `data`
    ///
    /// # Errors
    ///
    /// Fails as soon as one block header is invalid.
    pub fn parse_all(data: &Bytes) -> Result<Vec<Self>> {
        Ok(Struct::parse_all(data)?.into_iter().map(Self).collect())
    }

    /// Parameter type
    pub fn parameter_type(&self) -> SearchParameterType {
        self.0.code()
    }

    /// Mandatory flag
    pub fn is_mandatory(&self) -> bool {
        self.0.is_mandatory()
    }

    /// Payload matches the parameter type
    pub fn is_valid(&self) -> bool {
        let data = self.0.data();
        match self.parameter_type() {
            SearchParameterType::Invalid => false,
            SearchParameterType::SelectByProgrammingMode => data.is_empty(),
            SearchParameterType::SelectByMacAddress => data.len() == 6,
            SearchParameterType::SelectByService => {
                data.len() == 2 && ServiceFamily::from_raw(data[0]).is_some()
            }
            SearchParameterType::RequestDibs => {
                let types = trim_padding(&data);
                !types.is_empty() && types.iter().all(|b| DescriptionType::from_raw(*b).is_some())
            }
        }
    }

    /// MAC address of a MAC selector
    pub fn mac(&self) -> Option<[u8; 6]> {
        if self.parameter_type() != SearchParameterType::SelectByMacAddress {
            return None;
        }
        <[u8; 6]>::try_from(&self.0.data()[..]).ok()
    }

    /// Family and minimum version of a service selector
    pub fn service_info(&self) -> Option<ServiceInfo> {
        if self.parameter_type() != SearchParameterType::SelectByService || !self.is_valid() {
            return None;
        }
        let data = self.0.data();
        ServiceFamily::from_raw(data[0]).map(|family| ServiceInfo::new(family, data[1]))
    }

    /// Requested description types, padding removed
    pub fn requested_dibs(&self) -> Vec<DescriptionType> {
        if self.parameter_type() != SearchParameterType::RequestDibs {
            return Vec::new();
        }
        trim_padding(&self.0.data()).iter().filter_map(|b| DescriptionType::from_raw(*b)).collect()
    }

    /// Full byte image
    pub fn bytes(&self) -> &Bytes {
        self.0.bytes()
    }

    /// Total size
    pub fn size(&self) -> usize {
        self.0.size()
    }
}

fn trim_padding(data: &[u8]) -> &[u8] {
    match data {
        [rest @ .., 0] => rest,
        _ => data,
    }
}
