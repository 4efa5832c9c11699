//! KNXnet/IP protocol implementation.
//!
//! This module contains the wire codecs: the generic structure header, the
//! frame header, the typed sub-structures (HPAI, CRI/CRD, DIB, SRP) and one
//! view/builder pair per service.

pub mod constants;
pub mod cri;
pub mod description;
pub mod dib;
pub mod frame;
pub mod hpai;
pub mod management;
pub mod search;
pub mod server_info;
pub mod services;
pub mod srp;
pub mod structure;

pub use constants::*;
pub use frame::{Frame, FrameBuilder, FrameHeader};
pub use server_info::ServerInfo;
