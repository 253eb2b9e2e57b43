//! # bthal: console test harnesses for vendor Bluetooth HALs
//!
//! This library drives the test interfaces that a vendor Bluetooth stack
//! exposes through its hardware abstraction layer (HAL) shared library.
//! It provides everything the interactive tools in `bthal-tools` are made of:
//!
//! * a [loader](loader) that opens the vendor library and resolves its interface table,
//! * [capability traits](hal) for the adapter, the vendor extension and its test
//!   applications, with [native](native) implementations over the raw [ABI](sys),
//! * a [listener interface](hal::HalListener) for the asynchronous callbacks of the stack,
//!   and an [event bus](event) to wait for a specific callback instead of sleeping,
//! * a line [tokenizer](args), a [command table and dispatcher](dispatch) with a bounded
//!   [background job queue](job), and a [console](console) loop,
//! * the command sets of the [MCAP](mcap) and [RFCOMM](rfcomm) test tools.
//!
//! The protocol state machines themselves live inside the vendor stack.
//! This crate only issues requests and reports what comes back.
//!
//! ## Basic usage
//! Load the vendor library using [NativeHal::load](native::NativeHal::load), build a tool
//! dispatcher using [mcap::start] or [rfcomm::start] and hand it to [app::launch].

#![warn(missing_docs)]

#[cfg(not(target_os = "linux"))]
compile_error!("bthal only supports the Linux operating system.");

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::{
    convert::TryInto,
    fmt::{self, Debug, Display, Formatter},
    ops::Deref,
    str::FromStr,
};
use strum::{Display, IntoStaticStr};

pub mod adapter;
pub mod app;
pub mod args;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod event;
pub mod hal;
pub mod job;
pub mod loader;
pub mod mcap;
pub mod native;
pub mod rfcomm;
pub mod sys;

pub use adapter::Adapter;
pub use config::Config;
pub use console::Console;

/// Bluetooth HAL test harness error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    /// Error kind.
    pub kind: ErrorKind,
    /// Detailed error message.
    pub message: String,
}

/// Bluetooth HAL test harness error kind.
#[derive(Clone, Debug, displaydoc::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// failed to load Bluetooth library {0}
    LibraryNotFound(String),
    /// failed to load symbol {0} from Bluetooth library
    SymbolNotFound(String),
    /// Error in loading vendor interface
    VendorInterfaceNotFound,
    /// test application interface {0} not found
    TestInterfaceNotFound(String),
    /// interface not loaded
    InterfaceNotLoaded,
    /// invalid Bluetooth address: {0}
    InvalidAddress(String),
    /// input too long: {len} characters exceed limit of {max}
    InputTooLong {
        /// Length of the offending token.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// HAL REQUEST FAILED status : {0}
    Failed(Status),
    /// timed out waiting for {0}
    Timeout(String),
    /// IO error {0:?}
    Io(std::io::ErrorKind),
    /// internal error
    Internal,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind, message: String::new() }
    }

    pub(crate) fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", &self.kind)
        } else {
            write!(f, "{}: {}", &self.kind, &self.message)
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::with_message(ErrorKind::Io(err.kind()), err.to_string())
    }
}

impl From<InvalidAddress> for Error {
    fn from(err: InvalidAddress) -> Self {
        Self::new(ErrorKind::InvalidAddress(err.0))
    }
}

impl From<args::InputTooLong> for Error {
    fn from(err: args::InputTooLong) -> Self {
        Self::new(ErrorKind::InputTooLong { len: err.len, max: err.max })
    }
}

/// Bluetooth HAL test harness result.
pub type Result<T> = std::result::Result<T, Error>;

/// Status code returned by requests into the vendor stack.
///
/// Displays as the symbolic constant name used by the stack headers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Display, IntoStaticStr, FromPrimitive)]
#[repr(u32)]
pub enum Status {
    /// Request accepted.
    #[strum(serialize = "BT_STATUS_SUCCESS")]
    Success = 0,
    /// Request failed.
    #[strum(serialize = "BT_STATUS_FAIL")]
    Fail,
    /// Stack not ready.
    #[strum(serialize = "BT_STATUS_NOT_READY")]
    NotReady,
    /// Out of memory.
    #[strum(serialize = "BT_STATUS_NOMEM")]
    NoMemory,
    /// Stack busy.
    #[strum(serialize = "BT_STATUS_BUSY")]
    Busy,
    /// Request already done.
    #[strum(serialize = "BT_STATUS_DONE")]
    Done,
    /// Request not supported.
    #[strum(serialize = "BT_STATUS_UNSUPPORTED")]
    Unsupported,
    /// Invalid parameter.
    #[strum(serialize = "BT_STATUS_PARM_INVALID")]
    ParamInvalid,
    /// Request not handled.
    #[strum(serialize = "BT_STATUS_UNHANDLED")]
    Unhandled,
    /// Authentication failure.
    #[strum(serialize = "BT_STATUS_AUTH_FAILURE")]
    AuthFailure,
    /// Remote device down.
    #[strum(serialize = "BT_STATUS_RMT_DEV_DOWN")]
    RemoteDeviceDown,
    /// Authentication rejected.
    #[strum(serialize = "BT_STATUS_AUTH_REJECTED")]
    AuthRejected,
    /// Any code the stack returns that has no name here.
    #[strum(serialize = "unknown status code")]
    Unknown = 0xff,
}

impl Status {
    /// Converts a raw `bt_status_t`.
    pub fn from_raw(raw: i32) -> Self {
        u32::try_from(raw).ok().and_then(<Self as FromPrimitive>::from_u32).unwrap_or(Self::Unknown)
    }

    /// Whether the request was accepted.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Converts into a result, failing with [ErrorKind::Failed] unless successful.
    pub fn check(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Failed(self)))
        }
    }
}

/// Bluetooth address.
///
/// The string representation is in colon-hexadecimal notation.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// Creates a new Bluetooth address with the specified value.
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl Deref for Address {
    type Target = [u8; 6];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<sys::RawAddress> for Address {
    fn from(addr: sys::RawAddress) -> Self {
        Self(addr.address)
    }
}

impl From<Address> for sys::RawAddress {
    fn from(addr: Address) -> Self {
        sys::RawAddress { address: addr.0 }
    }
}

/// Invalid Bluetooth address error.
#[derive(Debug, Clone)]
pub struct InvalidAddress(pub String);

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "invalid Bluetooth address: {}", &self.0)
    }
}

impl std::error::Error for InvalidAddress {}

impl FromStr for Address {
    type Err = InvalidAddress;

    /// Accepts `00:11:22:33:44:55` as well as the bare form `001122334455`
    /// advertised in the tool help texts.
    fn from_str(s: &str) -> std::result::Result<Self, InvalidAddress> {
        if !s.contains(':') {
            let mut addr = [0; 6];
            hex::decode_to_slice(s, &mut addr).map_err(|_| InvalidAddress(s.to_string()))?;
            return Ok(Self(addr));
        }

        let fields = s
            .split(':')
            .map(|s| match s.len() {
                1 | 2 => u8::from_str_radix(s, 16).map_err(|_| InvalidAddress(s.to_string())),
                _ => Err(InvalidAddress(s.to_string())),
            })
            .collect::<std::result::Result<Vec<_>, InvalidAddress>>()?;
        Ok(Self(fields.try_into().map_err(|_| InvalidAddress(s.to_string()))?))
    }
}

impl From<[u8; 6]> for Address {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<Address> for [u8; 6] {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_colon_address() {
        let addr: Address = "00:1a:7D:da:71:13".parse().unwrap();
        assert_eq!(addr, Address([0x00, 0x1a, 0x7d, 0xda, 0x71, 0x13]));
        assert_eq!(addr.to_string(), "00:1A:7D:DA:71:13");
    }

    #[test]
    fn parse_bare_address() {
        let addr: Address = "001122334455".parse().unwrap();
        assert_eq!(addr, Address([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]));
    }

    #[test]
    fn reject_malformed_addresses() {
        for s in ["", "00:11:22:33:44", "00:11:22:33:44:55:66", "0011223344", "zz:11:22:33:44:55", "001:1:22:33:44:55"]
        {
            assert!(s.parse::<Address>().is_err(), "{s} parsed");
        }
    }

    #[test]
    fn status_names() {
        assert_eq!(Status::from_raw(0).to_string(), "BT_STATUS_SUCCESS");
        assert_eq!(Status::from_raw(4).to_string(), "BT_STATUS_BUSY");
        assert_eq!(Status::from_raw(6), Status::Unsupported);
        assert_eq!(Status::from_raw(77).to_string(), "unknown status code");
        assert_eq!(Status::from_raw(-1), Status::Unknown);
    }

    #[test]
    fn status_check() {
        assert!(Status::Success.check().is_ok());
        let err = Status::Busy.check().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Failed(Status::Busy));
        assert_eq!(err.to_string(), "HAL REQUEST FAILED status : BT_STATUS_BUSY");
    }
}
