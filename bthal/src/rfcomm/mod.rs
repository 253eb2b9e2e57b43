//! RFCOMM test application.

use crate::{sys, Address, Status};

mod tool;

pub use tool::{start, RfcommContext, COMMANDS};

/// Role of the RFCOMM device under test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RdutMode {
    /// Connect as client.
    Client,
    /// Listen as server.
    Server,
    /// Disconnect the client from the server side.
    Disconnect,
}

impl RdutMode {
    pub(crate) fn to_raw(self) -> u8 {
        match self {
            Self::Client => sys::RDUT_RFCOMM_CLIENT,
            Self::Server => sys::RDUT_RFCOMM_SERVER,
            Self::Disconnect => sys::RDUT_RFCOMM_DISCONNECT,
        }
    }
}

/// Request to the RFCOMM test interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RfcTest {
    /// Connect to server channel `scn` of a peer.
    Client {
        /// Peer address.
        address: Address,
        /// Server channel number.
        scn: u8,
    },
    /// Connect and exchange modem status and data.
    ClientTestMscData {
        /// Peer address.
        address: Address,
        /// Server channel number.
        scn: u8,
    },
    /// Switch the link role.
    RoleSwitch {
        /// Peer address.
        address: Address,
        /// Requested role.
        role: u8,
    },
    /// Send a remote line status frame error.
    FrameError,
    /// Write test data.
    WriteData,
}

impl RfcTest {
    pub(crate) fn to_raw(self) -> sys::tRFC {
        let none = sys::tRFC_DATA { conn: sys::tRFC_CONN::default() };
        let (param, data) = match self {
            Self::Client { address, scn } => {
                (sys::RFC_TEST_CLIENT, sys::tRFC_DATA { conn: sys::tRFC_CONN { bdadd: address.into(), scn } })
            }
            Self::ClientTestMscData { address, scn } => (
                sys::RFC_TEST_CLIENT_TEST_MSC_DATA,
                sys::tRFC_DATA { conn: sys::tRFC_CONN { bdadd: address.into(), scn } },
            ),
            Self::RoleSwitch { address, role } => (
                sys::RFC_TEST_ROLE_SWITCH,
                sys::tRFC_DATA { role_switch: sys::tRFC_ROLE { bdadd: address.into(), role } },
            ),
            Self::FrameError => (sys::RFC_TEST_FRAME_ERROR, none),
            Self::WriteData => (sys::RFC_TEST_WRITE_DATA, none),
        };
        sys::tRFC { param, data }
    }
}

/// RFCOMM test interface of the vendor stack.
pub trait RfcommHal: Send + Sync {
    /// Starts the device under test in the specified mode.
    fn rdut_rfcomm(&self, mode: RdutMode);
    /// Issues a test request.
    fn test_interface(&self, test: &RfcTest);
    /// Connects to a peer.
    fn connect(&self, address: Address) -> Status;
    /// Releases the test application.
    fn cleanup(&self);
}
