//! Multi-Channel Adaptation Protocol (MCAP) test application.
//!
//! The MCAP state machines run inside the vendor stack. This module describes
//! the requests its test interface accepts and the control events it reports,
//! and provides the command set of the MCAP console tool.

use std::{fmt, sync::Arc};

use crate::{sys, Address};

mod tool;

pub use tool::{start, McapContext, McapState, COMMANDS};

/// Registration handle.
pub type McaHandle = sys::tMCA_HANDLE;
/// Data endpoint id.
pub type McaDep = sys::tMCA_DEP;
/// Control link handle.
pub type McaCl = sys::tMCA_CL;
/// Data link handle.
pub type McaDl = sys::tMCA_DL;
/// Result code of an MCAP request.
pub type McaResult = sys::tMCA_RESULT;

/// Response timeout used for registrations, in milliseconds.
pub const DEFAULT_RSP_TIMEOUT: u16 = 5000;

/// Registration of an MCAP instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registration {
    /// L2CAP PSM of the control channel.
    pub ctrl_psm: u16,
    /// L2CAP PSM of the data channels.
    pub data_psm: u16,
    /// Security mask.
    pub sec_mask: u16,
    /// Response timeout in milliseconds.
    pub rsp_tout: u16,
}

impl From<&Registration> for sys::tMCA_REG {
    fn from(reg: &Registration) -> Self {
        Self { ctrl_psm: reg.ctrl_psm, data_psm: reg.data_psm, sec_mask: reg.sec_mask, rsp_tout: reg.rsp_tout }
    }
}

/// Kind of data endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepType {
    /// Echo test endpoint.
    Echo,
    /// Normal data endpoint.
    Data,
}

impl DepType {
    /// `0` selects the echo endpoint, anything else a data endpoint.
    pub fn from_arg(arg: u32) -> Self {
        if arg == 0 {
            Self::Echo
        } else {
            Self::Data
        }
    }

    pub(crate) fn to_raw(self) -> u8 {
        match self {
            Self::Echo => sys::MCA_TDEP_ECHO,
            Self::Data => sys::MCA_TDEP_DATA,
        }
    }
}

/// Data endpoint configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepConfig {
    /// Endpoint kind.
    pub kind: DepType,
    /// Maximum number of data links.
    pub max_mdl: u8,
}

/// L2CAP configuration of data channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig(pub sys::tMCA_CHNL_CFG);

impl Default for ChannelConfig {
    /// Enhanced retransmission mode with the stack default buffer sizes.
    fn default() -> Self {
        Self(sys::tMCA_CHNL_CFG {
            fcr_opt: sys::tL2CAP_FCR_OPTS {
                mode: sys::L2CAP_FCR_ERTM_MODE,
                tx_win_sz: sys::MCA_FCR_OPT_TX_WINDOW_SIZE,
                max_transmit: sys::MCA_FCR_OPT_MAX_TX_B4_DISCNT,
                rtrans_tout: sys::MCA_FCR_OPT_RETX_TOUT,
                mon_tout: sys::MCA_FCR_OPT_MONITOR_TOUT,
                mps: sys::MCA_FCR_OPT_MPS_SIZE,
            },
            user_rx_buf_size: sys::BT_DEFAULT_BUFFER_SIZE,
            user_tx_buf_size: sys::BT_DEFAULT_BUFFER_SIZE,
            fcr_rx_buf_size: sys::BT_DEFAULT_BUFFER_SIZE,
            fcr_tx_buf_size: sys::BT_DEFAULT_BUFFER_SIZE,
            fcs: sys::MCA_FCS_NONE,
            data_mtu: 572,
        })
    }
}

/// Packet received on a data link.
#[derive(Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Buffer event code.
    pub event: u16,
    /// Layer specific field.
    pub layer_specific: u16,
    /// Payload.
    pub payload: Vec<u8>,
}

impl fmt::Debug for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DataPacket")
            .field("event", &self.event)
            .field("layer_specific", &self.layer_specific)
            .field("len", &self.payload.len())
            .finish()
    }
}

/// Event reported by the MCAP control callback.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum McapCtrlEvent {
    /// Peer rejected a request.
    ErrorRsp {
        /// Request op code.
        op_code: u8,
        /// MDL id.
        mdl_id: u16,
    },
    /// Peer requests a data link.
    CreateInd {
        /// MDL id.
        mdl_id: u16,
        /// Local data endpoint.
        dep_id: u8,
        /// Requested configuration.
        cfg: u8,
    },
    /// Peer answered a data link request.
    CreateCfm {
        /// MDL id.
        mdl_id: u16,
        /// Response code.
        rsp_code: u8,
        /// Configuration.
        cfg: u8,
    },
    /// Peer requests reconnection of a data link.
    ReconnectInd {
        /// MDL id.
        mdl_id: u16,
    },
    /// Peer answered a reconnection request.
    ReconnectCfm {
        /// MDL id.
        mdl_id: u16,
    },
    /// Peer aborted a request.
    AbortInd {
        /// MDL id.
        mdl_id: u16,
    },
    /// Abort confirmed.
    AbortCfm {
        /// MDL id.
        mdl_id: u16,
    },
    /// Peer deleted a data link.
    DeleteInd {
        /// MDL id, [MCA_ALL_MDL_ID](sys::MCA_ALL_MDL_ID) for all.
        mdl_id: u16,
    },
    /// Delete confirmed.
    DeleteCfm {
        /// MDL id.
        mdl_id: u16,
    },
    /// Peer requests clock synchronization capabilities.
    SyncCapInd,
    /// Control link connected.
    ConnectInd {
        /// Peer address.
        address: Address,
        /// Peer MTU.
        mtu: u16,
    },
    /// Control link disconnected.
    DisconnectInd {
        /// Peer address.
        address: Address,
        /// Reason code.
        reason: u16,
    },
    /// Data link opened by the peer.
    OpenInd {
        /// MDL id.
        mdl_id: u16,
        /// Data link handle.
        mdl: McaDl,
        /// Peer MTU.
        mtu: u16,
    },
    /// Data link opened on request.
    OpenCfm {
        /// MDL id.
        mdl_id: u16,
        /// Data link handle.
        mdl: McaDl,
        /// Peer MTU.
        mtu: u16,
    },
    /// Data link closed by the peer.
    CloseInd {
        /// MDL id.
        mdl_id: u16,
        /// Reason code.
        reason: u16,
    },
    /// Data link closed on request.
    CloseCfm {
        /// MDL id.
        mdl_id: u16,
        /// Reason code.
        reason: u16,
    },
    /// Data link congestion changed.
    CongestionChanged,
    /// Peer did not respond in time.
    ResponseTimeout,
    /// Event code without a specific representation.
    Other(u8),
}

impl McapCtrlEvent {
    /// Decodes a control callback.
    ///
    /// # Safety
    /// `data` must be null or point to event data matching `event`.
    pub(crate) unsafe fn from_raw(event: u8, data: *const sys::tMCA_CTRL) -> Self {
        let Some(d) = data.as_ref() else {
            return match event {
                sys::MCA_SYNC_CAP_IND_EVT => Self::SyncCapInd,
                sys::MCA_CONG_CHG_EVT => Self::CongestionChanged,
                sys::MCA_RSP_TOUT_IND_EVT => Self::ResponseTimeout,
                other => Self::Other(other),
            };
        };
        match event {
            sys::MCA_ERROR_RSP_EVT => Self::ErrorRsp { op_code: d.hdr.op_code, mdl_id: d.hdr.mdl_id },
            sys::MCA_CREATE_IND_EVT => {
                Self::CreateInd { mdl_id: d.create_ind.mdl_id, dep_id: d.create_ind.dep_id, cfg: d.create_ind.cfg }
            }
            sys::MCA_CREATE_CFM_EVT => Self::CreateCfm {
                mdl_id: d.create_cfm.mdl_id,
                rsp_code: d.create_cfm.rsp_code,
                cfg: d.create_cfm.cfg,
            },
            sys::MCA_RECONNECT_IND_EVT => Self::ReconnectInd { mdl_id: d.reconnect_ind.mdl_id },
            sys::MCA_RECONNECT_CFM_EVT => Self::ReconnectCfm { mdl_id: d.hdr.mdl_id },
            sys::MCA_ABORT_IND_EVT => Self::AbortInd { mdl_id: d.abort_ind.mdl_id },
            sys::MCA_ABORT_CFM_EVT => Self::AbortCfm { mdl_id: d.hdr.mdl_id },
            sys::MCA_DELETE_IND_EVT => Self::DeleteInd { mdl_id: d.delete_ind.mdl_id },
            sys::MCA_DELETE_CFM_EVT => Self::DeleteCfm { mdl_id: d.hdr.mdl_id },
            sys::MCA_SYNC_CAP_IND_EVT => Self::SyncCapInd,
            sys::MCA_CONNECT_IND_EVT => {
                Self::ConnectInd { address: d.connect_ind.bd_addr.into(), mtu: d.connect_ind.mtu }
            }
            sys::MCA_DISCONNECT_IND_EVT => {
                Self::DisconnectInd { address: d.disconnect_ind.bd_addr.into(), reason: d.disconnect_ind.reason }
            }
            sys::MCA_OPEN_IND_EVT => {
                Self::OpenInd { mdl_id: d.open_ind.mdl_id, mdl: d.open_ind.mdl, mtu: d.open_ind.mtu }
            }
            sys::MCA_OPEN_CFM_EVT => {
                Self::OpenCfm { mdl_id: d.open_cfm.mdl_id, mdl: d.open_cfm.mdl, mtu: d.open_cfm.mtu }
            }
            sys::MCA_CLOSE_IND_EVT => Self::CloseInd { mdl_id: d.close_ind.mdl_id, reason: d.close_ind.reason },
            sys::MCA_CLOSE_CFM_EVT => Self::CloseCfm { mdl_id: d.close_ind.mdl_id, reason: d.close_ind.reason },
            sys::MCA_CONG_CHG_EVT => Self::CongestionChanged,
            sys::MCA_RSP_TOUT_IND_EVT => Self::ResponseTimeout,
            other => Self::Other(other),
        }
    }
}

/// Receiver of MCAP callbacks.
pub trait McapListener: Send + Sync {
    /// Control event on the control link `mcl` of registration `handle`.
    fn control(&self, handle: McaHandle, mcl: McaCl, event: McapCtrlEvent);

    /// Packet received on data link `mdl`.
    #[allow(unused_variables)]
    fn data(&self, mdl: McaDl, packet: DataPacket) {}
}

/// MCAP test interface of the vendor stack.
///
/// Requests return the raw MCAP result code, `0` being success, unless noted.
pub trait McapHal: Send + Sync {
    /// Initializes the MCAP layer.
    fn init(&self);
    /// Registers an MCAP instance and returns its handle, `0` on failure.
    fn register(&self, reg: &Registration, listener: Arc<dyn McapListener>) -> McaHandle;
    /// Removes a registration.
    fn deregister(&self, handle: McaHandle);
    /// Creates a data endpoint, returning the result code and the endpoint id.
    fn create_dep(&self, handle: McaHandle, config: &DepConfig) -> (McaResult, McaDep);
    /// Removes a data endpoint.
    fn delete_dep(&self, handle: McaHandle, dep: McaDep) -> McaResult;
    /// Opens a control link to a peer.
    fn connect_req(&self, handle: McaHandle, address: Address, ctrl_psm: u16, sec_mask: u16) -> McaResult;
    /// Closes a control link.
    fn disconnect_req(&self, mcl: McaCl) -> McaResult;
    /// Requests a data link.
    #[allow(clippy::too_many_arguments)]
    fn create_mdl(
        &self, mcl: McaCl, dep: McaDep, data_psm: u16, mdl_id: u16, peer_dep_id: u8, cfg: u8, chnl: &ChannelConfig,
    ) -> McaResult;
    /// Answers a data link request of the peer.
    fn create_mdl_rsp(
        &self, mcl: McaCl, dep: McaDep, mdl_id: u16, cfg: u8, rsp_code: u8, chnl: &ChannelConfig,
    ) -> McaResult;
    /// Closes a data link.
    fn close_req(&self, mdl: McaDl) -> McaResult;
    /// Answers a reconnection request of the peer.
    fn reconnect_mdl_rsp(&self, mcl: McaCl, dep: McaDep, mdl_id: u16, rsp_code: u8, chnl: &ChannelConfig)
        -> McaResult;
}
