//! System native types and constants of the vendor Bluetooth HAL.
//!
//! Layouts follow the stack headers `bluetooth.h`, `vendor.h`, `bt_testapp.h`
//! and `mca_api.h` of the targeted vendor release. Interface tables are only ever
//! read through pointers handed out by the library, so only their leading
//! members up to the last one used here are declared.

#![allow(non_camel_case_types, non_snake_case, missing_docs)]

use libc::{c_char, c_int, c_void, size_t};

/// Name of the vendor library loaded by default.
pub const BLUETOOTH_LIBRARY_NAME: &str = "libbluetooth_qti.so";
/// Symbol of the [bt_interface_t] table.
pub const BLUETOOTH_INTERFACE_STRING: &str = "bluetoothInterface";
/// Profile id passed to `get_profile_interface` for the vendor extension.
pub const BT_PROFILE_VENDOR_ID: &[u8] = b"vendor\0";

pub type bt_status_t = c_int;
pub type bt_state_t = c_int;
pub type bt_discovery_state_t = c_int;
pub type bt_ssp_variant_t = c_int;
pub type bt_bond_state_t = c_int;
pub type bt_acl_state_t = c_int;
pub type bt_property_type_t = c_int;

pub const BT_STATE_OFF: bt_state_t = 0;
pub const BT_STATE_ON: bt_state_t = 1;

pub const BT_DISCOVERY_STOPPED: bt_discovery_state_t = 0;
pub const BT_DISCOVERY_STARTED: bt_discovery_state_t = 1;

pub const BT_ACL_STATE_CONNECTED: bt_acl_state_t = 0;
pub const BT_ACL_STATE_DISCONNECTED: bt_acl_state_t = 1;

pub const BT_PROPERTY_BDNAME: bt_property_type_t = 0x01;
pub const BT_PROPERTY_BDADDR: bt_property_type_t = 0x02;
pub const BT_PROPERTY_ADAPTER_SCAN_MODE: bt_property_type_t = 0x07;
pub const BT_PROPERTY_ADAPTER_DISCOVERABLE_TIMEOUT: bt_property_type_t = 0x09;

pub const BT_SCAN_MODE_CONNECTABLE_DISCOVERABLE: c_int = 2;

/// Transport argument of `create_bond` for classic Bluetooth.
pub const BT_TRANSPORT_BR_EDR: c_int = 1;

/// Bluetooth device address as laid out by the stack.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawAddress {
    pub address: [u8; 6],
}

pub const BD_NAME_LEN: usize = 249;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct bt_bdname_t {
    pub name: [u8; BD_NAME_LEN],
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct bt_pin_code_t {
    pub pin: [u8; 16],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct bt_property_t {
    pub type_: bt_property_type_t,
    pub len: c_int,
    pub val: *mut c_void,
}

pub type adapter_state_changed_callback = unsafe extern "C" fn(state: bt_state_t);
pub type adapter_properties_callback =
    unsafe extern "C" fn(status: bt_status_t, num_properties: c_int, properties: *mut bt_property_t);
pub type remote_device_properties_callback = unsafe extern "C" fn(
    status: bt_status_t,
    bd_addr: *mut RawAddress,
    num_properties: c_int,
    properties: *mut bt_property_t,
);
pub type device_found_callback = unsafe extern "C" fn(num_properties: c_int, properties: *mut bt_property_t);
pub type discovery_state_changed_callback = unsafe extern "C" fn(state: bt_discovery_state_t);
pub type pin_request_callback =
    unsafe extern "C" fn(remote_bd_addr: *mut RawAddress, bd_name: *mut bt_bdname_t, cod: u32, min_16_digit: bool);
pub type ssp_request_callback = unsafe extern "C" fn(
    remote_bd_addr: *mut RawAddress,
    bd_name: *mut bt_bdname_t,
    cod: u32,
    pairing_variant: bt_ssp_variant_t,
    pass_key: u32,
);
pub type bond_state_changed_callback =
    unsafe extern "C" fn(status: bt_status_t, remote_bd_addr: *mut RawAddress, state: bt_bond_state_t, fail_reason: c_int);
pub type acl_state_changed_callback =
    unsafe extern "C" fn(status: bt_status_t, remote_bd_addr: *mut RawAddress, state: bt_acl_state_t, hci_reason: c_int);
pub type le_test_mode_callback = unsafe extern "C" fn(status: bt_status_t, num_packets: u16);
/// Placeholder for callback slots this harness never fills.
pub type unused_callback = Option<unsafe extern "C" fn()>;

/// Asynchronous notifications from the stack.
#[repr(C)]
pub struct bt_callbacks_t {
    pub size: size_t,
    pub adapter_state_changed_cb: Option<adapter_state_changed_callback>,
    pub adapter_properties_cb: Option<adapter_properties_callback>,
    pub remote_device_properties_cb: Option<remote_device_properties_callback>,
    pub device_found_cb: Option<device_found_callback>,
    pub discovery_state_changed_cb: Option<discovery_state_changed_callback>,
    pub pin_request_cb: Option<pin_request_callback>,
    pub ssp_request_cb: Option<ssp_request_callback>,
    pub bond_state_changed_cb: Option<bond_state_changed_callback>,
    pub address_consolidate_cb: unused_callback,
    pub le_address_associate_cb: unused_callback,
    pub acl_state_changed_cb: Option<acl_state_changed_callback>,
    pub thread_evt_cb: unused_callback,
    pub dut_mode_recv_cb: unused_callback,
    pub le_test_mode_cb: Option<le_test_mode_callback>,
    pub energy_info_cb: unused_callback,
    pub link_quality_report_cb: unused_callback,
    pub generate_local_oob_data_cb: unused_callback,
    pub switch_buffer_size_cb: unused_callback,
    pub switch_codec_cb: unused_callback,
}

pub type alarm_cb = unsafe extern "C" fn(data: *mut c_void);

/// Operating system services the stack calls back into.
#[repr(C)]
pub struct bt_os_callouts_t {
    pub size: size_t,
    pub set_wake_alarm:
        Option<unsafe extern "C" fn(delay_millis: u64, should_wake: bool, cb: Option<alarm_cb>, data: *mut c_void) -> bool>,
    pub acquire_wake_lock: Option<unsafe extern "C" fn(lock_name: *const c_char) -> c_int>,
    pub release_wake_lock: Option<unsafe extern "C" fn(lock_name: *const c_char) -> c_int>,
}

/// Base Bluetooth interface table.
#[repr(C)]
pub struct bt_interface_t {
    pub size: size_t,
    pub init: Option<
        unsafe extern "C" fn(
            callbacks: *mut bt_callbacks_t,
            guest_mode: bool,
            is_common_criteria_mode: bool,
            config_compare_result: c_int,
            init_flags: *const *const c_char,
            is_atv: bool,
            user_data_directory: *const c_char,
        ) -> c_int,
    >,
    pub enable: Option<unsafe extern "C" fn() -> c_int>,
    pub disable: Option<unsafe extern "C" fn() -> c_int>,
    pub cleanup: Option<unsafe extern "C" fn()>,
    pub get_adapter_properties: Option<unsafe extern "C" fn() -> c_int>,
    pub get_adapter_property: Option<unsafe extern "C" fn(type_: bt_property_type_t) -> c_int>,
    pub set_adapter_property: Option<unsafe extern "C" fn(property: *const bt_property_t) -> c_int>,
    pub get_remote_device_properties: Option<unsafe extern "C" fn(remote_addr: *mut RawAddress) -> c_int>,
    pub get_remote_device_property:
        Option<unsafe extern "C" fn(remote_addr: *mut RawAddress, type_: bt_property_type_t) -> c_int>,
    pub set_remote_device_property:
        Option<unsafe extern "C" fn(remote_addr: *mut RawAddress, property: *const bt_property_t) -> c_int>,
    pub get_remote_service_record: Option<unsafe extern "C" fn(remote_addr: *const RawAddress, uuid: *const c_void) -> c_int>,
    pub get_remote_services: Option<unsafe extern "C" fn(remote_addr: *mut RawAddress) -> c_int>,
    pub start_discovery: Option<unsafe extern "C" fn() -> c_int>,
    pub cancel_discovery: Option<unsafe extern "C" fn() -> c_int>,
    pub create_bond: Option<unsafe extern "C" fn(bd_addr: *const RawAddress, transport: c_int) -> c_int>,
    pub create_bond_out_of_band: unused_callback,
    pub remove_bond: Option<unsafe extern "C" fn(bd_addr: *const RawAddress) -> c_int>,
    pub cancel_bond: Option<unsafe extern "C" fn(bd_addr: *const RawAddress) -> c_int>,
    pub get_connection_state: Option<unsafe extern "C" fn(bd_addr: *const RawAddress) -> c_int>,
    pub pin_reply: Option<
        unsafe extern "C" fn(bd_addr: *const RawAddress, accept: u8, pin_len: u8, pin_code: *mut bt_pin_code_t) -> c_int,
    >,
    pub ssp_reply: Option<
        unsafe extern "C" fn(bd_addr: *const RawAddress, variant: bt_ssp_variant_t, accept: u8, passkey: u32) -> c_int,
    >,
    pub get_profile_interface: Option<unsafe extern "C" fn(profile_id: *const c_char) -> *const c_void>,
    pub dut_mode_configure: Option<unsafe extern "C" fn(enable: u8) -> c_int>,
    pub dut_mode_send: Option<unsafe extern "C" fn(opcode: u16, buf: *mut u8, len: u8) -> c_int>,
    pub le_test_mode: Option<unsafe extern "C" fn(opcode: u16, buf: *mut u8, len: u8) -> c_int>,
    pub set_os_callouts: Option<unsafe extern "C" fn(callouts: *mut bt_os_callouts_t) -> c_int>,
}

/// Test application profiles of the vendor extension.
pub type test_app_profile = c_int;
pub const TEST_APP_L2CAP: test_app_profile = 0;
pub const TEST_APP_RFCOMM: test_app_profile = 1;
pub const TEST_APP_MCAP: test_app_profile = 2;
pub const TEST_APP_GATT: test_app_profile = 3;
pub const TEST_APP_GAP: test_app_profile = 4;
pub const TEST_APP_SMP: test_app_profile = 5;

/// Vendor extension interface table.
#[repr(C)]
pub struct btvendor_interface_t {
    pub size: size_t,
    pub init: Option<unsafe extern "C" fn(callbacks: *mut c_void) -> bt_status_t>,
    pub bredrcleanup: Option<unsafe extern "C" fn()>,
    pub bredrcleanupbydevice: Option<unsafe extern "C" fn(bd_addr: *mut RawAddress)>,
    pub get_testapp_interface: Option<unsafe extern "C" fn(test_app_profile: c_int) -> *mut c_void>,
}

// MCAP

pub type tMCA_HANDLE = u8;
pub type tMCA_DEP = u8;
pub type tMCA_CL = u16;
pub type tMCA_DL = u16;
pub type tMCA_RESULT = u8;

pub const MCA_SUCCESS: tMCA_RESULT = 0;
pub const MCA_RSP_SUCCESS: u8 = 0x00;
pub const MCA_RSP_BAD_MDL: u8 = 0x05;

pub const MCA_TDEP_ECHO: u8 = 0;
pub const MCA_TDEP_DATA: u8 = 1;
pub const MCA_NUM_MDLS: u8 = 4;
/// MDL id addressing all data links of a control link.
pub const MCA_ALL_MDL_ID: u16 = 0xFFFF;

pub const MCA_ERROR_RSP_EVT: u8 = 0x00;
pub const MCA_CREATE_IND_EVT: u8 = 0x01;
pub const MCA_CREATE_CFM_EVT: u8 = 0x02;
pub const MCA_RECONNECT_IND_EVT: u8 = 0x03;
pub const MCA_RECONNECT_CFM_EVT: u8 = 0x04;
pub const MCA_ABORT_IND_EVT: u8 = 0x05;
pub const MCA_ABORT_CFM_EVT: u8 = 0x06;
pub const MCA_DELETE_IND_EVT: u8 = 0x07;
pub const MCA_DELETE_CFM_EVT: u8 = 0x08;
pub const MCA_SYNC_CAP_IND_EVT: u8 = 0x11;
pub const MCA_CONNECT_IND_EVT: u8 = 0x20;
pub const MCA_DISCONNECT_IND_EVT: u8 = 0x21;
pub const MCA_OPEN_IND_EVT: u8 = 0x22;
pub const MCA_OPEN_CFM_EVT: u8 = 0x23;
pub const MCA_CLOSE_IND_EVT: u8 = 0x24;
pub const MCA_CLOSE_CFM_EVT: u8 = 0x25;
pub const MCA_CONG_CHG_EVT: u8 = 0x26;
pub const MCA_RSP_TOUT_IND_EVT: u8 = 0x27;

pub const L2CAP_FCR_ERTM_MODE: u8 = 0x03;
pub const MCA_FCR_OPT_TX_WINDOW_SIZE: u8 = 10;
pub const MCA_FCR_OPT_MAX_TX_B4_DISCNT: u8 = 20;
pub const MCA_FCR_OPT_RETX_TOUT: u16 = 2000;
pub const MCA_FCR_OPT_MONITOR_TOUT: u16 = 12000;
pub const MCA_FCR_OPT_MPS_SIZE: u16 = 1000;
pub const BT_DEFAULT_BUFFER_SIZE: u16 = 4096 + 16;
pub const MCA_FCS_NONE: u8 = 0;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct tMCA_REG {
    pub ctrl_psm: u16,
    pub data_psm: u16,
    pub sec_mask: u16,
    pub rsp_tout: u16,
}

pub type tMCA_DATA_CBACK = unsafe extern "C" fn(mdl: tMCA_DL, p_pkt: *mut BT_HDR);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_CS {
    pub type_: u8,
    pub max_mdl: u8,
    pub p_data_cback: Option<tMCA_DATA_CBACK>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct tL2CAP_FCR_OPTS {
    pub mode: u8,
    pub tx_win_sz: u8,
    pub max_transmit: u8,
    pub rtrans_tout: u16,
    pub mon_tout: u16,
    pub mps: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct tMCA_CHNL_CFG {
    pub fcr_opt: tL2CAP_FCR_OPTS,
    pub user_rx_buf_size: u16,
    pub user_tx_buf_size: u16,
    pub fcr_rx_buf_size: u16,
    pub fcr_tx_buf_size: u16,
    pub fcs: u8,
    pub data_mtu: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_EVT_HDR {
    pub op_code: u8,
    pub mdl_id: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_CREATE_IND {
    pub op_code: u8,
    pub mdl_id: u16,
    pub dep_id: u8,
    pub cfg: u8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_CREATE_CFM {
    pub op_code: u8,
    pub mdl_id: u16,
    pub rsp_code: u8,
    pub cfg: u8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_CONNECT_IND {
    pub bd_addr: RawAddress,
    pub mtu: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_DISCONNECT_IND {
    pub bd_addr: RawAddress,
    pub reason: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_OPEN_IND {
    pub mdl_id: u16,
    pub mdl: tMCA_DL,
    pub mtu: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tMCA_CLOSE_IND {
    pub mdl_id: u16,
    pub reason: u16,
}

/// Event data of the MCAP control callback; the member is selected by the event code.
#[repr(C)]
#[derive(Clone, Copy)]
pub union tMCA_CTRL {
    pub hdr: tMCA_EVT_HDR,
    pub create_ind: tMCA_CREATE_IND,
    pub create_cfm: tMCA_CREATE_CFM,
    pub reconnect_ind: tMCA_EVT_HDR,
    pub delete_ind: tMCA_EVT_HDR,
    pub abort_ind: tMCA_EVT_HDR,
    pub connect_ind: tMCA_CONNECT_IND,
    pub disconnect_ind: tMCA_DISCONNECT_IND,
    pub open_ind: tMCA_OPEN_IND,
    pub open_cfm: tMCA_OPEN_IND,
    pub close_ind: tMCA_CLOSE_IND,
}

pub type tMCA_CTRL_CBACK = unsafe extern "C" fn(handle: tMCA_HANDLE, mcl: tMCA_CL, event: u8, p_data: *mut tMCA_CTRL);

/// Stack buffer header; payload starts `offset` bytes into `data`.
#[repr(C)]
pub struct BT_HDR {
    pub event: u16,
    pub len: u16,
    pub offset: u16,
    pub layer_specific: u16,
    pub data: [u8; 0],
}

/// MCAP test application interface table.
#[repr(C)]
pub struct btmcap_interface_t {
    pub size: size_t,
    pub Init: Option<unsafe extern "C" fn()>,
    pub Register: Option<unsafe extern "C" fn(p_reg: *mut tMCA_REG, p_cback: Option<tMCA_CTRL_CBACK>) -> tMCA_HANDLE>,
    pub Deregister: Option<unsafe extern "C" fn(handle: tMCA_HANDLE)>,
    pub CreateDep: Option<unsafe extern "C" fn(handle: tMCA_HANDLE, p_dep: *mut tMCA_DEP, p_cs: *mut tMCA_CS) -> tMCA_RESULT>,
    pub DeleteDep: Option<unsafe extern "C" fn(handle: tMCA_HANDLE, dep: tMCA_DEP) -> tMCA_RESULT>,
    pub ConnectReq: Option<
        unsafe extern "C" fn(handle: tMCA_HANDLE, bd_addr: *const RawAddress, ctrl_psm: u16, sec_mask: u16) -> tMCA_RESULT,
    >,
    pub DisconnectReq: Option<unsafe extern "C" fn(mcl: tMCA_CL) -> tMCA_RESULT>,
    pub CreateMdl: Option<
        unsafe extern "C" fn(
            mcl: tMCA_CL,
            dep: tMCA_DEP,
            data_psm: u16,
            mdl_id: u16,
            peer_dep_id: u8,
            cfg: u8,
            p_chnl_cfg: *const tMCA_CHNL_CFG,
        ) -> tMCA_RESULT,
    >,
    pub CreateMdlRsp: Option<
        unsafe extern "C" fn(
            mcl: tMCA_CL,
            dep: tMCA_DEP,
            mdl_id: u16,
            cfg: u8,
            rsp_code: u8,
            p_chnl_cfg: *const tMCA_CHNL_CFG,
        ) -> tMCA_RESULT,
    >,
    pub CloseReq: Option<unsafe extern "C" fn(mdl: tMCA_DL) -> tMCA_RESULT>,
    pub ReconnectMdl: unused_callback,
    pub ReconnectMdlRsp: Option<
        unsafe extern "C" fn(
            mcl: tMCA_CL,
            dep: tMCA_DEP,
            mdl_id: u16,
            rsp_code: u8,
            p_chnl_cfg: *const tMCA_CHNL_CFG,
        ) -> tMCA_RESULT,
    >,
}

// RFCOMM

pub type rfc_test_t = c_int;
pub const RFC_TEST_CLIENT: rfc_test_t = 1;
pub const RFC_TEST_FRAME_ERROR: rfc_test_t = 2;
pub const RFC_TEST_ROLE_SWITCH: rfc_test_t = 3;
pub const RFC_TEST_SERVER: rfc_test_t = 4;
pub const RFC_TEST_DISCON: rfc_test_t = 5;
pub const RFC_TEST_CLIENT_TEST_MSC_DATA: rfc_test_t = 6;
pub const RFC_TEST_WRITE_DATA: rfc_test_t = 7;

/// Argument of `rdut_rfcomm`.
pub const RDUT_RFCOMM_CLIENT: u8 = 0;
pub const RDUT_RFCOMM_SERVER: u8 = 1;
pub const RDUT_RFCOMM_DISCONNECT: u8 = 3;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct tRFC_CONN {
    pub bdadd: RawAddress,
    pub scn: u8,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct tRFC_ROLE {
    pub bdadd: RawAddress,
    pub role: u8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union tRFC_DATA {
    pub conn: tRFC_CONN,
    pub role_switch: tRFC_ROLE,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct tRFC {
    pub param: rfc_test_t,
    pub data: tRFC_DATA,
}

/// RFCOMM test application interface table.
#[repr(C)]
pub struct btrfcomm_interface_t {
    pub size: size_t,
    pub rdut_rfcomm: Option<unsafe extern "C" fn(server: u8)>,
    pub rdut_rfcomm_test_interface: Option<unsafe extern "C" fn(input: *mut tRFC)>,
    pub connect: Option<unsafe extern "C" fn(bd_addr: *mut RawAddress) -> bt_status_t>,
    pub cleanup: Option<unsafe extern "C" fn()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn raw_address_layout() {
        assert_eq!(size_of::<RawAddress>(), 6);
        assert_eq!(align_of::<RawAddress>(), 1);
    }

    #[test]
    fn callback_table_is_pointer_sized_slots() {
        assert_eq!(size_of::<bt_callbacks_t>(), 20 * size_of::<usize>());
        assert_eq!(offset_of!(bt_callbacks_t, acl_state_changed_cb), 11 * size_of::<usize>());
        assert_eq!(offset_of!(bt_callbacks_t, le_test_mode_cb), 14 * size_of::<usize>());
    }

    #[test]
    fn interface_slots() {
        let slot = size_of::<usize>();
        assert_eq!(offset_of!(bt_interface_t, set_adapter_property), 7 * slot);
        assert_eq!(offset_of!(bt_interface_t, create_bond), 15 * slot);
        assert_eq!(offset_of!(bt_interface_t, pin_reply), 20 * slot);
        assert_eq!(offset_of!(bt_interface_t, ssp_reply), 21 * slot);
        assert_eq!(offset_of!(bt_interface_t, get_profile_interface), 22 * slot);
        assert_eq!(offset_of!(bt_interface_t, set_os_callouts), 26 * slot);
        assert_eq!(size_of::<bt_interface_t>(), 27 * slot);
        assert_eq!(offset_of!(btvendor_interface_t, get_testapp_interface), 4 * slot);
        assert_eq!(offset_of!(btmcap_interface_t, ReconnectMdlRsp), 12 * slot);
    }

    #[test]
    fn mcap_parameter_layout() {
        assert_eq!(size_of::<tMCA_REG>(), 8);
        assert_eq!(offset_of!(tL2CAP_FCR_OPTS, rtrans_tout), 4);
        assert_eq!(size_of::<tL2CAP_FCR_OPTS>(), 10);
        assert_eq!(offset_of!(tMCA_CHNL_CFG, user_rx_buf_size), 10);
        assert_eq!(offset_of!(tMCA_CHNL_CFG, data_mtu), 20);
        assert_eq!(offset_of!(tMCA_CREATE_IND, dep_id), 4);
        assert_eq!(offset_of!(tMCA_CONNECT_IND, mtu), 6);
        assert_eq!(size_of::<BT_HDR>(), 8);
    }

    #[test]
    fn rfcomm_parameter_layout() {
        assert_eq!(size_of::<tRFC_CONN>(), 7);
        assert_eq!(offset_of!(tRFC, data), 4);
        assert_eq!(size_of::<tRFC>(), 12);
    }
}
