//! Native bindings to the vendor Bluetooth library.
//!
//! The stack invokes plain C callbacks without a context pointer. The
//! trampolines in this module therefore forward to listeners registered in
//! process-wide slots, which are cleared again on [unload](BluetoothHal::unload).

use lazy_static::lazy_static;
use libc::{c_char, c_int, c_void};
use num_traits::FromPrimitive;
use std::{
    ptr::{self, NonNull},
    slice,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use crate::{
    hal::{
        AclState, AdapterState, BluetoothHal, BondState, DiscoveryState, HalListener, Interface, Property, ScanMode,
        SspVariant, Transport, VendorHal,
    },
    loader::Library,
    mcap::{ChannelConfig, DataPacket, DepConfig, McaCl, McaDep, McaDl, McaHandle, McaResult, McapCtrlEvent},
    mcap::{McapHal, McapListener, Registration},
    rfcomm::{RdutMode, RfcTest, RfcommHal},
    sys, Address, Config, Result, Status,
};

lazy_static! {
    static ref HAL_LISTENER: RwLock<Option<Arc<dyn HalListener>>> = RwLock::new(None);
    static ref MCAP_LISTENER: RwLock<Option<Arc<dyn McapListener>>> = RwLock::new(None);
}

static ALARM_GENERATION: AtomicU64 = AtomicU64::new(0);

/// Calls an optional function of an interface table.
///
/// Evaluates to `None` when the stack left the slot empty.
macro_rules! ccall {
    ($itf:expr, $fn_name:ident $(, $args:expr)*) => {
        match $itf.$fn_name {
            Some(f) => Some(unsafe { f($($args),*) }),
            None => {
                log::warn!("{} is not provided by the stack", stringify!($fn_name));
                None
            }
        }
    };
}

fn status(raw: Option<c_int>) -> Status {
    raw.map(Status::from_raw).unwrap_or(Status::Unsupported)
}

fn hal_listener() -> Option<Arc<dyn HalListener>> {
    HAL_LISTENER.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

fn mcap_listener() -> Option<Arc<dyn McapListener>> {
    MCAP_LISTENER.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
}

fn set_slot<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, value: Option<Arc<T>>) {
    *slot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
}

unsafe fn address(addr: *const sys::RawAddress) -> Address {
    addr.as_ref().map(|addr| Address::from(*addr)).unwrap_or_default()
}

unsafe fn bdname(name: *const sys::bt_bdname_t) -> String {
    match name.as_ref() {
        Some(name) => {
            let len = name.name.iter().position(|&c| c == 0).unwrap_or(name.name.len());
            String::from_utf8_lossy(&name.name[..len]).into_owned()
        }
        None => String::new(),
    }
}

unsafe fn property(prop: &sys::bt_property_t) -> Property {
    let value = match (prop.val as *const u8).as_ref() {
        Some(val) if prop.len > 0 => slice::from_raw_parts(val, prop.len as usize).to_vec(),
        _ => Vec::new(),
    };
    match prop.type_ {
        sys::BT_PROPERTY_BDNAME => {
            let len = value.iter().position(|&c| c == 0).unwrap_or(value.len());
            Property::Name(String::from_utf8_lossy(&value[..len]).into_owned())
        }
        sys::BT_PROPERTY_BDADDR if value.len() >= 6 => {
            let mut addr = [0; 6];
            addr.copy_from_slice(&value[..6]);
            Property::Address(Address(addr))
        }
        sys::BT_PROPERTY_ADAPTER_SCAN_MODE if value.len() >= 4 => {
            let mode = i32::from_ne_bytes([value[0], value[1], value[2], value[3]]);
            match ScanMode::from_i32(mode) {
                Some(mode) => Property::ScanMode(mode),
                None => Property::Other { kind: prop.type_, value },
            }
        }
        sys::BT_PROPERTY_ADAPTER_DISCOVERABLE_TIMEOUT if value.len() >= 4 => {
            Property::DiscoverableTimeout(u32::from_ne_bytes([value[0], value[1], value[2], value[3]]))
        }
        kind => Property::Other { kind, value },
    }
}

unsafe fn properties(num: c_int, props: *const sys::bt_property_t) -> Vec<Property> {
    if props.is_null() || num <= 0 {
        return Vec::new();
    }
    slice::from_raw_parts(props, num as usize).iter().map(|prop| property(prop)).collect()
}

fn property_to_raw(prop: &Property) -> (c_int, Vec<u8>) {
    match prop {
        Property::Name(name) => (sys::BT_PROPERTY_BDNAME, name.as_bytes().to_vec()),
        Property::Address(addr) => (sys::BT_PROPERTY_BDADDR, addr.to_vec()),
        Property::ScanMode(mode) => (sys::BT_PROPERTY_ADAPTER_SCAN_MODE, (*mode as i32).to_ne_bytes().to_vec()),
        Property::DiscoverableTimeout(secs) => {
            (sys::BT_PROPERTY_ADAPTER_DISCOVERABLE_TIMEOUT, secs.to_ne_bytes().to_vec())
        }
        Property::Other { kind, value } => (*kind, value.clone()),
    }
}

// Adapter callbacks

unsafe extern "C" fn adapter_state_changed_cb(state: sys::bt_state_t) {
    log::trace!("adapter_state_changed_cb: {state}");
    if let Some(listener) = hal_listener() {
        listener.adapter_state_changed(AdapterState::from_raw(state));
    }
}

unsafe extern "C" fn adapter_properties_cb(
    status: sys::bt_status_t, num_properties: c_int, props: *mut sys::bt_property_t,
) {
    log::trace!("adapter_properties_cb: {status} with {num_properties} properties");
    if let Some(listener) = hal_listener() {
        listener.adapter_properties(Status::from_raw(status), &properties(num_properties, props));
    }
}

unsafe extern "C" fn device_found_cb(num_properties: c_int, props: *mut sys::bt_property_t) {
    if let Some(listener) = hal_listener() {
        listener.device_found(&properties(num_properties, props));
    }
}

unsafe extern "C" fn discovery_state_changed_cb(state: sys::bt_discovery_state_t) {
    let state = match state {
        sys::BT_DISCOVERY_STOPPED => DiscoveryState::Stopped,
        _ => DiscoveryState::Started,
    };
    if let Some(listener) = hal_listener() {
        listener.discovery_state_changed(state);
    }
}

unsafe extern "C" fn pin_request_cb(
    addr: *mut sys::RawAddress, name: *mut sys::bt_bdname_t, cod: u32, min_16_digit: bool,
) {
    if let Some(listener) = hal_listener() {
        listener.pin_request(address(addr), &bdname(name), cod, min_16_digit);
    }
}

unsafe extern "C" fn ssp_request_cb(
    addr: *mut sys::RawAddress, name: *mut sys::bt_bdname_t, cod: u32, variant: sys::bt_ssp_variant_t, passkey: u32,
) {
    let Some(variant) = SspVariant::from_i32(variant) else {
        log::warn!("Ignoring SSP request with unknown variant {variant}");
        return;
    };
    if let Some(listener) = hal_listener() {
        listener.ssp_request(address(addr), &bdname(name), cod, variant, passkey);
    }
}

unsafe extern "C" fn bond_state_changed_cb(
    status: sys::bt_status_t, addr: *mut sys::RawAddress, state: sys::bt_bond_state_t, fail_reason: c_int,
) {
    log::trace!("bond_state_changed_cb: status {status}, state {state}, reason {fail_reason}");
    let Some(state) = BondState::from_i32(state) else {
        log::warn!("Ignoring unknown bond state {state}");
        return;
    };
    if let Some(listener) = hal_listener() {
        listener.bond_state_changed(Status::from_raw(status), address(addr), state);
    }
}

unsafe extern "C" fn acl_state_changed_cb(
    status: sys::bt_status_t, addr: *mut sys::RawAddress, state: sys::bt_acl_state_t, hci_reason: c_int,
) {
    log::trace!("acl_state_changed_cb: status {status}, state {state}, reason {hci_reason}");
    let state = match state {
        sys::BT_ACL_STATE_CONNECTED => AclState::Connected,
        _ => AclState::Disconnected,
    };
    if let Some(listener) = hal_listener() {
        listener.acl_state_changed(Status::from_raw(status), address(addr), state);
    }
}

unsafe extern "C" fn le_test_mode_cb(status: sys::bt_status_t, num_packets: u16) {
    if let Some(listener) = hal_listener() {
        listener.le_test_mode(Status::from_raw(status), num_packets);
    }
}

fn callbacks() -> sys::bt_callbacks_t {
    sys::bt_callbacks_t {
        size: std::mem::size_of::<sys::bt_callbacks_t>(),
        adapter_state_changed_cb: Some(adapter_state_changed_cb),
        adapter_properties_cb: Some(adapter_properties_cb),
        remote_device_properties_cb: None,
        device_found_cb: Some(device_found_cb),
        discovery_state_changed_cb: Some(discovery_state_changed_cb),
        pin_request_cb: Some(pin_request_cb),
        ssp_request_cb: Some(ssp_request_cb),
        bond_state_changed_cb: Some(bond_state_changed_cb),
        address_consolidate_cb: None,
        le_address_associate_cb: None,
        acl_state_changed_cb: Some(acl_state_changed_cb),
        thread_evt_cb: None,
        dut_mode_recv_cb: None,
        le_test_mode_cb: Some(le_test_mode_cb),
        energy_info_cb: None,
        link_quality_report_cb: None,
        generate_local_oob_data_cb: None,
        switch_buffer_size_cb: None,
        switch_codec_cb: None,
    }
}

// OS callouts

struct AlarmData(*mut c_void);

// The pointer is handed back to the stack unchanged.
unsafe impl Send for AlarmData {}

impl AlarmData {
    fn fire(self, cb: sys::alarm_cb) {
        unsafe { cb(self.0) }
    }
}

unsafe extern "C" fn set_wake_alarm(
    delay_millis: u64, _should_wake: bool, cb: Option<sys::alarm_cb>, data: *mut c_void,
) -> bool {
    let Some(cb) = cb else { return false };
    // Arming a new alarm replaces the pending one.
    let generation = ALARM_GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
    let alarm = AlarmData(data);
    let spawned = std::thread::Builder::new().name("bthal-alarm".into()).spawn(move || {
        std::thread::sleep(Duration::from_millis(delay_millis));
        if ALARM_GENERATION.load(Ordering::SeqCst) == generation {
            alarm.fire(cb);
        }
    });
    match spawned {
        Ok(_) => true,
        Err(err) => {
            log::error!("Cannot start wake alarm thread: {err}");
            false
        }
    }
}

unsafe extern "C" fn acquire_wake_lock(_lock_name: *const c_char) -> c_int {
    Status::Success as c_int
}

unsafe extern "C" fn release_wake_lock(_lock_name: *const c_char) -> c_int {
    Status::Success as c_int
}

/// Native binding to the base Bluetooth interface.
#[derive(Debug)]
pub struct NativeHal {
    _lib: Library,
    itf: NonNull<sys::bt_interface_t>,
    unloaded: AtomicBool,
}

// Interface tables are immutable and live as long as the library.
unsafe impl Send for NativeHal {}
unsafe impl Sync for NativeHal {}

impl NativeHal {
    /// Opens the vendor library and resolves the base interface.
    pub fn load(config: &Config) -> Result<Arc<Self>> {
        let lib = Library::open(&config.library)?;
        let itf = lib.symbol::<sys::bt_interface_t>(&config.symbol)?;
        log::debug!("Resolved {} from {}", &config.symbol, lib.name());
        Ok(Arc::new(Self { _lib: lib, itf, unloaded: AtomicBool::new(false) }))
    }

    fn itf(&self) -> Option<&sys::bt_interface_t> {
        if self.unloaded.load(Ordering::SeqCst) {
            log::warn!("Request after unload");
            return None;
        }
        Some(unsafe { self.itf.as_ref() })
    }
}

impl BluetoothHal for NativeHal {
    fn init(&self, listener: Arc<dyn HalListener>) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        set_slot(&HAL_LISTENER, Some(listener));
        let cbs: &'static mut sys::bt_callbacks_t = Box::leak(Box::new(callbacks()));
        status(ccall!(itf, init, cbs, false, false, 0, ptr::null(), false, ptr::null()))
    }

    fn enable(&self) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        status(ccall!(itf, enable))
    }

    fn disable(&self) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        status(ccall!(itf, disable))
    }

    fn cleanup(&self) {
        if let Some(itf) = self.itf() {
            ccall!(itf, cleanup);
        }
    }

    fn set_adapter_property(&self, prop: &Property) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        let (type_, mut value) = property_to_raw(prop);
        let raw = sys::bt_property_t { type_, len: value.len() as c_int, val: value.as_mut_ptr() as *mut c_void };
        status(ccall!(itf, set_adapter_property, &raw))
    }

    fn create_bond(&self, address: Address, transport: Transport) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        let addr = sys::RawAddress::from(address);
        status(ccall!(itf, create_bond, &addr, transport as c_int))
    }

    fn pin_reply(&self, address: Address, accept: bool, pin: &[u8]) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        let addr = sys::RawAddress::from(address);
        let mut code = sys::bt_pin_code_t::default();
        let len = pin.len().min(code.pin.len());
        code.pin[..len].copy_from_slice(&pin[..len]);
        status(ccall!(itf, pin_reply, &addr, accept as u8, len as u8, &mut code))
    }

    fn ssp_reply(&self, address: Address, variant: SspVariant, accept: bool, passkey: u32) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        let addr = sys::RawAddress::from(address);
        status(ccall!(itf, ssp_reply, &addr, variant as c_int, accept as u8, passkey))
    }

    fn set_os_callouts(&self) -> Status {
        let Some(itf) = self.itf() else { return Status::NotReady };
        let callouts: &'static mut sys::bt_os_callouts_t = Box::leak(Box::new(sys::bt_os_callouts_t {
            size: std::mem::size_of::<sys::bt_os_callouts_t>(),
            set_wake_alarm: Some(set_wake_alarm),
            acquire_wake_lock: Some(acquire_wake_lock),
            release_wake_lock: Some(release_wake_lock),
        }));
        status(ccall!(itf, set_os_callouts, callouts))
    }

    fn vendor(&self) -> Interface<dyn VendorHal> {
        let Some(itf) = self.itf() else { return Interface::Unavailable };
        let raw = ccall!(itf, get_profile_interface, sys::BT_PROFILE_VENDOR_ID.as_ptr() as *const c_char);
        match raw.and_then(|raw| NonNull::new(raw as *mut sys::btvendor_interface_t)) {
            Some(itf) => Interface::Available(Arc::new(NativeVendor { itf })),
            None => Interface::Unavailable,
        }
    }

    fn unload(&self) {
        self.unloaded.store(true, Ordering::SeqCst);
        set_slot(&HAL_LISTENER, None);
        set_slot(&MCAP_LISTENER, None);
        log::debug!("Listeners released");
    }
}

/// Native binding to the vendor extension interface.
#[derive(Debug)]
pub struct NativeVendor {
    itf: NonNull<sys::btvendor_interface_t>,
}

unsafe impl Send for NativeVendor {}
unsafe impl Sync for NativeVendor {}

impl NativeVendor {
    fn test_app(&self, profile: sys::test_app_profile) -> Option<NonNull<c_void>> {
        let itf = unsafe { self.itf.as_ref() };
        ccall!(itf, get_testapp_interface, profile).and_then(NonNull::new)
    }
}

impl VendorHal for NativeVendor {
    fn mcap(&self) -> Interface<dyn McapHal> {
        match self.test_app(sys::TEST_APP_MCAP) {
            Some(itf) => Interface::Available(Arc::new(NativeMcap { itf: itf.cast() })),
            None => Interface::Unavailable,
        }
    }

    fn rfcomm(&self) -> Interface<dyn RfcommHal> {
        match self.test_app(sys::TEST_APP_RFCOMM) {
            Some(itf) => Interface::Available(Arc::new(NativeRfcomm { itf: itf.cast() })),
            None => Interface::Unavailable,
        }
    }
}

// MCAP

unsafe extern "C" fn mcap_ctrl_cb(handle: sys::tMCA_HANDLE, mcl: sys::tMCA_CL, event: u8, data: *mut sys::tMCA_CTRL) {
    let event = McapCtrlEvent::from_raw(event, data);
    log::trace!("mcap_ctrl_cb: handle {handle}, mcl {mcl}, {event:?}");
    if let Some(listener) = mcap_listener() {
        listener.control(handle, mcl, event);
    }
}

unsafe extern "C" fn mcap_data_cb(mdl: sys::tMCA_DL, pkt: *mut sys::BT_HDR) {
    let Some(hdr) = pkt.as_ref() else { return };
    let payload = slice::from_raw_parts(hdr.data.as_ptr().add(hdr.offset as usize), hdr.len as usize).to_vec();
    let packet = DataPacket { event: hdr.event, layer_specific: hdr.layer_specific, payload };
    if let Some(listener) = mcap_listener() {
        listener.data(mdl, packet);
    }
}

/// Native binding to the MCAP test interface.
#[derive(Debug)]
pub struct NativeMcap {
    itf: NonNull<sys::btmcap_interface_t>,
}

unsafe impl Send for NativeMcap {}
unsafe impl Sync for NativeMcap {}

impl NativeMcap {
    fn itf(&self) -> &sys::btmcap_interface_t {
        unsafe { self.itf.as_ref() }
    }
}

const MCA_FAIL: McaResult = 1;

impl McapHal for NativeMcap {
    fn init(&self) {
        ccall!(self.itf(), Init);
    }

    fn register(&self, reg: &Registration, listener: Arc<dyn McapListener>) -> McaHandle {
        set_slot(&MCAP_LISTENER, Some(listener));
        let mut raw = sys::tMCA_REG::from(reg);
        ccall!(self.itf(), Register, &mut raw, Some(mcap_ctrl_cb)).unwrap_or(0)
    }

    fn deregister(&self, handle: McaHandle) {
        ccall!(self.itf(), Deregister, handle);
    }

    fn create_dep(&self, handle: McaHandle, config: &DepConfig) -> (McaResult, McaDep) {
        let mut cs =
            sys::tMCA_CS { type_: config.kind.to_raw(), max_mdl: config.max_mdl, p_data_cback: Some(mcap_data_cb) };
        let mut dep: McaDep = 0;
        let res = ccall!(self.itf(), CreateDep, handle, &mut dep, &mut cs).unwrap_or(MCA_FAIL);
        (res, dep)
    }

    fn delete_dep(&self, handle: McaHandle, dep: McaDep) -> McaResult {
        ccall!(self.itf(), DeleteDep, handle, dep).unwrap_or(MCA_FAIL)
    }

    fn connect_req(&self, handle: McaHandle, address: Address, ctrl_psm: u16, sec_mask: u16) -> McaResult {
        let addr = sys::RawAddress::from(address);
        ccall!(self.itf(), ConnectReq, handle, &addr, ctrl_psm, sec_mask).unwrap_or(MCA_FAIL)
    }

    fn disconnect_req(&self, mcl: McaCl) -> McaResult {
        ccall!(self.itf(), DisconnectReq, mcl).unwrap_or(MCA_FAIL)
    }

    fn create_mdl(
        &self, mcl: McaCl, dep: McaDep, data_psm: u16, mdl_id: u16, peer_dep_id: u8, cfg: u8, chnl: &ChannelConfig,
    ) -> McaResult {
        ccall!(self.itf(), CreateMdl, mcl, dep, data_psm, mdl_id, peer_dep_id, cfg, &chnl.0).unwrap_or(MCA_FAIL)
    }

    fn create_mdl_rsp(
        &self, mcl: McaCl, dep: McaDep, mdl_id: u16, cfg: u8, rsp_code: u8, chnl: &ChannelConfig,
    ) -> McaResult {
        ccall!(self.itf(), CreateMdlRsp, mcl, dep, mdl_id, cfg, rsp_code, &chnl.0).unwrap_or(MCA_FAIL)
    }

    fn close_req(&self, mdl: McaDl) -> McaResult {
        ccall!(self.itf(), CloseReq, mdl).unwrap_or(MCA_FAIL)
    }

    fn reconnect_mdl_rsp(
        &self, mcl: McaCl, dep: McaDep, mdl_id: u16, rsp_code: u8, chnl: &ChannelConfig,
    ) -> McaResult {
        ccall!(self.itf(), ReconnectMdlRsp, mcl, dep, mdl_id, rsp_code, &chnl.0).unwrap_or(MCA_FAIL)
    }
}

// RFCOMM

/// Native binding to the RFCOMM test interface.
#[derive(Debug)]
pub struct NativeRfcomm {
    itf: NonNull<sys::btrfcomm_interface_t>,
}

unsafe impl Send for NativeRfcomm {}
unsafe impl Sync for NativeRfcomm {}

impl NativeRfcomm {
    fn itf(&self) -> &sys::btrfcomm_interface_t {
        unsafe { self.itf.as_ref() }
    }
}

impl RfcommHal for NativeRfcomm {
    fn rdut_rfcomm(&self, mode: RdutMode) {
        ccall!(self.itf(), rdut_rfcomm, mode.to_raw());
    }

    fn test_interface(&self, test: &RfcTest) {
        let mut raw = test.to_raw();
        ccall!(self.itf(), rdut_rfcomm_test_interface, &mut raw);
    }

    fn connect(&self, address: Address) -> Status {
        let mut addr = sys::RawAddress::from(address);
        status(ccall!(self.itf(), connect, &mut addr))
    }

    fn cleanup(&self) {
        ccall!(self.itf(), cleanup);
    }
}

/// Loads the vendor library and resolves its base interface.
///
/// Fails with [LibraryNotFound](crate::ErrorKind::LibraryNotFound) or
/// [SymbolNotFound](crate::ErrorKind::SymbolNotFound).
pub fn load(config: &Config) -> Result<Arc<dyn BluetoothHal>> {
    match NativeHal::load(config) {
        Ok(hal) => Ok(hal),
        Err(err) => {
            log::error!("{err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_property_encoding() {
        let (kind, value) = property_to_raw(&Property::ScanMode(ScanMode::ConnectableDiscoverable));
        assert_eq!(kind, sys::BT_PROPERTY_ADAPTER_SCAN_MODE);
        let mut raw = sys::bt_property_t { type_: kind, len: value.len() as c_int, val: value.as_ptr() as *mut c_void };
        assert_eq!(unsafe { property(&raw) }, Property::ScanMode(ScanMode::ConnectableDiscoverable));

        let mut name = *b"Bluedroid\0\0";
        raw = sys::bt_property_t { type_: sys::BT_PROPERTY_BDNAME, len: 11, val: name.as_mut_ptr() as *mut c_void };
        assert_eq!(unsafe { property(&raw) }, Property::Name("Bluedroid".into()));
    }

    #[test]
    fn load_failure() {
        let config = Config { library: "libbthal-missing.so".into(), ..Config::default() };
        let Err(err) = load(&config) else { panic!("missing library loaded") };
        assert_eq!(err.kind, crate::ErrorKind::LibraryNotFound("libbthal-missing.so".into()));
    }

    static ALARMS: AtomicU64 = AtomicU64::new(0);

    unsafe extern "C" fn count_alarm(data: *mut c_void) {
        assert_eq!(data as usize, 0x5a);
        ALARMS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn wake_alarm_fires_once() {
        let armed = unsafe { set_wake_alarm(5, true, Some(count_alarm), 0x5a as *mut c_void) };
        assert!(armed);
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(ALARMS.load(Ordering::SeqCst), 1);

        assert!(!unsafe { set_wake_alarm(5, true, None, std::ptr::null_mut()) });
    }
}
