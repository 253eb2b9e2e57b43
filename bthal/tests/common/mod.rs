//! Test doubles of the vendor HAL interfaces.

#![allow(dead_code)]

use bthal::{
    console::Transcript,
    hal::{
        AdapterState, BluetoothHal, HalListener, Interface, Property, SspVariant, Transport, VendorHal,
    },
    mcap::{
        ChannelConfig, DepConfig, McaCl, McaDep, McaDl, McaHandle, McaResult, McapCtrlEvent, McapHal, McapListener,
        Registration,
    },
    rfcomm::{RdutMode, RfcTest, RfcommHal},
    Address, Config, Console, Status,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

pub fn console() -> (Console, Transcript) {
    let _ = env_logger::builder().is_test(true).try_init();
    Console::memory()
}

pub fn config() -> Config {
    Config { enable_timeout: Duration::from_secs(5), ..Config::default() }
}

pub fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

/// Mock of the base interface.
pub struct MockHal {
    calls: Mutex<Vec<String>>,
    listener: Mutex<Option<Arc<dyn HalListener>>>,
    init_status: Status,
    fire_on_enable: bool,
    vendor: Option<Arc<MockVendor>>,
    unloads: AtomicUsize,
}

impl MockHal {
    /// Stack with vendor, MCAP and RFCOMM interfaces that reports
    /// the adapter switched on shortly after enabling.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
            init_status: Status::Success,
            fire_on_enable: true,
            vendor: Some(Arc::new(MockVendor {
                mcap: Some(Arc::new(MockMcap::default())),
                rfcomm: Some(Arc::new(MockRfcomm::default())),
            })),
            unloads: AtomicUsize::new(0),
        }
    }

    pub fn without_vendor(mut self) -> Self {
        self.vendor = None;
        self
    }

    pub fn without_mcap(mut self) -> Self {
        self.vendor = Some(Arc::new(MockVendor { mcap: None, rfcomm: self.rfcomm() }));
        self
    }

    pub fn without_rfcomm(mut self) -> Self {
        self.vendor = Some(Arc::new(MockVendor { mcap: self.mcap(), rfcomm: None }));
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.init_status = Status::Fail;
        self
    }

    pub fn silent_enable(mut self) -> Self {
        self.fire_on_enable = false;
        self
    }

    pub fn mcap(&self) -> Option<Arc<MockMcap>> {
        self.vendor.as_ref().and_then(|vendor| vendor.mcap.clone())
    }

    pub fn rfcomm(&self) -> Option<Arc<MockRfcomm>> {
        self.vendor.as_ref().and_then(|vendor| vendor.rfcomm.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    /// Listener registered by init.
    pub fn listener(&self) -> Arc<dyn HalListener> {
        self.listener.lock().unwrap().clone().expect("init not called")
    }

    /// Invokes `f` with the listener on a separate thread, like the stack does.
    pub fn fire(&self, f: impl FnOnce(&dyn HalListener) + Send + 'static) {
        let listener = self.listener();
        thread::spawn(move || f(&*listener)).join().unwrap();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fire_later(&self, state: AdapterState) {
        let listener = self.listener();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            listener.adapter_state_changed(state);
        });
    }
}

impl BluetoothHal for MockHal {
    fn init(&self, listener: Arc<dyn HalListener>) -> Status {
        self.record("init".into());
        *self.listener.lock().unwrap() = Some(listener);
        self.init_status
    }

    fn enable(&self) -> Status {
        self.record("enable".into());
        if self.fire_on_enable {
            self.fire_later(AdapterState::On);
        }
        Status::Success
    }

    fn disable(&self) -> Status {
        self.record("disable".into());
        if self.fire_on_enable {
            self.fire_later(AdapterState::Off);
        }
        Status::Success
    }

    fn cleanup(&self) {
        self.record("cleanup".into());
    }

    fn set_adapter_property(&self, property: &Property) -> Status {
        self.record(format!("set_adapter_property {property:?}"));
        Status::Success
    }

    fn create_bond(&self, address: Address, transport: Transport) -> Status {
        self.record(format!("create_bond {address} {transport:?}"));
        Status::Success
    }

    fn pin_reply(&self, address: Address, accept: bool, pin: &[u8]) -> Status {
        self.record(format!("pin_reply {address} {accept} {}", String::from_utf8_lossy(pin)));
        Status::Success
    }

    fn ssp_reply(&self, address: Address, variant: SspVariant, accept: bool, passkey: u32) -> Status {
        self.record(format!("ssp_reply {address} {variant:?} {accept} {passkey}"));
        Status::Success
    }

    fn set_os_callouts(&self) -> Status {
        self.record("set_os_callouts".into());
        Status::Success
    }

    fn vendor(&self) -> Interface<dyn VendorHal> {
        self.vendor.clone().map(|vendor| vendor as Arc<dyn VendorHal>).into()
    }

    fn unload(&self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.listener.lock().unwrap().take();
    }
}

/// Mock of the vendor extension.
pub struct MockVendor {
    mcap: Option<Arc<MockMcap>>,
    rfcomm: Option<Arc<MockRfcomm>>,
}

impl VendorHal for MockVendor {
    fn mcap(&self) -> Interface<dyn McapHal> {
        self.mcap.clone().map(|mcap| mcap as Arc<dyn McapHal>).into()
    }

    fn rfcomm(&self) -> Interface<dyn RfcommHal> {
        self.rfcomm.clone().map(|rfcomm| rfcomm as Arc<dyn RfcommHal>).into()
    }
}

/// Mock of the MCAP test interface.
///
/// Registration yields handle 1 and endpoint creation endpoint 2.
#[derive(Default)]
pub struct MockMcap {
    calls: Mutex<Vec<String>>,
    listener: Mutex<Option<Arc<dyn McapListener>>>,
}

impl MockMcap {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    /// Delivers a control event from a stack thread.
    pub fn fire(&self, mcl: McaCl, event: McapCtrlEvent) {
        let listener = self.listener.lock().unwrap().clone().expect("register not called");
        thread::spawn(move || listener.control(1, mcl, event)).join().unwrap();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl McapHal for MockMcap {
    fn init(&self) {
        self.record("init".into());
    }

    fn register(&self, reg: &Registration, listener: Arc<dyn McapListener>) -> McaHandle {
        self.record(format!(
            "register ctrl_psm={:#x} data_psm={:#x} sec_mask={} rsp_tout={}",
            reg.ctrl_psm, reg.data_psm, reg.sec_mask, reg.rsp_tout
        ));
        *self.listener.lock().unwrap() = Some(listener);
        1
    }

    fn deregister(&self, handle: McaHandle) {
        self.record(format!("deregister {handle}"));
    }

    fn create_dep(&self, handle: McaHandle, config: &DepConfig) -> (McaResult, McaDep) {
        self.record(format!("create_dep {handle} {:?} max_mdl={}", config.kind, config.max_mdl));
        (0, 2)
    }

    fn delete_dep(&self, handle: McaHandle, dep: McaDep) -> McaResult {
        self.record(format!("delete_dep {handle} {dep}"));
        0
    }

    fn connect_req(&self, handle: McaHandle, address: Address, ctrl_psm: u16, sec_mask: u16) -> McaResult {
        self.record(format!("connect_req {handle} {address} {ctrl_psm:#x} {sec_mask}"));
        0
    }

    fn disconnect_req(&self, mcl: McaCl) -> McaResult {
        self.record(format!("disconnect_req {mcl}"));
        0
    }

    fn create_mdl(
        &self, mcl: McaCl, dep: McaDep, data_psm: u16, mdl_id: u16, peer_dep_id: u8, cfg: u8, chnl: &ChannelConfig,
    ) -> McaResult {
        assert_eq!(*chnl, ChannelConfig::default());
        self.record(format!("create_mdl {mcl} {dep} {data_psm:#x} {mdl_id} {peer_dep_id} {cfg}"));
        0
    }

    fn create_mdl_rsp(
        &self, mcl: McaCl, dep: McaDep, mdl_id: u16, cfg: u8, rsp_code: u8, _chnl: &ChannelConfig,
    ) -> McaResult {
        self.record(format!("create_mdl_rsp {mcl} {dep} {mdl_id} {cfg} {rsp_code}"));
        0
    }

    fn close_req(&self, mdl: McaDl) -> McaResult {
        self.record(format!("close_req {mdl}"));
        0
    }

    fn reconnect_mdl_rsp(
        &self, mcl: McaCl, dep: McaDep, mdl_id: u16, rsp_code: u8, _chnl: &ChannelConfig,
    ) -> McaResult {
        self.record(format!("reconnect_mdl_rsp {mcl} {dep} {mdl_id} {rsp_code}"));
        0
    }
}

/// Mock of the RFCOMM test interface.
#[derive(Default)]
pub struct MockRfcomm {
    calls: Mutex<Vec<String>>,
    tests: Mutex<Vec<RfcTest>>,
}

impl MockRfcomm {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tests(&self) -> Vec<RfcTest> {
        self.tests.lock().unwrap().clone()
    }
}

impl RfcommHal for MockRfcomm {
    fn rdut_rfcomm(&self, mode: RdutMode) {
        self.calls.lock().unwrap().push(format!("rdut_rfcomm {mode:?}"));
    }

    fn test_interface(&self, test: &RfcTest) {
        self.tests.lock().unwrap().push(*test);
    }

    fn connect(&self, address: Address) -> Status {
        self.calls.lock().unwrap().push(format!("connect {address}"));
        Status::Success
    }

    fn cleanup(&self) {
        self.calls.lock().unwrap().push("cleanup".into());
    }
}
