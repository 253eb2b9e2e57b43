//! Command set of the MCAP test console.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::{
    ChannelConfig, DataPacket, DepConfig, DepType, McaCl, McaDep, McaDl, McaHandle, McapCtrlEvent, McapHal,
    McapListener, Registration, DEFAULT_RSP_TIMEOUT,
};
use crate::{
    app::{self, Session},
    args::{Args, MAX_ARG_LEN},
    dispatch::{Command, Dispatcher},
    event::HalEvent,
    hal::{AclState, AdapterState, BluetoothHal, BondState, DiscoveryState, HalListener, Property, ScanMode},
    hal::{Interface, SspVariant, Transport},
    job::JobQueue,
    sys, Adapter, Address, Config, Console, Error, ErrorKind, Result, Status,
};

/// Handles and identifiers of the current MCAP session.
///
/// Each value is valid after the command or event that sets it and stale
/// once the peer or a later command replaced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct McapState {
    /// Registration handle.
    pub handle: McaHandle,
    /// Data endpoint.
    pub dep: McaDep,
    /// Control link.
    pub mcl: McaCl,
    /// Data link.
    pub mdl: McaDl,
    /// MDL id of the data link.
    pub mdl_id: u16,
    /// MTU of the peer on the data link.
    pub peer_mtu: u16,
}

/// MCAP session shared between the console commands and the control callback.
struct McapSession {
    mcap: Arc<dyn McapHal>,
    console: Console,
    channel: ChannelConfig,
    state: Mutex<McapState>,
}

impl McapSession {
    fn lock(&self) -> MutexGuard<'_, McapState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl McapListener for McapSession {
    fn control(&self, handle: McaHandle, mcl: McaCl, event: McapCtrlEvent) {
        log::debug!("MCAP control event on handle {handle}, mcl {mcl}: {event:?}");
        match event {
            McapCtrlEvent::CreateInd { mdl_id, dep_id, cfg } => {
                self.lock().mdl_id = mdl_id;
                let res = self.mcap.create_mdl_rsp(mcl, dep_id, mdl_id, cfg, sys::MCA_RSP_SUCCESS, &self.channel);
                log::debug!("CreateMdlRsp for MDL id {mdl_id}: {res}");
            }
            McapCtrlEvent::ConnectInd { address, mtu } => {
                self.lock().mcl = mcl;
                self.console.line(format_args!("MCAP connected to {address}, mtu={mtu}"));
            }
            McapCtrlEvent::DisconnectInd { address, reason } => {
                self.lock().mcl = 0;
                self.console.line(format_args!("MCAP disconnected from {address}, reason={reason}"));
            }
            McapCtrlEvent::OpenInd { mdl_id, mdl, mtu } | McapCtrlEvent::OpenCfm { mdl_id, mdl, mtu } => {
                let mut state = self.lock();
                state.mdl_id = mdl_id;
                state.mdl = mdl;
                state.peer_mtu = mtu;
            }
            McapCtrlEvent::ReconnectInd { mdl_id } => {
                let (known, dep) = {
                    let state = self.lock();
                    (state.mdl_id == mdl_id, state.dep)
                };
                let rsp_code = if known { sys::MCA_RSP_SUCCESS } else { sys::MCA_RSP_BAD_MDL };
                let res = self.mcap.reconnect_mdl_rsp(mcl, dep, mdl_id, rsp_code, &self.channel);
                log::debug!("ReconnectMdlRsp for MDL id {mdl_id} with {rsp_code}: {res}");
            }
            McapCtrlEvent::DeleteInd { mdl_id } => {
                let mut state = self.lock();
                if mdl_id == sys::MCA_ALL_MDL_ID || mdl_id == state.mdl_id {
                    state.mdl_id = 0;
                }
            }
            McapCtrlEvent::CloseInd { mdl_id, reason } | McapCtrlEvent::CloseCfm { mdl_id, reason } => {
                self.console.line(format_args!("MCAP data channel {mdl_id} closed, reason={reason}"));
            }
            _ => (),
        }
    }

    fn data(&self, mdl: McaDl, packet: DataPacket) {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("MCAP data on mdl {mdl}: {packet:?}\n{}", pretty_hex::pretty_hex(&packet.payload));
        }
    }
}

/// Adapter callbacks of the MCAP console.
///
/// Makes the adapter discoverable once it is switched on and accepts
/// every pairing request.
struct McapAdapterEvents {
    adapter: Weak<Adapter>,
    console: Console,
}

impl McapAdapterEvents {
    fn hal(&self) -> Option<Arc<dyn BluetoothHal>> {
        self.adapter.upgrade().map(|adapter| adapter.hal().clone())
    }
}

impl HalListener for McapAdapterEvents {
    fn adapter_state_changed(&self, state: AdapterState) {
        if state != AdapterState::On {
            return;
        }
        let Some(hal) = self.hal() else { return };
        for prop in [
            Property::ScanMode(ScanMode::ConnectableDiscoverable),
            Property::DiscoverableTimeout(1000),
            Property::Name("Bluedroid".to_string()),
        ] {
            let status = hal.set_adapter_property(&prop);
            if !status.is_success() {
                log::warn!("Setting {prop:?} failed: {status}");
            }
        }
    }

    fn adapter_properties(&self, _status: Status, properties: &[Property]) {
        match properties.first() {
            Some(Property::Address(addr)) => self.console.line(format_args!("Local Bd Addr = {addr}")),
            Some(_) => (),
            None => self.console.line("properties is null"),
        }
    }

    fn discovery_state_changed(&self, state: DiscoveryState) {
        self.console.line(format_args!("Discovery State Updated : {state}"));
    }

    fn pin_request(&self, address: Address, _name: &str, _cod: u32, _min_16_digit: bool) {
        let Some(hal) = self.hal() else { return };
        if !hal.pin_reply(address, true, b"1234").is_success() {
            self.console.line("Pin Reply failed");
        }
    }

    fn ssp_request(&self, address: Address, name: &str, _cod: u32, variant: SspVariant, passkey: u32) {
        self.console.line(format_args!("ssp_request_cb : {name} {} {passkey}", variant as i32));
        let Some(hal) = self.hal() else { return };
        if !hal.ssp_reply(address, variant, true, passkey).is_success() {
            self.console.line("SSP Reply failed");
        }
    }

    fn bond_state_changed(&self, _status: Status, _address: Address, state: BondState) {
        self.console.line(format_args!("Bond State Changed = {}", state as i32));
    }

    fn acl_state_changed(&self, _status: Status, _address: Address, state: AclState) {
        self.console.line(format_args!("acl_state_changed : acl status={state}"));
    }
}

/// Session context of the MCAP console.
pub struct McapContext {
    adapter: Arc<Adapter>,
    session: Arc<McapSession>,
}

impl McapContext {
    /// Snapshot of the MCAP session state.
    pub fn state(&self) -> McapState {
        self.session.lock().clone()
    }
}

impl Session for McapContext {
    fn adapter(&self) -> &Arc<Adapter> {
        &self.adapter
    }
}

fn parse_address(args: &mut Args) -> Result<Address> {
    Ok(args.get_str(MAX_ARG_LEN)?.parse()?)
}

fn do_pair(d: &Arc<Dispatcher<McapContext>>, args: &mut Args) -> Result<()> {
    let address = parse_address(args)?;
    let status = d.context().adapter.hal().create_bond(address, Transport::BrEdr);
    if !status.is_success() {
        d.console().line("Failed to Initiate Pairing");
    }
    Ok(())
}

fn do_register(d: &Arc<Dispatcher<McapContext>>, args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let reg = Registration {
        ctrl_psm: args.get_hex(u32::MAX) as u16,
        data_psm: args.get_hex(u32::MAX) as u16,
        sec_mask: args.get_int(u32::MAX) as u16,
        rsp_tout: DEFAULT_RSP_TIMEOUT,
    };
    let handle = session.mcap.register(&reg, session.clone());
    session.lock().handle = handle;
    d.console().line(format_args!("register:: Ret={handle}"));
    Ok(())
}

fn do_deregister(d: &Arc<Dispatcher<McapContext>>, _args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let handle = session.lock().handle;
    session.mcap.deregister(handle);
    d.console().line(format_args!("deregister:: Handle={handle}"));
    Ok(())
}

fn do_create_dep(d: &Arc<Dispatcher<McapContext>>, args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let config = DepConfig { kind: DepType::from_arg(args.get_int(u32::MAX)), max_mdl: sys::MCA_NUM_MDLS };
    let handle = session.lock().handle;
    let (res, dep) = session.mcap.create_dep(handle, &config);
    if res == sys::MCA_SUCCESS {
        session.lock().dep = dep;
    }
    d.console().line(format_args!("create_data_endpoint:: Ret={res}"));
    Ok(())
}

fn do_delete_dep(d: &Arc<Dispatcher<McapContext>>, _args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let McapState { handle, dep, .. } = session.lock().clone();
    let res = session.mcap.delete_dep(handle, dep);
    d.console().line(format_args!("delete_data_endpoint:: Ret={res}"));
    Ok(())
}

fn do_connect(d: &Arc<Dispatcher<McapContext>>, args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let address = parse_address(args)?;
    let ctrl_psm = args.get_hex(u32::MAX) as u16;
    let sec_mask = args.get_int(u32::MAX) as u16;
    d.console().line(format_args!("ctrl_psm={ctrl_psm}, secMask={sec_mask}"));
    let handle = session.lock().handle;
    let res = session.mcap.connect_req(handle, address, ctrl_psm, sec_mask);
    d.console().line(format_args!("connect:: Ret={res}"));
    Ok(())
}

fn do_disconnect(d: &Arc<Dispatcher<McapContext>>, _args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let mcl = session.lock().mcl;
    let res = session.mcap.disconnect_req(mcl);
    d.console().line(format_args!("disconnect:: Ret={res}"));
    Ok(())
}

fn do_create_mdl(d: &Arc<Dispatcher<McapContext>>, args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let data_psm = args.get_hex(u32::MAX) as u16;
    let McapState { mcl, dep, .. } = session.lock().clone();
    let res = session.mcap.create_mdl(mcl, dep, data_psm, 1, 1, 1, &session.channel);
    d.console().line(format_args!("create_mdl:: Ret={res}"));
    Ok(())
}

fn do_close(d: &Arc<Dispatcher<McapContext>>, _args: &mut Args) -> Result<()> {
    let session = &d.context().session;
    let mdl = session.lock().mdl;
    let res = session.mcap.close_req(mdl);
    d.console().line(format_args!("close_data_channel:: Ret={res}"));
    Ok(())
}

/// Commands of the MCAP console.
pub static COMMANDS: &[Command<McapContext>] = &[
    Command { name: "help", handler: app::do_help, help: "lists all available console commands", is_job: false },
    Command { name: "quit", handler: app::do_quit, help: "", is_job: false },
    Command { name: "enable", handler: app::do_enable, help: ":: enables bluetooth", is_job: false },
    Command { name: "disable", handler: app::do_disable, help: ":: disables bluetooth", is_job: false },
    Command { name: "pair", handler: do_pair, help: ":: BdAddr<00112233445566>", is_job: false },
    Command {
        name: "register",
        handler: do_register,
        help: "::Ctrl_Psm<hex>, Data_Psm<hex>, Security<0-10>",
        is_job: false,
    },
    Command { name: "deregister", handler: do_deregister, help: "::", is_job: false },
    Command {
        name: "create_data_endpoint",
        handler: do_create_dep,
        help: "::Type<0-Echo, 1-NormalData>",
        is_job: false,
    },
    Command { name: "delete_data_endpoint", handler: do_delete_dep, help: "::", is_job: false },
    Command {
        name: "connect",
        handler: do_connect,
        help: ":: BdAddr<00112233445566>, Ctrl_Psm<hex>, SecMask<int>",
        is_job: false,
    },
    Command { name: "disconnect", handler: do_disconnect, help: ":: BdAddr<00112233445566>", is_job: false },
    Command { name: "create_mdl", handler: do_create_mdl, help: ":: Data_Psm<hex>", is_job: false },
    Command { name: "close_data_channel", handler: do_close, help: "::", is_job: false },
];

/// Starts the MCAP console session.
///
/// Initializes the stack, switches the adapter on and waits for it to report
/// being on, then initializes the MCAP test application.
pub async fn start(
    hal: Arc<dyn BluetoothHal>, config: &Config, console: Console,
) -> Result<Arc<Dispatcher<McapContext>>> {
    let adapter = Adapter::new(hal, console.clone());
    let events = Arc::new(McapAdapterEvents { adapter: Arc::downgrade(&adapter), console: console.clone() });
    let vendor = adapter.init(events)?;
    let vendor = vendor.get().map_err(|_| Error::new(ErrorKind::VendorInterfaceNotFound))?.clone();

    let on = adapter.events().expect("adapter on", |evt| *evt == HalEvent::AdapterState(AdapterState::On));
    if adapter.enable().is_success() {
        match on.wait(config.enable_timeout).await {
            Ok(_) => log::debug!("Adapter is on"),
            Err(err) => log::warn!("{err}, continuing"),
        }
    }

    let mcap = match vendor.mcap() {
        Interface::Available(mcap) => mcap,
        Interface::Unavailable => {
            console.line("MCAP test interface not loaded");
            return Err(Error::new(ErrorKind::TestInterfaceNotFound("MCAP".into())));
        }
    };
    mcap.init();

    let session = Arc::new(McapSession {
        mcap,
        console: console.clone(),
        channel: ChannelConfig::default(),
        state: Mutex::new(McapState::default()),
    });
    let context = McapContext { adapter, session };
    Ok(Dispatcher::new(COMMANDS, context, console, JobQueue::new(config.jobs)?))
}
