//! Command set of the RFCOMM test console.

use std::sync::{Arc, Weak};

use super::{RdutMode, RfcTest, RfcommHal};
use crate::{
    app::{self, Session},
    args::{atoi, Args, MAX_ARG_LEN},
    dispatch::{Command, Dispatcher},
    hal::{AdapterState, BluetoothHal, HalListener, Interface, Property, SspVariant, VendorHal},
    job::JobQueue,
    Adapter, Address, Config, Console, Result,
};

/// Session context of the RFCOMM console.
pub struct RfcommContext {
    adapter: Arc<Adapter>,
    vendor: Interface<dyn VendorHal>,
}

impl RfcommContext {
    /// The RFCOMM test interface, resolved anew on every call.
    pub fn rfcomm(&self) -> Result<Arc<dyn RfcommHal>> {
        Ok(self.vendor.get()?.rfcomm().get()?.clone())
    }
}

impl Session for RfcommContext {
    fn adapter(&self) -> &Arc<Adapter> {
        &self.adapter
    }
}

/// Adapter callbacks of the RFCOMM console.
struct RfcommAdapterEvents {
    adapter: Weak<Adapter>,
    console: Console,
}

impl HalListener for RfcommAdapterEvents {
    fn adapter_state_changed(&self, state: AdapterState) {
        self.console.line(format_args!("ADAPTER STATE UPDATED : {state}"));
    }

    fn device_found(&self, properties: &[Property]) {
        for prop in properties {
            if let Property::Name(name) = prop {
                self.console.line(format_args!("AP name is : {name}"));
            }
        }
    }

    fn ssp_request(&self, address: Address, _name: &str, _cod: u32, variant: SspVariant, passkey: u32) {
        if variant == SspVariant::PasskeyEntry {
            self.console.line("bdt ssp remote request not supported");
            return;
        }
        self.console.line("bdt accept SSP pairing");
        if let Some(adapter) = self.adapter.upgrade() {
            let status = adapter.hal().ssp_reply(address, variant, true, passkey);
            if !status.is_success() {
                log::warn!("SSP reply failed: {status}");
            }
        }
    }
}

fn rdut(d: &Arc<Dispatcher<RfcommContext>>, msg: &str, mode: RdutMode) -> Result<()> {
    d.console().line(msg);
    d.context().rfcomm()?.rdut_rfcomm(mode);
    Ok(())
}

fn do_rfcomm(d: &Arc<Dispatcher<RfcommContext>>, _args: &mut Args) -> Result<()> {
    rdut(d, "rfcomm client", RdutMode::Client)
}

fn do_rfcomm_server(d: &Arc<Dispatcher<RfcommContext>>, _args: &mut Args) -> Result<()> {
    rdut(d, "rfcomm server", RdutMode::Server)
}

fn do_disconnect_from_server(d: &Arc<Dispatcher<RfcommContext>>, _args: &mut Args) -> Result<()> {
    rdut(d, "rfcomm disc from Server", RdutMode::Disconnect)
}

/// Parses the peer address and a number given like `atoi` would read it.
fn address_and_number(args: &mut Args) -> Result<(Address, u8)> {
    let address = args.get_str(MAX_ARG_LEN)?.parse()?;
    let number = atoi(args.get_str(MAX_ARG_LEN)?) as u8;
    Ok((address, number))
}

fn do_rfc_con(d: &Arc<Dispatcher<RfcommContext>>, args: &mut Args) -> Result<()> {
    d.console().line("bdt do_rfc_con");
    let (address, scn) = address_and_number(args)?;
    d.console().line(format_args!("SCN ={scn}"));
    d.context().rfcomm()?.test_interface(&RfcTest::Client { address, scn });
    Ok(())
}

fn do_rfc_msccon(d: &Arc<Dispatcher<RfcommContext>>, args: &mut Args) -> Result<()> {
    d.console().line("bdt do_rfc_con_for_test_msc_data");
    let (address, scn) = address_and_number(args)?;
    d.console().line(format_args!("SCN ={scn}"));
    d.context().rfcomm()?.test_interface(&RfcTest::ClientTestMscData { address, scn });
    Ok(())
}

fn do_role_switch(d: &Arc<Dispatcher<RfcommContext>>, args: &mut Args) -> Result<()> {
    d.console().line("bdt do_role_switch");
    let (address, role) = address_and_number(args)?;
    d.context().rfcomm()?.test_interface(&RfcTest::RoleSwitch { address, role });
    Ok(())
}

fn do_rfc_rls(d: &Arc<Dispatcher<RfcommContext>>, _args: &mut Args) -> Result<()> {
    d.console().line("bdt rfc_rls");
    d.context().rfcomm()?.test_interface(&RfcTest::FrameError);
    Ok(())
}

fn do_rfc_send_data(d: &Arc<Dispatcher<RfcommContext>>, _args: &mut Args) -> Result<()> {
    d.console().line("bdt rfc_send_data");
    d.context().rfcomm()?.test_interface(&RfcTest::WriteData);
    Ok(())
}

/// Commands of the RFCOMM console.
pub static COMMANDS: &[Command<RfcommContext>] = &[
    Command { name: "help", handler: app::do_help, help: "lists all available console commands", is_job: false },
    Command { name: "quit", handler: app::do_quit, help: "", is_job: false },
    Command { name: "enable", handler: app::do_enable, help: ":: enables bluetooth", is_job: false },
    Command { name: "disable", handler: app::do_disable, help: ":: disables bluetooth", is_job: false },
    Command { name: "rfcomm", handler: do_rfcomm, help: "rfcomm test", is_job: false },
    Command { name: "server_rfcomm", handler: do_rfcomm_server, help: "rfcomm server test", is_job: false },
    Command { name: "dis_client", handler: do_disconnect_from_server, help: "disc from Server", is_job: false },
    Command { name: "rfc_con", handler: do_rfc_con, help: "rfc_con", is_job: false },
    Command { name: "rfc_msccon", handler: do_rfc_msccon, help: "rfc_msccon", is_job: false },
    Command { name: "rfc_rls", handler: do_rfc_rls, help: "rls", is_job: false },
    Command { name: "rfc_senddata", handler: do_rfc_send_data, help: "rfc_senddata", is_job: false },
    Command { name: "role_sw", handler: do_role_switch, help: "role_sw", is_job: false },
];

/// Starts the RFCOMM console session.
///
/// Only initializes the stack. The RFCOMM test interface is looked up by each
/// command, which report `interface not loaded` when it is missing.
pub async fn start(
    hal: Arc<dyn BluetoothHal>, config: &Config, console: Console,
) -> Result<Arc<Dispatcher<RfcommContext>>> {
    let adapter = Adapter::new(hal, console.clone());
    let events = Arc::new(RfcommAdapterEvents { adapter: Arc::downgrade(&adapter), console: console.clone() });
    let vendor = adapter.init(events)?;
    if !vendor.is_available() {
        log::warn!("Running without vendor interface");
    }
    let context = RfcommContext { adapter, vendor };
    Ok(Dispatcher::new(COMMANDS, context, console, JobQueue::new(config.jobs)?))
}
