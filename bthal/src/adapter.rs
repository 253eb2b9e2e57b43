//! Bluetooth adapter session.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::{
    event::{EventBus, HalEvent},
    hal::{
        AclState, AdapterState, BluetoothHal, BondState, DiscoveryState, HalListener, Interface, Property,
        SspVariant, VendorHal,
    },
    Address, Console, Error, ErrorKind, Result, Status,
};

/// Adapter state as last reported by the stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterStatus {
    /// Adapter is switched on.
    pub enabled: bool,
    /// Last reported power state.
    pub state: AdapterState,
    /// Last reported bond state.
    pub bond: BondState,
    /// Local adapter address, once reported.
    pub local_address: Option<Address>,
}

impl Default for AdapterStatus {
    fn default() -> Self {
        Self { enabled: false, state: AdapterState::Off, bond: BondState::None, local_address: None }
    }
}

/// Bluetooth adapter driven through the base HAL interface.
///
/// Tracks the adapter state from the callbacks of the stack and publishes
/// them on its [event bus](Self::events).
pub struct Adapter {
    hal: Arc<dyn BluetoothHal>,
    console: Console,
    events: EventBus,
    status: Mutex<AdapterStatus>,
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Adapter").field("status", &self.status()).finish()
    }
}

impl Adapter {
    /// Creates an adapter session over `hal`.
    pub fn new(hal: Arc<dyn BluetoothHal>, console: Console) -> Arc<Self> {
        Arc::new(Self { hal, console, events: EventBus::new(), status: Mutex::new(AdapterStatus::default()) })
    }

    /// Base HAL interface.
    pub fn hal(&self) -> &Arc<dyn BluetoothHal> {
        &self.hal
    }

    /// Console output.
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Adapter events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn lock(&self) -> MutexGuard<'_, AdapterStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the adapter state.
    pub fn status(&self) -> AdapterStatus {
        self.lock().clone()
    }

    /// Whether the adapter is switched on.
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Prints the outcome of a request.
    pub fn check_return_status(&self, status: Status) {
        if status.is_success() {
            self.console.line("HAL REQUEST SUCCESS");
        } else {
            let raw = status as u32;
            self.console.line(format_args!("HAL REQUEST FAILED status : {raw} ({status})"));
        }
    }

    /// Initializes the stack with `profile` receiving the adapter callbacks,
    /// then resolves the vendor interface and installs the OS callouts.
    ///
    /// A failed initialization is reported and yields no vendor interface.
    /// A missing vendor interface after successful initialization is an error.
    pub fn init(self: &Arc<Self>, profile: Arc<dyn HalListener>) -> Result<Interface<dyn VendorHal>> {
        self.console.line("INIT BT ");
        let relay = Arc::new(Relay { adapter: Arc::downgrade(self), profile });
        let mut status = self.hal.init(relay);
        let mut vendor = Interface::Unavailable;
        if status.is_success() {
            vendor = self.hal.vendor();
            if !vendor.is_available() {
                self.console.line("Error in loading vendor interface ");
                return Err(Error::new(ErrorKind::VendorInterfaceNotFound));
            }
            status = self.hal.set_os_callouts();
        }
        self.check_return_status(status);
        Ok(vendor)
    }

    /// Switches the adapter on unless it already is.
    pub fn enable(&self) -> Status {
        self.console.line("ENABLE BT");
        if self.is_enabled() {
            self.console.line("Bluetooth is already enabled");
            return Status::Done;
        }
        let status = self.hal.enable();
        self.check_return_status(status);
        status
    }

    /// Switches the adapter off unless it already is.
    pub fn disable(&self) -> Status {
        self.console.line("DISABLE BT");
        if !self.is_enabled() {
            self.console.line("Bluetooth is already disabled");
            return Status::Done;
        }
        let status = self.hal.disable();
        self.check_return_status(status);
        status
    }
}

/// Receives the callbacks of the stack on behalf of an adapter and
/// forwards them to the tool specific listener.
struct Relay {
    adapter: Weak<Adapter>,
    profile: Arc<dyn HalListener>,
}

impl Relay {
    fn with_adapter(&self, f: impl FnOnce(&Adapter)) {
        match self.adapter.upgrade() {
            Some(adapter) => f(&adapter),
            None => log::debug!("Callback after adapter was dropped"),
        }
    }
}

impl HalListener for Relay {
    fn adapter_state_changed(&self, state: AdapterState) {
        self.with_adapter(|adapter| {
            {
                let mut status = adapter.lock();
                status.state = state;
                status.enabled = state == AdapterState::On;
            }
            log::debug!("Adapter state {state}");
            self.profile.adapter_state_changed(state);
            adapter.events.publish(&HalEvent::AdapterState(state));
        });
    }

    fn adapter_properties(&self, status: Status, properties: &[Property]) {
        self.with_adapter(|adapter| {
            let local = properties.iter().find_map(|prop| match prop {
                Property::Address(addr) => Some(*addr),
                _ => None,
            });
            if let Some(addr) = local {
                adapter.lock().local_address = Some(addr);
            }
            self.profile.adapter_properties(status, properties);
            if let Some(addr) = local {
                adapter.events.publish(&HalEvent::LocalAddress(addr));
            }
        });
    }

    fn device_found(&self, properties: &[Property]) {
        self.profile.device_found(properties);
    }

    fn discovery_state_changed(&self, state: DiscoveryState) {
        self.with_adapter(|adapter| {
            self.profile.discovery_state_changed(state);
            adapter.events.publish(&HalEvent::DiscoveryState(state));
        });
    }

    fn pin_request(&self, address: Address, name: &str, cod: u32, min_16_digit: bool) {
        self.profile.pin_request(address, name, cod, min_16_digit);
    }

    fn ssp_request(&self, address: Address, name: &str, cod: u32, variant: SspVariant, passkey: u32) {
        self.profile.ssp_request(address, name, cod, variant, passkey);
    }

    fn bond_state_changed(&self, status: Status, address: Address, state: BondState) {
        self.with_adapter(|adapter| {
            adapter.lock().bond = state;
            self.profile.bond_state_changed(status, address, state);
            adapter.events.publish(&HalEvent::BondState { address, state });
        });
    }

    fn acl_state_changed(&self, status: Status, address: Address, state: AclState) {
        self.with_adapter(|adapter| {
            self.profile.acl_state_changed(status, address, state);
            adapter.events.publish(&HalEvent::AclState { address, state });
        });
    }

    fn le_test_mode(&self, status: Status, packets: u16) {
        self.with_adapter(|adapter| {
            adapter.console.line(format_args!("LE TEST MODE END status:{status} number_of_packets:{packets}"));
            self.profile.le_test_mode(status, packets);
            adapter.events.publish(&HalEvent::LeTestMode { status, packets });
        });
    }
}
