//! Capabilities of the vendor Bluetooth HAL.
//!
//! The stack is modelled as a set of traits so that the console tools can be
//! driven by the [native](crate::native) bindings as well as by test doubles.
//! Optional interfaces are represented by [Interface], which is either
//! available or not.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use std::{fmt, sync::Arc};
use strum::{Display, IntoStaticStr};

use crate::{mcap::McapHal, rfcomm::RfcommHal, Address, Error, ErrorKind, Result, Status};

/// Optional capability resolved at runtime.
pub enum Interface<T: ?Sized> {
    /// Interface provided by the stack.
    Available(Arc<T>),
    /// Interface not provided by the stack.
    Unavailable,
}

impl<T: ?Sized> Interface<T> {
    /// The interface or [ErrorKind::InterfaceNotLoaded].
    pub fn get(&self) -> Result<&Arc<T>> {
        match self {
            Self::Available(itf) => Ok(itf),
            Self::Unavailable => Err(Error::new(ErrorKind::InterfaceNotLoaded)),
        }
    }

    /// Whether the interface is available.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T: ?Sized> Clone for Interface<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Available(itf) => Self::Available(itf.clone()),
            Self::Unavailable => Self::Unavailable,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Interface<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Available(_) => write!(f, "Available"),
            Self::Unavailable => write!(f, "Unavailable"),
        }
    }
}

impl<T: ?Sized> From<Option<Arc<T>>> for Interface<T> {
    fn from(itf: Option<Arc<T>>) -> Self {
        match itf {
            Some(itf) => Self::Available(itf),
            None => Self::Unavailable,
        }
    }
}

/// Adapter power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
pub enum AdapterState {
    /// Powered off.
    #[strum(serialize = "OFF")]
    Off = 0,
    /// Powered on.
    #[strum(serialize = "ON")]
    On = 1,
}

impl AdapterState {
    /// Converts a raw `bt_state_t`. Anything but on is treated as off.
    pub fn from_raw(raw: i32) -> Self {
        Self::from_i32(raw).unwrap_or(Self::Off)
    }
}

/// Device discovery state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
pub enum DiscoveryState {
    /// Discovery stopped.
    #[strum(serialize = "STOPPED")]
    Stopped = 0,
    /// Discovery running.
    #[strum(serialize = "STARTED")]
    Started = 1,
}

/// Bonding state with a remote device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
pub enum BondState {
    /// Not bonded.
    #[default]
    None = 0,
    /// Bonding in progress.
    Bonding = 1,
    /// Bonded.
    Bonded = 2,
}

/// ACL link state with a remote device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
pub enum AclState {
    /// Link established.
    #[strum(serialize = "ACL Connected")]
    Connected = 0,
    /// Link released.
    #[strum(serialize = "ACL Disconnected")]
    Disconnected = 1,
}

/// Secure simple pairing association model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum SspVariant {
    /// Numeric comparison.
    PasskeyConfirmation = 0,
    /// Passkey entered on the local side.
    PasskeyEntry = 1,
    /// Just works.
    Consent = 2,
    /// Passkey displayed on the local side.
    PasskeyNotification = 3,
}

/// Transport used for bonding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum Transport {
    /// Classic Bluetooth.
    BrEdr = 1,
    /// Bluetooth Low Energy.
    Le = 2,
}

/// Adapter scan mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, IntoStaticStr, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum ScanMode {
    /// Neither connectable nor discoverable.
    None = 0,
    /// Connectable.
    Connectable = 1,
    /// Connectable and discoverable.
    ConnectableDiscoverable = 2,
}

/// Adapter or remote device property.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Property {
    /// Friendly name.
    Name(String),
    /// Device address.
    Address(Address),
    /// Adapter scan mode.
    ScanMode(ScanMode),
    /// Adapter discoverable timeout in seconds.
    DiscoverableTimeout(u32),
    /// Property without a specific representation.
    Other {
        /// Property type code.
        kind: i32,
        /// Raw value.
        value: Vec<u8>,
    },
}

/// Receiver of the asynchronous callbacks of the stack.
///
/// Callbacks arrive on threads owned by the stack.
/// All methods do nothing by default.
#[allow(unused_variables)]
pub trait HalListener: Send + Sync {
    /// Adapter was switched on or off.
    fn adapter_state_changed(&self, state: AdapterState) {}
    /// Adapter properties were reported.
    fn adapter_properties(&self, status: Status, properties: &[Property]) {}
    /// A remote device was found during discovery.
    fn device_found(&self, properties: &[Property]) {}
    /// Discovery started or stopped.
    fn discovery_state_changed(&self, state: DiscoveryState) {}
    /// Remote device requests a legacy PIN.
    fn pin_request(&self, address: Address, name: &str, cod: u32, min_16_digit: bool) {}
    /// Remote device requests secure simple pairing.
    fn ssp_request(&self, address: Address, name: &str, cod: u32, variant: SspVariant, passkey: u32) {}
    /// Bonding state changed.
    fn bond_state_changed(&self, status: Status, address: Address, state: BondState) {}
    /// ACL link state changed.
    fn acl_state_changed(&self, status: Status, address: Address, state: AclState) {}
    /// LE test mode ended.
    fn le_test_mode(&self, status: Status, packets: u16) {}
}

/// Base Bluetooth interface.
pub trait BluetoothHal: Send + Sync {
    /// Registers the listener and initializes the stack.
    fn init(&self, listener: Arc<dyn HalListener>) -> Status;
    /// Switches the adapter on. Completion is reported to the listener.
    fn enable(&self) -> Status;
    /// Switches the adapter off. Completion is reported to the listener.
    fn disable(&self) -> Status;
    /// Shuts the stack down.
    fn cleanup(&self);
    /// Sets an adapter property.
    fn set_adapter_property(&self, property: &Property) -> Status;
    /// Starts bonding with a remote device.
    fn create_bond(&self, address: Address, transport: Transport) -> Status;
    /// Answers a legacy PIN request.
    fn pin_reply(&self, address: Address, accept: bool, pin: &[u8]) -> Status;
    /// Answers a secure simple pairing request.
    fn ssp_reply(&self, address: Address, variant: SspVariant, accept: bool, passkey: u32) -> Status;
    /// Installs the operating system callouts (wake alarm and wake locks).
    fn set_os_callouts(&self) -> Status;
    /// Vendor extension interface.
    fn vendor(&self) -> Interface<dyn VendorHal>;
    /// Releases the binding. No further requests are made afterwards.
    fn unload(&self);
}

/// Vendor extension interface, giving access to the test applications.
pub trait VendorHal: Send + Sync {
    /// MCAP test application.
    fn mcap(&self) -> Interface<dyn McapHal>;
    /// RFCOMM test application.
    fn rfcomm(&self) -> Interface<dyn RfcommHal>;
}
