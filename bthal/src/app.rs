//! Console tool lifecycle: startup, console loop and shutdown.

use std::{future::Future, io::ErrorKind as IoErrorKind, path::Path, sync::Arc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{
    args::Args,
    dispatch::{Dispatcher, Origin},
    hal::BluetoothHal,
    Adapter, Config, Console, Error, ErrorKind, Result,
};

/// Session context of a console tool.
pub trait Session: Send + Sync + 'static {
    /// The adapter session.
    fn adapter(&self) -> &Arc<Adapter>;
}

const BANNER: &str = ":::::::::::::::::::::::::::::::::::::::::::::::::::";

/// `help` command.
pub fn do_help<C: Session>(d: &Arc<Dispatcher<C>>, _args: &mut Args) -> Result<()> {
    d.print_help();
    Ok(())
}

/// `quit` command.
pub fn do_quit<C: Session>(d: &Arc<Dispatcher<C>>, _args: &mut Args) -> Result<()> {
    d.console().line("shutdown bdroid test app");
    d.quit();
    Ok(())
}

/// `enable` command.
pub fn do_enable<C: Session>(d: &Arc<Dispatcher<C>>, _args: &mut Args) -> Result<()> {
    d.context().adapter().enable();
    Ok(())
}

/// `disable` command.
pub fn do_disable<C: Session>(d: &Arc<Dispatcher<C>>, _args: &mut Args) -> Result<()> {
    d.context().adapter().disable();
    Ok(())
}

/// Runs a console tool.
///
/// `loaded` is the outcome of loading the vendor library. When loading failed,
/// the PID file is removed and the error is returned before any input is read.
/// Otherwise `start` builds the tool's dispatcher, which then serves `input`
/// until `quit`, end of input or Ctrl-C. Finally running jobs are awaited and
/// the HAL binding is unloaded, also when `start` fails.
pub async fn launch<C, F, Fut, R>(
    loaded: Result<Arc<dyn BluetoothHal>>, config: &Config, console: &Console, start: F, input: R,
) -> Result<()>
where
    C: Session,
    F: FnOnce(Arc<dyn BluetoothHal>) -> Fut,
    Fut: Future<Output = Result<Arc<Dispatcher<C>>>>,
    R: AsyncBufRead + Unpin,
{
    console.line(BANNER);
    console.line(":: Bluedroid test app starting");

    let hal = match loaded {
        Ok(hal) => hal,
        Err(err) => {
            console.line(format_args!("HAL failed to initialize, exit: {err}"));
            remove_pid_file(&config.pid_file);
            return Err(err);
        }
    };
    console.line("loaded HAL Success");

    let served = match start(hal.clone()).await {
        Ok(dispatcher) => {
            let served = serve(&dispatcher, input).await;
            dispatcher.jobs().wait_idle().await;
            served
        }
        Err(err) => Err(err),
    };

    console.line("Unloading HAL lib");
    hal.unload();
    console.line("HAL library unloaded");
    console.line(":: Bluedroid test app terminating");
    served
}

/// Reads and dispatches console lines until the dispatcher is done,
/// input ends or Ctrl-C is pressed.
pub async fn serve<C, R>(dispatcher: &Arc<Dispatcher<C>>, input: R) -> Result<()>
where
    C: Send + Sync + 'static,
    R: AsyncBufRead + Unpin,
{
    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Interrupted"),
            Err(err) => {
                log::warn!("Cannot listen for Ctrl-C: {err}");
                std::future::pending::<()>().await
            }
        }
    };
    serve_until(dispatcher, input, interrupted).await
}

/// Like [serve], but stops once `shutdown` completes instead of on Ctrl-C.
///
/// A read pending on `input` is abandoned on shutdown.
pub async fn serve_until<C, R, S>(dispatcher: &Arc<Dispatcher<C>>, input: R, shutdown: S) -> Result<()>
where
    C: Send + Sync + 'static,
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    while !dispatcher.is_done() {
        dispatcher.console().prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = &mut shutdown => break,
        };
        let Some(line) = line else {
            log::debug!("End of input");
            break;
        };
        let line = line.trim_end_matches('\r').to_string();
        if line.trim().is_empty() {
            continue;
        }

        let d = dispatcher.clone();
        tokio::task::spawn_blocking(move || {
            d.process(&line, Origin::Console);
        })
        .await
        .map_err(|err| Error::with_message(ErrorKind::Internal, err.to_string()))?;
    }
    Ok(())
}

fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(err) if err.kind() == IoErrorKind::NotFound => (),
        Err(err) => log::warn!("Cannot remove {}: {err}", path.display()),
    }
}

const AID_BLUETOOTH: libc::gid_t = 1002;
const SUPPLEMENTARY_GROUPS: [libc::gid_t; 8] = [
    3002, // net_bt
    3003, // inet
    3001, // net_bt_admin
    1000, // system
    9998, // misc
    1015, // sdcard_rw
    3005, // net_admin
    1016, // vpn
];

const LINUX_CAPABILITY_VERSION_3: u32 = 0x2008_0522;
const CAPABILITIES: [u32; 7] = [
    10, // net_bind_service
    12, // net_admin
    13, // net_raw
    17, // sys_rawio
    23, // sys_nice
    6,  // setgid
    35, // wake_alarm
];

#[repr(C)]
struct CapHeader {
    version: u32,
    pid: libc::c_int,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct CapData {
    effective: u32,
    permitted: u32,
    inheritable: u32,
}

fn check(what: &str, res: libc::c_long) {
    if res < 0 {
        log::warn!("{what} failed: {}", std::io::Error::last_os_error());
    }
}

/// Switches to the Bluetooth service user while keeping the capabilities
/// the stack needs.
///
/// Failures are logged and otherwise ignored.
pub fn drop_privileges() {
    log::info!(
        "set_aid_and_cap : pid {}, uid {} gid {}",
        std::process::id(),
        unsafe { libc::getuid() },
        unsafe { libc::getgid() }
    );

    unsafe {
        check("PR_SET_KEEPCAPS", libc::prctl(libc::PR_SET_KEEPCAPS, 1, 0, 0, 0).into());
        check(
            "setgroups",
            libc::setgroups(SUPPLEMENTARY_GROUPS.len(), SUPPLEMENTARY_GROUPS.as_ptr()).into(),
        );
        check("setgid", libc::setgid(AID_BLUETOOTH).into());
        check("setuid", libc::setuid(AID_BLUETOOTH).into());
    }

    let header = CapHeader { version: LINUX_CAPABILITY_VERSION_3, pid: 0 };
    let mut data = [CapData::default(); 2];
    for cap in CAPABILITIES {
        let slot = &mut data[(cap / 32) as usize];
        slot.permitted |= 1 << (cap % 32);
        slot.effective |= 1 << (cap % 32);
    }
    let res = unsafe { libc::syscall(libc::SYS_capset, &header as *const CapHeader, data.as_ptr()) };
    check("capset", res);
}
