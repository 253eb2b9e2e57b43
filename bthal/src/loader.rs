//! Dynamic loading of the vendor library.

use libc::{c_void, RTLD_NOW};
use std::{
    ffi::{CStr, CString},
    ptr::NonNull,
};

use crate::{Error, ErrorKind, Result};

/// Shared library opened with `dlopen`.
///
/// The library stays mapped for the lifetime of the process, since the stack
/// keeps running threads and callback pointers into it.
#[derive(Debug)]
pub struct Library {
    handle: NonNull<c_void>,
    name: String,
}

// The handle is only passed to dlsym, which is thread safe.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

fn last_dl_error() -> String {
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

impl Library {
    /// Opens the library at `name`, resolving all symbols immediately.
    pub fn open(name: &str) -> Result<Self> {
        let c_name = CString::new(name).map_err(|_| Error::new(ErrorKind::LibraryNotFound(name.to_string())))?;
        let handle = unsafe { libc::dlopen(c_name.as_ptr(), RTLD_NOW) };
        match NonNull::new(handle) {
            Some(handle) => {
                log::debug!("Opened {name}");
                Ok(Self { handle, name: name.to_string() })
            }
            None => Err(Error::with_message(ErrorKind::LibraryNotFound(name.to_string()), last_dl_error())),
        }
    }

    /// Library name as opened.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the data symbol `symbol`.
    pub fn symbol<T>(&self, symbol: &str) -> Result<NonNull<T>> {
        let c_symbol =
            CString::new(symbol).map_err(|_| Error::new(ErrorKind::SymbolNotFound(symbol.to_string())))?;
        let _ = last_dl_error();
        let addr = unsafe { libc::dlsym(self.handle.as_ptr(), c_symbol.as_ptr()) };
        NonNull::new(addr as *mut T).ok_or_else(|| {
            Error::with_message(ErrorKind::SymbolNotFound(symbol.to_string()), last_dl_error())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library() {
        let err = Library::open("libbthal-does-not-exist.so").unwrap_err();
        assert_eq!(err.kind, ErrorKind::LibraryNotFound("libbthal-does-not-exist.so".into()));
    }

    #[test]
    fn missing_symbol() {
        let libc = Library::open("libc.so.6").unwrap();
        assert!(libc.symbol::<c_void>("malloc").is_ok());
        let err = libc.symbol::<c_void>("bthalNoSuchInterface").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SymbolNotFound("bthalNoSuchInterface".into()));
    }
}
