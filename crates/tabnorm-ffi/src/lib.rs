//! C FFI bindings for tabnorm-core
//!
//! JSON in, JSON out: a rendering layer passes its source data and config as
//! JSON strings and receives the normalized table (rows plus column
//! definitions) back as a JSON string.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use tabnorm_core::{needs_merging, normalize, NormalizeConfig, SourceSet};

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(message: impl Into<String>) {
    let message = message.into();
    tracing::debug!(error = %message, "ffi call failed");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Read a C string as UTF-8. Null or invalid input sets the last error.
unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Option<&'a str> {
    if ptr.is_null() {
        set_last_error(format!("{what} is null"));
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s),
        Err(e) => {
            set_last_error(format!("{what} is not valid UTF-8: {e}"));
            None
        }
    }
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(e) => {
            set_last_error(format!("output contains a NUL byte: {e}"));
            ptr::null_mut()
        }
    }
}

/// Check whether a JSON document is a keyed source set
///
/// Returns 1 if it needs merging, 0 if not, -1 on invalid input.
///
/// # Safety
/// - `json` must be a valid C string or null
#[no_mangle]
pub unsafe extern "C" fn tn_needs_merging(json: *const c_char) -> c_int {
    clear_last_error();
    let Some(text) = read_str(json, "json") else {
        return -1;
    };

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => c_int::from(needs_merging(&value)),
        Err(e) => {
            set_last_error(format!("invalid JSON: {e}"));
            -1
        }
    }
}

/// Normalize source data into a table
///
/// `config_json` may be null to use the default configuration.
///
/// # Safety
/// - `data_json` must be a valid C string
/// - `config_json` must be a valid C string or null
/// - Returns null on error (see `tn_last_error`)
/// - Caller must free the returned string with `tn_free_string`
#[no_mangle]
pub unsafe extern "C" fn tn_normalize_json(
    data_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(data_text) = read_str(data_json, "data_json") else {
        return ptr::null_mut();
    };

    let config = if config_json.is_null() {
        NormalizeConfig::default()
    } else {
        let Some(config_text) = read_str(config_json, "config_json") else {
            return ptr::null_mut();
        };
        match serde_json::from_str::<NormalizeConfig>(config_text) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(format!("invalid config: {e}"));
                return ptr::null_mut();
            }
        }
    };
    if let Err(e) = config.validate() {
        set_last_error(e.to_string());
        return ptr::null_mut();
    }

    let data = match serde_json::from_str::<serde_json::Value>(data_text) {
        Ok(value) => SourceSet::from_json(&value),
        Err(e) => {
            set_last_error(format!("invalid data: {e}"));
            return ptr::null_mut();
        }
    };

    let table = normalize(&data, &config);
    match serde_json::to_string(&table) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            set_last_error(e.to_string());
            ptr::null_mut()
        }
    }
}

/// Get the message of the last failed call on this thread
///
/// # Safety
/// - Returns null if the last call succeeded
/// - Caller must free the returned string with `tn_free_string`
#[no_mangle]
pub unsafe extern "C" fn tn_last_error() -> *mut c_char {
    LAST_ERROR
        .with(|slot| slot.borrow().clone())
        .and_then(|msg| CString::new(msg).ok())
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a tn_* function or null
#[no_mangle]
pub unsafe extern "C" fn tn_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
