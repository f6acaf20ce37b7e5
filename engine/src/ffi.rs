//! FFI layer for mobile and desktop clients.
//!
//! This module provides C-compatible functions so an offline client can
//! validate and merge changes locally with the same rules the server uses.
//! All data crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `tally_*` functions are allocated by Rust
//! - Caller must free them with `tally_string_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{merge_records, Change, ChangeRequest, ItemState};
use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `tally_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') {
        r#"{"error":"string contained null bytes"}"#.to_string()
    } else {
        s
    };
    CString::new(s).map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn error_json(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `tally_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn tally_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Merge a JSON array of one list's changes into item state.
///
/// Elements that fail to parse or validate are skipped and counted, exactly
/// as the server treats malformed stored records. An array whose changes
/// span more than one list is an error.
///
/// # Returns
/// JSON string: `{"ok": Reconciled}` or `{"error": "message"}`
///
/// # Safety
/// - `changes_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_merge(changes_json: *const c_char) -> *mut c_char {
    let changes_str = match from_c_string(changes_json) {
        Some(s) => s,
        None => return error_json("invalid changes JSON"),
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&changes_str) {
        Ok(v) => v,
        Err(e) => return error_json(format!("parse error: {}", e)),
    };

    let records: Vec<_> = values
        .into_iter()
        .map(|value| serde_json::from_value::<Change>(value).map_err(|e| e.to_string()))
        .collect();

    let lists: BTreeSet<&str> = records
        .iter()
        .filter_map(|record| record.as_ref().ok())
        .filter(|change| change.validate().is_ok())
        .map(|change| change.list_id.as_str())
        .collect();
    if lists.len() > 1 {
        return error_json(format!(
            "changes span more than one list: {}",
            lists.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    let merged = merge_records(records);
    to_c_string(FfiResult::ok(merged).to_json())
}

/// Validate a change request and return the change it would store.
///
/// The request must carry its own timestamp; only a server assigns one.
///
/// # Returns
/// JSON string: `{"ok": Change}` or `{"error": "message"}`
///
/// # Safety
/// - `change_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_validate_change(change_json: *const c_char) -> *mut c_char {
    let change_str = match from_c_string(change_json) {
        Some(s) => s,
        None => return error_json("invalid change JSON"),
    };

    let request: ChangeRequest = match serde_json::from_str(&change_str) {
        Ok(r) => r,
        Err(e) => return error_json(format!("parse error: {}", e)),
    };

    if request.timestamp.is_none() {
        return error_json("timestamp is required");
    }

    match request.into_change(|_| 0) {
        Ok(change) => to_c_string(FfiResult::ok(change).to_json()),
        Err(e) => error_json(e.to_string()),
    }
}

/// Turn a signed amount into the absolute quantities for an update.
///
/// # Arguments
/// - `item_json`: JSON string of ItemState
/// - `delta`: positive raises target, negative marks units bought
///
/// # Returns
/// JSON string: `{"ok": {"target": n, "bought": n}}` or `{"error": "message"}`
///
/// # Safety
/// - `item_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_apply_delta(item_json: *const c_char, delta: i64) -> *mut c_char {
    let item_str = match from_c_string(item_json) {
        Some(s) => s,
        None => return error_json("invalid item JSON"),
    };

    let item: ItemState = match serde_json::from_str(&item_str) {
        Ok(i) => i,
        Err(e) => return error_json(format!("parse error: {}", e)),
    };

    let (target, bought) = item.apply_delta(delta);
    to_c_string(FfiResult::ok(serde_json::json!({ "target": target, "bought": bought })).to_json())
}

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn tally_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
