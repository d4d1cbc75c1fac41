//! Accessibility (AX) element access.

use super::cg::{CGPoint, CGSize};
use crate::error::{Error, Result};
use crate::platform::{AxWindow, ProcessId, Rect, WindowId, WindowRole};
use core_foundation::base::{CFRelease, CFRetain, CFTypeRef, TCFType};
use core_foundation::boolean::kCFBooleanTrue;
use core_foundation::string::{CFString, CFStringRef};
use std::ffi::c_void;
use std::ptr;
use std::sync::OnceLock;
use tracing::trace;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXUIElementCreateApplication(pid: i32) -> *mut c_void;
    fn AXUIElementCopyAttributeValue(element: *mut c_void, attr: CFStringRef, value: *mut CFTypeRef) -> i32;
    fn AXUIElementSetAttributeValue(element: *mut c_void, attr: CFStringRef, value: CFTypeRef) -> i32;
    fn AXUIElementPerformAction(element: *mut c_void, action: CFStringRef) -> i32;
    fn AXValueGetValue(value: CFTypeRef, the_type: i32, value_ptr: *mut c_void) -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFArrayGetCount(arr: CFTypeRef) -> isize;
    fn CFArrayGetValueAtIndex(arr: CFTypeRef, idx: isize) -> CFTypeRef;
    fn CFBooleanGetValue(b: CFTypeRef) -> bool;
}

const K_AX_VALUE_CGPOINT_TYPE: i32 = 1;
const K_AX_VALUE_CGSIZE_TYPE: i32 = 2;

const K_AX_ERROR_SUCCESS: i32 = 0;
const K_AX_ERROR_INVALID_UI_ELEMENT: i32 = -25202;
const K_AX_ERROR_CANNOT_COMPLETE: i32 = -25204;
const K_AX_ERROR_NOT_IMPLEMENTED: i32 = -25208;
const K_AX_ERROR_API_DISABLED: i32 = -25211;
const K_AX_ERROR_NO_VALUE: i32 = -25212;

pub(super) fn trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

type AxGetWindowFn = unsafe extern "C" fn(*mut c_void, *mut u32) -> i32;

/// Private `_AXUIElementGetWindow`, resolved once.
fn get_window_fn() -> Option<AxGetWindowFn> {
    static SYM: OnceLock<Option<AxGetWindowFn>> = OnceLock::new();
    *SYM.get_or_init(|| unsafe {
        let ptr = libc::dlsym(libc::RTLD_DEFAULT, c"_AXUIElementGetWindow".as_ptr());
        if ptr.is_null() {
            None
        } else {
            Some(std::mem::transmute::<*mut c_void, AxGetWindowFn>(ptr))
        }
    })
}

/// Owned AX element reference.
pub(super) struct AxElement(*mut c_void);

impl Drop for AxElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) };
    }
}

enum Copied {
    Value(CFTypeRef),
    Missing,
    Gone,
    Unavailable(i32),
}

impl AxElement {
    pub(super) fn application(pid: ProcessId) -> Option<Self> {
        let ptr = unsafe { AXUIElementCreateApplication(pid) };
        (!ptr.is_null()).then_some(Self(ptr))
    }

    fn copy(&self, attr: &str) -> Copied {
        let name = CFString::new(attr);
        let mut value: CFTypeRef = ptr::null();
        let err = unsafe { AXUIElementCopyAttributeValue(self.0, name.as_concrete_TypeRef(), &mut value) };
        match err {
            K_AX_ERROR_SUCCESS if !value.is_null() => Copied::Value(value),
            K_AX_ERROR_SUCCESS | K_AX_ERROR_NO_VALUE => Copied::Missing,
            K_AX_ERROR_INVALID_UI_ELEMENT => Copied::Gone,
            code => Copied::Unavailable(code),
        }
    }

    /// `Ok(None)` when the app does not answer accessibility queries.
    pub(super) fn windows(&self) -> Result<Option<Vec<AxElement>>> {
        let array = match self.copy("AXWindows") {
            Copied::Value(v) => v,
            Copied::Missing | Copied::Gone => return Ok(Some(Vec::new())),
            Copied::Unavailable(
                K_AX_ERROR_API_DISABLED | K_AX_ERROR_CANNOT_COMPLETE | K_AX_ERROR_NOT_IMPLEMENTED,
            ) => return Ok(None),
            Copied::Unavailable(code) => return Err(Error::Os(format!("AXWindows failed: {code}"))),
        };
        let count = unsafe { CFArrayGetCount(array) };
        let elements = (0..count)
            .filter_map(|i| {
                let item = unsafe { CFArrayGetValueAtIndex(array, i) };
                if item.is_null() {
                    return None;
                }
                unsafe { CFRetain(item) };
                Some(AxElement(item as *mut c_void))
            })
            .collect();
        unsafe { CFRelease(array) };
        Ok(Some(elements))
    }

    fn string(&self, attr: &str) -> Option<String> {
        match self.copy(attr) {
            Copied::Value(v) => {
                let s = unsafe { CFString::wrap_under_create_rule(v as CFStringRef) };
                Some(s.to_string())
            }
            _ => None,
        }
    }

    fn boolean(&self, attr: &str) -> Option<bool> {
        match self.copy(attr) {
            Copied::Value(v) => {
                let b = unsafe { CFBooleanGetValue(v) };
                unsafe { CFRelease(v) };
                Some(b)
            }
            _ => None,
        }
    }

    fn value<T: Default>(&self, attr: &str, ty: i32) -> Option<T> {
        let Copied::Value(v) = self.copy(attr) else {
            return None;
        };
        let mut out = T::default();
        let ok = unsafe { AXValueGetValue(v, ty, &mut out as *mut T as *mut c_void) };
        unsafe { CFRelease(v) };
        ok.then_some(out)
    }

    fn element(&self, attr: &str) -> Option<AxElement> {
        match self.copy(attr) {
            Copied::Value(v) => Some(AxElement(v as *mut c_void)),
            _ => None,
        }
    }

    pub(super) fn window_id(&self) -> Option<WindowId> {
        let f = get_window_fn()?;
        let mut id: u32 = 0;
        let rc = unsafe { f(self.0, &mut id) };
        (rc == K_AX_ERROR_SUCCESS && id != 0).then_some(id)
    }

    fn bounds(&self) -> Option<Rect> {
        let origin: CGPoint = self.value("AXPosition", K_AX_VALUE_CGPOINT_TYPE)?;
        let size: CGSize = self.value("AXSize", K_AX_VALUE_CGSIZE_TYPE)?;
        Some(Rect::new(origin.x, origin.y, size.width, size.height))
    }

    pub(super) fn describe(&self) -> AxWindow {
        let role = self.string("AXRole");
        let subrole = self.string("AXSubrole");
        AxWindow {
            id: self.window_id(),
            title: self.string("AXTitle"),
            bounds: self.bounds(),
            minimized: self.boolean("AXMinimized").unwrap_or(false),
            role: role_for(role.as_deref(), subrole.as_deref()),
        }
    }

    fn perform(&self, action: &str) -> Result<()> {
        let name = CFString::new(action);
        match unsafe { AXUIElementPerformAction(self.0, name.as_concrete_TypeRef()) } {
            K_AX_ERROR_SUCCESS => Ok(()),
            code => Err(Error::Os(format!("{action} failed: {code}"))),
        }
    }

    pub(super) fn raise(&self) -> Result<()> {
        self.perform("AXRaise")?;
        let name = CFString::new("AXMain");
        let err = unsafe {
            AXUIElementSetAttributeValue(self.0, name.as_concrete_TypeRef(), kCFBooleanTrue as CFTypeRef)
        };
        if err != K_AX_ERROR_SUCCESS {
            trace!(err, "AXMain not settable");
        }
        Ok(())
    }

    pub(super) fn close(&self) -> Result<()> {
        let button = self
            .element("AXCloseButton")
            .ok_or_else(|| Error::Os("window has no close button".into()))?;
        button.perform("AXPress")
    }
}

/// Finds the AX element for a CoreGraphics window id.
pub(super) fn window_element(pid: ProcessId, id: WindowId) -> Result<AxElement> {
    let app = AxElement::application(pid).ok_or_else(|| Error::stale(pid, id))?;
    let windows = app
        .windows()?
        .ok_or(Error::PermissionDenied("Accessibility"))?;
    if windows.is_empty() {
        return Err(Error::stale(pid, id));
    }
    windows
        .into_iter()
        .find(|w| w.window_id() == Some(id))
        .ok_or(Error::AmbiguousWindowMatch(id))
}

pub(super) fn role_for(role: Option<&str>, subrole: Option<&str>) -> WindowRole {
    if role == Some("AXSheet") {
        return WindowRole::Sheet;
    }
    match subrole {
        Some("AXStandardWindow") => WindowRole::Standard,
        Some("AXDialog") => WindowRole::Dialog,
        Some("AXSystemDialog") => WindowRole::SystemDialog,
        Some("AXFloatingWindow" | "AXSystemFloatingWindow") => WindowRole::FloatingPanel,
        _ => WindowRole::Other,
    }
}
