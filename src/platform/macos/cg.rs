//! CoreGraphics window list, display and event-state queries.

use crate::input::keys::Modifiers;
use crate::platform::{ProcessId, Rect, WindowId};
use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};
use std::ffi::c_void;

type CFArrayRef = *const c_void;
type CFDictionaryRef = *const c_void;
type CFNumberRef = *const c_void;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct CGPoint {
    pub x: f64,
    pub y: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct CGSize {
    pub width: f64,
    pub height: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct CGRect {
    origin: CGPoint,
    size: CGSize,
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGWindowListCopyWindowInfo(option: u32, relative_to: u32) -> CFArrayRef;
    fn CGRectMakeWithDictionaryRepresentation(dict: CFDictionaryRef, rect: *mut CGRect) -> bool;
    fn CGGetActiveDisplayList(max: u32, displays: *mut u32, count: *mut u32) -> i32;
    fn CGDisplayBounds(display: u32) -> CGRect;
    fn CGEventCreate(source: *const c_void) -> *const c_void;
    fn CGEventGetLocation(event: *const c_void) -> CGPoint;
    fn CGEventSourceFlagsState(state_id: i32) -> u64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFArrayGetCount(arr: CFArrayRef) -> isize;
    fn CFArrayGetValueAtIndex(arr: CFArrayRef, idx: isize) -> *const c_void;
    fn CFDictionaryGetValue(dict: CFDictionaryRef, key: *const c_void) -> *const c_void;
    fn CFNumberGetValue(num: CFNumberRef, the_type: isize, value_ptr: *mut c_void) -> bool;
    fn CFRelease(cf: *const c_void);
}

const K_CG_WINDOW_LIST_OPTION_ALL: u32 = 0;
const K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY: u32 = 1;
const K_CG_WINDOW_LIST_EXCLUDE_DESKTOP_ELEMENTS: u32 = 1 << 4;
const K_CG_NULL_WINDOW_ID: u32 = 0;
const K_CF_NUMBER_INT32_TYPE: isize = 3;
const K_CG_EVENT_SOURCE_STATE_COMBINED: i32 = 0;
const MAX_DISPLAYS: u32 = 16;

/// `kCGDockWindowLevel`; the Dock bar itself sits here.
const DOCK_LAYER: i32 = 20;
const DOCK_OWNER: &str = "Dock";

pub(super) const FLAG_SHIFT: u64 = 0x0002_0000;
pub(super) const FLAG_CONTROL: u64 = 0x0004_0000;
pub(super) const FLAG_ALTERNATE: u64 = 0x0008_0000;
pub(super) const FLAG_COMMAND: u64 = 0x0010_0000;

/// One entry of `CGWindowListCopyWindowInfo`, front to back.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct CgWindow {
    pub pid: ProcessId,
    pub id: WindowId,
    pub owner: String,
    pub title: String,
    pub layer: i32,
    pub bounds: Rect,
}

struct Keys {
    layer: CFString,
    pid: CFString,
    owner: CFString,
    name: CFString,
    number: CFString,
    bounds: CFString,
}

impl Keys {
    fn new() -> Self {
        Self {
            layer: CFString::from_static_string("kCGWindowLayer"),
            pid: CFString::from_static_string("kCGWindowOwnerPID"),
            owner: CFString::from_static_string("kCGWindowOwnerName"),
            name: CFString::from_static_string("kCGWindowName"),
            number: CFString::from_static_string("kCGWindowNumber"),
            bounds: CFString::from_static_string("kCGWindowBounds"),
        }
    }
}

fn dict_value(dict: CFDictionaryRef, key: &CFString) -> *const c_void {
    unsafe { CFDictionaryGetValue(dict, key.as_concrete_TypeRef() as *const c_void) }
}

fn dict_i32(dict: CFDictionaryRef, key: &CFString) -> Option<i32> {
    let val = dict_value(dict, key);
    if val.is_null() {
        return None;
    }
    let mut result: i32 = 0;
    let ok = unsafe {
        CFNumberGetValue(
            val as CFNumberRef,
            K_CF_NUMBER_INT32_TYPE,
            &mut result as *mut i32 as *mut c_void,
        )
    };
    ok.then_some(result)
}

fn dict_string(dict: CFDictionaryRef, key: &CFString) -> Option<String> {
    let val = dict_value(dict, key);
    if val.is_null() {
        return None;
    }
    let s = unsafe { CFString::wrap_under_get_rule(val as CFStringRef) };
    Some(s.to_string())
}

fn dict_rect(dict: CFDictionaryRef, key: &CFString) -> Option<Rect> {
    let val = dict_value(dict, key);
    if val.is_null() {
        return None;
    }
    let mut rect = CGRect::default();
    let ok = unsafe { CGRectMakeWithDictionaryRepresentation(val as CFDictionaryRef, &mut rect) };
    ok.then(|| Rect::new(rect.origin.x, rect.origin.y, rect.size.width, rect.size.height))
}

/// The system window list. `on_screen` limits it to the current space.
pub(super) fn window_list(on_screen: bool) -> Vec<CgWindow> {
    let opts = if on_screen {
        K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY
    } else {
        K_CG_WINDOW_LIST_OPTION_ALL
    } | K_CG_WINDOW_LIST_EXCLUDE_DESKTOP_ELEMENTS;
    let list = unsafe { CGWindowListCopyWindowInfo(opts, K_CG_NULL_WINDOW_ID) };
    if list.is_null() {
        return Vec::new();
    }

    let keys = Keys::new();
    let count = unsafe { CFArrayGetCount(list) };
    let mut windows = Vec::with_capacity(count.max(0) as usize);
    for i in 0..count {
        let dict = unsafe { CFArrayGetValueAtIndex(list, i) } as CFDictionaryRef;
        if dict.is_null() {
            continue;
        }
        let (Some(pid), Some(id), Some(layer)) = (
            dict_i32(dict, &keys.pid),
            dict_i32(dict, &keys.number),
            dict_i32(dict, &keys.layer),
        ) else {
            continue;
        };
        windows.push(CgWindow {
            pid,
            id: id as WindowId,
            owner: dict_string(dict, &keys.owner).unwrap_or_default(),
            title: dict_string(dict, &keys.name).unwrap_or_default().trim().to_string(),
            layer,
            bounds: dict_rect(dict, &keys.bounds).unwrap_or_default(),
        });
    }
    unsafe { CFRelease(list) };
    windows
}

/// The Dock owns the native Cmd+Tab panel; it shows up as a Dock window
/// above the Dock's own level.
pub(super) fn native_switcher_visible(windows: &[CgWindow]) -> bool {
    windows.iter().any(|w| {
        w.owner == DOCK_OWNER && w.layer > DOCK_LAYER && w.bounds.width > 0.0 && w.bounds.height > 0.0
    })
}

pub(super) fn displays() -> Vec<Rect> {
    let mut ids = [0u32; MAX_DISPLAYS as usize];
    let mut count = 0u32;
    let ret = unsafe { CGGetActiveDisplayList(MAX_DISPLAYS, ids.as_mut_ptr(), &mut count) };
    if ret != 0 {
        return Vec::new();
    }
    ids.iter()
        .take(count as usize)
        .map(|&id| {
            let r = unsafe { CGDisplayBounds(id) };
            Rect::new(r.origin.x, r.origin.y, r.size.width, r.size.height)
        })
        .collect()
}

pub(super) fn cursor() -> Option<(f64, f64)> {
    unsafe {
        let event = CGEventCreate(std::ptr::null());
        if event.is_null() {
            return None;
        }
        let loc = CGEventGetLocation(event);
        CFRelease(event);
        Some((loc.x, loc.y))
    }
}

pub(super) fn event_flags() -> u64 {
    unsafe { CGEventSourceFlagsState(K_CG_EVENT_SOURCE_STATE_COMBINED) }
}

pub(super) fn modifiers_from_flags(flags: u64) -> Modifiers {
    let pairs = [
        (FLAG_SHIFT, Modifiers::SHIFT),
        (FLAG_CONTROL, Modifiers::CONTROL),
        (FLAG_ALTERNATE, Modifiers::ALT),
        (FLAG_COMMAND, Modifiers::SUPER),
    ];
    pairs
        .into_iter()
        .filter(|(bit, _)| flags & bit != 0)
        .fold(Modifiers::empty(), |acc, (_, m)| acc | m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(owner: &str, layer: i32, bounds: Rect) -> CgWindow {
        CgWindow {
            pid: 1,
            id: 1,
            owner: owner.into(),
            title: String::new(),
            layer,
            bounds,
        }
    }

    #[test]
    fn flags_map_to_modifiers() {
        const CAPS_LOCK: u64 = 0x0001_0000;
        let cases = [
            (FLAG_ALTERNATE, Modifiers::ALT),
            (FLAG_ALTERNATE | FLAG_SHIFT, Modifiers::ALT | Modifiers::SHIFT),
            (FLAG_COMMAND | CAPS_LOCK, Modifiers::SUPER),
            (FLAG_CONTROL, Modifiers::CONTROL),
            (CAPS_LOCK, Modifiers::empty()),
        ];
        for (flags, expected) in cases {
            assert_eq!(modifiers_from_flags(flags), expected, "flags: {flags:#x}");
        }
    }

    #[test]
    fn dock_panel_above_dock_level_is_native_switcher() {
        let panel = Rect::new(500.0, 400.0, 900.0, 160.0);
        let cases = [
            (vec![window("Dock", 24, panel)], true),
            (vec![window("Dock", DOCK_LAYER, panel)], false),
            (vec![window("Dock", 24, Rect::default())], false),
            (vec![window("Finder", 24, panel)], false),
            (vec![window("Finder", 0, panel), window("Dock", 1000, panel)], true),
            (Vec::new(), false),
        ];
        for (windows, expected) in cases {
            assert_eq!(native_switcher_visible(&windows), expected, "windows: {windows:?}");
        }
    }
}
