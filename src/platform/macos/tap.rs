//! CGEventTap feeding key-downs and modifier changes to the listener.
//!
//! CoreGraphics only suppresses delivery when the callback returns NULL,
//! which `CallbackResult::Drop` maps to.

use super::cg::modifiers_from_flags;
use crate::error::{Error, Result};
use crate::input::keys::{KeyEvent, TapVerdict};
use crate::input::tap::TapHandler;
use core_foundation::base::TCFType;
use core_foundation::mach_port::CFMachPortRef;
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult,
};
use parking_lot::Mutex;
use std::ffi::c_void;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, trace, warn};

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

const FIELD_KEYBOARD_EVENT_AUTOREPEAT: u32 = 8;
const FIELD_KEYBOARD_EVENT_KEYCODE: u32 = 9;
const FIELD_EVENT_SOURCE_UNIX_PROCESS_ID: u32 = 41;

pub struct InputGuard {
    run_loop: Arc<Mutex<Option<CFRunLoop>>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for InputGuard {
    fn drop(&mut self) {
        if let Some(rl) = self.run_loop.lock().take() {
            rl.stop();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub(super) fn install(handler: TapHandler) -> Result<InputGuard> {
    let run_loop = Arc::new(Mutex::new(None));
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
    let thread_rl = run_loop.clone();
    let thread = std::thread::Builder::new()
        .name("event-tap".into())
        .spawn(move || run(handler, thread_rl, ready_tx))?;
    match ready_rx.recv() {
        Ok(Ok(())) => Ok(InputGuard {
            run_loop,
            thread: Some(thread),
        }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => Err(Error::TapDisabled("event tap thread exited")),
    }
}

fn run(handler: TapHandler, run_loop: Arc<Mutex<Option<CFRunLoop>>>, ready: crossbeam_channel::Sender<Result<()>>) {
    let own_pid = i64::from(std::process::id());
    let port: Arc<AtomicPtr<c_void>> = Arc::new(AtomicPtr::new(std::ptr::null_mut()));
    let port_cb = port.clone();

    let tap = CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![CGEventType::KeyDown, CGEventType::FlagsChanged],
        move |_proxy, etype, event| match etype {
            CGEventType::KeyDown => {
                if event.get_integer_value_field(FIELD_EVENT_SOURCE_UNIX_PROCESS_ID) == own_pid {
                    return CallbackResult::Keep;
                }
                let key = KeyEvent {
                    code: event.get_integer_value_field(FIELD_KEYBOARD_EVENT_KEYCODE) as u32,
                    modifiers: modifiers_from_flags(event.get_flags().bits()),
                    repeat: event.get_integer_value_field(FIELD_KEYBOARD_EVENT_AUTOREPEAT) != 0,
                };
                let verdict = handler.key_down(key);
                trace!(code = key.code, ?verdict, "key down");
                match verdict {
                    TapVerdict::Swallow => CallbackResult::Drop,
                    TapVerdict::PassThrough => CallbackResult::Keep,
                }
            }
            CGEventType::FlagsChanged => {
                handler.flags_changed(modifiers_from_flags(event.get_flags().bits()));
                CallbackResult::Keep
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                handler.tap_disabled("disabled by the OS");
                let p = port_cb.load(Ordering::SeqCst) as CFMachPortRef;
                if !p.is_null() {
                    unsafe { CGEventTapEnable(p, true) };
                }
                CallbackResult::Keep
            }
            _ => CallbackResult::Keep,
        },
    );
    let tap = match tap {
        Ok(tap) => tap,
        Err(()) => {
            let _ = ready.send(Err(Error::TapDisabled("event tap could not be created")));
            return;
        }
    };
    port.store(tap.mach_port().as_concrete_TypeRef() as *mut c_void, Ordering::SeqCst);

    let Ok(source) = tap.mach_port().create_runloop_source(0) else {
        let _ = ready.send(Err(Error::TapDisabled("run loop source could not be created")));
        return;
    };
    let rl = CFRunLoop::get_current();
    rl.add_source(&source, unsafe { kCFRunLoopCommonModes });
    *run_loop.lock() = Some(rl);
    tap.enable();

    let _ = ready.send(Ok(()));
    debug!("event tap running");
    CFRunLoop::run_current();
    debug!("event tap stopped");
}
