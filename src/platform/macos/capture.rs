//! Window thumbnails through ScreenCaptureKit.

use crate::error::{Error, Result};
use crate::platform::preview::{fit_thumbnail, pixels_to_rgba, ChannelOrder};
use crate::platform::{RgbaImage, WindowId};
use objc2::rc::Retained;
use objc2::{AnyThread, Message};
use objc2_core_graphics::CGImage;
use objc2_foundation::NSError;
use objc2_screen_capture_kit::{
    SCContentFilter, SCScreenshotManager, SCShareableContent, SCStreamConfiguration, SCWindow,
};
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

type CGImageRef = *const c_void;
type CFDataRef = *const c_void;
type CGDataProviderRef = *const c_void;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGImageGetWidth(image: CGImageRef) -> usize;
    fn CGImageGetHeight(image: CGImageRef) -> usize;
    fn CGImageGetBytesPerRow(image: CGImageRef) -> usize;
    fn CGImageGetBitsPerPixel(image: CGImageRef) -> usize;
    fn CGImageGetDataProvider(image: CGImageRef) -> CGDataProviderRef;
    fn CGDataProviderCopyData(provider: CGDataProviderRef) -> CFDataRef;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: *const c_void);
    fn CFDataGetBytePtr(data: CFDataRef) -> *const u8;
    fn CFDataGetLength(data: CFDataRef) -> isize;
}

const STEP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Cleared after the first timeout; a hung ScreenCaptureKit stays hung.
static SCK_AVAILABLE: AtomicBool = AtomicBool::new(true);

pub(super) fn capture(window: WindowId, max_w: u32, max_h: u32) -> Result<RgbaImage> {
    let failure = |reason: &str| Error::CaptureFailure {
        window,
        reason: reason.into(),
    };
    if !SCK_AVAILABLE.load(Ordering::Relaxed) {
        return Err(failure("screen capture disabled after a timeout"));
    }
    let sc_window = match shareable_window(window) {
        Ok(w) => w.ok_or_else(|| failure("window not shareable"))?,
        Err(e) => return Err(timed_out(e, failure)),
    };
    let image = match screenshot(&sc_window, max_w, max_h) {
        Ok(image) => image.ok_or_else(|| failure("no image"))?,
        Err(e) => return Err(timed_out(e, failure)),
    };
    let full = extract_rgba(&image).ok_or_else(|| failure("unreadable image data"))?;
    fit_thumbnail(&full, max_w, max_h).ok_or_else(|| failure("empty thumbnail"))
}

fn timed_out(
    _: crossbeam_channel::RecvTimeoutError,
    failure: impl Fn(&str) -> Error,
) -> Error {
    warn!("screen capture timed out, disabling for this session");
    SCK_AVAILABLE.store(false, Ordering::Relaxed);
    failure("timed out")
}

fn shareable_window(
    window: WindowId,
) -> std::result::Result<Option<Retained<SCWindow>>, crossbeam_channel::RecvTimeoutError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let completion = block2::RcBlock::new(move |content: *mut SCShareableContent, err: *mut NSError| {
        if !err.is_null() {
            let desc = unsafe { (*err).localizedDescription() };
            warn!(error = %desc, "shareable content unavailable");
            let _ = tx.send(None);
            return;
        }
        if content.is_null() {
            let _ = tx.send(None);
            return;
        }
        let content = unsafe { &*content };
        let windows = unsafe { content.windows() };
        let found = (0..windows.count())
            .map(|i| unsafe { windows.objectAtIndex(i) })
            .find(|w| unsafe { w.windowID() } == window)
            .map(|w| w.retain());
        let _ = tx.send(found);
    });
    unsafe {
        SCShareableContent::getShareableContentWithCompletionHandler(&completion);
    }
    rx.recv_timeout(STEP_TIMEOUT)
}

fn screenshot(
    window: &SCWindow,
    max_w: u32,
    max_h: u32,
) -> std::result::Result<Option<Retained<CGImage>>, crossbeam_channel::RecvTimeoutError> {
    let filter = unsafe { SCContentFilter::initWithDesktopIndependentWindow(SCContentFilter::alloc(), window) };
    let config = unsafe { SCStreamConfiguration::new() };
    unsafe {
        config.setWidth(max_w as usize);
        config.setHeight(max_h as usize);
        config.setScalesToFit(true);
    }

    let (tx, rx) = crossbeam_channel::bounded(1);
    let completion = block2::RcBlock::new(move |image: *mut CGImage, err: *mut NSError| {
        if !err.is_null() {
            let desc = unsafe { (*err).localizedDescription() };
            warn!(error = %desc, "screenshot failed");
            let _ = tx.send(None);
            return;
        }
        let _ = tx.send(unsafe { Retained::retain(image) });
    });
    unsafe {
        SCScreenshotManager::captureImageWithFilter_configuration_completionHandler(
            &filter,
            &config,
            Some(&completion),
        );
    }
    rx.recv_timeout(STEP_TIMEOUT)
}

fn extract_rgba(image: &CGImage) -> Option<RgbaImage> {
    let img = image as *const CGImage as CGImageRef;
    let (width, height, stride, bits) = unsafe {
        (
            CGImageGetWidth(img),
            CGImageGetHeight(img),
            CGImageGetBytesPerRow(img),
            CGImageGetBitsPerPixel(img),
        )
    };
    let provider = unsafe { CGImageGetDataProvider(img) };
    if provider.is_null() {
        return None;
    }
    let data = unsafe { CGDataProviderCopyData(provider) };
    if data.is_null() {
        return None;
    }
    let raw = unsafe {
        let len = CFDataGetLength(data).max(0) as usize;
        std::slice::from_raw_parts(CFDataGetBytePtr(data), len)
    };
    let rgba = pixels_to_rgba(raw, width, height, stride, bits / 8, ChannelOrder::BGRA);
    unsafe { CFRelease(data) };
    rgba
}
