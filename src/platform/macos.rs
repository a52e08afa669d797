//! macOS platform implementation for the overlay window
//!
//! A borderless, non-opaque `NSWindow` at status-window level, owned by an
//! accessory-policy application so it never takes focus or shows in the Dock.
//! A custom `NSView` draws the last committed frame from its own BGRA copy.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;

use objc2::rc::Retained;
use objc2::{DefinedClass, MainThreadMarker, MainThreadOnly, define_class, msg_send};
use objc2_app_kit::{
    NSApplication, NSApplicationActivationPolicy, NSBackingStoreType, NSColor, NSEventMask,
    NSGraphicsContext, NSScreen, NSView, NSWindow, NSWindowCollectionBehavior, NSWindowStyleMask,
};
use objc2_foundation::{NSDate, NSDefaultRunLoopMode, NSPoint, NSRect, NSSize};

use core_graphics::base::{kCGBitmapByteOrder32Little, kCGImageAlphaPremultipliedFirst};
use core_graphics::color_space::CGColorSpace;
use core_graphics::context::CGContext;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use tracing::{debug, info};

use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError};

/// `NSStatusWindowLevel`: above normal and floating windows
const OVERLAY_WINDOW_LEVEL: isize = 25;

pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let Some(mtm) = MainThreadMarker::new() else {
        return Vec::new();
    };
    let screens = NSScreen::screens(mtm);

    // The first screen holds the menu bar and defines the global origin
    let Some(primary_height) = screens.iter().next().map(|s| s.frame().size.height) else {
        return Vec::new();
    };

    screens
        .iter()
        .enumerate()
        .map(|(i, screen)| {
            let frame = screen.frame();
            // Bottom-left origin -> top-left origin
            let y = primary_height - frame.origin.y - frame.size.height;

            MonitorInfo {
                id: format!("screen-{}", i),
                x: frame.origin.x as i32,
                y: y as i32,
                width: frame.size.width as u32,
                height: frame.size.height as u32,
                is_primary: i == 0,
            }
        })
        .collect()
}

#[derive(Default)]
struct OverlayViewIvars {
    /// Premultiplied BGRA, row-major, top-down
    frame: RefCell<Vec<u8>>,
    frame_width: Cell<u32>,
    frame_height: Cell<u32>,
}

define_class!(
    // SAFETY: NSView permits subclassing; drawRect: and isOpaque are meant
    // to be overridden. No Drop impl.
    #[unsafe(super(NSView))]
    #[thread_kind = MainThreadOnly]
    #[name = "NetSpeedOverlayView"]
    #[ivars = OverlayViewIvars]
    struct OverlayView;

    impl OverlayView {
        #[unsafe(method(drawRect:))]
        fn draw_rect(&self, _dirty_rect: NSRect) {
            let ivars = self.ivars();
            let width = ivars.frame_width.get();
            let height = ivars.frame_height.get();
            let mut frame = ivars.frame.borrow_mut();

            if width == 0 || height == 0 || frame.len() != (width * height * 4) as usize {
                return;
            }

            let color_space = CGColorSpace::create_device_rgb();
            let bitmap = CGContext::create_bitmap_context(
                Some(frame.as_mut_ptr() as *mut c_void),
                width as usize,
                height as usize,
                8,
                (width * 4) as usize,
                &color_space,
                kCGImageAlphaPremultipliedFirst | kCGBitmapByteOrder32Little,
            );
            let Some(image) = bitmap.create_image() else {
                return;
            };
            let Some(ns_ctx) = NSGraphicsContext::currentContext() else {
                return;
            };

            // SAFETY: CGContext is a plain property getter on the current context
            let cg_ctx_ptr: *mut c_void = unsafe { msg_send![&*ns_ctx, CGContext] };
            if cg_ctx_ptr.is_null() {
                return;
            }

            // SAFETY: pointer comes from the live NSGraphicsContext above
            let cg_ctx = unsafe {
                CGContext::from_existing_context_ptr(cg_ctx_ptr as *mut core_graphics::sys::CGContext)
            };
            let bounds = self.bounds();
            cg_ctx.draw_image(
                CGRect::new(
                    &CGPoint::new(0.0, 0.0),
                    &CGSize::new(bounds.size.width, bounds.size.height),
                ),
                &image,
            );
        }

        #[unsafe(method(isOpaque))]
        fn is_opaque(&self) -> bool {
            false
        }
    }
);

impl OverlayView {
    fn new(mtm: MainThreadMarker, frame: NSRect) -> Retained<Self> {
        let this = Self::alloc(mtm).set_ivars(OverlayViewIvars::default());
        // SAFETY: initWithFrame: is NSView's designated initializer
        unsafe { msg_send![super(this), initWithFrame: frame] }
    }

    /// Replace the displayed frame with a premultiplied RGBA buffer
    fn store_frame(&self, rgba: &[u8], width: u32, height: u32) {
        let ivars = self.ivars();
        let mut frame = ivars.frame.borrow_mut();
        frame.resize(rgba.len(), 0);
        for (dst, src) in frame.chunks_exact_mut(4).zip(rgba.chunks_exact(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }
        ivars.frame_width.set(width);
        ivars.frame_height.set(height);
    }
}

pub struct MacOSOverlay {
    app: Retained<NSApplication>,
    window: Retained<NSWindow>,
    view: Retained<OverlayView>,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    redraw_requested: bool,
    running: bool,
}

impl OverlayPlatform for MacOSOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let mtm = MainThreadMarker::new()
            .ok_or_else(|| PlatformError::Other("overlay must be created on the main thread".into()))?;

        let app = NSApplication::sharedApplication(mtm);
        app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);
        // SAFETY: called once before any event is pulled from the queue
        unsafe { app.finishLaunching() };

        let primary = NSScreen::screens(mtm)
            .iter()
            .next()
            .ok_or_else(|| PlatformError::Other("No screens attached".into()))?;
        let primary_height = primary.frame().size.height;

        // Top-left origin -> bottom-left origin
        let macos_y = primary_height - config.y as f64 - config.height as f64;
        let rect = NSRect::new(
            NSPoint::new(config.x as f64, macos_y),
            NSSize::new(config.width as f64, config.height as f64),
        );

        // SAFETY: designated initializer with a freshly allocated window
        let window = unsafe {
            NSWindow::initWithContentRect_styleMask_backing_defer(
                NSWindow::alloc(mtm),
                rect,
                NSWindowStyleMask::Borderless,
                NSBackingStoreType::Buffered,
                false,
            )
        };

        // SAFETY: we keep our own Retained reference for the window's lifetime
        unsafe { window.setReleasedWhenClosed(false) };
        window.setLevel(OVERLAY_WINDOW_LEVEL);
        window.setBackgroundColor(Some(&NSColor::clearColor()));
        window.setOpaque(false);
        window.setHasShadow(false);
        window.setIgnoresMouseEvents(config.click_through);
        window.setCollectionBehavior(
            NSWindowCollectionBehavior::CanJoinAllSpaces
                | NSWindowCollectionBehavior::Stationary
                | NSWindowCollectionBehavior::IgnoresCycle
                | NSWindowCollectionBehavior::FullScreenAuxiliary,
        );

        let view = OverlayView::new(
            mtm,
            NSRect::new(
                NSPoint::new(0.0, 0.0),
                NSSize::new(config.width as f64, config.height as f64),
            ),
        );
        window.setContentView(Some(&view));
        // Shows the window without activating the application
        window.orderFrontRegardless();

        info!(
            x = config.x,
            y = config.y,
            width = config.width,
            height = config.height,
            "macOS overlay shown"
        );

        Ok(Self {
            app,
            window,
            view,
            width: config.width,
            height: config.height,
            x: config.x,
            y: config.y,
            redraw_requested: true,
            running: true,
        })
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn x(&self) -> i32 {
        self.x
    }

    fn y(&self) -> i32 {
        self.y
    }

    fn commit(&mut self, rgba: &[u8]) {
        if rgba.len() != (self.width * self.height * 4) as usize {
            debug!(actual = rgba.len(), "Frame size mismatch, dropping frame");
            return;
        }
        self.view.store_frame(rgba, self.width, self.height);
        self.view.setNeedsDisplay(true);
    }

    fn raise_topmost(&self) -> Result<(), PlatformError> {
        self.window.orderFrontRegardless();
        Ok(())
    }

    fn poll_events(&mut self) -> bool {
        loop {
            // SAFETY: main-thread event pump with a non-blocking deadline
            let event = unsafe {
                self.app.nextEventMatchingMask_untilDate_inMode_dequeue(
                    NSEventMask::Any,
                    Some(&NSDate::distantPast()),
                    NSDefaultRunLoopMode,
                    true,
                )
            };
            let Some(event) = event else {
                break;
            };
            self.app.sendEvent(&event);
        }
        self.app.updateWindows();

        if !self.window.isVisible() {
            info!("macOS overlay window closed");
            self.running = false;
        }
        self.running
    }

    fn take_redraw_requested(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }
}

impl Drop for MacOSOverlay {
    fn drop(&mut self) {
        self.window.close();
    }
}
