//! X11 platform implementation for the overlay window
//!
//! Uses XCB via x11rb. The window is override-redirect with a 32-bit ARGB
//! visual, so the window manager neither decorates nor focuses it. Frames are
//! blitted through a MIT-SHM segment. Translucency requires a compositor.

use std::fs::File;
use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use tracing::{debug, info, warn};
use x11rb::atom_manager;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::shm::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError};

// EWMH window type and state atoms
atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DOCK,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_STATE_SKIP_PAGER,
        ATOM,
    }
}

pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let Ok((conn, screen_num)) = x11rb::connect(None) else {
        return Vec::new();
    };
    monitors_for(&conn, conn.setup().roots[screen_num].root)
}

fn monitors_for(conn: &RustConnection, root: Window) -> Vec<MonitorInfo> {
    let Ok(cookie) = conn.randr_get_monitors(root, true) else {
        return Vec::new();
    };
    let Ok(reply) = cookie.reply() else {
        return Vec::new();
    };

    reply
        .monitors
        .iter()
        .enumerate()
        .map(|(idx, mon)| {
            let id = conn
                .get_atom_name(mon.name)
                .ok()
                .and_then(|r| r.reply().ok())
                .map(|r| String::from_utf8_lossy(&r.name).to_string())
                .unwrap_or_else(|| format!("Monitor {}", idx + 1));

            MonitorInfo {
                id,
                x: mon.x as i32,
                y: mon.y as i32,
                width: mon.width as u32,
                height: mon.height as u32,
                is_primary: mon.primary,
            }
        })
        .collect()
}

/// SHM segment the server reads frames from
struct ShmBuffer {
    seg_id: shm::Seg,
    ptr: *mut u8,
    size: usize,
}

pub struct X11Overlay {
    conn: RustConnection,
    window: Window,
    gc: Gcontext,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    depth: u8,
    shm_buffer: ShmBuffer,
    redraw_requested: bool,
    running: bool,
}

impl X11Overlay {
    /// First depth-32 TrueColor visual, required for per-pixel alpha
    fn find_argb_visual(screen: &Screen) -> Option<(Visualid, u8)> {
        screen
            .allowed_depths
            .iter()
            .filter(|depth| depth.depth == 32)
            .flat_map(|depth| depth.visuals.iter().map(move |v| (v, depth.depth)))
            .find(|(visual, _)| visual.class == VisualClass::TRUE_COLOR)
            .map(|(visual, depth)| (visual.visual_id, depth))
    }

    fn create_shm_buffer(
        conn: &RustConnection,
        width: u32,
        height: u32,
    ) -> Result<ShmBuffer, PlatformError> {
        let size = (width * height * 4) as usize;

        let fd = memfd_create(c"netspeed-overlay-frame", MemfdFlags::CLOEXEC)
            .map_err(|e| PlatformError::BufferError(format!("memfd_create failed: {}", e)))?;

        rustix::fs::ftruncate(&fd, size as u64)
            .map_err(|e| PlatformError::BufferError(format!("ftruncate failed: {}", e)))?;

        // SAFETY: fresh mapping of a memfd we just sized; unmapped in Drop
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd.as_fd(),
                0,
            )
            .map_err(|e| PlatformError::BufferError(format!("mmap failed: {}", e)))?
        };

        let seg_id = conn
            .generate_id()
            .map_err(|e| PlatformError::BufferError(e.to_string()))?;

        // shm_attach_fd takes ownership of the fd
        conn.shm_attach_fd(seg_id, File::from(fd), false)
            .map_err(|e| PlatformError::BufferError(format!("shm_attach_fd failed: {}", e)))?;

        Ok(ShmBuffer {
            seg_id,
            ptr: ptr as *mut u8,
            size,
        })
    }

    /// Dock type plus above / skip-taskbar / skip-pager state. Override-redirect
    /// windows are unmanaged, but compositors and pagers still read these.
    fn setup_window_hints(
        &self,
        atoms: &AtomCollection,
        namespace: &str,
    ) -> Result<(), PlatformError> {
        let other = |e: x11rb::errors::ConnectionError| PlatformError::Other(e.to_string());

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                atoms._NET_WM_WINDOW_TYPE,
                atoms.ATOM,
                &[atoms._NET_WM_WINDOW_TYPE_DOCK],
            )
            .map_err(other)?;

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                atoms._NET_WM_STATE,
                atoms.ATOM,
                &[
                    atoms._NET_WM_STATE_ABOVE,
                    atoms._NET_WM_STATE_SKIP_TASKBAR,
                    atoms._NET_WM_STATE_SKIP_PAGER,
                ],
            )
            .map_err(other)?;

        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.window,
                AtomEnum::WM_NAME,
                AtomEnum::STRING,
                namespace.as_bytes(),
            )
            .map_err(other)?;

        Ok(())
    }

    /// Empty input region when click-through, full window otherwise
    fn set_input_shape(&self, click_through: bool) {
        let full = [Rectangle {
            x: 0,
            y: 0,
            width: self.width as u16,
            height: self.height as u16,
        }];
        let rects: &[Rectangle] = if click_through { &[] } else { &full };
        if let Err(e) = self.conn.shape_rectangles(
            shape::SO::SET,
            shape::SK::INPUT,
            ClipOrdering::UNSORTED,
            self.window,
            0,
            0,
            rects,
        ) {
            warn!(error = %e, "Failed to set X11 input shape");
        }
    }
}

impl OverlayPlatform for X11Overlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let atoms = AtomCollection::new(&conn)
            .map_err(|e| PlatformError::Other(e.to_string()))?
            .reply()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;

        conn.shape_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("Shape extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("Shape extension".into()))?;

        conn.shm_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?;

        let (visual, depth) = Self::find_argb_visual(screen)
            .ok_or_else(|| PlatformError::UnsupportedFeature("32-bit ARGB visual".into()))?;

        let colormap = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, root, visual)
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let window = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let win_aux = CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .colormap(colormap)
            .event_mask(EventMask::EXPOSURE | EventMask::STRUCTURE_NOTIFY)
            .override_redirect(1);

        conn.create_window(
            depth,
            window,
            root,
            config.x as i16,
            config.y as i16,
            config.width as u16,
            config.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &win_aux,
        )
        .map_err(|e| PlatformError::Other(e.to_string()))?;

        let gc = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let shm_buffer = Self::create_shm_buffer(&conn, config.width, config.height)?;

        let overlay = Self {
            conn,
            window,
            gc,
            width: config.width,
            height: config.height,
            x: config.x,
            y: config.y,
            depth,
            shm_buffer,
            redraw_requested: true,
            running: true,
        };

        overlay.setup_window_hints(&atoms, &config.namespace)?;
        overlay.set_input_shape(config.click_through);

        overlay
            .conn
            .map_window(window)
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        overlay
            .conn
            .flush()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        info!(
            window = window,
            x = config.x,
            y = config.y,
            width = config.width,
            height = config.height,
            "X11 overlay mapped"
        );

        Ok(overlay)
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
        if rgba.len() != self.shm_buffer.size {
            warn!(
                expected = self.shm_buffer.size,
                actual = rgba.len(),
                "Frame size does not match SHM segment, dropping frame"
            );
            return;
        }

        // SAFETY: the mapping is `size` bytes long and lives until Drop
        let shm_slice =
            unsafe { std::slice::from_raw_parts_mut(self.shm_buffer.ptr, self.shm_buffer.size) };

        // Premultiplied RGBA -> BGRA (depth-32 ZPixmap, little-endian)
        for (dst, src) in shm_slice.chunks_exact_mut(4).zip(rgba.chunks_exact(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        let result = self.conn.shm_put_image(
            self.window,
            self.gc,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.depth,
            ImageFormat::Z_PIXMAP.into(),
            false,
            self.shm_buffer.seg_id,
            0,
        );
        if let Err(e) = result.and_then(|_| self.conn.flush()) {
            debug!(error = %e, "shm_put_image failed");
        }
    }

    fn raise_topmost(&self) -> Result<(), PlatformError> {
        // Unmanaged window: restack directly instead of asking the WM
        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .map_err(|e| PlatformError::Other(format!("configure_window failed: {}", e)))?;
        self.conn
            .flush()
            .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))
    }

    fn poll_events(&mut self) -> bool {
        loop {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => match event {
                    Event::Expose(e) if e.count == 0 => self.redraw_requested = true,
                    Event::MapNotify(e) if e.window == self.window => {
                        self.redraw_requested = true
                    }
                    Event::DestroyNotify(e) if e.window == self.window => {
                        info!("X11 overlay window destroyed");
                        self.running = false;
                    }
                    Event::Error(e) => {
                        debug!(error = ?e, "X11 protocol error");
                    }
                    _ => {}
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "X11 connection lost");
                    self.running = false;
                    break;
                }
            }
        }
        self.running
    }

    fn take_redraw_requested(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }
}

impl Drop for X11Overlay {
    fn drop(&mut self) {
        let _ = self.conn.shm_detach(self.shm_buffer.seg_id);
        // SAFETY: mapping created in create_shm_buffer and not used after this
        unsafe {
            rustix::mm::munmap(self.shm_buffer.ptr as *mut _, self.shm_buffer.size).ok();
        }

        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.free_gc(self.gc);
        let _ = self.conn.flush();
    }
}
