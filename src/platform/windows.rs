//! Windows platform implementation for the overlay window
//!
//! A layered popup (`WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW |
//! WS_EX_NOACTIVATE`) updated through `UpdateLayeredWindow` for per-pixel
//! alpha. Tool windows stay out of the taskbar and Alt+Tab.
#![allow(clippy::too_many_arguments)]

use std::mem;
use std::ptr;

use tracing::{debug, info, warn};
use windows::Win32::Foundation::{
    BOOL, COLORREF, HWND, LPARAM, LRESULT, POINT, RECT, SIZE, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION, CreateCompatibleDC, CreateDIBSection,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, EnumDisplayMonitors, GetDC, GetMonitorInfoW, HBITMAP,
    HDC, HGDIOBJ, HMONITOR, MONITORINFOEXW, ReleaseDC, SelectObject,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CS_HREDRAW, CS_VREDRAW, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    GWL_EXSTYLE, GetWindowLongPtrW, HTCLIENT, HTTRANSPARENT, HWND_TOPMOST, IDC_ARROW, LoadCursorW,
    MSG, PM_REMOVE, PeekMessageW, PostQuitMessage, RegisterClassExW, SW_SHOWNOACTIVATE,
    SWP_ASYNCWINDOWPOS, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SetWindowPos, ShowWindow,
    TranslateMessage, ULW_ALPHA, UpdateLayeredWindow, WM_DESTROY, WM_DISPLAYCHANGE, WM_ERASEBKGND,
    WM_MOUSEACTIVATE, WM_NCHITTEST, WM_PAINT, WM_QUIT, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::PCWSTR;

use super::{MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError};

const WINDOW_CLASS: &str = "NetSpeedOverlayClass";
/// `MA_NOACTIVATE` for WM_MOUSEACTIVATE
const MA_NOACTIVATE: isize = 3;

/// Callback for EnumDisplayMonitors - collects monitor info into a Vec<MonitorInfo>
unsafe extern "system" fn enum_monitors_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    unsafe {
        let monitors = &mut *(lparam.0 as *mut Vec<MonitorInfo>);

        let mut info = MONITORINFOEXW::default();
        info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(hmonitor, &mut info.monitorInfo).as_bool() {
            let rc = info.monitorInfo.rcMonitor;
            let name_len = info
                .szDevice
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(info.szDevice.len());

            monitors.push(MonitorInfo {
                id: String::from_utf16_lossy(&info.szDevice[..name_len]),
                x: rc.left,
                y: rc.top,
                width: (rc.right - rc.left) as u32,
                height: (rc.bottom - rc.top) as u32,
                // MONITORINFOF_PRIMARY
                is_primary: info.monitorInfo.dwFlags & 1 != 0,
            });
        }

        BOOL::from(true)
    }
}

pub fn get_all_monitors() -> Vec<MonitorInfo> {
    let mut monitors: Vec<MonitorInfo> = Vec::new();

    unsafe {
        let raw_ptr = &mut monitors as *mut Vec<MonitorInfo>;
        let ok = EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitors_callback),
            LPARAM(raw_ptr as isize),
        );
        if !ok.as_bool() {
            warn!("EnumDisplayMonitors failed");
        }
    }

    debug!(count = monitors.len(), "Enumerated monitors");
    monitors
}

pub struct WindowsOverlay {
    hwnd: HWND,
    hdc_mem: HDC,
    dib: HBITMAP,
    /// Pixel memory owned by the DIB section (BGRA, top-down)
    dib_bits: *mut u8,
    previous_object: HGDIOBJ,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    redraw_requested: bool,
    running: bool,
}

// WindowsOverlay is not Send: the HWND's message queue belongs to the
// creating thread, so every call must come from the thread that built it.

impl WindowsOverlay {
    fn register_class() -> Result<(), PlatformError> {
        unsafe {
            let class_name = wide_string(WINDOW_CLASS);
            let hinstance = GetModuleHandleW(None)
                .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

            let wc = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(window_proc),
                hInstance: hinstance.into(),
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };

            if RegisterClassExW(&wc) == 0 {
                let err = std::io::Error::last_os_error();
                // ERROR_CLASS_ALREADY_EXISTS
                if err.raw_os_error() != Some(1410) {
                    return Err(PlatformError::Other(format!(
                        "RegisterClassExW failed: {}",
                        err
                    )));
                }
            }
        }
        Ok(())
    }

    fn bitmap_info(width: u32, height: u32) -> BITMAPINFO {
        BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                // Top-down DIB
                biHeight: -(height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn create_dib_section(&mut self) -> Result<(), PlatformError> {
        unsafe {
            let hdc_screen = GetDC(HWND::default());

            self.hdc_mem = CreateCompatibleDC(hdc_screen);
            if self.hdc_mem.is_invalid() {
                ReleaseDC(HWND::default(), hdc_screen);
                return Err(PlatformError::BufferError(
                    "CreateCompatibleDC failed".to_string(),
                ));
            }

            let bmi = Self::bitmap_info(self.width, self.height);
            let mut bits: *mut std::ffi::c_void = ptr::null_mut();
            let dib = CreateDIBSection(hdc_screen, &bmi, DIB_RGB_COLORS, &mut bits, None, 0);
            ReleaseDC(HWND::default(), hdc_screen);

            self.dib = dib.map_err(|e| {
                PlatformError::BufferError(format!("CreateDIBSection failed: {}", e))
            })?;
            if bits.is_null() {
                return Err(PlatformError::BufferError(
                    "CreateDIBSection returned no pixel memory".to_string(),
                ));
            }
            self.dib_bits = bits as *mut u8;
            self.previous_object = SelectObject(self.hdc_mem, self.dib);
        }
        Ok(())
    }

    fn update_layered_window(&self) -> Result<(), PlatformError> {
        unsafe {
            let hdc_screen = GetDC(HWND::default());

            let pt_src = POINT { x: 0, y: 0 };
            let pt_dst = POINT {
                x: self.x,
                y: self.y,
            };
            let size = SIZE {
                cx: self.width as i32,
                cy: self.height as i32,
            };
            let blend = BLENDFUNCTION {
                BlendOp: 0, // AC_SRC_OVER
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: 1, // AC_SRC_ALPHA
            };

            let result = UpdateLayeredWindow(
                self.hwnd,
                hdc_screen,
                Some(&pt_dst),
                Some(&size),
                self.hdc_mem,
                Some(&pt_src),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            );

            ReleaseDC(HWND::default(), hdc_screen);
            result.map_err(|e| PlatformError::Other(format!("UpdateLayeredWindow failed: {}", e)))
        }
    }
}

impl OverlayPlatform for WindowsOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        Self::register_class()?;

        let hwnd = unsafe {
            let class_name = wide_string(WINDOW_CLASS);
            let window_name = wide_string(&config.namespace);
            let hinstance = GetModuleHandleW(None)
                .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

            let mut ex_style = WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE;
            if config.click_through {
                ex_style |= WS_EX_TRANSPARENT;
            }

            CreateWindowExW(
                ex_style,
                PCWSTR(class_name.as_ptr()),
                PCWSTR(window_name.as_ptr()),
                WS_POPUP,
                config.x,
                config.y,
                config.width as i32,
                config.height as i32,
                None,
                None,
                hinstance,
                None,
            )
            .map_err(|e| PlatformError::Other(format!("CreateWindowExW failed: {}", e)))?
        };

        let mut overlay = Self {
            hwnd,
            hdc_mem: HDC::default(),
            dib: HBITMAP::default(),
            dib_bits: ptr::null_mut(),
            previous_object: HGDIOBJ::default(),
            width: config.width,
            height: config.height,
            x: config.x,
            y: config.y,
            redraw_requested: true,
            running: true,
        };

        overlay.create_dib_section()?;

        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
        }

        info!(
            hwnd = ?hwnd,
            x = config.x,
            y = config.y,
            width = config.width,
            height = config.height,
            "Windows overlay shown"
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
        let size = (self.width * self.height * 4) as usize;
        if rgba.len() != size || self.dib_bits.is_null() {
            warn!(
                expected = size,
                actual = rgba.len(),
                "Frame size does not match DIB section, dropping frame"
            );
            return;
        }

        // SAFETY: the DIB section owns `size` bytes until DeleteObject in Drop
        let bgra = unsafe { std::slice::from_raw_parts_mut(self.dib_bits, size) };

        // Premultiplied RGBA -> premultiplied BGRA, as AC_SRC_ALPHA expects
        for (dst, src) in bgra.chunks_exact_mut(4).zip(rgba.chunks_exact(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        if let Err(e) = self.update_layered_window() {
            debug!(error = %e, "Failed to present frame");
        }
    }

    fn raise_topmost(&self) -> Result<(), PlatformError> {
        unsafe {
            SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_ASYNCWINDOWPOS,
            )
        }
        .map_err(|e| PlatformError::Other(format!("SetWindowPos failed: {}", e)))
    }

    fn poll_events(&mut self) -> bool {
        unsafe {
            let mut msg = MSG::default();
            // Thread-wide peek so the WM_QUIT posted from WM_DESTROY is seen
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                match msg.message {
                    WM_QUIT => {
                        info!("Received WM_QUIT");
                        self.running = false;
                    }
                    WM_PAINT | WM_DISPLAYCHANGE => {
                        self.redraw_requested = true;
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                    _ => {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
            }
        }
        self.running
    }

    fn take_redraw_requested(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }
}

impl Drop for WindowsOverlay {
    fn drop(&mut self) {
        unsafe {
            if !self.hdc_mem.is_invalid() {
                if !self.previous_object.is_invalid() {
                    SelectObject(self.hdc_mem, self.previous_object);
                }
                let _ = DeleteDC(self.hdc_mem);
            }
            if !self.dib.is_invalid() {
                let _ = DeleteObject(self.dib);
            }
            if !self.hwnd.is_invalid() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
        debug!("Windows overlay released");
    }
}

/// Window procedure for overlay windows
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // Clicks never activate the overlay
        WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE),
        WM_NCHITTEST => {
            let ex_style = unsafe { GetWindowLongPtrW(hwnd, GWL_EXSTYLE) };
            if ex_style & WS_EX_TRANSPARENT.0 as isize != 0 {
                LRESULT(HTTRANSPARENT as isize)
            } else {
                LRESULT(HTCLIENT as isize)
            }
        }
        WM_ERASEBKGND => LRESULT(1),
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Convert a &str to a null-terminated wide string
fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
