//! Win32 backends: monitor enumeration, cursor polling, a layered top-most
//! surface, GDI screen capture and the system clipboard.

use crate::overlay::capture::{CaptureBackend, CaptureSource, WindowHandle};
use crate::overlay::display::{DisplayDescriptor, DisplayRegistry, VerticalAxis};
use crate::overlay::error::CaptureError;
use crate::overlay::geometry::{Point, Rect};
use crate::overlay::layers::LayerStack;
use crate::overlay::platform::{ClipboardSink, OverlayPlatform, OverlaySurface, PointerSource};
use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::ffi::c_void;
use std::mem;
use std::sync::{Arc, Once};
use std::time::Duration;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{BOOL, COLORREF, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, EnumDisplayMonitors,
    EnumDisplaySettingsW, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC, SelectObject, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, DEVMODEW, DIB_RGB_COLORS, ENUM_CURRENT_SETTINGS, HDC, HGDIOBJ,
    HMONITOR, MONITORINFOEXW, SRCCOPY,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetCursorPos,
    PeekMessageW, RegisterClassW, SetLayeredWindowAttributes,
    SetWindowDisplayAffinity, SetWindowLongPtrW, SetWindowPos, ShowCursor, ShowWindow,
    TranslateMessage, GWL_EXSTYLE, HWND_TOPMOST, LWA_ALPHA, MONITORINFOF_PRIMARY, MSG,
    PM_REMOVE, SWP_NOACTIVATE, SW_HIDE, SW_SHOWNOACTIVATE, WDA_EXCLUDEFROMCAPTURE,
    WINDOW_EX_STYLE, WINDOW_STYLE, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};

const CAPTURE_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Builds the native platform. Must run on the thread that will own the surface.
pub fn native_platform() -> Result<OverlayPlatform> {
    let surface = LayeredSurface::create().context("create overlay surface")?;
    Ok(OverlayPlatform {
        displays: Box::new(Win32Displays),
        pointer: Box::new(Win32Pointer),
        surface: Box::new(surface),
        capture: Arc::new(GdiCaptureBackend),
        clipboard: Box::new(ArboardClipboard::default()),
        excluded_windows: Vec::new(),
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Displays;

impl DisplayRegistry for Win32Displays {
    fn enumerate(&self, out: &mut Vec<DisplayDescriptor>) {
        unsafe extern "system" fn enum_proc(
            monitor: HMONITOR,
            _hdc: HDC,
            _rect: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            let displays = unsafe { &mut *(data.0 as *mut Vec<DisplayDescriptor>) };
            let mut info = MONITORINFOEXW::default();
            info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;
            if unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut _ as *mut _) }
                .as_bool()
            {
                let rc = info.monitorInfo.rcMonitor;
                let mut descriptor = DisplayDescriptor::new(
                    monitor.0 as usize as u64,
                    Rect::new(
                        f64::from(rc.left),
                        f64::from(rc.top),
                        f64::from(rc.right - rc.left),
                        f64::from(rc.bottom - rc.top),
                    ),
                    info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
                );
                if let Some(hz) = refresh_rate(&info) {
                    descriptor = descriptor.with_refresh_hz(hz);
                }
                displays.push(descriptor);
            }
            BOOL(1)
        }

        out.clear();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_proc),
                LPARAM(out as *mut Vec<DisplayDescriptor> as isize),
            );
        }
    }

    fn y_axis(&self) -> VerticalAxis {
        VerticalAxis::Down
    }
}

fn refresh_rate(info: &MONITORINFOEXW) -> Option<u32> {
    let mut mode = DEVMODEW {
        dmSize: mem::size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };
    let ok = unsafe {
        EnumDisplaySettingsW(
            PCWSTR(info.szDevice.as_ptr()),
            ENUM_CURRENT_SETTINGS,
            &mut mode,
        )
    }
    .as_bool();
    // 0 and 1 both mean "hardware default".
    (ok && mode.dmDisplayFrequency > 1).then_some(mode.dmDisplayFrequency)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Pointer;

impl PointerSource for Win32Pointer {
    fn current_global_pointer(&self) -> Option<Point> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .ok()
            .map(|()| Point::new(f64::from(point.x), f64::from(point.y)))
    }

    fn primary_button_down(&self) -> bool {
        unsafe { GetAsyncKeyState(i32::from(VK_LBUTTON.0)) } < 0
    }
}

fn widestring(value: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

unsafe extern "system" fn overlay_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn compose_overlay_window_ex_style(click_through: bool) -> WINDOW_EX_STYLE {
    let base = WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE;
    if click_through {
        base | WS_EX_TRANSPARENT
    } else {
        base
    }
}

/// Borderless top-most layered window. Drawing the layers is left to the
/// renderer attached to this window; the surface manages placement, opacity,
/// input pass-through and cursor visibility.
#[derive(Debug)]
pub struct LayeredSurface {
    hwnd: HWND,
    cursor_hidden: bool,
    presented: u64,
}

impl LayeredSurface {
    pub fn create() -> Result<Self> {
        static REGISTER_CLASS: Once = Once::new();
        let class_name = widestring("BoreSightOverlay");
        let hinstance = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|err| anyhow!("GetModuleHandleW failed: {err}"))?;

        REGISTER_CLASS.call_once(|| unsafe {
            let wc = WNDCLASSW {
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                lpfnWndProc: Some(overlay_wndproc),
                ..Default::default()
            };
            let _ = RegisterClassW(&wc);
        });

        let hwnd = unsafe {
            CreateWindowExW(
                compose_overlay_window_ex_style(true),
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WINDOW_STYLE(WS_POPUP.0),
                0,
                0,
                1,
                1,
                None,
                None,
                hinstance,
                None,
            )
        }
        .map_err(|err| anyhow!("CreateWindowExW failed for overlay surface: {err}"))?;

        let surface = Self {
            hwnd,
            cursor_hidden: false,
            presented: 0,
        };
        unsafe { SetLayeredWindowAttributes(hwnd, COLORREF(0), 255, LWA_ALPHA) }
            .map_err(|err| anyhow!("SetLayeredWindowAttributes failed: {err}"))?;
        // Keeps the overlay out of its own magnifier.
        if let Err(err) = unsafe { SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE) } {
            tracing::warn!(error = %err, "overlay window could not be excluded from capture");
        }
        Ok(surface)
    }
}

impl OverlaySurface for LayeredSurface {
    fn resize(&mut self, bounds: Rect) {
        let result = unsafe {
            SetWindowPos(
                self.hwnd,
                HWND_TOPMOST,
                bounds.x.round() as i32,
                bounds.y.round() as i32,
                bounds.width.round() as i32,
                bounds.height.round() as i32,
                SWP_NOACTIVATE,
            )
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to resize overlay surface");
        }
    }

    fn set_opacity(&mut self, opacity: f64) {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        if let Err(err) =
            unsafe { SetLayeredWindowAttributes(self.hwnd, COLORREF(0), alpha, LWA_ALPHA) }
        {
            tracing::warn!(error = %err, "failed to set overlay opacity");
        }
    }

    fn show(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
        }
    }

    fn hide(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }

    fn set_click_through(&mut self, click_through: bool) {
        let style = compose_overlay_window_ex_style(click_through);
        unsafe {
            let _ = SetWindowLongPtrW(self.hwnd, GWL_EXSTYLE, style.0 as isize);
        }
        tracing::trace!(click_through, "overlay input mode changed");
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        if visible == !self.cursor_hidden {
            return;
        }
        self.cursor_hidden = !visible;
        unsafe {
            ShowCursor(BOOL::from(visible));
        }
    }

    fn present(&mut self, layers: &LayerStack) {
        self.presented += 1;
        tracing::trace!(frame = self.presented, layers = layers.layers().len(), "overlay frame");
    }

    fn pump(&mut self) {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }
        }
    }

    fn window_handle(&self) -> Option<WindowHandle> {
        Some(WindowHandle(self.hwnd.0 as isize))
    }
}

impl Drop for LayeredSurface {
    fn drop(&mut self) {
        if self.cursor_hidden {
            self.set_cursor_visible(true);
        }
        if !self.hwnd.0.is_null() {
            unsafe {
                let _ = DestroyWindow(self.hwnd);
            }
            self.hwnd = HWND::default();
        }
    }
}

/// Desktop duplication through GDI `BitBlt`. Windows excluded from capture are
/// marked with `WDA_EXCLUDEFROMCAPTURE` so they never appear in frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdiCaptureBackend;

impl CaptureBackend for GdiCaptureBackend {
    fn open(
        &self,
        display: &DisplayDescriptor,
        excluding: &[WindowHandle],
    ) -> Result<Box<dyn CaptureSource>, CaptureError> {
        let bounds = display.bounds;
        if bounds.width < 1.0 || bounds.height < 1.0 {
            return Err(CaptureError::DisplayUnavailable(display.id));
        }
        for handle in excluding {
            let hwnd = HWND(handle.0 as *mut c_void);
            unsafe { SetWindowDisplayAffinity(hwnd, WDA_EXCLUDEFROMCAPTURE) }.map_err(|err| {
                CaptureError::backend(format!("failed to exclude window from capture: {err}"))
            })?;
        }
        Ok(Box::new(GdiCaptureSource {
            x: bounds.x.round() as i32,
            y: bounds.y.round() as i32,
            width: bounds.width.round() as i32,
            height: bounds.height.round() as i32,
        }))
    }
}

struct GdiCaptureSource {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl CaptureSource for GdiCaptureSource {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<RgbaImage>, CaptureError> {
        std::thread::sleep(timeout.min(CAPTURE_FRAME_INTERVAL));
        capture_rect_rgba(self.x, self.y, self.width, self.height).map(Some)
    }

    fn close(&mut self) {
        tracing::trace!("gdi capture session closed");
    }
}

fn capture_rect_rgba(x: i32, y: i32, width: i32, height: i32) -> Result<RgbaImage, CaptureError> {
    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.0.is_null() {
            return Err(CaptureError::backend("GetDC failed for desktop capture"));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        if mem_dc.0.is_null() {
            let _ = ReleaseDC(HWND::default(), screen_dc);
            return Err(CaptureError::backend("CreateCompatibleDC failed"));
        }
        let bmp = CreateCompatibleBitmap(screen_dc, width, height);
        if bmp.0.is_null() {
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(HWND::default(), screen_dc);
            return Err(CaptureError::backend("CreateCompatibleBitmap failed"));
        }

        let old_obj = SelectObject(mem_dc, HGDIOBJ(bmp.0));
        let blitted = BitBlt(mem_dc, 0, 0, width, height, screen_dc, x, y, SRCCOPY).is_ok();

        let mut bgra = vec![0u8; (width as usize) * (height as usize) * 4];
        let rows = if blitted {
            let mut bmi = BITMAPINFO::default();
            bmi.bmiHeader = BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            };
            GetDIBits(
                mem_dc,
                bmp,
                0,
                height as u32,
                Some(bgra.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        } else {
            0
        };

        let _ = SelectObject(mem_dc, old_obj);
        let _ = DeleteObject(bmp);
        let _ = DeleteDC(mem_dc);
        let _ = ReleaseDC(HWND::default(), screen_dc);

        if !blitted {
            return Err(CaptureError::backend("BitBlt failed for desktop capture"));
        }
        if rows == 0 {
            return Err(CaptureError::backend("GetDIBits failed for desktop capture"));
        }

        for px in bgra.chunks_exact_mut(4) {
            px.swap(0, 2);
            px[3] = 255;
        }
        RgbaImage::from_raw(width as u32, height as u32, bgra)
            .ok_or_else(|| CaptureError::backend("captured buffer has unexpected size"))
    }
}

/// System clipboard, opened on first use.
#[derive(Default)]
pub struct ArboardClipboard {
    inner: Option<arboard::Clipboard>,
}

impl ClipboardSink for ArboardClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new().context("open system clipboard")?);
        }
        let clipboard = self
            .inner
            .as_mut()
            .ok_or_else(|| anyhow!("system clipboard unavailable"))?;
        clipboard
            .set_text(text.to_string())
            .context("write readout to clipboard")
    }
}
