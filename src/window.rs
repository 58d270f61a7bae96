//! 主窗口显示控制
//!
//! 窗口隐藏后 eframe 不再调用 `update`，视口命令要等到下一帧才会执行。
//! 托盘回调通过 `WindowControl` 直接显示窗口：发送视口命令的同时，
//! Windows 上用 Win32 API 把窗口重新显示出来，让事件循环恢复绘制。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eframe::egui;

/// 可在任意线程使用的窗口显示开关
#[derive(Clone)]
pub struct WindowControl {
    ctx: egui::Context,
    #[cfg_attr(not(windows), allow(dead_code))]
    title: &'static str,
    visible: Arc<AtomicBool>,
}

impl WindowControl {
    pub fn new(ctx: egui::Context, title: &'static str) -> Self {
        Self {
            ctx,
            title,
            visible: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// 显示窗口并置于前台
    pub fn show(&self) {
        self.visible.store(true, Ordering::SeqCst);

        #[cfg(windows)]
        win32::show_window(self.title);

        self.ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        self.ctx.request_repaint();
    }

    /// 隐藏窗口（程序继续在托盘运行）
    pub fn hide(&self) {
        self.visible.store(false, Ordering::SeqCst);
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
        self.ctx.request_repaint();
    }

    pub fn toggle(&self) {
        if self.is_visible() {
            self.hide();
        } else {
            self.show();
        }
    }
}

#[cfg(windows)]
mod win32 {
    use tracing::debug;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowW, SetForegroundWindow, ShowWindow, SW_RESTORE, SW_SHOW,
    };

    fn find_window(title: &str) -> Option<HWND> {
        let wide: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe { FindWindowW(PCWSTR::null(), PCWSTR(wide.as_ptr())) }
            .ok()
            .filter(|hwnd| !hwnd.is_invalid())
    }

    pub fn show_window(title: &str) {
        let Some(hwnd) = find_window(title) else {
            debug!("未找到窗口: {}", title);
            return;
        };
        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = ShowWindow(hwnd, SW_RESTORE);
            let _ = SetForegroundWindow(hwnd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_visibility() {
        let window = WindowControl::new(egui::Context::default(), "test-window");
        assert!(window.is_visible());

        window.toggle();
        assert!(!window.is_visible());

        window.toggle();
        assert!(window.is_visible());
    }

    #[test]
    fn test_clones_share_state() {
        let window = WindowControl::new(egui::Context::default(), "test-window");
        let from_tray = window.clone();

        window.hide();
        assert!(!from_tray.is_visible());

        from_tray.show();
        assert!(window.is_visible());
    }
}
