//! 系统托盘模块
//!
//! 窗口关闭后程序常驻托盘，轮询继续运行。托盘提供：
//! - 左键单击：显示/隐藏窗口
//! - 菜单：显示窗口、打开数据目录、退出
//!
//! Linux 上不创建托盘，关闭窗口即退出。

use std::sync::Arc;

use thiserror::Error;
#[cfg(not(target_os = "linux"))]
use tray_icon::{
    menu::{Menu, MenuItem, PredefinedMenuItem},
    TrayIconBuilder,
};
use tray_icon::{
    menu::{MenuEvent, MenuId},
    Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconEvent,
};

#[cfg(not(target_os = "linux"))]
use crate::config;

/// 托盘错误
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("菜单错误: {0}")]
    Menu(String),

    #[error("无法创建图标: {0}")]
    Icon(String),

    #[error("无法创建托盘图标: {0}")]
    Build(String),

    #[error("当前平台不支持系统托盘")]
    Unsupported,
}

/// 托盘事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    /// 切换窗口显示
    ToggleWindow,
    /// 显示窗口
    ShowWindow,
    /// 打开数据目录
    OpenDataDir,
    /// 退出程序
    Quit,
}

/// 菜单项 id，可以移动到事件回调中使用
#[derive(Debug, Clone)]
pub struct TrayMenuIds {
    show: MenuId,
    open_data_dir: MenuId,
    quit: MenuId,
}

impl TrayMenuIds {
    /// 把菜单点击翻译为托盘事件
    pub fn translate(&self, event: &MenuEvent) -> Option<TrayEvent> {
        if event.id == self.show {
            Some(TrayEvent::ShowWindow)
        } else if event.id == self.open_data_dir {
            Some(TrayEvent::OpenDataDir)
        } else if event.id == self.quit {
            Some(TrayEvent::Quit)
        } else {
            None
        }
    }
}

/// 系统托盘
#[cfg_attr(target_os = "linux", allow(dead_code))]
pub struct SystemTray {
    _tray_icon: TrayIcon,
    menu_ids: TrayMenuIds,
}

impl SystemTray {
    /// 创建系统托盘
    #[cfg(not(target_os = "linux"))]
    pub fn new() -> Result<Self, TrayError> {
        let menu = Menu::new();

        let show = MenuItem::new("显示窗口", true, None);
        let open_data_dir = MenuItem::new("📂 打开数据目录", true, None);
        let separator = PredefinedMenuItem::separator();
        let quit = MenuItem::new("退出", true, None);

        menu.append(&show).map_err(|e| TrayError::Menu(e.to_string()))?;
        menu.append(&open_data_dir).map_err(|e| TrayError::Menu(e.to_string()))?;
        menu.append(&separator).map_err(|e| TrayError::Menu(e.to_string()))?;
        menu.append(&quit).map_err(|e| TrayError::Menu(e.to_string()))?;

        let icon = create_icon()?;

        let tray_icon = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_menu_on_left_click(false)
            .with_tooltip(format!("{} - 剪贴板历史", config::APP_NAME))
            .with_icon(icon)
            .build()
            .map_err(|e| TrayError::Build(e.to_string()))?;

        Ok(Self {
            _tray_icon: tray_icon,
            menu_ids: TrayMenuIds {
                show: show.id().clone(),
                open_data_dir: open_data_dir.id().clone(),
                quit: quit.id().clone(),
            },
        })
    }

    /// Linux 上托盘依赖 GTK 主循环，而窗口由 winit 驱动，没有 GTK 循环
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self, TrayError> {
        Err(TrayError::Unsupported)
    }

    pub fn menu_ids(&self) -> TrayMenuIds {
        self.menu_ids.clone()
    }
}

/// 只响应左键单击（松开时）
pub fn translate_icon_event(event: &TrayIconEvent) -> Option<TrayEvent> {
    match event {
        TrayIconEvent::Click {
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
            ..
        } => Some(TrayEvent::ToggleWindow),
        _ => None,
    }
}

/// 接管托盘和菜单事件
///
/// 窗口隐藏时 eframe 不会调用 `update`，所以事件直接在托盘回调里交给 `handler` 处理，
/// 不经过界面循环。
pub fn install_event_handlers<H>(menu_ids: TrayMenuIds, handler: H)
where
    H: Fn(TrayEvent) + Send + Sync + 'static,
{
    let handler = Arc::new(handler);

    let menu_handler = Arc::clone(&handler);
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        if let Some(action) = menu_ids.translate(&event) {
            menu_handler(action);
        }
    }));

    TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
        if let Some(action) = translate_icon_event(&event) {
            handler(action);
        }
    }));
}

/// 图标边长
const ICON_SIZE: u32 = 32;

/// 创建托盘图标
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn create_icon() -> Result<Icon, TrayError> {
    Icon::from_rgba(icon_rgba(ICON_SIZE), ICON_SIZE, ICON_SIZE)
        .map_err(|e| TrayError::Icon(e.to_string()))
}

/// 绘制剪贴板形状的图标：蓝色圆角板 + 顶部夹子 + 白色横线
fn icon_rgba(size: u32) -> Vec<u8> {
    let s = size as f32;
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;

            let in_board = fx > s * 0.15 && fx < s * 0.85 && fy > s * 0.12 && fy < s * 0.95;
            let in_clip = fx > s * 0.35 && fx < s * 0.65 && fy > s * 0.04 && fy < s * 0.22;
            let in_line = fx > s * 0.28
                && fx < s * 0.72
                && [0.42, 0.58, 0.74]
                    .iter()
                    .any(|row| (fy - s * row).abs() < s * 0.035);

            let pixel = if in_clip {
                [60, 60, 67, 255] // 深灰夹子
            } else if in_board && in_line {
                [255, 255, 255, 255]
            } else if in_board {
                [0, 122, 204, 255] // 蓝色
            } else {
                [0, 0, 0, 0]
            };
            rgba.extend_from_slice(&pixel);
        }
    }

    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_buffer_matches_size() {
        let rgba = icon_rgba(ICON_SIZE);
        assert_eq!(rgba.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
    }

    #[test]
    fn test_icon_has_transparent_corner_and_opaque_center() {
        let size = ICON_SIZE as usize;
        let rgba = icon_rgba(ICON_SIZE);
        let alpha = |x: usize, y: usize| rgba[(y * size + x) * 4 + 3];

        assert_eq!(alpha(0, 0), 0);
        assert_eq!(alpha(size / 2, size / 2), 255);
    }

    fn ids() -> TrayMenuIds {
        TrayMenuIds {
            show: MenuId::new("show"),
            open_data_dir: MenuId::new("open"),
            quit: MenuId::new("quit"),
        }
    }

    #[test]
    fn test_menu_items_map_to_events() {
        let ids = ids();
        let click = |id: &str| MenuEvent { id: MenuId::new(id) };

        assert_eq!(ids.translate(&click("show")), Some(TrayEvent::ShowWindow));
        assert_eq!(ids.translate(&click("open")), Some(TrayEvent::OpenDataDir));
        assert_eq!(ids.translate(&click("quit")), Some(TrayEvent::Quit));
        assert_eq!(ids.translate(&click("other")), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_has_no_tray() {
        assert!(matches!(SystemTray::new(), Err(TrayError::Unsupported)));
    }

    #[test]
    fn test_icon_converts() {
        assert!(create_icon().is_ok());
    }
}
