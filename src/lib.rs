//! ClipIt - 复制过的每一段内容都能找回
//!
//! 剪贴板历史记录工具：后台轮询系统剪贴板，把文本和图片保存到本地，
//! 并提供按日期浏览、搜索、一键写回剪贴板的窗口。
//!
//! # 模块说明
//! - `config`: 配置项（存储路径、轮询间隔等）
//! - `entry`: 历史条目
//! - `clipboard`: 剪贴板读写
//! - `poller`: 剪贴板轮询和监听线程
//! - `store`: 历史文件和图片的存储（核心模块）
//! - `history`: 按日期分组的历史索引和搜索
//! - `notify`: 桌面通知
//! - `tray`: 系统托盘
//! - `window`: 主窗口显示/隐藏（托盘回调中使用）
//! - `gui`: 主窗口

pub mod config;
pub mod entry;
pub mod clipboard;
pub mod poller;
pub mod store;
pub mod history;
pub mod notify;
pub mod tray;
pub mod window;
pub mod gui;

// 重新导出常用类型
pub use clipboard::{ClipboardContent, ClipboardError, ClipboardSource, PngImage, SystemClipboard};
pub use entry::{Entry, EntryKind, Payload};
pub use history::{DateBucket, HistoryIndex};
pub use poller::{ClipboardPoller, Monitor, MonitorEvent, MonitorHandle};
pub use store::{Capture, Store, StoreError};
pub use tray::{SystemTray, TrayEvent};
pub use window::WindowControl;
