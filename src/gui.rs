//! ClipIt GUI 模块
//!
//! 深色主题的双栏窗口，使用 egui/eframe 实现：
//! - 左栏：日期列表，清除所选日期 / 清空全部 / 打开数据目录
//! - 右栏：所选日期的条目，双击把内容写回剪贴板
//! - 顶部搜索框：在所有日期的文本条目中搜索
//!
//! 关闭窗口只是隐藏到托盘，剪贴板监听始终运行，直到从托盘菜单退出。

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{Local, NaiveDate};
use crossbeam_channel::Receiver;
use eframe::egui;
use tracing::{info, warn};

use crate::clipboard::SystemClipboard;
use crate::config;
use crate::entry::{preview, Entry, Payload};
use crate::history::HistoryIndex;
use crate::notify::Notifier;
use crate::poller::{ClipboardPoller, Monitor, MonitorEvent, MonitorHandle};
use crate::store::{Store, StoreError};
use crate::tray::{self, SystemTray, TrayEvent};
use crate::window::WindowControl;

const ACCENT: egui::Color32 = egui::Color32::from_rgb(0, 122, 204);
const MUTED: egui::Color32 = egui::Color32::from_rgb(136, 136, 136);
const DANGER: egui::Color32 = egui::Color32::from_rgb(196, 43, 28);

/// GUI 应用状态
pub struct ClipItApp {
    /// 与监听线程共享的存储
    store: Arc<Mutex<Store>>,
    /// 内存中的历史索引
    index: HistoryIndex,
    /// 存储根目录（用于“打开数据目录”）
    storage_root: PathBuf,
    /// 当前选中的日期
    selected_date: Option<NaiveDate>,
    /// 搜索关键词
    search_query: String,
    /// 是否显示“清空全部”确认框
    confirm_clear_all: bool,
    /// 状态消息
    status_message: Option<(String, Instant)>,
    /// 写回剪贴板用
    clipboard: Option<SystemClipboard>,
    /// 缩略图缓存，`None` 表示图片无法读取
    thumbnails: HashMap<PathBuf, Option<egui::TextureHandle>>,
    notifier: Notifier,
    /// 托盘回调也持有一份，用于在窗口隐藏时重新显示
    window: WindowControl,
    tray: Option<SystemTray>,
    monitor: Option<MonitorHandle>,
    monitor_rx: Receiver<MonitorEvent>,
}

impl ClipItApp {
    /// 创建新的 GUI 应用，并启动剪贴板监听和托盘
    pub fn new(cc: &eframe::CreationContext<'_>, store: Store) -> io::Result<Self> {
        configure_dark_style(&cc.egui_ctx);
        install_cjk_font(&cc.egui_ctx);

        let storage_root = store.root().to_path_buf();
        let index = HistoryIndex::load(&store).unwrap_or_else(|e| {
            warn!("无法加载历史: {}", e);
            HistoryIndex::default()
        });
        info!("已加载 {} 条历史记录", index.len());

        let store = Arc::new(Mutex::new(store));
        let window = WindowControl::new(cc.egui_ctx.clone(), config::APP_NAME);

        let poller = ClipboardPoller::primed(index.latest());
        let ctx = cc.egui_ctx.clone();
        let monitor_notifier = Notifier::new();
        let (monitor, monitor_rx) = Monitor::new(poller, Arc::clone(&store), config::POLL_INTERVAL)
            .spawn(SystemClipboard::new, move |event| {
                notify_failure(&monitor_notifier, event);
                ctx.request_repaint();
            })?;

        let tray = match SystemTray::new() {
            Ok(tray) => {
                tray::install_event_handlers(
                    tray.menu_ids(),
                    tray_handler(window.clone(), Arc::clone(&store), storage_root.clone()),
                );
                Some(tray)
            }
            Err(e) => {
                warn!("无法创建系统托盘，关闭窗口将退出程序: {}", e);
                None
            }
        };

        let clipboard = match SystemClipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        let selected_date = resolve_selection(&index, None);

        Ok(Self {
            store,
            index,
            storage_root,
            selected_date,
            search_query: String::new(),
            confirm_clear_all: false,
            status_message: None,
            clipboard,
            thumbnails: HashMap::new(),
            notifier: Notifier::new(),
            window,
            tray,
            monitor: Some(monitor),
            monitor_rx,
        })
    }

    /// 显示状态消息
    fn show_message(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// 在存储锁内执行操作
    fn with_store<T>(&self, op: impl FnOnce(&Store) -> Result<T, StoreError>) -> Result<T, String> {
        let store = self.store.lock().map_err(|_| "存储锁已损坏".to_string())?;
        op(&store).map_err(|e| e.to_string())
    }

    /// 完整重新加载历史
    fn reload(&mut self) {
        match self.with_store(HistoryIndex::load) {
            Ok(index) => {
                self.index = index;
                self.selected_date = resolve_selection(&self.index, self.selected_date);
            }
            Err(e) => {
                warn!("无法加载历史: {}", e);
                self.show_message(format!("无法加载历史: {}", e));
            }
        }
    }

    /// 处理监听线程的事件
    ///
    /// 窗口隐藏期间的事件在窗口重新显示后一并处理；失败通知已由监听线程弹出。
    fn process_monitor_events(&mut self) {
        let mut captured = false;
        while let Ok(event) = self.monitor_rx.try_recv() {
            match event {
                MonitorEvent::Captured(_) => captured = true,
                MonitorEvent::StoreFailed(msg) => {
                    self.show_message(format!("保存失败: {}", msg));
                }
                MonitorEvent::ClipboardUnavailable(msg) => {
                    self.show_message(format!("剪贴板不可用: {}", msg));
                }
            }
        }
        if captured {
            self.reload();
        }
    }

    /// 关闭窗口时隐藏到托盘（没有托盘时正常退出）
    fn intercept_close(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        if self.tray.is_none() {
            info!("正在退出...");
            return;
        }
        ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
        self.window.hide();
    }

    fn clear_selected_date(&mut self) {
        let Some(date) = self.selected_date else {
            return;
        };
        match self.with_store(|store| store.clear_date(date)) {
            Ok(removed) => {
                self.thumbnails.clear();
                self.reload();
                self.show_message(format!("已清除 {} 条记录", removed));
            }
            Err(e) => {
                warn!("清除失败: {}", e);
                self.notifier.show("清除失败", &e);
                self.show_message(format!("清除失败: {}", e));
            }
        }
    }

    fn clear_all(&mut self) {
        match self.with_store(Store::clear_all) {
            Ok(()) => {
                self.thumbnails.clear();
                self.reload();
                self.show_message("已清空全部历史");
            }
            Err(e) => {
                warn!("清空失败: {}", e);
                self.notifier.show("清空失败", &e);
                self.show_message(format!("清空失败: {}", e));
            }
        }
    }

    /// 把条目写回剪贴板
    fn copy_back(&mut self, entry: &Entry) {
        let Some(clipboard) = self.clipboard.as_mut() else {
            self.show_message("剪贴板不可用");
            return;
        };

        let result = match &entry.payload {
            Payload::Text(text) => clipboard.write_text(text),
            Payload::Image(path) => clipboard.write_image_file(path),
        };

        match result {
            Ok(()) => {
                self.notifier.show("已复制", "内容已复制到剪贴板");
                self.show_message("已复制到剪贴板");
            }
            Err(e) => {
                warn!("{}", e);
                self.show_message(e.to_string());
            }
        }
    }

    /// 获取缩略图（带缓存）
    fn thumbnail(&mut self, ctx: &egui::Context, path: &Path) -> Option<egui::TextureHandle> {
        self.thumbnails
            .entry(path.to_path_buf())
            .or_insert_with(|| load_thumbnail(ctx, path))
            .clone()
    }

    /// 渲染顶部：标题和搜索框
    fn render_header(&mut self, ui: &mut egui::Ui) {
        ui.add_space(12.0);
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new(config::APP_NAME)
                    .size(40.0)
                    .strong()
                    .color(egui::Color32::WHITE),
            );
        });
        ui.add_space(8.0);
        ui.add_sized(
            egui::vec2(ui.available_width(), 36.0),
            egui::TextEdit::singleline(&mut self.search_query).hint_text("🔍 搜索历史..."),
        );
        ui.add_space(12.0);
    }

    /// 渲染左栏：日期列表和操作按钮
    fn render_dates(&mut self, ui: &mut egui::Ui) {
        let searching = !self.search_query.is_empty();
        let today = Local::now().date_naive();

        ui.label(egui::RichText::new("日期").size(16.0).strong());
        ui.add_space(8.0);

        let button_height = 44.0;
        let list_height = (ui.available_height() - button_height * 3.0 - 40.0).max(80.0);

        ui.add_enabled_ui(!searching, |ui| {
            egui::ScrollArea::vertical()
                .id_salt("date_list")
                .max_height(list_height)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    if self.index.is_empty() {
                        ui.label(egui::RichText::new("暂无记录").color(MUTED));
                    }
                    let dates: Vec<NaiveDate> = self.index.dates().collect();
                    for date in dates {
                        let selected = self.selected_date == Some(date);
                        let label = egui::RichText::new(date_label(date, today)).size(14.0);
                        if ui
                            .add_sized(
                                egui::vec2(ui.available_width(), 32.0),
                                egui::SelectableLabel::new(selected, label),
                            )
                            .clicked()
                        {
                            self.selected_date = Some(date);
                        }
                    }
                });
        });

        ui.add_space(12.0);

        let width = ui.available_width();
        let can_clear = !searching && self.selected_date.is_some();
        if ui
            .add_enabled(
                can_clear,
                egui::Button::new(egui::RichText::new("清除所选").size(14.0))
                    .fill(DANGER)
                    .min_size(egui::vec2(width, button_height)),
            )
            .clicked()
        {
            self.clear_selected_date();
        }

        if ui
            .add_enabled(
                !self.index.is_empty(),
                egui::Button::new(egui::RichText::new("清空全部").size(14.0))
                    .min_size(egui::vec2(width, button_height)),
            )
            .clicked()
        {
            self.confirm_clear_all = true;
        }

        if ui
            .add(
                egui::Button::new(egui::RichText::new("📂 打开数据目录").size(14.0))
                    .fill(ACCENT)
                    .min_size(egui::vec2(width, button_height)),
            )
            .clicked()
        {
            open_directory(&self.storage_root);
        }
    }

    /// 渲染右栏：条目列表或搜索结果
    fn render_entries(&mut self, ui: &mut egui::Ui) {
        let searching = !self.search_query.is_empty();

        let (heading, entries): (String, Vec<Entry>) = if searching {
            let hits: Vec<Entry> = self.index.search(&self.search_query).into_iter().cloned().collect();
            (format!("搜索结果（{}）", hits.len()), hits)
        } else {
            let entries = self
                .selected_date
                .and_then(|date| self.index.bucket(date))
                .map(|bucket| bucket.entries.clone())
                .unwrap_or_default();
            ("历史".to_string(), entries)
        };

        ui.label(egui::RichText::new(heading).size(16.0).strong());
        ui.add_space(8.0);

        let mut copied = None;
        egui::ScrollArea::vertical()
            .id_salt("entry_list")
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                if entries.is_empty() {
                    let hint = if searching { "没有匹配的文本" } else { "复制文本或图片后会显示在这里" };
                    ui.label(egui::RichText::new(hint).color(MUTED));
                }
                for entry in &entries {
                    if self.render_entry(ui, entry, searching) {
                        copied = Some(entry.clone());
                    }
                }
            });

        if let Some(entry) = copied {
            self.copy_back(&entry);
        }
    }

    /// 渲染单个条目，返回是否被双击
    fn render_entry(&mut self, ui: &mut egui::Ui, entry: &Entry, with_date: bool) -> bool {
        let time = if with_date {
            format!("[{} {}]", entry.date().format("%m-%d"), entry.time_label())
        } else {
            format!("[{}]", entry.time_label())
        };

        let response = egui::Frame::none()
            .inner_margin(egui::Margin::symmetric(10.0, 6.0))
            .rounding(egui::Rounding::same(5.0))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(time).color(MUTED).monospace());
                    match &entry.payload {
                        Payload::Text(text) => {
                            ui.label(preview(text, config::PREVIEW_CHARS));
                        }
                        Payload::Image(path) => match self.thumbnail(ui.ctx(), path) {
                            Some(texture) => {
                                ui.label("图片");
                                ui.add(
                                    egui::Image::from_texture(egui::load::SizedTexture::from_handle(&texture))
                                        .max_size(egui::vec2(config::THUMBNAIL_SIZE, config::THUMBNAIL_SIZE)),
                                );
                            }
                            None => {
                                ui.label(egui::RichText::new("图片不可用").color(MUTED));
                            }
                        },
                    }
                });
            })
            .response
            .interact(egui::Sense::click());

        let response = match &entry.payload {
            Payload::Text(text) => response.on_hover_text(text.as_str()),
            Payload::Image(path) => response.on_hover_text(path.display().to_string()),
        };
        ui.separator();

        response.double_clicked()
    }

    /// 渲染“清空全部”确认框
    fn render_confirm_clear_all(&mut self, ctx: &egui::Context) {
        if !self.confirm_clear_all {
            return;
        }

        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new("确认清空")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("确定要清空全部历史吗？图片文件也会被删除。");
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.add(egui::Button::new("清空").fill(DANGER)).clicked() {
                        confirmed = true;
                    }
                    if ui.button("取消").clicked() {
                        cancelled = true;
                    }
                });
            });

        if confirmed {
            self.clear_all();
        }
        if confirmed || cancelled {
            self.confirm_clear_all = false;
        }
    }
}

impl eframe::App for ClipItApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_monitor_events();
        self.intercept_close(ctx);

        // 清除过期的状态消息
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= config::STATUS_MESSAGE_TTL {
                self.status_message = None;
            }
        }

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::none().inner_margin(egui::Margin::symmetric(20.0, 0.0)))
            .show(ctx, |ui| self.render_header(ui));

        if let Some((msg, _)) = &self.status_message {
            let msg = msg.clone();
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.label(egui::RichText::new(msg).color(egui::Color32::WHITE));
            });
            ctx.request_repaint_after(config::STATUS_MESSAGE_TTL);
        }

        egui::SidePanel::left("dates")
            .exact_width(250.0)
            .resizable(false)
            .frame(pane_frame())
            .show(ctx, |ui| self.render_dates(ui));

        egui::CentralPanel::default()
            .frame(pane_frame())
            .show(ctx, |ui| self.render_entries(ui));

        self.render_confirm_clear_all(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
    }
}

fn pane_frame() -> egui::Frame {
    egui::Frame::none()
        .fill(egui::Color32::from_rgb(45, 45, 45))
        .rounding(egui::Rounding::same(10.0))
        .inner_margin(egui::Margin::same(12.0))
        .outer_margin(egui::Margin::same(10.0))
}

/// 托盘事件处理
///
/// 在托盘回调中直接执行，不依赖界面循环：窗口隐藏时 `update` 不会被调用。
fn tray_handler(
    window: WindowControl,
    store: Arc<Mutex<Store>>,
    storage_root: PathBuf,
) -> impl Fn(TrayEvent) + Send + Sync + 'static {
    move |event| match event {
        TrayEvent::ToggleWindow => window.toggle(),
        TrayEvent::ShowWindow => window.show(),
        TrayEvent::OpenDataDir => open_directory(&storage_root),
        TrayEvent::Quit => exit_from_tray(&store),
    }
}

/// 等待进行中的写入完成后结束进程
fn exit_from_tray(store: &Mutex<Store>) -> ! {
    info!("正在退出...");
    let _guard = store.lock().unwrap_or_else(PoisonError::into_inner);
    process::exit(0)
}

/// 监听线程上的失败通知
fn notify_failure(notifier: &Notifier, event: &MonitorEvent) {
    match event {
        MonitorEvent::StoreFailed(msg) => notifier.show("保存失败", msg),
        MonitorEvent::ClipboardUnavailable(msg) => notifier.show("剪贴板不可用", msg),
        MonitorEvent::Captured(_) => {}
    }
}

/// 日期列表中的显示名
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "今天".to_string()
    } else if today.pred_opt() == Some(date) {
        "昨天".to_string()
    } else {
        date.format("%b %d, %Y").to_string()
    }
}

/// 重新加载后保留原来的选中日期；该日期已不存在时选中最近的日期
pub fn resolve_selection(index: &HistoryIndex, previous: Option<NaiveDate>) -> Option<NaiveDate> {
    previous
        .filter(|date| index.bucket(*date).is_some())
        .or_else(|| index.dates().next())
}

/// 读取图片并生成缩略图纹理，失败时返回 `None`
fn load_thumbnail(ctx: &egui::Context, path: &Path) -> Option<egui::TextureHandle> {
    let image = match image::open(path) {
        Ok(image) => image,
        Err(e) => {
            warn!("无法读取图片 {}: {}", path.display(), e);
            return None;
        }
    };

    // 按两倍尺寸缩放，高分屏上更清晰
    let max_side = (config::THUMBNAIL_SIZE * 2.0) as u32;
    let pixels = image.thumbnail(max_side, max_side).to_rgba8();
    let size = [pixels.width() as usize, pixels.height() as usize];
    let color = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());

    Some(ctx.load_texture(path.to_string_lossy(), color, egui::TextureOptions::LINEAR))
}

/// 配置深色主题
fn configure_dark_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = egui::Visuals::dark();

    // 圆角设置
    style.visuals.window_rounding = egui::Rounding::same(10.0);
    style.visuals.widgets.noninteractive.rounding = egui::Rounding::same(5.0);
    style.visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    style.visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    style.visuals.widgets.active.rounding = egui::Rounding::same(8.0);

    // 颜色
    style.visuals.panel_fill = egui::Color32::from_rgb(30, 30, 30);
    style.visuals.extreme_bg_color = egui::Color32::from_rgb(45, 45, 45);
    style.visuals.selection.bg_fill = ACCENT;
    style.visuals.hyperlink_color = ACCENT;
    style.visuals.widgets.noninteractive.fg_stroke.color = egui::Color32::from_rgb(204, 204, 204);

    // 间距
    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);

    ctx.set_style(style);
}

/// 加载系统中文字体，egui 自带字体不含中文字形
fn install_cjk_font(ctx: &egui::Context) {
    const CANDIDATES: &[&str] = &[
        "C:\\Windows\\Fonts\\msyh.ttc",
        "C:\\Windows\\Fonts\\simhei.ttf",
        "/System/Library/Fonts/PingFang.ttc",
        "/System/Library/Fonts/STHeiti Medium.ttc",
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    ];

    let Some(bytes) = CANDIDATES.iter().find_map(|path| std::fs::read(path).ok()) else {
        warn!("未找到中文字体，界面文字可能无法显示");
        return;
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("cjk".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts.families.entry(family).or_default().push("cjk".to_owned());
    }
    ctx.set_fonts(fonts);
}

/// 打开目录
pub fn open_directory(path: &Path) {
    #[cfg(windows)]
    let result = std::process::Command::new("explorer").arg(path).spawn();
    #[cfg(target_os = "macos")]
    let result = std::process::Command::new("open").arg(path).spawn();
    #[cfg(all(unix, not(target_os = "macos")))]
    let result = std::process::Command::new("xdg-open").arg(path).spawn();

    if let Err(e) = result {
        warn!("无法打开目录 {}: {}", path.display(), e);
    }
}

/// 启动 GUI
pub fn run_gui(store: Store) -> eframe::Result<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config::APP_NAME)
            .with_inner_size([900.0, 650.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        config::APP_NAME,
        native_options,
        Box::new(move |cc| Ok(Box::new(ClipItApp::new(cc, store)?))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::parse_timestamp;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_date_labels() {
        let today = date("2024-03-10");
        assert_eq!(date_label(today, today), "今天");
        assert_eq!(date_label(date("2024-03-09"), today), "昨天");
        assert_eq!(date_label(date("2024-01-02"), today), "Jan 02, 2024");
    }

    #[test]
    fn test_selection_is_kept_when_date_survives() {
        let index = HistoryIndex::from_entries(vec![
            Entry::text(parse_timestamp("2024-01-01T10:00:00").unwrap(), "a"),
            Entry::text(parse_timestamp("2024-01-02T10:00:00").unwrap(), "b"),
        ]);
        assert_eq!(resolve_selection(&index, Some(date("2024-01-01"))), Some(date("2024-01-01")));
    }

    #[test]
    fn test_selection_falls_back_to_newest_date() {
        let index = HistoryIndex::from_entries(vec![
            Entry::text(parse_timestamp("2024-01-01T10:00:00").unwrap(), "a"),
            Entry::text(parse_timestamp("2024-01-02T10:00:00").unwrap(), "b"),
        ]);
        assert_eq!(resolve_selection(&index, Some(date("2023-12-31"))), Some(date("2024-01-02")));
        assert_eq!(resolve_selection(&index, None), Some(date("2024-01-02")));
        assert_eq!(resolve_selection(&HistoryIndex::default(), None), None);
    }

    #[test]
    fn test_tray_toggle_acts_without_frame() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Mutex::new(Store::open(dir.path()).unwrap()));
        let window = WindowControl::new(egui::Context::default(), "test-window");
        let handle = tray_handler(window.clone(), store, dir.path().to_path_buf());

        handle(TrayEvent::ToggleWindow);
        assert!(!window.is_visible());

        handle(TrayEvent::ToggleWindow);
        assert!(window.is_visible());

        window.hide();
        handle(TrayEvent::ShowWindow);
        assert!(window.is_visible());
    }
}
