//! ClipIt - 复制过的每一段内容都能找回
//!
//! 主程序入口，负责：
//! 1. 准备存储目录
//! 2. 初始化日志
//! 3. 启动窗口（窗口内启动剪贴板监听和托盘）

// Windows: 隐藏控制台窗口
#![cfg_attr(
    all(target_os = "windows", not(debug_assertions)),
    windows_subsystem = "windows"
)]

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process;
use std::sync::Mutex;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clipit::{config, gui, Store};

fn main() {
    let root = config::storage_root();
    if let Err(e) = fs::create_dir_all(&root) {
        eprintln!("错误: 无法创建存储目录 {}: {}", root.display(), e);
        process::exit(1);
    }

    init_logging(&root);
    info!("{} {} 正在启动...", config::APP_NAME, config::APP_VERSION);

    let store = match Store::open(&root) {
        Ok(store) => store,
        Err(e) => {
            error!("无法初始化存储: {}", e);
            eprintln!("错误: 无法初始化存储: {}", e);
            process::exit(1);
        }
    };

    info!("存储目录: {}", store.root().display());

    if let Err(e) = gui::run_gui(store) {
        error!("窗口运行失败: {}", e);
        eprintln!("错误: 窗口运行失败: {}", e);
        process::exit(1);
    }

    info!("{} 已退出", config::APP_NAME);
}

/// 初始化日志：写入存储目录下的 clipit.log，打不开时退回到 stderr
///
/// 日志级别由 RUST_LOG 控制，默认 info。
fn init_logging(root: &Path) {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_path = root.join(config::TRACE_FILE_NAME);
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(e) => {
            eprintln!("警告: 无法打开日志文件 {}: {}", log_path.display(), e);
            tracing_subscriber::fmt().with_env_filter(filter()).init();
        }
    }
}
