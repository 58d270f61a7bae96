//! 配置模块
//!
//! 定义 ClipIt 的所有配置项，包括存储路径、轮询间隔、界面尺寸等。

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// 应用名称
pub const APP_NAME: &str = "ClipIt";

/// 应用版本
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 存储目录环境变量，设置后覆盖默认位置
pub const STORAGE_ROOT_ENV: &str = "CLIPIT_HOME";

/// 默认存储目录名（位于用户主目录下，隐藏目录）
///
/// 沿用旧版剪贴板历史工具的目录，已有的历史和图片可以直接读取。
pub const STORAGE_DIR_NAME: &str = ".ClipboardHistoryApp";

/// 历史记录文件名
pub const LOG_FILE_NAME: &str = "history.csv";

/// 图片子目录名
pub const IMAGES_DIR_NAME: &str = "images";

/// 运行日志文件名
pub const TRACE_FILE_NAME: &str = "clipit.log";

/// 剪贴板轮询间隔
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 列表中文本预览的最大字符数
pub const PREVIEW_CHARS: usize = 50;

/// 图片缩略图的最大边长（像素）
pub const THUMBNAIL_SIZE: f32 = 200.0;

/// 窗口内状态消息的显示时长
pub const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// 获取存储根目录
///
/// 默认: ~/.ClipboardHistoryApp/
/// 设置 CLIPIT_HOME 后使用该路径。
pub fn storage_root() -> PathBuf {
    resolve_storage_root(env::var_os(STORAGE_ROOT_ENV), dirs::home_dir())
}

fn resolve_storage_root(overridden: Option<OsString>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = overridden.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    home.unwrap_or_else(|| PathBuf::from("."))
        .join(STORAGE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_is_hidden_dir_in_home() {
        let root = resolve_storage_root(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(root, PathBuf::from("/home/alice/.ClipboardHistoryApp"));
    }

    #[test]
    fn test_env_override_wins() {
        let root = resolve_storage_root(
            Some(OsString::from("/tmp/clips")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(root, PathBuf::from("/tmp/clips"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let root = resolve_storage_root(Some(OsString::new()), None);
        assert_eq!(root, PathBuf::from(".").join(".ClipboardHistoryApp"));
    }
}
