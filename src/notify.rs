//! 桌面通知模块
//!
//! 窗口隐藏在托盘时，复制成功、保存失败等消息通过系统通知显示。

use tracing::warn;

use crate::config;

/// 基于 notify-rust 的桌面通知
pub struct Notifier {
    app_name: String,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            app_name: config::APP_NAME.to_string(),
        }
    }

    /// 显示通知，失败只记录日志
    pub fn show(&self, summary: &str, body: &str) {
        let result = notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(summary)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(1500))
            .show();

        if let Err(e) = result {
            warn!("无法显示通知 \"{}\": {}", summary, e);
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
