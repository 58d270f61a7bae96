//! 剪贴板轮询模块
//!
//! `ClipboardPoller` 负责判断剪贴板内容是否变化：
//! - 内容为空或与上次记录的相同时不产生捕获
//! - 读取失败直接跳过，下一次轮询自然重试
//! - 只有写入存储成功后才 `commit`，写入失败的内容下次轮询会再次尝试
//!
//! `Monitor` 在独立线程上按固定间隔驱动轮询器，把新内容写入存储，
//! 并把事件发给回调和界面通道。

use std::fs;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::clipboard::{sha256, ClipboardContent, ClipboardError, ClipboardSource};
use crate::entry::{Entry, Payload};
use crate::store::{Capture, Store};

/// 用于比较的内容指纹
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fingerprint {
    Text(String),
    Image([u8; 32]),
}

impl Fingerprint {
    fn of(content: &ClipboardContent) -> Self {
        match content {
            ClipboardContent::Text(text) => Fingerprint::Text(text.clone()),
            ClipboardContent::Image(image) => Fingerprint::Image(image.digest()),
        }
    }
}

/// 剪贴板轮询器
///
/// 持有“上次记录的内容”，按内容（而非引用）比较。
#[derive(Debug, Default)]
pub struct ClipboardPoller {
    last_seen: Option<Fingerprint>,
    /// 最近一次写入失败的内容，同一内容只提示一次
    failed: Option<Fingerprint>,
}

impl ClipboardPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以历史中最新的条目作为“上次捕获”，避免重启后重复记录
    ///
    /// 图片条目读取文件计算摘要；文件无法读取时不预置。
    pub fn primed(latest: Option<&Entry>) -> Self {
        let last_seen = latest.and_then(|entry| match &entry.payload {
            Payload::Text(text) => Some(Fingerprint::Text(text.clone())),
            Payload::Image(path) => match fs::read(path) {
                Ok(bytes) => Some(Fingerprint::Image(sha256(&bytes))),
                Err(e) => {
                    debug!("无法读取最新图片 {}: {}", path.display(), e);
                    None
                }
            },
        });
        Self {
            last_seen,
            failed: None,
        }
    }

    /// 轮询一次，使用当前本地时间
    pub fn tick<S: ClipboardSource + ?Sized>(&self, source: &mut S) -> Option<Capture> {
        self.tick_at(source, Local::now().naive_local())
    }

    /// 轮询一次，使用给定时间
    pub fn tick_at<S: ClipboardSource + ?Sized>(
        &self,
        source: &mut S,
        now: NaiveDateTime,
    ) -> Option<Capture> {
        match source.read() {
            Ok(Some(content)) => self.observe(content, now),
            Ok(None) => None,
            Err(e) => {
                debug!("本次读取剪贴板失败: {}", e);
                None
            }
        }
    }

    /// 处理一次读取结果，内容与上次记录不同时返回新的捕获
    ///
    /// 返回的捕获在 `commit` 之前不算记录过。
    pub fn observe(&self, content: ClipboardContent, now: NaiveDateTime) -> Option<Capture> {
        if content.is_empty() {
            return None;
        }

        if self.last_seen.as_ref() == Some(&Fingerprint::of(&content)) {
            return None;
        }

        Some(Capture {
            captured_at: now,
            content,
        })
    }

    /// 捕获已写入存储，之后相同内容不再产生捕获
    pub fn commit(&mut self, capture: &Capture) {
        self.last_seen = Some(Fingerprint::of(&capture.content));
        self.failed = None;
    }

    /// 记录一次写入失败，同一内容第一次失败时返回 `true`
    pub fn record_failure(&mut self, capture: &Capture) -> bool {
        let fingerprint = Fingerprint::of(&capture.content);
        if self.failed.as_ref() == Some(&fingerprint) {
            return false;
        }
        self.failed = Some(fingerprint);
        true
    }
}

/// 监听线程发给界面的事件
#[derive(Debug)]
pub enum MonitorEvent {
    /// 新条目已写入存储
    Captured(Entry),
    /// 写入失败，本次内容被放弃（同一内容连续失败只发送一次）
    StoreFailed(String),
    /// 无法打开剪贴板，监听线程已退出
    ClipboardUnavailable(String),
}

/// 剪贴板监听器
pub struct Monitor {
    poller: ClipboardPoller,
    store: Arc<Mutex<Store>>,
    interval: Duration,
}

/// 监听线程句柄，drop 时停止线程
pub struct MonitorHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(poller: ClipboardPoller, store: Arc<Mutex<Store>>, interval: Duration) -> Self {
        Self {
            poller,
            store,
            interval,
        }
    }

    /// 启动监听线程
    ///
    /// 剪贴板在线程内创建（部分平台的剪贴板句柄不能跨线程）。
    /// `on_event` 在监听线程上对每个事件调用，窗口隐藏时界面循环不运行，
    /// 需要立即让用户看到的提示（如桌面通知）在这里处理。
    pub fn spawn<S, F, E>(self, open_source: F, on_event: E) -> io::Result<(MonitorHandle, Receiver<MonitorEvent>)>
    where
        S: ClipboardSource,
        F: FnOnce() -> Result<S, ClipboardError> + Send + 'static,
        E: Fn(&MonitorEvent) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let thread = thread::Builder::new()
            .name("clipboard-monitor".into())
            .spawn(move || {
                let mut source = match open_source() {
                    Ok(source) => source,
                    Err(e) => {
                        error!("剪贴板监听无法启动: {}", e);
                        let event = MonitorEvent::ClipboardUnavailable(e.to_string());
                        on_event(&event);
                        let _ = event_tx.send(event);
                        return;
                    }
                };
                self.run(&mut source, &stop_rx, &event_tx, &on_event);
            })?;

        Ok((
            MonitorHandle {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    fn run<S: ClipboardSource>(
        mut self,
        source: &mut S,
        stop_rx: &Receiver<()>,
        events: &Sender<MonitorEvent>,
        on_event: &dyn Fn(&MonitorEvent),
    ) {
        info!("剪贴板监听已启动，间隔 {:?}", self.interval);

        loop {
            // 超时即为一次定时触发；收到消息或发送端关闭都表示停止
            match stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }

            let Some(capture) = self.poller.tick(source) else {
                continue;
            };

            let result = match self.store.lock() {
                Ok(store) => store.append(&capture),
                Err(_) => {
                    error!("存储锁已损坏，停止监听");
                    break;
                }
            };

            let event = match result {
                Ok(entry) => {
                    self.poller.commit(&capture);
                    MonitorEvent::Captured(entry)
                }
                Err(e) if self.poller.record_failure(&capture) => {
                    warn!("保存剪贴板内容失败: {}", e);
                    MonitorEvent::StoreFailed(e.to_string())
                }
                Err(e) => {
                    debug!("保存剪贴板内容仍然失败: {}", e);
                    continue;
                }
            };

            on_event(&event);
            if events.send(event).is_err() {
                break;
            }
        }

        info!("剪贴板监听已停止");
    }
}

impl MonitorHandle {
    /// 停止监听线程并等待其退出
    pub fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
