//! 剪贴板模块
//!
//! 提供剪贴板读写功能，用于：
//! - 轮询时读取当前剪贴板内容（文本或图片）
//! - 双击历史条目时把内容写回剪贴板

use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use arboard::{Clipboard, ImageData};
use image::{ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// 剪贴板错误
#[derive(Debug, Clone, Error)]
pub enum ClipboardError {
    #[error("无法初始化剪贴板: {0}")]
    Unavailable(String),

    #[error("读取剪贴板失败: {0}")]
    Read(String),

    #[error("写入剪贴板失败: {0}")]
    Write(String),
}

/// PNG 编码后的图片
#[derive(Debug, Clone)]
pub struct PngImage {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
    digest: [u8; 32],
}

impl PngImage {
    /// 包装已经编码好的 PNG 数据
    pub fn new(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        let digest = sha256(&bytes);
        Self {
            width,
            height,
            bytes,
            digest,
        }
    }

    /// 从 RGBA 像素编码为 PNG
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ClipboardError> {
        let pixels = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| ClipboardError::Read(format!("图片数据与尺寸不符: {}x{}", width, height)))?;

        let mut bytes = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ClipboardError::Read(format!("PNG 编码失败: {}", e)))?;

        Ok(Self::new(width, height, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// PNG 数据的 SHA-256 摘要
    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() || self.width == 0 || self.height == 0
    }
}

/// 一次剪贴板读取的结果
#[derive(Debug, Clone)]
pub enum ClipboardContent {
    Text(String),
    Image(PngImage),
}

impl ClipboardContent {
    pub fn is_empty(&self) -> bool {
        match self {
            ClipboardContent::Text(text) => text.is_empty(),
            ClipboardContent::Image(image) => image.is_empty(),
        }
    }
}

/// 剪贴板读取接口
///
/// 轮询器只依赖这个接口，方便在测试中替换。
pub trait ClipboardSource {
    /// 读取当前剪贴板内容，剪贴板为空或格式不支持时返回 `Ok(None)`
    fn read(&mut self) -> Result<Option<ClipboardContent>, ClipboardError>;
}

/// 基于 arboard 的系统剪贴板
pub struct SystemClipboard {
    inner: Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self { inner })
    }

    /// 写入文本
    pub fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.inner
            .set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }

    /// 读取图片文件并写入剪贴板
    pub fn write_image_file(&mut self, path: &Path) -> Result<(), ClipboardError> {
        let pixels = image::open(path)
            .map_err(|e| ClipboardError::Write(format!("无法打开图片 {}: {}", path.display(), e)))?
            .to_rgba8();

        let (width, height) = pixels.dimensions();
        let data = ImageData {
            width: width as usize,
            height: height as usize,
            bytes: Cow::Owned(pixels.into_raw()),
        };

        self.inner
            .set_image(data)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

impl ClipboardSource for SystemClipboard {
    fn read(&mut self) -> Result<Option<ClipboardContent>, ClipboardError> {
        // 图片优先：截图工具通常同时提供图片和文本
        match self.inner.get_image() {
            Ok(data) => {
                let image = PngImage::from_rgba(
                    data.width as u32,
                    data.height as u32,
                    data.bytes.into_owned(),
                )?;
                return Ok(Some(ClipboardContent::Image(image)));
            }
            Err(arboard::Error::ContentNotAvailable) => {}
            Err(e) => debug!("读取剪贴板图片失败，尝试文本: {}", e),
        }

        match self.inner.get_text() {
            Ok(text) => Ok(Some(ClipboardContent::Text(text))),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }
}

/// 计算 SHA-256 摘要
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_from_rgba_is_decodable() {
        let rgba = vec![255u8; 2 * 3 * 4];
        let png = PngImage::from_rgba(2, 3, rgba).unwrap();

        let decoded = image::load_from_memory(png.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 3));
        assert!(!png.is_empty());
    }

    #[test]
    fn test_png_from_rgba_rejects_wrong_length() {
        let result = PngImage::from_rgba(4, 4, vec![0u8; 10]);
        assert!(matches!(result, Err(ClipboardError::Read(_))));
    }

    #[test]
    fn test_same_pixels_same_digest() {
        let a = PngImage::from_rgba(1, 1, vec![1, 2, 3, 255]).unwrap();
        let b = PngImage::from_rgba(1, 1, vec![1, 2, 3, 255]).unwrap();
        let c = PngImage::from_rgba(1, 1, vec![9, 2, 3, 255]).unwrap();

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest_hex().len(), 64);
    }

    #[test]
    fn test_empty_content() {
        assert!(ClipboardContent::Text(String::new()).is_empty());
        assert!(!ClipboardContent::Text("x".into()).is_empty());
        assert!(ClipboardContent::Image(PngImage::new(0, 0, Vec::new())).is_empty());
    }
}
