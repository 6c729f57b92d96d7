// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/media.rs - 上传文件与媒体类型判定
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use axum::body::Bytes;

/// 图片扩展名（小写，不含点）
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
/// 视频扩展名（小写，不含点）
pub const VIDEO_EXTENSIONS: [&str; 1] = ["mp4"];

/// 媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  /// 图片文件
  Image,
  /// 视频文件
  Video,
  /// 不支持的格式
  Unsupported,
}

/// 按扩展名（不区分大小写）判定媒体类型
pub fn classify(filename: &str) -> MediaKind {
  match extension_of(filename) {
    Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Image,
    Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Video,
    _ => MediaKind::Unsupported,
  }
}

/// 上传控件的 accept 属性，例如 `.jpg,.jpeg,.png,.mp4`
pub fn accept_attribute() -> String {
  IMAGE_EXTENSIONS
    .iter()
    .chain(VIDEO_EXTENSIONS.iter())
    .map(|ext| format!(".{}", ext))
    .collect::<Vec<_>>()
    .join(",")
}

fn extension_of(filename: &str) -> Option<String> {
  Path::new(filename)
    .extension()
    .and_then(|ext| ext.to_str())
    .map(str::to_ascii_lowercase)
}

/// 用户上传的文件，请求结束后丢弃
#[derive(Debug, Clone)]
pub struct UploadedFile {
  name: String,
  content: Bytes,
  extension: Option<String>,
}

impl UploadedFile {
  pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
    let name = name.into();
    let extension = extension_of(&name);
    Self {
      name,
      content: content.into(),
      extension,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn content(&self) -> &Bytes {
    &self.content
  }

  pub fn extension(&self) -> Option<&str> {
    self.extension.as_deref()
  }

  pub fn kind(&self) -> MediaKind {
    classify(&self.name)
  }
}
