// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output.rs - 输出定义
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

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};

pub mod draw;

pub use self::draw::{Draw, DrawError};

/// 编码为 PNG 字节
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(buffer.into_inner())
}

/// 生成可直接嵌入页面的 `data:` URI
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
  let mut uri = String::new();
  push_data_uri(&mut uri, mime, bytes);
  uri
}

/// 把 `data:` URI 直接追加到 `out`，大文件不再额外复制一份字符串
pub fn push_data_uri(out: &mut String, mime: &str, bytes: &[u8]) {
  out.reserve(mime.len() + 13 + bytes.len().div_ceil(3) * 4);
  out.push_str("data:");
  out.push_str(mime);
  out.push_str(";base64,");
  STANDARD.encode_string(bytes, out);
}
