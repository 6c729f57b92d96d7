// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/pipeline.rs - 请求处理流水线
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

use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

use crate::{
  model::InferenceError,
  output::{data_uri, encode_png, push_data_uri},
};

mod image_file;
mod video_file;

pub use self::image_file::{ImageDetection, ImageReport, run_image};
pub use self::video_file::{VideoDetection, VideoReport, run_video};

#[derive(Error, Debug)]
#[error("{name} is not a valid image: {source}")]
pub struct DecodeError {
  pub name: String,
  #[source]
  pub source: image::ImageError,
}

#[derive(Error, Debug)]
#[error("failed to store upload at {path}: {source}")]
pub struct StorageError {
  pub path: PathBuf,
  #[source]
  pub source: std::io::Error,
}

/// 单个请求内可恢复的错误，转换为用户可见的消息
#[derive(Error, Debug)]
pub enum RequestError {
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Inference(#[from] InferenceError),
  #[error(transparent)]
  Storage(#[from] StorageError),
  #[error("failed to render result: {0}")]
  Render(#[from] image::ImageError),
  #[error("detection aborted: {0}")]
  Aborted(String),
}

/// 页面上展示的一张图片
#[derive(Debug, Clone)]
pub struct RenderedImage {
  pub caption: &'static str,
  pub png: Vec<u8>,
}

impl RenderedImage {
  pub fn encode(caption: &'static str, image: &RgbImage) -> Result<Self, image::ImageError> {
    Ok(Self {
      caption,
      png: encode_png(image)?,
    })
  }

  pub fn data_uri(&self) -> String {
    data_uri("image/png", &self.png)
  }
}

/// 页面上展示的一段视频
#[derive(Debug, Clone)]
pub struct RenderedVideo {
  pub mime: &'static str,
  pub bytes: Vec<u8>,
}

impl RenderedVideo {
  pub fn push_data_uri(&self, out: &mut String) {
    push_data_uri(out, self.mime, &self.bytes)
  }
}
