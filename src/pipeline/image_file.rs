// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/pipeline/image_file.rs - 图片检测流水线
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

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  media::UploadedFile,
  model::{DetectResult, InferOptions, MediaSource, Model},
  output::Draw,
  pipeline::{DecodeError, RenderedImage, RequestError},
};

pub const ORIGINAL_CAPTION: &str = "Uploaded Image";
pub const ANNOTATED_CAPTION: &str = "Detection Results";

/// 图片请求的结果：原图总会展示，检测失败时只缺少标注图
#[derive(Debug)]
pub struct ImageReport {
  pub original: RenderedImage,
  pub detection: Result<ImageDetection, RequestError>,
}

#[derive(Debug)]
pub struct ImageDetection {
  pub annotated: RenderedImage,
  pub detections: DetectResult,
}

impl ImageReport {
  /// 按展示顺序列出所有图片
  pub fn rendered(&self) -> Vec<&RenderedImage> {
    let mut images = vec![&self.original];
    if let Ok(detection) = &self.detection {
      images.push(&detection.annotated);
    }
    images
  }
}

/// 解码上传的图片、推理并绘制结果
///
/// 解码失败时整个请求失败；推理失败时仍返回原图。
pub fn run_image(
  model: &dyn Model,
  draw: &Draw,
  file: &UploadedFile,
  confidence: f32,
) -> Result<ImageReport, RequestError> {
  info!("处理图片 {} ({} 字节)", file.name(), file.content().len());

  let frame: RgbImage = image::load_from_memory(file.content())
    .map_err(|source| {
      warn!("图片 {} 解码失败: {}", file.name(), source);
      DecodeError {
        name: file.name().to_string(),
        source,
      }
    })?
    .to_rgb8();
  info!("图片尺寸: {}x{}", frame.width(), frame.height());

  let original = RenderedImage::encode(ORIGINAL_CAPTION, &frame)?;
  let detection = detect(model, draw, &frame, confidence);
  if let Err(e) = &detection {
    warn!("图片 {} 检测失败: {}", file.name(), e);
  }

  Ok(ImageReport {
    original,
    detection,
  })
}

fn detect(
  model: &dyn Model,
  draw: &Draw,
  frame: &RgbImage,
  confidence: f32,
) -> Result<ImageDetection, RequestError> {
  let options = InferOptions {
    confidence,
    persist_output: false,
  };
  let prediction = model.infer(MediaSource::Frame(frame), &options)?;
  let detections = prediction.first_frame();
  info!("检测到 {} 个对象", detections.len());

  let annotated = draw.annotate(frame, &detections);
  Ok(ImageDetection {
    annotated: RenderedImage::encode(ANNOTATED_CAPTION, &annotated)?,
    detections,
  })
}
