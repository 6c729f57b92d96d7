// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::model::{DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_TEXT_HORIZONTAL_PADDING: u32 = 4;
const BOX_THICKNESS: i32 = 2;
const TEXT_COLOR: [u8; 3] = [255, 255, 255];

// 按类别轮换的边框颜色
const PALETTE: [[u8; 3]; 8] = [
  [255, 56, 56],
  [255, 157, 151],
  [255, 112, 31],
  [255, 178, 29],
  [72, 249, 10],
  [26, 147, 52],
  [0, 212, 187],
  [0, 24, 236],
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

/// 检测框绘制器
///
/// 未配置字体时只画边框，不画标签文字。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new()
  }
}

impl Draw {
  pub fn new() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
    }
  }

  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|_| DrawError::InvalidFont(path.display().to_string()))?;
    info!("加载标签字体: {}", path.display());
    Ok(Self {
      font: Some(font),
      font_size: LABEL_FONT_SIZE,
    })
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 返回绘制了检测结果的副本，原图不变
  pub fn annotate(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut annotated = image.clone();
    self.draw_detections_on_image(&mut annotated, result);
    annotated
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      self.draw_item(image, item);
    }
  }

  fn draw_item(&self, image: &mut RgbImage, item: &DetectItem) {
    let Some((x_min, y_min, x_max, y_max)) = pixel_box(image, &item.bbox) else {
      return;
    };
    let color = Rgb(color_for(item.class_id));

    // 向内加粗边框
    for t in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", item.label, item.score);
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &label);
    let tag_width = text_width + 2 * LABEL_TEXT_HORIZONTAL_PADDING;
    let tag_height = text_height + 2 * LABEL_TEXT_VERTICAL_PADDING as u32;

    // 标签放在边框上方，放不下时贴着图像顶部
    let tag_x = x_min;
    let tag_y = (y_min - tag_height as i32).max(0);
    let tag_width = tag_width.min(image.width().saturating_sub(tag_x as u32));
    if tag_width == 0 {
      return;
    }

    draw_filled_rect_mut(
      image,
      Rect::at(tag_x, tag_y).of_size(tag_width, tag_height),
      color,
    );
    draw_text_mut(
      image,
      Rgb(TEXT_COLOR),
      tag_x + LABEL_TEXT_HORIZONTAL_PADDING as i32,
      tag_y + LABEL_TEXT_VERTICAL_PADDING,
      scale,
      font,
      &label,
    );
  }
}

fn color_for(class_id: u32) -> [u8; 3] {
  PALETTE[class_id as usize % PALETTE.len()]
}

/// 归一化坐标 [x_min, y_min, x_max, y_max] 转为像素坐标，退化的框返回 None
fn pixel_box(image: &RgbImage, bbox: &[f32; 4]) -> Option<(i32, i32, i32, i32)> {
  let (w, h) = (image.width() as i32, image.height() as i32);
  if w == 0 || h == 0 {
    return None;
  }

  let x_min = ((bbox[0] * w as f32).floor() as i32).clamp(0, w - 1);
  let y_min = ((bbox[1] * h as f32).floor() as i32).clamp(0, h - 1);
  let x_max = ((bbox[2] * w as f32).ceil() as i32).clamp(0, w - 1);
  let y_max = ((bbox[3] * h as f32).ceil() as i32).clamp(0, h - 1);

  if x_min >= x_max || y_min >= y_max {
    return None;
  }
  Some((x_min, y_min, x_max, y_max))
}
