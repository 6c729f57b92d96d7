// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model.rs - 模型
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

/// 默认置信度阈值
pub const DEFAULT_CONFIDENCE: f32 = 0.25;

/// 模型输入：内存中的 RGB 帧或磁盘上的媒体文件
#[derive(Debug, Clone, Copy)]
pub enum MediaSource<'a> {
  Frame(&'a RgbImage),
  File(&'a Path),
}

/// 单次推理参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferOptions {
  pub confidence: f32,
  /// 为真时由模型把标注后的副本写入其输出目录
  pub persist_output: bool,
}

impl Default for InferOptions {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      persist_output: false,
    }
  }
}

/// 预训练检测模型句柄，进程内只读共享
pub trait Model: Send + Sync {
  fn infer(
    &self,
    source: MediaSource<'_>,
    options: &InferOptions,
  ) -> Result<Prediction, InferenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// 一次推理的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
  /// 每帧的检测结果，图片只有一帧
  pub frames: Vec<DetectResult>,
  /// 持久化输出的位置（仅在 `persist_output` 时存在）
  pub saved_to: Option<PathBuf>,
}

impl Prediction {
  /// 第一帧的检测结果，没有帧时为空结果
  pub fn first_frame(&self) -> DetectResult {
    self.frames.first().cloned().unwrap_or_default()
  }

  pub fn total_detections(&self) -> usize {
    self.frames.iter().map(DetectResult::len).sum()
  }

  pub fn frames_with_detections(&self) -> usize {
    self.frames.iter().filter(|frame| !frame.is_empty()).count()
  }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("model file not found: {0}")]
  Missing(PathBuf),
  #[error("model path is not a regular file: {0}")]
  NotAFile(PathBuf),
  #[error("model file is empty: {0}")]
  Empty(PathBuf),
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("predictor `{program}` is not available: {reason}")]
  PredictorUnavailable { program: String, reason: String },
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("failed to prepare model input: {0}")]
  Input(String),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("failed to encode frame: {0}")]
  Encode(#[from] image::ImageError),
  #[error("failed to start predictor `{program}`: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("predictor exited with {status}: {stderr}")]
  Predictor { status: String, stderr: String },
  #[error("malformed detection record `{line}`")]
  MalformedRecord { line: String },
}

mod labels;
pub use self::labels::Labels;

#[cfg(feature = "model_ultralytics")]
mod ultralytics;
#[cfg(feature = "model_ultralytics")]
pub use self::ultralytics::{Ultralytics, UltralyticsBuilder};

#[cfg(test)]
mod tests {
  use super::*;

  fn item(score: f32) -> DetectItem {
    DetectItem {
      class_id: 0,
      label: "person".to_string(),
      score,
      bbox: [0.1, 0.1, 0.2, 0.2],
    }
  }

  #[test]
  fn prediction_summary_counts_frames() {
    let prediction = Prediction {
      frames: vec![
        DetectResult {
          items: vec![item(0.9), item(0.5)].into_boxed_slice(),
        },
        DetectResult::default(),
        DetectResult {
          items: vec![item(0.3)].into_boxed_slice(),
        },
      ],
      saved_to: None,
    };

    assert_eq!(prediction.total_detections(), 3);
    assert_eq!(prediction.frames_with_detections(), 2);
    assert_eq!(prediction.first_frame().len(), 2);
  }

  #[test]
  fn empty_prediction_has_empty_first_frame() {
    let prediction = Prediction::default();
    assert!(prediction.first_frame().is_empty());
    assert_eq!(prediction.total_detections(), 0);
  }

  #[test]
  fn default_options_use_quarter_confidence() {
    let options = InferOptions::default();
    assert_eq!(options.confidence, 0.25);
    assert!(!options.persist_output);
  }
}
