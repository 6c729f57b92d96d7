// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model/ultralytics.rs - Ultralytics 预测器适配
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

//! Ultralytics 预测器适配
//!
//! 权重格式、解码、特征提取、NMS 以及视频编解码全部由外部的 `yolo`
//! 命令行预测器负责，本模块只负责组装命令行并读取它输出的标签文件。
//!
//! 标签文件每行一个目标，格式为 `class cx cy w h conf`，坐标为归一化值。
//! 图片输出为 `labels/<stem>.txt`，视频每帧输出为 `labels/<stem>_<帧号>.txt`。

use std::{
  fs, io,
  path::{Path, PathBuf},
  process::Command,
};

use chrono::Local;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  model::{
    DetectItem, DetectResult, InferOptions, InferenceError, Labels, MediaSource, Model,
    ModelLoadError, Prediction,
  },
  scratch::ScopedDir,
};

const DEFAULT_PROGRAM: &str = "yolo";
const DEFAULT_OUTPUT_DIR: &str = "runs/detect";
const STAGED_FRAME_NAME: &str = "frame.png";
const SCRATCH_RUN_NAME: &str = "predict";
const STDERR_TAIL: usize = 2000;

pub struct UltralyticsBuilder {
  weights: PathBuf,
  program: String,
  output_dir: PathBuf,
  scratch_dir: PathBuf,
  labels: Labels,
}

impl UltralyticsBuilder {
  pub fn new(weights: impl Into<PathBuf>) -> Self {
    Self {
      weights: weights.into(),
      program: DEFAULT_PROGRAM.to_string(),
      output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
      scratch_dir: std::env::temp_dir().join("shaobing"),
      labels: Labels::default(),
    }
  }

  pub fn program(mut self, program: impl Into<String>) -> Self {
    self.program = program.into();
    self
  }

  /// 持久化输出（标注后的视频）所在目录
  pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.output_dir = dir.into();
    self
  }

  /// 每次推理暂存输入帧的目录
  pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.scratch_dir = dir.into();
    self
  }

  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = labels;
    self
  }

  pub fn build(self) -> Result<Ultralytics, ModelLoadError> {
    info!("加载模型文件: {}", self.weights.display());
    let metadata = fs::metadata(&self.weights).map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        ModelLoadError::Missing(self.weights.clone())
      } else {
        ModelLoadError::Io {
          path: self.weights.clone(),
          source,
        }
      }
    })?;

    if !metadata.is_file() {
      return Err(ModelLoadError::NotAFile(self.weights));
    }
    if metadata.len() == 0 {
      return Err(ModelLoadError::Empty(self.weights));
    }
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    // 预测器可能在其他工作目录下解析路径，统一使用绝对路径
    let weights = fs::canonicalize(&self.weights).map_err(|source| ModelLoadError::Io {
      path: self.weights.clone(),
      source,
    })?;

    let version = probe_predictor(&self.program)?;
    info!("预测器 {} 版本: {}", self.program, version);
    info!("模型加载完成");

    Ok(Ultralytics {
      weights,
      program: self.program,
      output_dir: self.output_dir,
      scratch_dir: self.scratch_dir,
      labels: self.labels,
    })
  }
}

fn probe_predictor(program: &str) -> Result<String, ModelLoadError> {
  let output = Command::new(program)
    .arg("version")
    .output()
    .map_err(|e| ModelLoadError::PredictorUnavailable {
      program: program.to_string(),
      reason: e.to_string(),
    })?;

  if !output.status.success() {
    return Err(ModelLoadError::PredictorUnavailable {
      program: program.to_string(),
      reason: format!(
        "`{} version` exited with {}: {}",
        program,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      ),
    });
  }

  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// 已加载的 Ultralytics 模型
#[derive(Debug)]
pub struct Ultralytics {
  weights: PathBuf,
  program: String,
  output_dir: PathBuf,
  scratch_dir: PathBuf,
  labels: Labels,
}

impl Ultralytics {
  pub fn weights(&self) -> &Path {
    &self.weights
  }

  pub fn output_dir(&self) -> &Path {
    &self.output_dir
  }

  fn run_predictor(
    &self,
    source: &Path,
    project: &Path,
    name: &str,
    options: &InferOptions,
  ) -> Result<(), InferenceError> {
    let mut command = Command::new(&self.program);
    command
      .arg("detect")
      .arg("predict")
      .arg(format!("model={}", self.weights.display()))
      .arg(format!("source={}", source.display()))
      .arg(format!("conf={}", options.confidence))
      .arg(format!("project={}", project.display()))
      .arg(format!("name={}", name))
      .arg("exist_ok=True")
      .arg(format!("save={}", python_bool(options.persist_output)))
      .arg("save_txt=True")
      .arg("save_conf=True")
      .arg("verbose=False");

    debug!("执行预测器: {:?}", command);
    let output = command.output().map_err(|source| InferenceError::Spawn {
      program: self.program.clone(),
      source,
    })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let stderr = tail(stderr.trim(), STDERR_TAIL);
      warn!("预测器失败 ({}): {}", output.status, stderr);
      return Err(InferenceError::Predictor {
        status: output.status.to_string(),
        stderr: stderr.to_string(),
      });
    }

    Ok(())
  }
}

impl Model for Ultralytics {
  fn infer(
    &self,
    source: MediaSource<'_>,
    options: &InferOptions,
  ) -> Result<Prediction, InferenceError> {
    if !(0.0..=1.0).contains(&options.confidence) {
      return Err(InferenceError::Input(format!(
        "confidence {} is outside [0, 1]",
        options.confidence
      )));
    }

    let scratch = ScopedDir::create(&self.scratch_dir, "predict")?;

    let source_path = match source {
      MediaSource::Frame(frame) => {
        if frame.width() == 0 || frame.height() == 0 {
          return Err(InferenceError::Input("frame has no pixels".to_string()));
        }
        let staged = scratch.path().join(STAGED_FRAME_NAME);
        frame.save(&staged)?;
        staged
      }
      MediaSource::File(path) => {
        if !path.is_file() {
          return Err(InferenceError::Input(format!(
            "source {} is not a file",
            path.display()
          )));
        }
        path.to_path_buf()
      }
    };

    let (project, name) = if options.persist_output {
      fs::create_dir_all(&self.output_dir)?;
      (self.output_dir.clone(), run_name())
    } else {
      (scratch.path().to_path_buf(), SCRATCH_RUN_NAME.to_string())
    };

    let now = std::time::Instant::now();
    self.run_predictor(&source_path, &project, &name, options)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let run_dir = project.join(&name);
    let stem = source_path
      .file_stem()
      .and_then(|stem| stem.to_str())
      .unwrap_or_default();
    let frames = read_label_dir(
      &run_dir.join("labels"),
      stem,
      options.confidence,
      &self.labels,
    )?;

    let prediction = Prediction {
      frames,
      saved_to: options.persist_output.then_some(run_dir),
    };
    debug!(
      "检测到 {} 个物体，涉及 {} 帧",
      prediction.total_detections(),
      prediction.frames_with_detections()
    );

    Ok(prediction)
  }
}

fn python_bool(value: bool) -> &'static str {
  if value { "True" } else { "False" }
}

fn tail(text: &str, max: usize) -> &str {
  if text.len() <= max {
    return text;
  }
  let mut start = text.len() - max;
  while !text.is_char_boundary(start) {
    start += 1;
  }
  &text[start..]
}

fn run_name() -> String {
  let id = Uuid::new_v4().simple().to_string();
  format!("predict-{}-{}", Local::now().format("%Y%m%d-%H%M%S"), &id[..8])
}

/// 从标签文件名中取出帧号：`<stem>.txt` 为第 0 帧，`<stem>_<n>.txt` 为第 n 帧
fn frame_index(file_name: &str, stem: &str) -> Option<usize> {
  let rest = file_name.strip_suffix(".txt")?.strip_prefix(stem)?;
  if rest.is_empty() {
    return Some(0);
  }
  rest.strip_prefix('_')?.parse().ok()
}

/// 读取预测器输出的标签目录，按帧号排序
pub(crate) fn read_label_dir(
  dir: &Path,
  stem: &str,
  confidence: f32,
  labels: &Labels,
) -> Result<Vec<DetectResult>, InferenceError> {
  let entries = match fs::read_dir(dir) {
    Ok(entries) => entries,
    // 没有任何检测时预测器不会创建标签目录
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(e.into()),
  };

  let mut frames = Vec::new();
  for entry in entries {
    let entry = entry?;
    let file_name = entry.file_name();
    let Some(index) = file_name.to_str().and_then(|n| frame_index(n, stem)) else {
      continue;
    };
    let text = fs::read_to_string(entry.path())?;
    frames.push((index, parse_label_text(&text, confidence, labels)?));
  }

  frames.sort_by_key(|(index, _)| *index);
  Ok(frames.into_iter().map(|(_, frame)| frame).collect())
}

pub(crate) fn parse_label_text(
  text: &str,
  confidence: f32,
  labels: &Labels,
) -> Result<DetectResult, InferenceError> {
  let mut items = Vec::new();
  for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
    let item = parse_label_line(line, labels)?;
    if item.score >= confidence {
      items.push(item);
    }
  }
  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}

fn parse_label_line(line: &str, labels: &Labels) -> Result<DetectItem, InferenceError> {
  let malformed = || InferenceError::MalformedRecord {
    line: line.to_string(),
  };

  let fields: Vec<&str> = line.split_whitespace().collect();
  if fields.len() != 5 && fields.len() != 6 {
    return Err(malformed());
  }

  let class_id: u32 = fields[0].parse().map_err(|_| malformed())?;
  let mut values = [0f32; 5];
  for (value, field) in values.iter_mut().zip(&fields[1..]) {
    *value = field.parse().map_err(|_| malformed())?;
  }
  let [cx, cy, w, h, conf] = values;
  // 未保存置信度时视为确定
  let score = if fields.len() == 6 { conf } else { 1.0 };

  Ok(DetectItem {
    class_id,
    label: labels.name(class_id),
    score,
    bbox: [
      (cx - w / 2.0).clamp(0.0, 1.0),
      (cy - h / 2.0).clamp(0.0, 1.0),
      (cx + w / 2.0).clamp(0.0, 1.0),
      (cy + h / 2.0).clamp(0.0, 1.0),
    ],
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_line_converts_center_box_to_corners() {
    let labels = Labels::from_names(["hiding face", "weapon"]);
    let result = parse_label_text("1 0.5 0.5 0.2 0.4 0.91\n", 0.25, &labels).unwrap();

    assert_eq!(result.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.class_id, 1);
    assert_eq!(item.label, "weapon");
    assert!((item.score - 0.91).abs() < 1e-6);
    let expected = [0.4, 0.3, 0.6, 0.7];
    for (got, want) in item.bbox.iter().zip(expected) {
      assert!((got - want).abs() < 1e-6, "{got} != {want}");
    }
  }

  #[test]
  fn boxes_are_clamped_to_the_frame() {
    let result = parse_label_text("0 0.05 0.95 0.2 0.2 0.8", 0.25, &Labels::default()).unwrap();
    let bbox = result.items[0].bbox;
    assert_eq!(bbox[0], 0.0);
    assert_eq!(bbox[3], 1.0);
  }

  #[test]
  fn low_confidence_records_are_dropped() {
    let text = "0 0.5 0.5 0.1 0.1 0.10\n0 0.5 0.5 0.1 0.1 0.25\n";
    let result = parse_label_text(text, 0.25, &Labels::default()).unwrap();
    assert_eq!(result.len(), 1);
  }

  #[test]
  fn record_without_confidence_counts_as_certain() {
    let result = parse_label_text("2 0.5 0.5 0.1 0.1", 0.9, &Labels::default()).unwrap();
    assert_eq!(result.items[0].score, 1.0);
    assert_eq!(result.items[0].label, "class 2");
  }

  #[test]
  fn garbage_records_are_rejected() {
    for line in ["0 0.5 0.5", "x 0.5 0.5 0.1 0.1 0.9", "0 0.5 0.5 0.1 0.1 0.9 0.3 0.3"] {
      let err = parse_label_text(line, 0.25, &Labels::default()).unwrap_err();
      assert!(matches!(err, InferenceError::MalformedRecord { .. }), "{line}");
    }
  }

  #[test]
  fn frame_index_matches_image_and_video_names() {
    assert_eq!(frame_index("frame.txt", "frame"), Some(0));
    assert_eq!(frame_index("clip_12.txt", "clip"), Some(12));
    assert_eq!(frame_index("clip_x.txt", "clip"), None);
    assert_eq!(frame_index("other_3.txt", "clip"), None);
    assert_eq!(frame_index("clip_3.png", "clip"), None);
  }

  #[test]
  fn label_dir_is_ordered_by_frame() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("clip_10.txt"), "0 0.5 0.5 0.1 0.1 0.9\n0 0.2 0.2 0.1 0.1 0.8").unwrap();
    fs::write(dir.path().join("clip_2.txt"), "1 0.5 0.5 0.1 0.1 0.9").unwrap();
    fs::write(dir.path().join("unrelated.txt"), "garbage").unwrap();

    let frames = read_label_dir(dir.path(), "clip", 0.25, &Labels::default()).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].items[0].class_id, 1);
    assert_eq!(frames[1].len(), 2);
  }

  #[test]
  fn missing_label_dir_means_no_detections() {
    let dir = tempfile::tempdir().unwrap();
    let frames = read_label_dir(&dir.path().join("labels"), "frame", 0.25, &Labels::default()).unwrap();
    assert!(frames.is_empty());
  }

  #[test]
  fn missing_weights_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = UltralyticsBuilder::new(dir.path().join("epoch-30.pt"))
      .build()
      .unwrap_err();
    assert!(matches!(err, ModelLoadError::Missing(_)));
  }

  #[test]
  fn empty_weights_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("epoch-30.pt");
    fs::write(&weights, b"").unwrap();
    let err = UltralyticsBuilder::new(&weights).build().unwrap_err();
    assert!(matches!(err, ModelLoadError::Empty(_)));
  }

  #[test]
  fn directory_weights_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = UltralyticsBuilder::new(dir.path()).build().unwrap_err();
    assert!(matches!(err, ModelLoadError::NotAFile(_)));
  }

  #[test]
  fn unavailable_predictor_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("epoch-30.pt");
    fs::write(&weights, b"weights").unwrap();
    let err = UltralyticsBuilder::new(&weights)
      .program(dir.path().join("no-such-yolo").display().to_string())
      .build()
      .unwrap_err();
    assert!(matches!(err, ModelLoadError::PredictorUnavailable { .. }));
  }

  #[test]
  fn tail_keeps_the_end_of_long_output() {
    assert_eq!(tail("short", 10), "short");
    assert_eq!(tail("0123456789", 3), "789");
    // 不在多字节字符中间截断
    assert_eq!(tail("错误信息", 4), "息");
  }
}
