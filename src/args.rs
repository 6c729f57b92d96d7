// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use shaobing::settings::{DEFAULT_MAX_UPLOAD_MB, DEFAULT_TITLE, Settings};

/// Shaobing 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 预训练模型权重文件路径
  #[arg(long, default_value = "epoch-30.pt", value_name = "FILE")]
  pub model: PathBuf,

  /// Ultralytics 命令行预测器
  #[arg(long, default_value = "yolo", value_name = "EXE")]
  pub predictor: String,

  /// HTTP 监听地址
  #[arg(long, default_value = "127.0.0.1:8501", value_name = "ADDR")]
  pub listen: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD", value_parser = parse_confidence)]
  pub confidence: f32,

  /// 标注视频的输出目录
  #[arg(long, default_value = "runs/detect", value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 上传文件的临时目录，默认为系统临时目录下的 shaobing
  #[arg(long, value_name = "DIR")]
  pub upload_dir: Option<PathBuf>,

  /// 类别名称文件，每行一个名称
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标签文字使用的字体文件（TTF/OTF）
  ///
  /// 程序不自带字体；不指定时标注图只绘制边框，类别名称和置信度仅出现在结果表格中
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 单次上传大小上限（MB）
  ///
  /// 视频会以 base64 内嵌在结果页中，单个请求的内存占用约为上限的 4 到 5 倍
  #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB, value_name = "MB")]
  pub max_upload_mb: usize,

  /// 页面标题
  #[arg(long, default_value = DEFAULT_TITLE, value_name = "TEXT")]
  pub title: String,
}

impl Args {
  pub fn settings(&self) -> Settings {
    let defaults = Settings::default();
    Settings {
      title: self.title.clone(),
      confidence: self.confidence,
      upload_dir: self.upload_dir.clone().unwrap_or(defaults.upload_dir),
      max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
    }
  }

  /// 每次推理暂存输入帧的目录，与上传目录分开
  pub fn scratch_dir(&self) -> PathBuf {
    self.settings().upload_dir.join("frames")
  }
}

fn parse_confidence(value: &str) -> Result<f32, String> {
  let confidence: f32 = value
    .parse()
    .map_err(|e| format!("无效的置信度 `{}`: {}", value, e))?;
  if !(0.0..=1.0).contains(&confidence) {
    return Err(format!("置信度 {} 超出有效范围 [0, 1]", confidence));
  }
  Ok(confidence)
}
