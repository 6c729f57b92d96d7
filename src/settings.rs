// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/settings.rs - 运行配置
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

use crate::model::DEFAULT_CONFIDENCE;

pub const DEFAULT_TITLE: &str = "Thief Detection System";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 200;

/// 请求处理所需的配置，进程启动后只读
#[derive(Debug, Clone)]
pub struct Settings {
  /// 页面标题
  pub title: String,
  /// 置信度阈值
  pub confidence: f32,
  /// 上传视频临时文件所在目录
  pub upload_dir: PathBuf,
  /// 单次上传大小上限（字节）
  pub max_upload_bytes: usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      title: DEFAULT_TITLE.to_string(),
      confidence: DEFAULT_CONFIDENCE,
      upload_dir: std::env::temp_dir().join("shaobing"),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
    }
  }
}
