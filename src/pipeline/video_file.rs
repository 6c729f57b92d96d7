// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/pipeline/video_file.rs - 视频检测流水线
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

use tracing::{info, warn};

use crate::{
  media::UploadedFile,
  model::{InferOptions, MediaSource, Model},
  pipeline::{RenderedVideo, RequestError, StorageError},
  scratch::{ScopedFile, unique_name},
};

const VIDEO_MIME: &str = "video/mp4";

/// 视频请求的结果：原视频总会展示，检测失败时附带错误
#[derive(Debug)]
pub struct VideoReport {
  pub original: RenderedVideo,
  pub detection: Result<VideoDetection, RequestError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetection {
  /// 模型写出标注视频的目录
  pub saved_to: Option<PathBuf>,
  pub frames_with_detections: usize,
  pub total_detections: usize,
}

/// 把上传的视频写入请求独占的临时文件，推理并持久化标注结果
///
/// 临时文件在函数返回前删除，无论成功、失败还是 panic。
pub fn run_video(
  model: &dyn Model,
  file: &UploadedFile,
  upload_dir: &Path,
  confidence: f32,
) -> Result<VideoReport, RequestError> {
  info!("处理视频 {} ({} 字节)", file.name(), file.content().len());

  let name = unique_name("upload", file.extension());
  let temp = ScopedFile::write(upload_dir, &name, file.content()).map_err(|source| {
    warn!("写入临时视频失败: {}", source);
    StorageError {
      path: upload_dir.join(&name),
      source,
    }
  })?;

  // 从临时文件回读用于展示
  let bytes = std::fs::read(temp.path()).map_err(|source| StorageError {
    path: temp.path().to_path_buf(),
    source,
  })?;
  let original = RenderedVideo {
    mime: VIDEO_MIME,
    bytes,
  };

  let options = InferOptions {
    confidence,
    persist_output: true,
  };
  let detection = model
    .infer(MediaSource::File(temp.path()), &options)
    .map(|prediction| VideoDetection {
      frames_with_detections: prediction.frames_with_detections(),
      total_detections: prediction.total_detections(),
      saved_to: prediction.saved_to,
    })
    .map_err(RequestError::from);

  match &detection {
    Ok(done) => info!(
      "视频检测完成: {} 帧含目标，共 {} 个目标",
      done.frames_with_detections, done.total_detections
    ),
    Err(e) => warn!("视频 {} 检测失败: {}", file.name(), e),
  }

  drop(temp);
  Ok(VideoReport {
    original,
    detection,
  })
}
