// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::sync::Arc;

use axum::{
  Router,
  extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
  http::StatusCode,
  response::Html,
  routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
  media::{MediaKind, UploadedFile},
  model::Model,
  output::Draw,
  page::{self, Outcome},
  pipeline::{RequestError, run_image, run_video},
  settings::Settings,
};

/// 上传控件的表单字段名
pub const UPLOAD_FIELD: &str = "file";

/// 所有请求共享的只读状态
#[derive(Clone)]
pub struct AppState {
  pub model: Arc<dyn Model>,
  pub draw: Arc<Draw>,
  pub settings: Arc<Settings>,
}

impl AppState {
  pub fn new(model: Arc<dyn Model>, draw: Draw, settings: Settings) -> Self {
    Self {
      model,
      draw: Arc::new(draw),
      settings: Arc::new(settings),
    }
  }
}

pub fn router(state: AppState) -> Router {
  let limit = state.settings.max_upload_bytes;
  Router::new()
    .route("/", get(index).post(upload))
    .route("/healthz", get(healthz))
    .layer(DefaultBodyLimit::max(limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
  Html(page::render(&state.settings, &Outcome::Idle))
}

async fn healthz() -> &'static str {
  "ok"
}

async fn upload(
  State(state): State<AppState>,
  multipart: Multipart,
) -> (StatusCode, Html<String>) {
  let (status, outcome) = match read_upload(multipart).await {
    Ok(Some(file)) => (StatusCode::OK, dispatch(&state, file).await),
    Ok(None) => (StatusCode::OK, Outcome::Idle),
    Err(e) => {
      warn!("读取上传内容失败: {}", e);
      (
        e.status(),
        Outcome::UploadFailed {
          reason: e.body_text(),
        },
      )
    }
  };
  (status, Html(page::render(&state.settings, &outcome)))
}

/// 取出第一个带文件名的上传字段；浏览器在未选择文件时会提交空文件名
async fn read_upload(mut multipart: Multipart) -> Result<Option<UploadedFile>, MultipartError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let name = match field.file_name() {
      Some(name) if !name.is_empty() => name.to_string(),
      _ => continue,
    };
    let content = field.bytes().await?;
    info!("收到上传 {} ({} 字节)", name, content.len());
    return Ok(Some(UploadedFile::new(name, content)));
  }
  Ok(None)
}

/// 按媒体类型分发到对应流水线
pub async fn dispatch(state: &AppState, file: UploadedFile) -> Outcome {
  let name = file.name().to_string();
  let confidence = state.settings.confidence;

  match file.kind() {
    MediaKind::Unsupported => {
      warn!("不支持的文件格式: {}", name);
      Outcome::Unsupported { name }
    }
    MediaKind::Image => {
      let model = state.model.clone();
      let draw = state.draw.clone();
      let report = blocking(move || run_image(model.as_ref(), &draw, &file, confidence)).await;
      Outcome::Image { name, report }
    }
    MediaKind::Video => {
      let model = state.model.clone();
      let settings = state.settings.clone();
      let report = blocking(move || {
        run_video(model.as_ref(), &file, &settings.upload_dir, confidence)
      })
      .await;
      Outcome::Video { name, report }
    }
  }
}

/// 在阻塞线程池上运行流水线，panic 只影响当前请求
async fn blocking<T, F>(task: F) -> Result<T, RequestError>
where
  F: FnOnce() -> Result<T, RequestError> + Send + 'static,
  T: Send + 'static,
{
  match tokio::task::spawn_blocking(task).await {
    Ok(result) => result,
    Err(e) => {
      error!("流水线异常终止: {}", e);
      Err(RequestError::Aborted(e.to_string()))
    }
  }
}
