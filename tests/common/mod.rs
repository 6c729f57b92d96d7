// 该文件是 Shaobing （哨兵） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode},
};
use image::RgbImage;
use tower::ServiceExt;

use shaobing::model::{
  DetectItem, DetectResult, InferOptions, InferenceError, MediaSource, Model, Prediction,
};

pub const BOUNDARY: &str = "shaobing-test-boundary";

/// 记录一次推理调用
#[derive(Debug, Clone)]
pub struct Call {
  pub options: InferOptions,
  /// 图片输入的尺寸
  pub frame: Option<(u32, u32)>,
  /// 文件输入的路径，以及调用时文件是否存在
  pub file: Option<(PathBuf, bool)>,
}

pub enum Behavior {
  Detect(Vec<DetectItem>),
  Fail(&'static str),
  Panic,
}

/// 不依赖外部预测器的模型替身
pub struct StubModel {
  behavior: Behavior,
  calls: Mutex<Vec<Call>>,
}

impl StubModel {
  pub fn detecting(items: Vec<DetectItem>) -> Self {
    Self {
      behavior: Behavior::Detect(items),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn failing(stderr: &'static str) -> Self {
    Self {
      behavior: Behavior::Fail(stderr),
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn panicking() -> Self {
    Self {
      behavior: Behavior::Panic,
      calls: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }
}

impl Model for StubModel {
  fn infer(
    &self,
    source: MediaSource<'_>,
    options: &InferOptions,
  ) -> Result<Prediction, InferenceError> {
    let call = match source {
      MediaSource::Frame(frame) => Call {
        options: *options,
        frame: Some((frame.width(), frame.height())),
        file: None,
      },
      MediaSource::File(path) => Call {
        options: *options,
        frame: None,
        file: Some((path.to_path_buf(), path.is_file())),
      },
    };
    // 先释放锁，panic 时不留下中毒的 Mutex
    self.calls.lock().unwrap().push(call);

    match &self.behavior {
      Behavior::Detect(items) => Ok(Prediction {
        frames: vec![DetectResult {
          items: items.clone().into_boxed_slice(),
        }],
        saved_to: options
          .persist_output
          .then(|| PathBuf::from("runs/detect/predict-test")),
      }),
      Behavior::Fail(stderr) => Err(InferenceError::Predictor {
        status: "exit status: 1".to_string(),
        stderr: stderr.to_string(),
      }),
      Behavior::Panic => panic!("predictor crashed"),
    }
  }
}

pub fn weapon() -> DetectItem {
  DetectItem {
    class_id: 1,
    label: "weapon".to_string(),
    score: 0.87,
    bbox: [0.1, 0.2, 0.6, 0.9],
  }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, image::Rgb([40, 90, 160]));
  shaobing::output::encode_png(&image).unwrap()
}

/// 构造只含一个文件字段的 multipart 请求体
pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
  let mut body = Vec::new();
  body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
  body.extend_from_slice(
    format!(
      "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
      field, filename
    )
    .as_bytes(),
  );
  body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
  body.extend_from_slice(content);
  body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
  body
}

pub fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/")
    .header(
      "content-type",
      format!("multipart/form-data; boundary={}", BOUNDARY),
    )
    .body(Body::from(multipart_body("file", filename, content)))
    .unwrap()
}

/// 发送请求并取回状态码与页面
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
  let response = app.oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  (status, String::from_utf8(bytes.to_vec()).unwrap())
}
