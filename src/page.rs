// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/page.rs - 页面渲染
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

//! 单页界面
//!
//! 页面骨架以静态字符串内嵌在二进制中，结果区根据 [`Outcome`] 生成。

use std::fmt::Write;

use crate::{
  media::accept_attribute,
  model::DetectResult,
  pipeline::{ImageReport, RenderedImage, RequestError, VideoReport},
  settings::Settings,
};

/// 一次页面请求的结果
#[derive(Debug)]
pub enum Outcome {
  /// 尚未上传文件
  Idle,
  /// 扩展名不受支持，未调用任何流水线
  Unsupported { name: String },
  Image {
    name: String,
    report: Result<ImageReport, RequestError>,
  },
  Video {
    name: String,
    report: Result<VideoReport, RequestError>,
  },
  /// 上传本身没有完整到达
  UploadFailed { reason: String },
}

pub const IDLE_MESSAGE: &str = "📤 Please upload a file to begin the detection process.";
pub const UNSUPPORTED_MESSAGE: &str =
  "❌ Unsupported file format. Please upload a valid image or video.";

const PAGE_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; color: #262730; }
    h1 { font-size: 2.2rem; }
    figure { margin: 1rem 0; }
    figure img, video { width: 100%; border-radius: 0.3rem; }
    figcaption { text-align: center; color: #808495; font-size: 0.9rem; }
    form { border: 1px dashed #bbb; border-radius: 0.5rem; padding: 1rem; margin: 1.5rem 0; }
    .msg { padding: 0.8rem 1rem; border-radius: 0.4rem; margin: 1rem 0; }
    .info { background: #e8f1fb; color: #0e4f88; }
    .error { background: #fdecea; color: #7d1a12; }
    .success { background: #e6f4ea; color: #1b5e20; }
    table { border-collapse: collapse; width: 100%; font-size: 0.9rem; }
    th, td { border-bottom: 1px solid #e6e6e6; padding: 0.3rem 0.5rem; text-align: left; }
  </style>
</head>
<body>
"#;

const PAGE_INTRO: &str = r#"<p>This system detects suspicious activities such as hiding faces, carrying weapons, or breaking doors.<br />
Upload an <strong>image</strong> or <strong>video</strong>, and the model will analyze it.<br />
<em>Supported formats: JPG, JPEG, PNG, MP4</em></p>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// 渲染完整页面
pub fn render(settings: &Settings, outcome: &Outcome) -> String {
  let title = escape(&settings.title);
  let mut page = PAGE_HEAD.replace("{{TITLE}}", &title);

  let _ = writeln!(page, "<h1>🚨 {}</h1>", title);
  page.push_str(PAGE_INTRO);
  let _ = writeln!(
    page,
    r#"<form method="post" action="/" enctype="multipart/form-data">
  <label for="file">📤 Upload your file:</label>
  <input id="file" type="file" name="file" accept="{}" />
  <button type="submit">Analyze</button>
</form>"#,
    accept_attribute()
  );

  page.push_str("<section id=\"result\">\n");
  render_outcome(&mut page, outcome);
  page.push_str("</section>\n");
  page.push_str(PAGE_TAIL);
  page
}

fn render_outcome(page: &mut String, outcome: &Outcome) {
  match outcome {
    Outcome::Idle => message(page, "info", IDLE_MESSAGE),
    Outcome::Unsupported { name } => {
      message(page, "error", UNSUPPORTED_MESSAGE);
      let _ = writeln!(page, "<p><code>{}</code></p>", escape(name));
    }
    Outcome::Image { name, report } => {
      page.push_str("<h3>📷 Uploaded Image</h3>\n");
      match report {
        Ok(report) => render_image(page, name, report),
        Err(e) => message(page, "error", &image_error(e)),
      }
    }
    Outcome::Video { name, report } => {
      page.push_str("<h3>🎥 Uploaded Video</h3>\n");
      match report {
        Ok(report) => render_video(page, name, report),
        Err(e) => message(page, "error", &video_error(e)),
      }
    }
    Outcome::UploadFailed { reason } => {
      message(page, "error", &format!("❌ Upload failed: {}", reason))
    }
  }
}

fn render_image(page: &mut String, name: &str, report: &ImageReport) {
  figure(page, &report.original, name);
  page.push_str("<h3>🔍 Running Detection...</h3>\n");
  match &report.detection {
    Ok(detection) => {
      figure(page, &detection.annotated, name);
      detection_table(page, &detection.detections);
    }
    Err(e) => message(page, "error", &image_error(e)),
  }
}

fn render_video(page: &mut String, name: &str, report: &VideoReport) {
  // 视频可能很大，直接编码进页面缓冲区
  page.push_str(r#"<video controls src=""#);
  report.original.push_data_uri(page);
  let _ = writeln!(page, r#"" title="{}"></video>"#, escape(name));
  page.push_str("<h3>🔍 Running Detection on Video...</h3>\n");
  match &report.detection {
    Ok(done) => {
      let location = match &done.saved_to {
        Some(dir) => format!("<code>{}</code>", escape(&dir.display().to_string())),
        None => "the model directory".to_string(),
      };
      let _ = writeln!(
        page,
        r#"<div class="msg success">✅ Detection complete! Check the saved output in {}.</div>"#,
        location
      );
      let _ = writeln!(
        page,
        "<p>{} detections across {} frames.</p>",
        done.total_detections, done.frames_with_detections
      );
    }
    Err(e) => message(page, "error", &video_error(e)),
  }
}

fn figure(page: &mut String, image: &RenderedImage, name: &str) {
  let _ = writeln!(
    page,
    r#"<figure><img src="{}" alt="{}" /><figcaption>{}</figcaption></figure>"#,
    image.data_uri(),
    escape(name),
    image.caption
  );
}

fn detection_table(page: &mut String, detections: &DetectResult) {
  if detections.is_empty() {
    message(page, "info", "No objects detected.");
    return;
  }

  page.push_str("<table>\n<tr><th>Label</th><th>Confidence</th><th>Box (x_min, y_min, x_max, y_max)</th></tr>\n");
  for item in detections.items.iter() {
    let _ = writeln!(
      page,
      "<tr><td>{}</td><td>{:.2}</td><td>{:.3}, {:.3}, {:.3}, {:.3}</td></tr>",
      escape(&item.label),
      item.score,
      item.bbox[0],
      item.bbox[1],
      item.bbox[2],
      item.bbox[3]
    );
  }
  page.push_str("</table>\n");
}

fn message(page: &mut String, class: &str, text: &str) {
  let _ = writeln!(page, r#"<div class="msg {}">{}</div>"#, class, escape(text));
}

fn image_error(e: &RequestError) -> String {
  format!("❌ Error analyzing the image: {}", e)
}

fn video_error(e: &RequestError) -> String {
  format!("❌ Error analyzing the video: {}", e)
}

/// 转义 HTML 特殊字符
pub fn escape(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::{
    model::{DetectItem, InferenceError},
    pipeline::{ImageDetection, RenderedVideo, VideoDetection},
  };

  fn rendered(caption: &'static str) -> RenderedImage {
    RenderedImage {
      caption,
      png: vec![0x89, b'P', b'N', b'G'],
    }
  }

  #[test]
  fn idle_page_has_upload_control_and_info() {
    let page = render(&Settings::default(), &Outcome::Idle);
    assert!(page.contains("Thief Detection System"));
    assert!(page.contains(r#"accept=".jpg,.jpeg,.png,.mp4""#));
    assert!(page.contains(IDLE_MESSAGE));
    assert_eq!(page.matches("<input").count(), 1);
  }

  #[test]
  fn unsupported_page_shows_error_and_escapes_name() {
    let outcome = Outcome::Unsupported {
      name: "<script>.zip".to_string(),
    };
    let page = render(&Settings::default(), &outcome);
    assert!(page.contains(UNSUPPORTED_MESSAGE));
    assert!(page.contains("&lt;script&gt;.zip"));
    assert!(!page.contains("<script>"));
  }

  #[test]
  fn successful_image_renders_two_images_and_table() {
    let report = ImageReport {
      original: rendered("Uploaded Image"),
      detection: Ok(ImageDetection {
        annotated: rendered("Detection Results"),
        detections: DetectResult {
          items: vec![DetectItem {
            class_id: 1,
            label: "weapon".to_string(),
            score: 0.87,
            bbox: [0.1, 0.2, 0.3, 0.4],
          }]
          .into_boxed_slice(),
        },
      }),
    };
    let outcome = Outcome::Image {
      name: "photo.JPG".to_string(),
      report: Ok(report),
    };
    let page = render(&Settings::default(), &outcome);

    assert_eq!(page.matches("<img ").count(), 2);
    assert!(page.contains("Detection Results"));
    assert!(page.contains("<td>weapon</td><td>0.87</td>"));
  }

  #[test]
  fn failed_video_detection_still_shows_video() {
    let report = VideoReport {
      original: RenderedVideo {
        mime: "video/mp4",
        bytes: b"mp4".to_vec(),
      },
      detection: Err(RequestError::Inference(InferenceError::Input(
        "bad stream".to_string(),
      ))),
    };
    let outcome = Outcome::Video {
      name: "clip.mp4".to_string(),
      report: Ok(report),
    };
    let page = render(&Settings::default(), &outcome);

    assert!(page.contains("<video controls src=\"data:video/mp4;base64,"));
    assert!(page.contains("❌ Error analyzing the video: failed to prepare model input: bad stream"));
  }

  #[test]
  fn finished_video_reports_output_location() {
    let report = VideoReport {
      original: RenderedVideo {
        mime: "video/mp4",
        bytes: Vec::new(),
      },
      detection: Ok(VideoDetection {
        saved_to: Some(PathBuf::from("runs/detect/predict-1")),
        frames_with_detections: 4,
        total_detections: 9,
      }),
    };
    let outcome = Outcome::Video {
      name: "clip.mp4".to_string(),
      report: Ok(report),
    };
    let page = render(&Settings::default(), &outcome);

    assert!(page.contains("✅ Detection complete!"));
    assert!(page.contains("<code>runs/detect/predict-1</code>"));
    assert!(page.contains("9 detections across 4 frames"));
  }

  #[test]
  fn title_is_escaped() {
    let settings = Settings {
      title: "A & B".to_string(),
      ..Settings::default()
    };
    let page = render(&settings, &Outcome::Idle);
    assert!(page.contains("<title>A &amp; B</title>"));
  }
}
