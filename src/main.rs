// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::{sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use shaobing::{
  model::{Labels, Ultralytics, UltralyticsBuilder},
  output::Draw,
  server::{AppState, router},
};

fn load_model(args: &args::Args) -> Result<Ultralytics, shaobing::model::ModelLoadError> {
  let labels = match &args.labels {
    Some(path) => Labels::load(path)?,
    None => Labels::default(),
  };

  UltralyticsBuilder::new(&args.model)
    .program(&args.predictor)
    .output_dir(&args.output_dir)
    .scratch_dir(args.scratch_dir())
    .labels(labels)
    .build()
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let settings = args.settings();

  info!("模型文件路径: {}", args.model.display());
  info!("预测器: {}", args.predictor);
  info!("置信度阈值: {}", settings.confidence);
  info!("上传目录: {}", settings.upload_dir.display());

  // 模型加载失败时不提供任何服务
  let model = load_model(&args)
    .inspect_err(|e| error!("❌ Failed to load the YOLO model: {}", e))
    .context("Failed to load the YOLO model")?;
  info!("标注视频输出目录: {}", model.output_dir().display());

  let draw = match &args.font {
    Some(path) => Draw::with_font_file(path)
      .with_context(|| format!("无法加载字体: {}", path.display()))?,
    None => Draw::new(),
  };
  if !draw.has_font() {
    warn!("未指定 --font，标注图只绘制边框，类别名称见结果表格");
  }

  std::fs::create_dir_all(&settings.upload_dir)
    .with_context(|| format!("无法创建上传目录: {}", settings.upload_dir.display()))?;

  let state = AppState::new(Arc::new(model), draw, settings);
  let app = router(state);

  let listener = tokio::net::TcpListener::bind(&args.listen)
    .await
    .with_context(|| format!("无法监听地址: {}", args.listen))?;
  info!("服务已启动: http://{}", listener.local_addr()?);

  let (tx, mut rx) = tokio::sync::watch::channel(false);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(true);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置 Ctrl-C 处理器")?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      let _ = rx.changed().await;
    })
    .await
    .context("HTTP 服务异常退出")?;

  info!("服务已停止");
  Ok(())
}
