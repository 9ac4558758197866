// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/detection_service.rs - 检测服务
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use shanan_pipeline::{
  FromUrl,
  args::{DetectionArgs, init_tracing},
  detection::{DetectionRpc, Detector},
  model::Yolov5Builder,
  server::{serve_detection, watch_ctrl_c},
};

#[tokio::main]
async fn main() -> Result<()> {
  init_tracing();

  let args = DetectionArgs::parse();
  info!("模型地址: {}", args.model);
  info!("监听地址: {}", args.listen);

  let mut builder = Yolov5Builder::from_url(&args.model).context("无法解析模型地址")?;
  if let Some(conf) = args.confidence {
    builder = builder.conf_threshold(conf);
  }
  if let Some(iou) = args.nms_threshold {
    builder = builder.iou_threshold(iou);
  }
  if let Some(labels) = &args.labels {
    builder = builder.labels_path(labels.to_string_lossy());
  }

  // 模型加载可能较慢，放到阻塞线程中完成
  let model = tokio::task::spawn_blocking(move || builder.build())
    .await
    .context("模型加载线程异常退出")?
    .context("无法加载模型")?;

  let listener = TcpListener::bind(args.listen)
    .await
    .with_context(|| format!("无法监听 {}", args.listen))?;

  let rpc = DetectionRpc::new(Detector::new(model));
  serve_detection(listener, rpc, args.max_message_size, watch_ctrl_c()).await?;

  Ok(())
}
