// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/pipeline_driver.rs - 依次调用检测与可视化服务
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use shanan_pipeline::{
  PipelineError,
  args::{DriverArgs, init_tracing},
  proto::{
    DetectedObjects, Image, ImageWithObjects, detection_service_client::DetectionServiceClient,
    visualization_service_client::VisualizationServiceClient,
  },
};

async fn detect(args: &DriverArgs, data: &[u8]) -> Result<DetectedObjects, PipelineError> {
  let mut client = DetectionServiceClient::connect(args.detection.to_string())
    .await?
    .max_decoding_message_size(args.max_message_size)
    .max_encoding_message_size(args.max_message_size);

  let now = std::time::Instant::now();
  let objects = client
    .detect(Image {
      data: data.to_vec(),
    })
    .await?
    .into_inner();
  info!("检测完成, 耗时: {:.2?}", now.elapsed());

  for object in &objects.objects {
    let [x_min, y_min, x_max, y_max] = object.normalized_bounds();
    info!(
      "  {} [{:.3}, {:.3}, {:.3}, {:.3}]",
      object.legend(),
      x_min,
      y_min,
      x_max,
      y_max
    );
  }
  Ok(objects)
}

async fn visualize(
  args: &DriverArgs,
  data: Vec<u8>,
  objects: DetectedObjects,
) -> Result<(), PipelineError> {
  let mut client = VisualizationServiceClient::connect(args.visualization.to_string())
    .await?
    .max_decoding_message_size(args.max_message_size)
    .max_encoding_message_size(args.max_message_size);

  let now = std::time::Instant::now();
  client.visualize(ImageWithObjects::new(data, objects)).await?;
  info!("可视化完成, 耗时: {:.2?}", now.elapsed());
  Ok(())
}

async fn run(args: &DriverArgs) -> Result<()> {
  let data = tokio::fs::read(&args.image)
    .await
    .with_context(|| format!("无法读取图片 {}", args.image.display()))?;
  info!("读取图片: {} ({} 字节)", args.image.display(), data.len());

  let objects = if args.skip_detection {
    info!("跳过检测");
    DetectedObjects::default()
  } else {
    let objects = detect(args, &data).await.context("检测服务调用失败")?;
    info!("检测到 {} 个目标", objects.objects.len());
    objects
  };

  visualize(args, data, objects)
    .await
    .context("可视化服务调用失败")?;
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  init_tracing();

  let args = DriverArgs::parse();
  info!("检测服务: {}", args.detection);
  info!("可视化服务: {}", args.visualization);

  if let Err(err) = run(&args).await {
    error!("{:#}", err);
    return Err(err);
  }
  Ok(())
}
