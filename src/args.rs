// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::{server::DEFAULT_MAX_MESSAGE_SIZE, visualization::RenderOptions};

/// 初始化日志，`RUST_LOG` 未设置时默认为 `info`
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// 检测服务参数
#[derive(Parser, Debug)]
#[command(author, version, about = "Shanan 检测服务", long_about = None)]
pub struct DetectionArgs {
  /// 模型地址，例如 onnx:///models/yolov5s.onnx?conf=0.25&iou=0.45
  #[arg(long, env = "SHANAN_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// gRPC 监听地址
  #[arg(long, env = "SHANAN_DETECTION_LISTEN", default_value = "0.0.0.0:8060")]
  pub listen: SocketAddr,

  /// 类别名称文件（每行一个），覆盖模型地址中的 labels 参数
  #[arg(long, env = "SHANAN_LABELS", value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)，覆盖模型地址中的 conf 参数
  #[arg(long, env = "SHANAN_CONFIDENCE", value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)，覆盖模型地址中的 iou 参数
  #[arg(long, env = "SHANAN_NMS_THRESHOLD", value_name = "THRESHOLD")]
  pub nms_threshold: Option<f32>,

  /// 最大 gRPC 消息大小（字节）
  #[arg(long, env = "SHANAN_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
  pub max_message_size: usize,
}

/// 可视化服务与 HTTP 网关参数
#[derive(Parser, Debug)]
#[command(author, version, about = "Shanan 可视化服务与推流网关", long_about = None)]
pub struct VisualizationArgs {
  /// gRPC 监听地址
  #[arg(long, env = "SHANAN_VISUALIZATION_LISTEN", default_value = "0.0.0.0:8061")]
  pub listen: SocketAddr,

  /// HTTP 网关监听地址
  #[arg(long, env = "SHANAN_HTTP_LISTEN", default_value = "0.0.0.0:8062")]
  pub http_listen: SocketAddr,

  /// 推流轮询间隔（毫秒）
  #[arg(
    long,
    env = "SHANAN_POLL_INTERVAL_MS",
    default_value_t = 100,
    value_name = "MS",
    value_parser = clap::value_parser!(u64).range(1..)
  )]
  pub poll_interval_ms: u64,

  /// 输出帧宽度
  #[arg(
    long,
    env = "SHANAN_OUTPUT_WIDTH",
    default_value_t = 300,
    value_parser = clap::value_parser!(u32).range(1..)
  )]
  pub width: u32,

  /// 输出帧高度
  #[arg(
    long,
    env = "SHANAN_OUTPUT_HEIGHT",
    default_value_t = 300,
    value_parser = clap::value_parser!(u32).range(1..)
  )]
  pub height: u32,

  /// JPEG 质量 (1 - 100)
  #[arg(
    long,
    env = "SHANAN_JPEG_QUALITY",
    default_value_t = 75,
    value_parser = clap::value_parser!(u8).range(1..=100)
  )]
  pub jpeg_quality: u8,

  /// 图例字体（TTF/OTF），未指定时使用内置字体
  #[arg(long, env = "SHANAN_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 最大 gRPC 消息大小（字节）
  #[arg(long, env = "SHANAN_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
  pub max_message_size: usize,
}

impl VisualizationArgs {
  pub fn render_options(&self) -> RenderOptions {
    RenderOptions {
      width: self.width,
      height: self.height,
      jpeg_quality: self.jpeg_quality,
    }
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }
}

/// 流水线驱动参数
#[derive(Parser, Debug)]
#[command(author, version, about = "依次调用检测与可视化服务", long_about = None)]
pub struct DriverArgs {
  /// 检测服务地址
  #[arg(long, env = "SHANAN_DETECTION_URL", default_value = "http://127.0.0.1:8060")]
  pub detection: Url,

  /// 可视化服务地址
  #[arg(long, env = "SHANAN_VISUALIZATION_URL", default_value = "http://127.0.0.1:8061")]
  pub visualization: Url,

  /// 跳过检测，直接以空检测结果调用可视化服务
  #[arg(long)]
  pub skip_detection: bool,

  /// 最大 gRPC 消息大小（字节）
  #[arg(long, env = "SHANAN_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
  pub max_message_size: usize,

  /// 输入图片
  #[arg(value_name = "IMAGE")]
  pub image: PathBuf,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn visualization_defaults() {
    let args = VisualizationArgs::try_parse_from(["visualization-service"]).unwrap();
    assert_eq!(args.listen.port(), 8061);
    assert_eq!(args.http_listen.port(), 8062);
    assert_eq!(args.poll_interval(), Duration::from_millis(100));
    assert_eq!(args.render_options(), RenderOptions::default());
    assert_eq!(args.max_message_size, 32 * 1024 * 1024);
  }

  #[test]
  fn jpeg_quality_is_range_checked() {
    let err = VisualizationArgs::try_parse_from(["visualization-service", "--jpeg-quality", "0"]);
    assert!(err.is_err());
  }

  #[test]
  fn zero_sizes_and_interval_are_rejected() {
    for flag in ["--width", "--height", "--poll-interval-ms"] {
      let parsed = VisualizationArgs::try_parse_from(["visualization-service", flag, "0"]);
      assert!(parsed.is_err(), "{} 0 should be rejected", flag);
    }
    let args = VisualizationArgs::try_parse_from([
      "visualization-service",
      "--width",
      "1",
      "--poll-interval-ms",
      "1",
    ])
    .unwrap();
    assert_eq!(args.width, 1);
    assert_eq!(args.poll_interval(), Duration::from_millis(1));
  }

  #[test]
  fn detection_requires_model_url() {
    let args = DetectionArgs::try_parse_from([
      "detection-service",
      "--model",
      "onnx:///models/yolov5s.onnx?conf=0.3",
    ])
    .unwrap();
    assert_eq!(args.model.scheme(), "onnx");
    assert_eq!(args.listen.port(), 8060);
    assert!(args.confidence.is_none());
  }

  #[test]
  fn driver_takes_image_and_flags() {
    let args = DriverArgs::try_parse_from([
      "pipeline-driver",
      "--skip-detection",
      "--visualization",
      "http://10.0.0.2:9000",
      "cat.jpg",
    ])
    .unwrap();
    assert!(args.skip_detection);
    assert_eq!(args.detection.port(), Some(8060));
    assert_eq!(args.visualization.host_str(), Some("10.0.0.2"));
    assert_eq!(args.image, PathBuf::from("cat.jpg"));
  }
}
