// 该文件是 Shanan （山南西风） 项目的一部分。
// src/visualization.rs - 可视化服务
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

use std::{sync::Arc, time::Instant};

use image::{DynamicImage, RgbaImage, imageops::FilterType};
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::{
  error::PipelineError,
  frame::FrameSlot,
  output::{Draw, encode_jpeg},
  proto::{
    DetectedObject, Empty, ImageWithObjects,
    visualization_service_server::{VisualizationService, VisualizationServiceServer},
  },
};

pub const DEFAULT_OUTPUT_WIDTH: u32 = 300;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 300;
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
  pub width: u32,
  pub height: u32,
  pub jpeg_quality: u8,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self {
      width: DEFAULT_OUTPUT_WIDTH,
      height: DEFAULT_OUTPUT_HEIGHT,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
    }
  }
}

/// 把检测结果绘制到图像上并编码为 JPEG
#[derive(Clone, Default)]
pub struct Visualizer {
  draw: Draw,
  options: RenderOptions,
}

impl Visualizer {
  pub fn new(draw: Draw, options: RenderOptions) -> Self {
    Self { draw, options }
  }

  /// 解码 → 缩放到固定尺寸 → 在透明叠加层上绘制 → 合成 → JPEG
  ///
  /// 坐标按缩放后的叠加层尺寸换算，与原图分辨率无关。
  pub fn render(&self, data: &[u8], objects: &[DetectedObject]) -> Result<Vec<u8>, PipelineError> {
    let RenderOptions {
      width,
      height,
      jpeg_quality,
    } = self.options;

    let source = image::load_from_memory(data).map_err(PipelineError::Decode)?;
    let mut base = source
      .resize_exact(width, height, FilterType::Triangle)
      .to_rgba8();

    let mut overlay = RgbaImage::new(width, height);
    self.draw.draw_objects(&mut overlay, objects);

    image::imageops::overlay(&mut base, &overlay, 0, 0);
    let flattened = DynamicImage::ImageRgba8(base).to_rgb8();

    encode_jpeg(&flattened, jpeg_quality)
  }
}

/// gRPC 可视化服务，成功渲染后把结果写入共享帧槽
#[derive(Clone)]
pub struct VisualizationRpc {
  visualizer: Arc<Visualizer>,
  slot: FrameSlot,
}

impl VisualizationRpc {
  pub fn new(visualizer: Visualizer, slot: FrameSlot) -> Self {
    Self {
      visualizer: Arc::new(visualizer),
      slot,
    }
  }

  pub fn into_server(self, max_message_size: usize) -> VisualizationServiceServer<Self> {
    VisualizationServiceServer::new(self).max_decoding_message_size(max_message_size)
  }

  /// 渲染并发布；任何一步失败都不会改动帧槽
  pub async fn publish_annotated(&self, request: ImageWithObjects) -> Result<(), PipelineError> {
    let data = request.image.map(|image| image.data).unwrap_or_default();
    let objects = request.objects.map(|o| o.objects).unwrap_or_default();
    let count = objects.len();

    let now = Instant::now();
    let visualizer = Arc::clone(&self.visualizer);
    let frame =
      tokio::task::spawn_blocking(move || visualizer.render(&data, &objects)).await??;

    debug!(
      "渲染完成, 检测框: {}, 帧大小: {} 字节, 耗时: {:.2?}",
      count,
      frame.len(),
      now.elapsed()
    );
    self.slot.publish(frame);
    Ok(())
  }
}

#[tonic::async_trait]
impl VisualizationService for VisualizationRpc {
  async fn visualize(
    &self,
    request: Request<ImageWithObjects>,
  ) -> Result<Response<Empty>, Status> {
    let request = request.into_inner();
    debug!(
      "收到可视化请求, 图像大小: {} 字节",
      request.image.as_ref().map_or(0, |image| image.data.len())
    );

    match self.publish_annotated(request).await {
      Ok(()) => Ok(Response::new(Empty {})),
      Err(err) => {
        warn!("可视化请求失败: {}", err);
        Err(err.into())
      }
    }
  }
}
