// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测服务
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

use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::{
  error::PipelineError,
  model::{DetectItem, Model, label_for},
  proto::{
    DetectedObject, DetectedObjects, Image, Point,
    detection_service_server::{DetectionService, DetectionServiceServer},
  },
};

/// 推理时长边的目标尺寸
pub const INFERENCE_SIZE: u32 = 640;

/// 解码图像、调用模型并把像素坐标归一化
pub struct Detector<M> {
  model: Arc<M>,
}

impl<M> Clone for Detector<M> {
  fn clone(&self) -> Self {
    Self {
      model: Arc::clone(&self.model),
    }
  }
}

impl<M: Model> Detector<M> {
  pub fn new(model: M) -> Self {
    Self {
      model: Arc::new(model),
    }
  }

  /// 同步执行一次完整检测，包含解码与推理
  pub fn detect_blocking(&self, data: &[u8]) -> Result<DetectedObjects, PipelineError> {
    let image = image::load_from_memory(data)
      .map_err(PipelineError::Decode)?
      .to_rgb8();
    let (width, height) = image.dimensions();

    let result = self
      .model
      .infer(&image, INFERENCE_SIZE)
      .map_err(PipelineError::inference)?;

    let names = self.model.class_names();
    let objects = result
      .items
      .iter()
      .map(|item| normalize(item, width as f32, height as f32, names))
      .collect::<Vec<_>>();
    Ok(objects.into())
  }

  /// 在阻塞线程池中检测，调用方取消时结果被直接丢弃
  pub async fn detect(&self, data: Vec<u8>) -> Result<DetectedObjects, PipelineError> {
    let detector = self.clone();
    tokio::task::spawn_blocking(move || detector.detect_blocking(&data)).await?
  }
}

fn normalize(item: &DetectItem, width: f32, height: f32, names: &[String]) -> DetectedObject {
  let [x_min, y_min, x_max, y_max] = item.bbox;
  let fx = |x: f32| (x / width).clamp(0.0, 1.0);
  let fy = |y: f32| (y / height).clamp(0.0, 1.0);

  DetectedObject {
    class_name: label_for(names, item.class_id),
    class_idx: item.class_id as i32,
    p1: Some(Point::new(fx(x_min), fy(y_min))),
    p2: Some(Point::new(fx(x_max), fy(y_max))),
    conf: item.score,
  }
}

/// gRPC 检测服务
pub struct DetectionRpc<M> {
  detector: Detector<M>,
}

impl<M: Model> DetectionRpc<M> {
  pub fn new(detector: Detector<M>) -> Self {
    Self { detector }
  }

  pub fn into_server(self, max_message_size: usize) -> DetectionServiceServer<Self> {
    DetectionServiceServer::new(self).max_decoding_message_size(max_message_size)
  }
}

#[tonic::async_trait]
impl<M: Model> DetectionService for DetectionRpc<M> {
  async fn detect(&self, request: Request<Image>) -> Result<Response<DetectedObjects>, Status> {
    let Image { data } = request.into_inner();
    debug!("收到检测请求, 图像大小: {} 字节", data.len());

    let now = Instant::now();
    match self.detector.detect(data).await {
      Ok(objects) => {
        debug!(
          "检测完成, 目标数: {}, 耗时: {:.2?}",
          objects.objects.len(),
          now.elapsed()
        );
        Ok(Response::new(objects))
      }
      Err(err) => {
        warn!("检测请求失败: {}", err);
        Err(err.into())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectResult;
  use image::{Rgb, RgbImage};

  #[derive(Debug, thiserror::Error)]
  #[error("模型已损坏")]
  struct Broken;

  /// 返回固定结果的模型
  struct FixedModel {
    items: Vec<DetectItem>,
    names: Vec<String>,
    fail: bool,
  }

  impl Model for FixedModel {
    type Error = Broken;

    fn infer(&self, image: &RgbImage, target_size: u32) -> Result<DetectResult, Broken> {
      assert_eq!(target_size, INFERENCE_SIZE);
      assert_eq!(image.dimensions(), (640, 480));
      if self.fail {
        return Err(Broken);
      }
      Ok(self.items.clone().into())
    }

    fn class_names(&self) -> &[String] {
      &self.names
    }
  }

  fn model(items: Vec<DetectItem>, fail: bool) -> FixedModel {
    FixedModel {
      items,
      names: vec!["person".into(), "bicycle".into()],
      fail,
    }
  }

  fn png() -> Vec<u8> {
    let image = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    image
      .write_to(&mut buffer, image::ImageFormat::Png)
      .unwrap();
    buffer.into_inner()
  }

  #[tokio::test]
  async fn boxes_are_normalized_by_source_size() {
    let items = vec![
      DetectItem {
        class_id: 1,
        score: 0.9,
        bbox: [64.0, 48.0, 320.0, 240.0],
      },
      // 超出画面的部分被截断到 [0, 1]
      DetectItem {
        class_id: 0,
        score: 0.4,
        bbox: [-10.0, 400.0, 700.0, 500.0],
      },
    ];
    let rpc = DetectionRpc::new(Detector::new(model(items, false)));
    let objects = rpc
      .detect(Request::new(Image { data: png() }))
      .await
      .unwrap()
      .into_inner()
      .objects;

    assert_eq!(objects.len(), 2);
    let first = &objects[0];
    assert_eq!(first.class_name, "bicycle");
    assert_eq!(first.class_idx, 1);
    assert_eq!(first.conf, 0.9);
    assert_eq!(first.normalized_bounds(), [0.1, 0.1, 0.5, 0.5]);

    for object in &objects {
      for v in object.normalized_bounds() {
        assert!((0.0..=1.0).contains(&v), "{:?}", object);
      }
    }
    assert_eq!(objects[1].normalized_bounds(), [0.0, 400.0 / 480.0, 1.0, 1.0]);
  }

  #[tokio::test]
  async fn empty_result_is_not_an_error() {
    let detector = Detector::new(model(Vec::new(), false));
    let objects = detector.detect(png()).await.unwrap();
    assert!(objects.objects.is_empty());
  }

  #[tokio::test]
  async fn malformed_bytes_are_invalid_argument() {
    let rpc = DetectionRpc::new(Detector::new(model(Vec::new(), false)));
    let status = rpc
      .detect(Request::new(Image {
        data: vec![0xde, 0xad, 0xbe, 0xef],
      }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
  }

  #[tokio::test]
  async fn model_failure_is_internal() {
    let rpc = DetectionRpc::new(Detector::new(model(Vec::new(), true)));
    let status = rpc
      .detect(Request::new(Image { data: png() }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Internal);
    assert!(status.message().contains("模型已损坏"));
  }
}
