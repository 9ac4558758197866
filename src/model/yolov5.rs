// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolov5.rs - YOLOv5 ONNX 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;

use image::{RgbImage, imageops::FilterType};
use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, Model, labels},
};

const YOLOV5_SCHEME: &str = "onnx";
const YOLOV5_PAD_VALUE: f32 = 114.0 / 255.0;
const YOLOV5_BOX_FIELDS: usize = 5; // cx, cy, w, h, objectness
const YOLOV5_CONF_THRESH: f32 = 0.25;
const YOLOV5_IOU_THRESH: f32 = 0.45;
const YOLOV5_MAX_DETECTIONS: usize = 300;

#[derive(Error, Debug)]
pub enum Yolov5Error {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(String),
  #[error("模型输出形状不符合预期: {0:?}")]
  OutputShape(Vec<i64>),
  #[error("推理会话锁已损坏")]
  Poisoned,
  #[error("标签文件读取错误: {0}")]
  Labels(#[from] std::io::Error),
}

impl Yolov5Error {
  fn runtime(err: impl std::fmt::Display) -> Self {
    Yolov5Error::Runtime(err.to_string())
  }
}

/// 从 `onnx:///path/to/yolov5s.onnx?conf=0.25&iou=0.45&labels=/path/to/labels.txt` 构建
pub struct Yolov5Builder {
  model_path: String,
  labels_path: Option<String>,
  conf_threshold: f32,
  iou_threshold: f32,
}

impl FromUrlWithScheme for Yolov5Builder {
  const SCHEME: &'static str = YOLOV5_SCHEME;
}

impl FromUrl for Yolov5Builder {
  type Error = Yolov5Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov5Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut builder = Yolov5Builder {
      model_path: url.path().to_string(),
      labels_path: None,
      conf_threshold: YOLOV5_CONF_THRESH,
      iou_threshold: YOLOV5_IOU_THRESH,
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "conf" => builder.conf_threshold = parse_threshold(&key, &value)?,
        "iou" => builder.iou_threshold = parse_threshold(&key, &value)?,
        "labels" => builder.labels_path = Some(value.into_owned()),
        other => {
          return Err(Yolov5Error::ModelPathError(format!(
            "未知的模型参数: {}",
            other
          )));
        }
      }
    }

    Ok(builder)
  }
}

fn parse_threshold(key: &str, value: &str) -> Result<f32, Yolov5Error> {
  value
    .parse::<f32>()
    .ok()
    .filter(|v| (0.0..=1.0).contains(v))
    .ok_or_else(|| Yolov5Error::ModelPathError(format!("参数 {} 必须在 0.0 - 1.0 之间", key)))
}

impl Yolov5Builder {
  pub fn conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn labels_path(mut self, path: impl Into<String>) -> Self {
    self.labels_path = Some(path.into());
    self
  }

  pub fn build(self) -> Result<Yolov5, Yolov5Error> {
    let class_names = match &self.labels_path {
      Some(path) => {
        info!("加载标签文件: {}", path);
        labels::read_labels(path)?
      }
      None => labels::coco_labels(),
    };

    info!("加载模型文件: {}", self.model_path);
    let session = Session::builder()
      .map_err(Yolov5Error::runtime)?
      .commit_from_file(&self.model_path)
      .map_err(Yolov5Error::runtime)?;
    info!("模型加载完成, 类别数: {}", class_names.len());

    Ok(Yolov5 {
      session: Mutex::new(session),
      class_names,
      conf_threshold: self.conf_threshold,
      iou_threshold: self.iou_threshold,
    })
  }
}

/// YOLOv5 ONNX 检测器
///
/// ONNX Runtime 会话在推理时需要独占访问，
/// 因此只有 `session.run` 处于锁内，前后处理均可并发执行。
pub struct Yolov5 {
  session: Mutex<Session>,
  class_names: Vec<String>,
  conf_threshold: f32,
  iou_threshold: f32,
}

/// 记录 letterbox 变换，用于把输出坐标映射回源图像
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  src_w: f32,
  src_h: f32,
}

impl Letterbox {
  fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
    (
      ((x - self.pad_x) / self.scale).clamp(0.0, self.src_w),
      ((y - self.pad_y) / self.scale).clamp(0.0, self.src_h),
    )
  }
}

/// 按长边缩放到 `target` 并居中填充，输出 NCHW 的 f32 张量数据
fn letterbox(image: &RgbImage, target: u32) -> (Vec<f32>, Letterbox) {
  let (src_w, src_h) = image.dimensions();
  let scale = target as f32 / src_w.max(src_h).max(1) as f32;
  let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, target);
  let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, target);
  let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

  let pad_x = (target - new_w) / 2;
  let pad_y = (target - new_h) / 2;
  let plane = (target * target) as usize;
  let mut data = vec![YOLOV5_PAD_VALUE; 3 * plane];

  for (x, y, pixel) in resized.enumerate_pixels() {
    let idx = ((y + pad_y) * target + (x + pad_x)) as usize;
    data[idx] = pixel[0] as f32 / 255.0;
    data[plane + idx] = pixel[1] as f32 / 255.0;
    data[2 * plane + idx] = pixel[2] as f32 / 255.0;
  }

  let transform = Letterbox {
    scale,
    pad_x: pad_x as f32,
    pad_y: pad_y as f32,
    src_w: src_w as f32,
    src_h: src_h as f32,
  };
  (data, transform)
}

/// 解码 `[1, N, 5 + C]` 的输出，返回源图像坐标下的候选框
fn decode_rows(
  data: &[f32],
  features: usize,
  transform: &Letterbox,
  conf_threshold: f32,
) -> Vec<DetectItem> {
  let mut items = Vec::new();
  for row in data.chunks_exact(features) {
    let objectness = row[4];
    if objectness < conf_threshold {
      continue;
    }

    let (class_id, class_score) = row[YOLOV5_BOX_FIELDS..]
      .iter()
      .enumerate()
      .fold((0usize, f32::MIN), |best, (idx, &score)| {
        if score > best.1 { (idx, score) } else { best }
      });
    let score = objectness * class_score;
    if score < conf_threshold {
      continue;
    }

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    let (x_min, y_min) = transform.unmap(cx - w / 2.0, cy - h / 2.0);
    let (x_max, y_max) = transform.unmap(cx + w / 2.0, cy + h / 2.0);
    items.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox: [x_min, y_min, x_max, y_max],
    });
  }
  items
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = ix * iy;
  if inter <= 0.0 {
    return 0.0;
  }
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  inter / (area_a + area_b - inter)
}

/// 按类别的贪心 NMS，结果按置信度降序
fn non_max_suppression(mut items: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  items.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
  let mut kept: Vec<DetectItem> = Vec::new();
  for item in items {
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == item.class_id && iou(&k.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
      if kept.len() >= YOLOV5_MAX_DETECTIONS {
        break;
      }
    }
  }
  kept
}

impl Model for Yolov5 {
  type Error = Yolov5Error;

  fn infer(&self, image: &RgbImage, target_size: u32) -> Result<DetectResult, Self::Error> {
    debug!("预处理输入图像: {}x{}", image.width(), image.height());
    let (input, transform) = letterbox(image, target_size);
    let shape = [1usize, 3, target_size as usize, target_size as usize];
    let tensor = Tensor::from_array((shape, input.into_boxed_slice())).map_err(Yolov5Error::runtime)?;

    let (shape, data) = {
      let mut session = self.session.lock().map_err(|_| Yolov5Error::Poisoned)?;
      debug!("执行模型推理");
      let outputs = session
        .run(ort::inputs![tensor])
        .map_err(Yolov5Error::runtime)?;
      let output = outputs
        .get("output0")
        .or_else(|| outputs.get("output"))
        .ok_or_else(|| Yolov5Error::Runtime("模型缺少输出节点".to_string()))?;
      let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(Yolov5Error::runtime)?;
      (shape.iter().copied().collect::<Vec<i64>>(), data.to_vec())
    };

    let features = self.class_names.len() + YOLOV5_BOX_FIELDS;
    if shape.len() != 3 || shape[2] as usize != features {
      return Err(Yolov5Error::OutputShape(shape));
    }

    let candidates = decode_rows(&data, features, &transform, self.conf_threshold);
    debug!("NMS 前候选框数量: {}", candidates.len());
    let items = non_max_suppression(candidates, self.iou_threshold);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }

  fn class_names(&self) -> &[String] {
    &self.class_names
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_query_configures_thresholds() {
    let url = Url::parse("onnx:///models/yolov5s.onnx?conf=0.4&iou=0.5").unwrap();
    let builder = Yolov5Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/yolov5s.onnx");
    assert_eq!(builder.conf_threshold, 0.4);
    assert_eq!(builder.iou_threshold, 0.5);
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("file:///models/yolov5s.onnx").unwrap();
    assert!(matches!(
      Yolov5Builder::from_url(&url),
      Err(Yolov5Error::ModelPathError(_))
    ));
  }

  #[test]
  fn letterbox_pads_short_edge() {
    let image = RgbImage::from_pixel(640, 480, image::Rgb([255, 0, 0]));
    let (data, transform) = letterbox(&image, 320);
    assert_eq!(transform.scale, 0.5);
    assert_eq!(transform.pad_x, 0.0);
    assert_eq!(transform.pad_y, 40.0);
    // 第一行属于填充区域
    assert_eq!(data[0], YOLOV5_PAD_VALUE);
    // 中心像素来自原图
    let center = (160 * 320 + 160) as usize;
    assert_eq!(data[center], 1.0);
    assert_eq!(transform.unmap(160.0, 160.0), (320.0, 240.0));
  }

  #[test]
  fn decode_and_nms_keep_best_box_per_object() {
    let transform = Letterbox {
      scale: 1.0,
      pad_x: 0.0,
      pad_y: 0.0,
      src_w: 100.0,
      src_h: 100.0,
    };
    // 两个类别：两个重叠的 0 类框 + 一个低分框
    #[rustfmt::skip]
    let data = vec![
      50.0, 50.0, 20.0, 20.0, 0.9, 0.9, 0.1,
      51.0, 50.0, 20.0, 20.0, 0.8, 0.9, 0.1,
      10.0, 10.0, 4.0, 4.0, 0.1, 0.9, 0.1,
    ];
    let candidates = decode_rows(&data, 7, &transform, 0.25);
    assert_eq!(candidates.len(), 2);
    let kept = non_max_suppression(candidates, 0.45);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].class_id, 0);
    assert_eq!(kept[0].bbox, [40.0, 40.0, 60.0, 60.0]);
  }
}
