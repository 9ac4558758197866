// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;

/// 检测模型协作者
///
/// 实现需要能被多个请求并发调用；若底层推理库不可重入，
/// 应只在推理步骤内部加锁（参见 `Yolov5`）。
pub trait Model: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 以 `target_size`（长边）为推理尺寸运行检测，
  /// 返回的 bbox 为源图像的像素坐标
  fn infer(&self, image: &RgbImage, target_size: u32) -> Result<DetectResult, Self::Error>;

  /// 类别索引到名称的映射表
  fn class_names(&self) -> &[String];
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，源图像像素
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 按索引查找类别名称，越界时退化为 `class_<id>`
pub fn label_for(names: &[String], class_id: u32) -> String {
  names
    .get(class_id as usize)
    .cloned()
    .unwrap_or_else(|| format!("class_{}", class_id))
}

pub mod labels;

#[cfg(feature = "onnx")]
mod yolov5;
#[cfg(feature = "onnx")]
pub use self::yolov5::{Yolov5, Yolov5Builder, Yolov5Error};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_class_falls_back_to_index() {
    let names = vec!["person".to_string()];
    assert_eq!(label_for(&names, 0), "person");
    assert_eq!(label_for(&names, 7), "class_7");
  }
}
