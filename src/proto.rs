// 该文件是 Shanan （山南西风） 项目的一部分。
// src/proto.rs - gRPC 消息与服务定义
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

#![allow(clippy::derive_partial_eq_without_eq)]

tonic::include_proto!("pipeline");

/// 供反射服务使用的编码后文件描述集
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("pipeline_descriptor");

impl Point {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

impl DetectedObject {
  /// 以归一化坐标返回 `[x_min, y_min, x_max, y_max]`
  ///
  /// `p1`/`p2` 不保证是左上/右下角，这里统一取最小/最大值。
  /// 缺失的角点按原点处理。
  pub fn normalized_bounds(&self) -> [f32; 4] {
    let (x1, y1) = corner(self.p1.as_ref());
    let (x2, y2) = corner(self.p2.as_ref());
    [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]
  }

  /// 图例文本，例如 `person (87%)`
  pub fn legend(&self) -> String {
    format!("{} ({}%)", self.class_name, (self.conf * 100.0).round() as i32)
  }
}

fn corner(point: Option<&Point>) -> (f32, f32) {
  point.map_or((0.0, 0.0), |p| (p.x, p.y))
}

impl From<Vec<DetectedObject>> for DetectedObjects {
  fn from(objects: Vec<DetectedObject>) -> Self {
    Self { objects }
  }
}

impl ImageWithObjects {
  pub fn new(data: impl Into<Vec<u8>>, objects: impl Into<DetectedObjects>) -> Self {
    Self {
      image: Some(Image { data: data.into() }),
      objects: Some(objects.into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn object(p1: (f32, f32), p2: (f32, f32), conf: f32) -> DetectedObject {
    DetectedObject {
      class_name: "cat".into(),
      class_idx: 15,
      p1: Some(Point::new(p1.0, p1.1)),
      p2: Some(Point::new(p2.0, p2.1)),
      conf,
    }
  }

  #[test]
  fn bounds_are_ordered_for_reversed_corners() {
    // p1 在左下、p2 在右上
    let obj = object((0.1, 0.5), (0.5, 0.1), 0.05);
    assert_eq!(obj.normalized_bounds(), [0.1, 0.1, 0.5, 0.5]);
  }

  #[test]
  fn legend_rounds_confidence() {
    assert_eq!(object((0.0, 0.0), (1.0, 1.0), 0.986).legend(), "cat (99%)");
    assert_eq!(object((0.0, 0.0), (1.0, 1.0), 0.054).legend(), "cat (5%)");
  }

  #[test]
  fn descriptor_set_is_embedded() {
    assert!(!FILE_DESCRIPTOR_SET.is_empty());
  }
}
