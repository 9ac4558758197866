// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 类别标签表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 默认标签表（COCO 80 类）
pub fn coco_labels() -> Vec<String> {
  COCO_CLASSES.iter().map(|name| name.to_string()).collect()
}

/// 从文本中解析标签表：每行一个类别名，忽略空行与 `#` 注释
pub fn parse_labels(text: &str) -> Vec<String> {
  text
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .map(str::to_string)
    .collect()
}

/// 从文件读取标签表
pub fn read_labels(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
  let text = std::fs::read_to_string(path)?;
  Ok(parse_labels(&text))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn coco_table_has_eighty_classes() {
    let labels = coco_labels();
    assert_eq!(labels.len(), 80);
    assert_eq!(labels[0], "person");
    assert_eq!(labels[79], "toothbrush");
  }

  #[test]
  fn parse_skips_blank_and_comment_lines() {
    let labels = parse_labels("# custom\nred ball\n\n  blue cube  \n");
    assert_eq!(labels, vec!["red ball".to_string(), "blue cube".to_string()]);
  }
}
