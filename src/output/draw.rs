// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{debug, warn};

use crate::{error::PipelineError, proto::DetectedObject};

/// 边框颜色：红、绿、蓝、青、黄，按检测顺序循环
pub const PALETTE: [Rgba<u8>; 5] = [
  Rgba([255, 0, 0, 255]),
  Rgba([0, 128, 0, 255]),
  Rgba([0, 0, 255, 255]),
  Rgba([0, 255, 255, 255]),
  Rgba([255, 255, 0, 255]),
];

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 12.0;
const LEGEND_BORDER_SIZE: i32 = 2;
const OUTLINE_WIDTH: i32 = 2;
const LEGEND_FILL: Rgba<u8> = Rgba([0, 0, 0, 128]);
const LEGEND_TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
// 字体解析失败时按等宽位图字体估算
const FALLBACK_CHAR_WIDTH: u32 = 6;
const FALLBACK_TEXT_HEIGHT: u32 = 11;

// 默认字体，随二进制分发
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// 第 `index` 个检测框的颜色
pub fn palette_color(index: usize) -> Rgba<u8> {
  PALETTE[index % PALETTE.len()]
}

#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    let font = FontArc::try_from_slice(BUNDLED_FONT);
    if let Err(e) = &font {
      warn!("内置字体解析失败, 图例将不包含文字: {}", e);
    }
    Self {
      font: font.ok(),
      scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }
}

impl Draw {
  fn with_font(font: FontArc) -> Self {
    Self {
      font: Some(font),
      scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
    let path = path.as_ref();
    let data = std::fs::read(path)
      .map_err(|e| PipelineError::Config(format!("无法读取字体文件 {}: {}", path.display(), e)))?;
    let font = FontArc::try_from_vec(data)
      .map_err(|e| PipelineError::Config(format!("无法解析字体文件 {}: {}", path.display(), e)))?;
    Ok(Self::with_font(font))
  }

  /// 优先使用指定字体，否则使用内置字体
  pub fn discover(font_path: Option<&Path>) -> Result<Self, PipelineError> {
    match font_path {
      Some(path) => {
        let draw = Self::from_font_file(path)?;
        debug!("使用字体: {}", path.display());
        Ok(draw)
      }
      None => Ok(Self::default()),
    }
  }

  /// 测量文本渲染后的宽高
  pub fn text_size(&self, text: &str) -> (u32, u32) {
    match &self.font {
      Some(font) => text_size(self.scale, font, text),
      None => (
        text.chars().count() as u32 * FALLBACK_CHAR_WIDTH,
        FALLBACK_TEXT_HEIGHT,
      ),
    }
  }

  /// 按顺序在透明叠加层上绘制所有检测框，颜色每次调用都从调色板起点开始
  pub fn draw_objects(&self, overlay: &mut RgbaImage, objects: &[DetectedObject]) {
    for (index, object) in objects.iter().enumerate() {
      self.draw_object(overlay, object, palette_color(index));
    }
  }

  /// 绘制单个检测框及其图例，坐标按叠加层尺寸换算
  pub fn draw_object(&self, overlay: &mut RgbaImage, object: &DetectedObject, color: Rgba<u8>) {
    let (w, h) = (overlay.width() as f32, overlay.height() as f32);
    let [nx_min, ny_min, nx_max, ny_max] = object.normalized_bounds();

    let x_min = (nx_min * w).round() as i32;
    let y_min = (ny_min * h).round() as i32;
    let x_max = (nx_max * w).round() as i32;
    let y_max = (ny_max * h).round() as i32;

    outline(overlay, x_min, y_min, x_max, y_max, color);

    // 图例位于框左上角正上方，超出顶部时直接被裁剪
    let legend = object.legend();
    let (text_w, text_h) = self.text_size(&legend);
    let legend_top = y_min - text_h as i32 - 2 * LEGEND_BORDER_SIZE;
    let legend_right = x_min + text_w as i32 + 2 * LEGEND_BORDER_SIZE;

    fill(overlay, x_min, legend_top, legend_right, y_min, LEGEND_FILL);
    outline(overlay, x_min, legend_top, legend_right, y_min, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        overlay,
        LEGEND_TEXT_COLOR,
        x_min + LEGEND_BORDER_SIZE,
        y_min - text_h as i32 - LEGEND_BORDER_SIZE,
        self.scale,
        font,
        &legend,
      );
    }
  }
}

/// `(x0, y0)` 到 `(x1, y1)` 含端点的矩形
fn rect_between(x0: i32, y0: i32, x1: i32, y1: i32) -> Option<Rect> {
  let width = x1 - x0 + 1;
  let height = y1 - y0 + 1;
  if width <= 0 || height <= 0 {
    return None;
  }
  Some(Rect::at(x0, y0).of_size(width as u32, height as u32))
}

fn outline(image: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
  for inset in 0..OUTLINE_WIDTH {
    if let Some(rect) = rect_between(x0 + inset, y0 + inset, x1 - inset, y1 - inset) {
      draw_hollow_rect_mut(image, rect, color);
    }
  }
}

fn fill(image: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
  if let Some(rect) = rect_between(x0, y0, x1, y1) {
    draw_filled_rect_mut(image, rect, color);
  }
}
