// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{RgbImage, codecs::jpeg::JpegEncoder};

use crate::error::PipelineError;

pub mod draw;

pub use self::draw::{Draw, PALETTE, palette_color};

/// 将 RGB 图像编码为 JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
  let mut buffer = Vec::new();
  JpegEncoder::new_with_quality(&mut buffer, quality)
    .encode_image(image)
    .map_err(PipelineError::Encode)?;
  Ok(buffer)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encoded_jpeg_decodes_to_same_size() {
    let image = RgbImage::from_pixel(32, 16, image::Rgb([10, 200, 30]));
    let jpeg = encode_jpeg(&image, 75).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 16));
  }
}
