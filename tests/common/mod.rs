// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::{convert::Infallible, net::SocketAddr};

use image::{ImageFormat, Rgb, RgbImage};
use shanan_pipeline::model::{DetectItem, DetectResult, Model};
use tokio::net::TcpListener;

/// 把亮色区域当作唯一目标的模型
pub struct BlobModel {
  names: Vec<String>,
}

impl Default for BlobModel {
  fn default() -> Self {
    Self {
      names: vec!["blob".to_string()],
    }
  }
}

impl Model for BlobModel {
  type Error = Infallible;

  fn infer(&self, image: &RgbImage, _target_size: u32) -> Result<DetectResult, Infallible> {
    let mut bounds: Option<[u32; 4]> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
      if pixel.0.iter().all(|&c| c > 128) {
        let b = bounds.get_or_insert([x, y, x, y]);
        b[0] = b[0].min(x);
        b[1] = b[1].min(y);
        b[2] = b[2].max(x);
        b[3] = b[3].max(y);
      }
    }

    let items = bounds
      .map(|[x0, y0, x1, y1]| DetectItem {
        class_id: 0,
        score: 0.9,
        bbox: [x0 as f32, y0 as f32, (x1 + 1) as f32, (y1 + 1) as f32],
      })
      .into_iter()
      .collect::<Vec<_>>();
    Ok(items.into())
  }

  fn class_names(&self) -> &[String] {
    &self.names
  }
}

/// 黑底上一个白色矩形，矩形范围为 `[x0, x1) × [y0, y1)`
pub fn scene_png(width: u32, height: u32, rect: [u32; 4]) -> Vec<u8> {
  let [x0, y0, x1, y1] = rect;
  let image = RgbImage::from_fn(width, height, |x, y| {
    if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
      Rgb([255, 255, 255])
    } else {
      Rgb([0, 0, 0])
    }
  });
  let mut buffer = std::io::Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png).unwrap();
  buffer.into_inner()
}

pub async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  (listener, addr)
}
