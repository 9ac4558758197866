// 该文件是 Shanan （山南西风） 项目的一部分。
// src/gateway.rs - MJPEG 推流网关
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

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::{
  Router,
  body::Body,
  extract::State,
  http::header,
  response::{Html, IntoResponse},
  routing::get,
};
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use tokio::sync::watch;
use tracing::debug;

use crate::frame::FrameSlot;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const BOUNDARY: &str = "frame";
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Shanan 实时画面</title>
  </head>
  <body>
    <h1>Shanan 实时画面</h1>
    <img src="/video_feed" alt="video feed">
  </body>
</html>
"#;

#[derive(Clone)]
pub struct GatewayState {
  slot: FrameSlot,
  poll_interval: Duration,
  shutdown: watch::Receiver<bool>,
}

impl GatewayState {
  /// `shutdown` 变为 `true` 时所有推流循环结束
  pub fn new(slot: FrameSlot, poll_interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
    Self {
      slot,
      poll_interval,
      shutdown,
    }
  }
}

pub fn router(state: GatewayState) -> Router {
  Router::new()
    .route("/", get(index))
    .route("/video_feed", get(video_feed))
    .with_state(state)
}

async fn index() -> Html<&'static str> {
  Html(INDEX_HTML)
}

async fn video_feed(State(state): State<GatewayState>) -> impl IntoResponse {
  debug!("新的观看者接入");
  let parts = frame_stream(state.slot, state.poll_interval, state.shutdown);
  (
    [
      (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
      (header::CACHE_CONTROL, "no-cache"),
    ],
    Body::from_stream(parts),
  )
}

/// 把一帧 JPEG 包装为一个 multipart 分段
pub fn frame_part(jpeg: &[u8]) -> Bytes {
  let mut part = BytesMut::with_capacity(jpeg.len() + 64);
  part.put_slice(b"--");
  part.put_slice(BOUNDARY.as_bytes());
  part.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
  part.put_slice(jpeg);
  part.put_slice(b"\r\n");
  part.freeze()
}

/// 单个观看者的轮询循环
///
/// 每隔 `interval` 读取一次帧槽，有帧就输出一个分段，没有就继续等待。
/// 观看者断开时流被丢弃，循环随之结束；收到关闭信号时流正常结束。
pub fn frame_stream(
  slot: FrameSlot,
  interval: Duration,
  mut shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
  stream! {
    loop {
      if *shutdown.borrow() {
        break;
      }

      tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        // 发送端被丢弃后这一分支不再匹配，只剩定时器
        Ok(()) = shutdown.changed() => continue,
      }

      if let Some(frame) = slot.read() {
        yield Ok(frame_part(&frame));
      }
    }
    debug!("推流循环结束");
  }
}
