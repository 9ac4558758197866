// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 最新帧共享槽
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

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

/// 单槽、后写者胜出的帧存储
///
/// 克隆得到的是同一个槽的句柄。写入方（可视化服务）调用 [`FrameSlot::publish`]，
/// 读取方（推流网关）调用 [`FrameSlot::read`]，二者互不感知。
/// 槽内保存的是完整编码好的 JPEG，读者只会看到 `None` 或某一次完整的写入。
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
  latest: Arc<RwLock<Option<Bytes>>>,
}

impl FrameSlot {
  pub fn new() -> Self {
    Self::default()
  }

  /// 原子地替换当前帧
  pub fn publish(&self, frame: impl Into<Bytes>) {
    let frame = frame.into();
    // 锁内只做指针交换，旧帧在锁外释放
    let previous = {
      let mut guard = self.latest.write().unwrap_or_else(PoisonError::into_inner);
      guard.replace(frame)
    };
    drop(previous);
  }

  /// 读取当前帧，尚未发布时返回 `None`
  pub fn read(&self) -> Option<Bytes> {
    self
      .latest
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}
