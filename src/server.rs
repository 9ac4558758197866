// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server.rs - gRPC 与 HTTP 服务启动
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

use axum::Router;
use tokio::{net::TcpListener, sync::watch};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};

use crate::{
  detection::DetectionRpc,
  error::PipelineError,
  model::Model,
  proto::FILE_DESCRIPTOR_SET,
  visualization::VisualizationRpc,
};

/// 默认最大 gRPC 消息大小（32 MiB）
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;

fn reflection_builder() -> tonic_reflection::server::Builder<'static> {
  tonic_reflection::server::Builder::configure()
    .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
}

fn reflection_error(err: tonic_reflection::server::Error) -> PipelineError {
  PipelineError::Config(format!("无法构建反射服务: {}", err))
}

/// 关闭信号：接收到 `true` 或发送端全部丢弃时返回
pub async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
  let _ = shutdown.wait_for(|stop| *stop).await;
}

/// 监听 Ctrl-C，触发后把关闭信号置为 `true`
pub fn watch_ctrl_c() -> watch::Receiver<bool> {
  let (tx, rx) = watch::channel(false);
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        info!("收到 Ctrl-C, 正在关闭服务");
        let _ = tx.send(true);
      }
      Err(e) => {
        error!("无法监听 Ctrl-C: {}", e);
        // 保留发送端，避免服务被误关闭
        futures::future::pending::<()>().await;
      }
    }
  });
  rx
}

/// 在给定监听器上运行检测服务，附带反射
pub async fn serve_detection<M: Model>(
  listener: TcpListener,
  rpc: DetectionRpc<M>,
  max_message_size: usize,
  shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
  let addr = listener.local_addr().ok();
  let reflection_v1 = reflection_builder().build_v1().map_err(reflection_error)?;
  let reflection_v1alpha = reflection_builder()
    .build_v1alpha()
    .map_err(reflection_error)?;

  info!("检测服务监听于 {:?}", addr);
  Server::builder()
    .add_service(reflection_v1)
    .add_service(reflection_v1alpha)
    .add_service(rpc.into_server(max_message_size))
    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal(shutdown))
    .await?;
  info!("检测服务已停止");
  Ok(())
}

/// 在给定监听器上运行可视化服务，附带反射
pub async fn serve_visualization(
  listener: TcpListener,
  rpc: VisualizationRpc,
  max_message_size: usize,
  shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
  let addr = listener.local_addr().ok();
  let reflection_v1 = reflection_builder().build_v1().map_err(reflection_error)?;
  let reflection_v1alpha = reflection_builder()
    .build_v1alpha()
    .map_err(reflection_error)?;

  info!("可视化服务监听于 {:?}", addr);
  Server::builder()
    .add_service(reflection_v1)
    .add_service(reflection_v1alpha)
    .add_service(rpc.into_server(max_message_size))
    .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal(shutdown))
    .await?;
  info!("可视化服务已停止");
  Ok(())
}

/// 运行 HTTP 网关直到收到关闭信号
pub async fn serve_http(
  listener: TcpListener,
  router: Router,
  shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
  info!("HTTP 网关监听于 {:?}", listener.local_addr().ok());
  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await
    .map_err(|e| PipelineError::Transport(format!("HTTP 网关异常退出: {}", e)))?;
  info!("HTTP 网关已停止");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn shutdown_signal_resolves_on_true() {
    let (tx, rx) = watch::channel(false);
    let waiter = tokio::spawn(shutdown_signal(rx));
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), waiter)
      .await
      .unwrap()
      .unwrap();
  }

  #[tokio::test]
  async fn shutdown_signal_ignores_false() {
    let (tx, rx) = watch::channel(false);
    tx.send(false).unwrap();
    let waited = tokio::time::timeout(Duration::from_millis(50), shutdown_signal(rx)).await;
    assert!(waited.is_err());
    drop(tx);
  }

  #[test]
  fn reflection_services_build() {
    assert!(reflection_builder().build_v1().is_ok());
    assert!(reflection_builder().build_v1alpha().is_ok());
  }
}
