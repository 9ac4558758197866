// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/visualization_service.rs - 可视化服务与推流网关
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use shanan_pipeline::{
  FrameSlot,
  args::{VisualizationArgs, init_tracing},
  gateway::{GatewayState, router},
  output::Draw,
  server::{serve_http, serve_visualization, watch_ctrl_c},
  visualization::{VisualizationRpc, Visualizer},
};

#[tokio::main]
async fn main() -> Result<()> {
  init_tracing();

  let args = VisualizationArgs::parse();
  info!("gRPC 监听地址: {}", args.listen);
  info!("HTTP 监听地址: {}", args.http_listen);

  let draw = Draw::discover(args.font.as_deref()).context("无法加载图例字体")?;
  let visualizer = Visualizer::new(draw, args.render_options());

  let slot = FrameSlot::new();
  let shutdown = watch_ctrl_c();

  let grpc_listener = TcpListener::bind(args.listen)
    .await
    .with_context(|| format!("无法监听 {}", args.listen))?;
  let http_listener = TcpListener::bind(args.http_listen)
    .await
    .with_context(|| format!("无法监听 {}", args.http_listen))?;

  let rpc = VisualizationRpc::new(visualizer, slot.clone());
  let gateway = router(GatewayState::new(slot, args.poll_interval(), shutdown.clone()));

  let grpc = tokio::spawn(serve_visualization(
    grpc_listener,
    rpc,
    args.max_message_size,
    shutdown.clone(),
  ));
  let http = tokio::spawn(serve_http(http_listener, gateway, shutdown));

  // 任意一端失败即退出进程
  tokio::try_join!(
    async { grpc.await.context("gRPC 服务任务异常退出")?.context("gRPC 服务运行失败") },
    async { http.await.context("HTTP 网关任务异常退出")?.context("HTTP 网关运行失败") },
  )?;

  Ok(())
}
