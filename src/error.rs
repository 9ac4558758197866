// 该文件是 Shanan （山南西风） 项目的一部分。
// src/error.rs - 流水线错误定义
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

use thiserror::Error;
use tonic::{Code, Status};

/// 检测/可视化请求过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("图像解码错误: {0}")]
  Decode(#[source] image::ImageError),
  #[error("模型推理错误: {0}")]
  Inference(String),
  #[error("图像编码错误: {0}")]
  Encode(#[source] image::ImageError),
  #[error("传输错误: {0}")]
  Transport(String),
  #[error("配置错误: {0}")]
  Config(String),
  #[error("工作线程异常退出: {0}")]
  Worker(String),
}

impl PipelineError {
  pub fn inference(err: impl std::fmt::Display) -> Self {
    PipelineError::Inference(err.to_string())
  }

  pub fn code(&self) -> Code {
    match self {
      PipelineError::Decode(_) => Code::InvalidArgument,
      PipelineError::Inference(_) | PipelineError::Encode(_) | PipelineError::Worker(_) => {
        Code::Internal
      }
      PipelineError::Transport(_) => Code::Unavailable,
      PipelineError::Config(_) => Code::FailedPrecondition,
    }
  }
}

impl From<PipelineError> for Status {
  fn from(err: PipelineError) -> Self {
    Status::new(err.code(), err.to_string())
  }
}

impl From<tokio::task::JoinError> for PipelineError {
  fn from(err: tokio::task::JoinError) -> Self {
    PipelineError::Worker(err.to_string())
  }
}

impl From<tonic::transport::Error> for PipelineError {
  fn from(err: tonic::transport::Error) -> Self {
    PipelineError::Transport(err.to_string())
  }
}

impl From<Status> for PipelineError {
  fn from(status: Status) -> Self {
    PipelineError::Transport(format!("{:?}: {}", status.code(), status.message()))
  }
}
