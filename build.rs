// 该文件是 Shanan （山南西风） 项目的一部分。
// build.rs - 编译 protobuf 描述
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

use std::{env, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
  // 使用随 crate 分发的 protoc，避免依赖系统环境
  let protoc = protoc_bin_vendored::protoc_bin_path()?;
  // SAFETY: 构建脚本为单线程，此时没有其他线程读取环境变量
  unsafe {
    env::set_var("PROTOC", protoc);
  }

  let out_dir = PathBuf::from(env::var("OUT_DIR")?);
  println!("cargo:rerun-if-changed=proto/pipeline.proto");

  tonic_build::configure()
    .file_descriptor_set_path(out_dir.join("pipeline_descriptor.bin"))
    .compile_protos(&["proto/pipeline.proto"], &["proto"])?;

  Ok(())
}
