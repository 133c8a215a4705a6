// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复检测计时
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use chepai::{
  DetectConfig, FromUrl, PlateDetector,
  input::ImageFileInput,
  model::GridReplay,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};

/// Chepai 重复检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 网络输出网格 (grid://<path>.json)
  #[arg(long, value_name = "GRID")]
  pub grid: Url,
  /// 输入图像 (image://<path>)
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径 (image://<path> 或 folder://<dir>)
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 缩放后短边长度
  #[arg(long, default_value = "288", value_name = "PIXELS")]
  pub max_dim: u32,
  /// 重复次数
  #[arg(long, default_value = "1000")]
  pub times: usize,
  /// 不计入平均值的预热次数
  #[arg(long, default_value = "2")]
  pub warmup: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("网格文件: {}", args.grid);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let config = DetectConfig {
    max_dim: args.max_dim,
    ..DetectConfig::default()
  };
  let model = PlateDetector::new(GridReplay::from_url(&args.grid)?, config);
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .with_warmup(args.warmup)
    .run_task(input, model, output)?;

  Ok(())
}
