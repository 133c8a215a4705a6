// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像车牌检测与矫正
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
  task::{OneShotTask, Task},
};

/// Chepai 单张图像参数配置
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
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub threshold: f32,
  /// 缩放后短边长度，缺省时按车辆图像长宽比计算
  #[arg(long, value_name = "PIXELS")]
  pub max_dim: Option<u32>,
  /// 矫正输出宽度
  #[arg(long, default_value = "240")]
  pub out_width: u32,
  /// 矫正输出高度
  #[arg(long, default_value = "80")]
  pub out_height: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("网格文件: {}", args.grid);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let image = ImageFileInput::from_url(&args.input)?
    .next()
    .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;

  let mut config = match args.max_dim {
    Some(max_dim) => DetectConfig {
      max_dim,
      ..DetectConfig::default()
    },
    None => DetectConfig::for_vehicle(image.width(), image.height()),
  };
  config.threshold = args.threshold;
  config.out_size = (args.out_width, args.out_height);
  info!("检测参数: {:?}", config);

  let model = PlateDetector::new(GridReplay::from_url(&args.grid)?, config);
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(ImageFileInput::from(image), model, output)?;

  Ok(())
}
