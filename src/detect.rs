// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/detect.rs - 车牌检测流程
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

use std::time::{Duration, Instant};

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::{DetectConfig, ReconstructConfig},
  decoder::{DecodeError, GridDecoder},
  frame::NhwcTensor,
  grid::Grid,
  label::PlateLabel,
  model::Model,
  rectify::{Rectified, Rectifier},
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("输入图像为空")]
  EmptyImage,
  #[error("检测参数无效: {0}")]
  InvalidConfig(String),
  #[error("模型推理错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("网格解码错误: {0}")]
  Decode(#[from] DecodeError),
}

/// 网络输入尺寸：短边缩放到 max_dim，再将宽高向上对齐到 net_step 的倍数
pub fn network_input_size(width: u32, height: u32, max_dim: u32, net_step: u32) -> (u32, u32) {
  let min_dim = width.min(height).max(1) as f64;
  let factor = max_dim as f64 / min_dim;
  let w = (width as f64 * factor) as u32;
  let h = (height as f64 * factor) as u32;
  (align_up(w, net_step), align_up(h, net_step))
}

fn align_up(value: u32, step: u32) -> u32 {
  match value % step {
    0 => value,
    rem => value + (step - rem),
  }
}

/// 将图像直接缩放到网络输入尺寸
pub fn preprocess(image: &RgbImage, max_dim: u32, net_step: u32) -> RgbImage {
  let (w, h) = network_input_size(image.width(), image.height(), max_dim, net_step);
  debug!(
    "缩放输入图像: {}x{} -> {}x{}",
    image.width(),
    image.height(),
    w,
    h
  );
  image::imageops::resize(image, w, h, FilterType::Triangle)
}

/// 一次检测的结果
#[derive(Debug, Clone)]
pub struct PlateDetection {
  /// 按置信度降序排列的车牌
  pub labels: Vec<PlateLabel>,
  /// 与 labels 一一对应的矫正图像
  pub crops: Vec<RgbImage>,
  /// 网络推理耗时
  pub elapsed: Duration,
  /// 送入网络的图像尺寸
  pub input_size: (u32, u32),
}

impl PlateDetection {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

/// 缩放、推理、解码、去重与矫正的完整流程
pub struct PlateDetector<M> {
  model: M,
  decoder: GridDecoder,
  rectifier: Rectifier,
  config: DetectConfig,
}

impl<M> PlateDetector<M> {
  pub fn new(model: M, config: DetectConfig) -> Self {
    Self {
      model,
      decoder: GridDecoder::default(),
      rectifier: Rectifier::new(config.out_size).iou_threshold(config.iou_threshold),
      config,
    }
  }

  pub fn reconstruct_config(mut self, config: ReconstructConfig) -> Self {
    self.decoder = GridDecoder::new(config);
    self
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  pub fn model(&self) -> &M {
    &self.model
  }
}

impl<M> PlateDetector<M>
where
  M: Model<Input = NhwcTensor, Output = Grid>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn detect(&self, image: &RgbImage) -> Result<PlateDetection, DetectError> {
    if image.width() == 0 || image.height() == 0 {
      return Err(DetectError::EmptyImage);
    }
    if self.config.max_dim == 0 || self.config.net_step == 0 {
      return Err(DetectError::InvalidConfig(format!(
        "max_dim={}, net_step={}",
        self.config.max_dim, self.config.net_step
      )));
    }

    let resized = preprocess(image, self.config.max_dim, self.config.net_step);
    let input_size = resized.dimensions();
    let tensor = NhwcTensor::from(&resized);

    let start = Instant::now();
    let grid = self
      .model
      .infer(&tensor)
      .map_err(|e| DetectError::Model(Box::new(e)))?;
    let elapsed = start.elapsed();
    debug!("网络推理耗时: {:.2?}", elapsed);

    let candidates = self
      .decoder
      .decode(&grid, input_size, self.config.threshold)?;
    let Rectified { labels, crops } = self.rectifier.rectify(image, candidates);

    info!("检测到 {} 个车牌", labels.len());
    Ok(PlateDetection {
      labels,
      crops,
      elapsed,
      input_size,
    })
  }
}

impl<M> Model for PlateDetector<M>
where
  M: Model<Input = NhwcTensor, Output = Grid>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  type Input = RgbImage;
  type Output = PlateDetection;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::GridReplay;

  #[test]
  fn input_size_scales_short_side_and_aligns() {
    assert_eq!(network_input_size(320, 320, 160, 16), (160, 160));
    // 320x240 -> 213.3x160 -> 224x160
    assert_eq!(network_input_size(320, 240, 160, 16), (224, 160));
    assert_eq!(network_input_size(240, 320, 160, 16), (160, 224));
  }

  #[test]
  fn align_up_keeps_multiples() {
    assert_eq!(align_up(32, 16), 32);
    assert_eq!(align_up(33, 16), 48);
    assert_eq!(align_up(0, 16), 0);
  }

  #[test]
  fn preprocess_resizes_to_network_input() {
    let image = RgbImage::new(320, 240);
    assert_eq!(preprocess(&image, 160, 16).dimensions(), (224, 160));
  }

  #[test]
  fn empty_image_is_rejected() {
    let detector = PlateDetector::new(
      GridReplay::from_grid(Grid::zeros(1, 1, 8).unwrap()),
      DetectConfig::default(),
    );
    assert!(matches!(
      detector.detect(&RgbImage::new(0, 10)),
      Err(DetectError::EmptyImage)
    ));
  }

  #[test]
  fn grid_of_wrong_size_fails_decode() {
    let detector = PlateDetector::new(
      GridReplay::from_grid(Grid::zeros(4, 4, 8).unwrap()),
      DetectConfig {
        max_dim: 160,
        ..DetectConfig::default()
      },
    );
    assert!(matches!(
      detector.detect(&RgbImage::new(320, 320)),
      Err(DetectError::Decode(DecodeError::ShapeMismatch { .. }))
    ));
  }
}
