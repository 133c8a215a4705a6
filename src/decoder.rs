// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/decoder.rs - 网格解码
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

use nalgebra::{Matrix2x3, Matrix2x4, Matrix3x4, Vector2};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  config::ReconstructConfig,
  grid::Grid,
  label::{PLATE_CLASS_ID, PlateLabel},
};

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("网格尺寸与输入不符: 输入 {input:?} / 步长 {stride} 应为 {expected:?}, 网格为 {found:?}")]
  ShapeMismatch {
    input: (u32, u32),
    stride: u32,
    expected: (usize, usize),
    found: (usize, usize),
  },
}

/// 对角项取非负，防止四边形沿主轴翻转；剪切与平移项保持不变
pub fn clamp_affine(mut affine: Matrix2x3<f32>) -> Matrix2x3<f32> {
  affine[(0, 0)] = affine[(0, 0)].max(0.0);
  affine[(1, 1)] = affine[(1, 1)].max(0.0);
  affine
}

/// 将概率/仿射网格解码为车牌四边形候选
#[derive(Debug, Clone, Default)]
pub struct GridDecoder {
  config: ReconstructConfig,
}

impl GridDecoder {
  pub fn new(config: ReconstructConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &ReconstructConfig {
    &self.config
  }

  /// 齐次基准四边形，列顺序为 (-,-) (+,-) (+,+) (-,+)
  pub fn base_quad(&self) -> Matrix3x4<f32> {
    let a = self.config.alpha;
    #[rustfmt::skip]
    let base = Matrix3x4::new(
      -a,   a,   a,  -a,
      -a,  -a,   a,   a,
      1.0, 1.0, 1.0, 1.0,
    );
    base
  }

  /// 解码网格。
  ///
  /// `input_size` 是送入网络的图像尺寸 (宽, 高)，必须恰好是网格
  /// (cols, rows) 的 `net_stride` 倍。返回的候选按行主序排列，未去重。
  /// 通道数由 [`Grid`] 构造时保证不少于 8。
  pub fn decode(
    &self,
    grid: &Grid,
    input_size: (u32, u32),
    threshold: f32,
  ) -> Result<Vec<PlateLabel>, DecodeError> {
    let stride = self.config.net_stride.max(1);
    let expected = (
      (input_size.0 / stride) as usize,
      (input_size.1 / stride) as usize,
    );
    let found = (grid.cols(), grid.rows());
    if input_size.0 % stride != 0 || input_size.1 % stride != 0 || expected != found {
      error!(
        "网格尺寸与输入不符: 输入 {:?}, 期望 {:?}, 实际 {:?}",
        input_size, expected, found
      );
      return Err(DecodeError::ShapeMismatch {
        input: input_size,
        stride,
        expected,
        found,
      });
    }

    let mn = Vector2::new(
      input_size.0 as f32 / stride as f32,
      input_size.1 as f32 / stride as f32,
    );
    let base = self.base_quad();

    let mut labels = Vec::new();
    for row in 0..grid.rows() {
      for col in 0..grid.cols() {
        let prob = grid.prob(row, col);
        if prob > threshold {
          let pts = self.cell_quad(&grid.affine(row, col), &base, row, col, &mn);
          labels.push(PlateLabel::new(PLATE_CLASS_ID, pts, prob));
        }
      }
    }

    debug!("阈值 {} 以上的候选数量: {}", threshold, labels.len());
    Ok(labels)
  }

  fn cell_quad(
    &self,
    affine: &Matrix2x3<f32>,
    base: &Matrix3x4<f32>,
    row: usize,
    col: usize,
    mn: &Vector2<f32>,
  ) -> Matrix2x4<f32> {
    let affine = clamp_affine(*affine);
    let center = Vector2::new(col as f32 + 0.5, row as f32 + 0.5);

    let mut pts = affine * base * self.config.side;
    for mut column in pts.column_iter_mut() {
      column += center;
      column.component_div_assign(mn);
    }
    pts
  }
}
