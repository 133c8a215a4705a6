// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/grid.rs - 网络输出网格
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

use nalgebra::Matrix2x3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 每个单元至少包含的通道数：概率 2 个 + 仿射参数 6 个
pub const GRID_MIN_CHANNELS: usize = 8;
const GRID_PROB_CHANNEL: usize = 0;
const GRID_AFFINE_CHANNEL: usize = 2;

#[derive(Error, Debug, PartialEq)]
pub enum GridError {
  #[error("网格通道数不足: 至少需要 8, 实际为 {0}")]
  ChannelCount(usize),
  #[error("网格数据长度不匹配: 期望 {expected}, 实际 {found}")]
  DataLength { expected: usize, found: usize },
  #[error("网格尺寸溢出: {rows}x{cols}x{channels}")]
  ShapeOverflow {
    rows: usize,
    cols: usize,
    channels: usize,
  },
}

/// 形状为 (rows, cols, channels) 的行主序网格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridRepr")]
pub struct Grid {
  rows: usize,
  cols: usize,
  channels: usize,
  data: Vec<f32>,
}

#[derive(Deserialize)]
struct GridRepr {
  rows: usize,
  cols: usize,
  channels: usize,
  data: Vec<f32>,
}

impl TryFrom<GridRepr> for Grid {
  type Error = GridError;

  fn try_from(repr: GridRepr) -> Result<Self, Self::Error> {
    Grid::new(repr.rows, repr.cols, repr.channels, repr.data)
  }
}

impl Grid {
  pub fn new(rows: usize, cols: usize, channels: usize, data: Vec<f32>) -> Result<Self, GridError> {
    if channels < GRID_MIN_CHANNELS {
      return Err(GridError::ChannelCount(channels));
    }
    let expected = Self::len_for(rows, cols, channels)?;
    if data.len() != expected {
      return Err(GridError::DataLength {
        expected,
        found: data.len(),
      });
    }
    Ok(Self {
      rows,
      cols,
      channels,
      data,
    })
  }

  pub fn zeros(rows: usize, cols: usize, channels: usize) -> Result<Self, GridError> {
    if channels < GRID_MIN_CHANNELS {
      return Err(GridError::ChannelCount(channels));
    }
    let len = Self::len_for(rows, cols, channels)?;
    Self::new(rows, cols, channels, vec![0.0; len])
  }

  fn len_for(rows: usize, cols: usize, channels: usize) -> Result<usize, GridError> {
    rows
      .checked_mul(cols)
      .and_then(|n| n.checked_mul(channels))
      .ok_or(GridError::ShapeOverflow {
        rows,
        cols,
        channels,
      })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn cell(&self, row: usize, col: usize) -> &[f32] {
    let start = (row * self.cols + col) * self.channels;
    &self.data[start..start + self.channels]
  }

  pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut [f32] {
    let start = (row * self.cols + col) * self.channels;
    &mut self.data[start..start + self.channels]
  }

  pub fn prob(&self, row: usize, col: usize) -> f32 {
    self.cell(row, col)[GRID_PROB_CHANNEL]
  }

  /// 单元的 2x3 仿射矩阵，按行读取通道 2..8
  pub fn affine(&self, row: usize, col: usize) -> Matrix2x3<f32> {
    let cell = self.cell(row, col);
    Matrix2x3::from_row_slice(&cell[GRID_AFFINE_CHANNEL..GRID_AFFINE_CHANNEL + 6])
  }

  /// 写入一个单元的概率与仿射参数
  pub fn set_cell(&mut self, row: usize, col: usize, prob: f32, affine: [f32; 6]) {
    let cell = self.cell_mut(row, col);
    cell[GRID_PROB_CHANNEL] = prob;
    cell[GRID_AFFINE_CHANNEL..GRID_AFFINE_CHANNEL + 6].copy_from_slice(&affine);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_short_channel_dimension() {
    assert_eq!(Grid::zeros(2, 2, 6), Err(GridError::ChannelCount(6)));
  }

  #[test]
  fn rejects_wrong_data_length() {
    let err = Grid::new(2, 3, 8, vec![0.0; 10]).unwrap_err();
    assert_eq!(
      err,
      GridError::DataLength {
        expected: 48,
        found: 10
      }
    );
  }

  #[test]
  fn affine_is_read_row_major() {
    let mut grid = Grid::zeros(3, 4, 8).unwrap();
    grid.set_cell(1, 2, 0.7, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let a = grid.affine(1, 2);
    assert_eq!(a[(0, 0)], 1.0);
    assert_eq!(a[(0, 2)], 3.0);
    assert_eq!(a[(1, 0)], 4.0);
    assert_eq!(a[(1, 2)], 6.0);
    assert_eq!(grid.prob(1, 2), 0.7);
    assert_eq!(grid.prob(2, 1), 0.0);
  }

  #[test]
  fn deserialize_validates_shape() {
    let ok: Grid =
      serde_json::from_str(r#"{"rows":1,"cols":1,"channels":8,"data":[0.9,0,1,0,0,0,1,0]}"#)
        .unwrap();
    assert_eq!(ok.prob(0, 0), 0.9);

    let bad = serde_json::from_str::<Grid>(r#"{"rows":1,"cols":1,"channels":8,"data":[0.9]}"#);
    assert!(bad.is_err());
  }

  #[test]
  fn oversized_shape_is_an_error() {
    let huge = 1usize << 32;
    assert_eq!(
      Grid::new(huge, huge, 8, Vec::new()),
      Err(GridError::ShapeOverflow {
        rows: huge,
        cols: huge,
        channels: 8
      })
    );
    assert!(matches!(
      Grid::zeros(usize::MAX, 2, 8),
      Err(GridError::ShapeOverflow { .. })
    ));

    let bad = serde_json::from_str::<Grid>(
      r#"{"rows":4294967296,"cols":4294967296,"channels":8,"data":[]}"#,
    );
    assert!(bad.is_err());
  }
}
