// 该文件是 Chepai （车牌矫正） 项目的一部分。
// tests/common/synthetic.rs - 合成图像与网格
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

use chepai::Grid;
use image::{Rgb, RgbImage};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

/// R = x / 2, G = y / 2, B 固定，便于从采样值反推源坐标
pub fn gradient(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x / 2).min(255) as u8, (y / 2).min(255) as u8, 64])
  })
}

/// 全零网格，并按 (row, col, prob, affine) 设置若干单元
pub fn grid_with(rows: usize, cols: usize, cells: &[(usize, usize, f32, [f32; 6])]) -> Grid {
  let mut grid = Grid::zeros(rows, cols, 8).expect("valid grid shape");
  for &(row, col, prob, affine) in cells {
    grid.set_cell(row, col, prob, affine);
  }
  grid
}

/// 随机概率与随机仿射参数的网格
pub fn random_grid(rows: usize, cols: usize, seed: u64) -> Grid {
  let mut rng = StdRng::seed_from_u64(seed);
  let mut grid = Grid::zeros(rows, cols, 8).expect("valid grid shape");
  for row in 0..rows {
    for col in 0..cols {
      let affine = std::array::from_fn(|_| rng.gen_range(-1.5..1.5));
      grid.set_cell(row, col, rng.gen_range(0.0..1.0), affine);
    }
  }
  grid
}
