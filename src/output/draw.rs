// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/output/draw.rs - 车牌检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::{detect::PlateDetection, label::PlateLabel};

const QUAD_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const QUAD_THICKNESS: i32 = 2;

/// 在原图上绘制车牌四边形
pub struct Draw {
  color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: QUAD_COLOR,
      thickness: QUAD_THICKNESS,
    }
  }
}

impl Draw {
  pub fn new(color: [u8; 3], thickness: i32) -> Self {
    Self {
      color,
      thickness: thickness.max(1),
    }
  }

  fn draw_quad(&self, image: &mut RgbImage, label: &PlateLabel) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let corners = label.corners().map(|[x, y]| (x * w, y * h));

    for i in 0..corners.len() {
      let (x0, y0) = corners[i];
      let (x1, y1) = corners[(i + 1) % corners.len()];
      // 平移多条线段加粗边框
      for t in 0..self.thickness {
        let d = t as f32 - (self.thickness - 1) as f32 / 2.0;
        draw_line_segment_mut(image, (x0 + d, y0), (x1 + d, y1), Rgb(self.color));
        draw_line_segment_mut(image, (x0, y0 + d), (x1, y1 + d), Rgb(self.color));
      }
    }
  }

  pub fn draw_on_image(&self, image: &mut RgbImage, labels: &[PlateLabel]) {
    for label in labels {
      self.draw_quad(image, label);
    }
  }

  pub fn draw_detection(&self, frame: &RgbImage, result: &PlateDetection) -> RgbImage {
    let mut image = frame.clone();
    self.draw_on_image(&mut image, &result.labels);
    image
  }
}
