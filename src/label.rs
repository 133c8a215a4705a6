// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/label.rs - 检测标签
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

use nalgebra::{Matrix2x4, Matrix3x4, Vector2};

/// 车牌类别编号，本领域只有一个类别
pub const PLATE_CLASS_ID: u32 = 0;

/// 轴对齐包围框能力：去重只依赖这组接口
pub trait Label {
  fn class_id(&self) -> u32;
  /// 左上角（最小坐标）
  fn tl(&self) -> Vector2<f32>;
  /// 右下角（最大坐标）
  fn br(&self) -> Vector2<f32>;
  fn prob(&self) -> f32;

  fn wh(&self) -> Vector2<f32> {
    self.br() - self.tl()
  }

  /// 包围框中心
  fn cc(&self) -> Vector2<f32> {
    self.tl() + self.wh() * 0.5
  }

  fn area(&self) -> f32 {
    let wh = self.wh();
    wh.x * wh.y
  }
}

/// 两个包围框的交并比；并集为零时返回 0
pub fn iou<A: Label + ?Sized, B: Label + ?Sized>(a: &A, b: &B) -> f32 {
  let (tl1, br1) = (a.tl(), a.br());
  let (tl2, br2) = (b.tl(), b.br());

  let iw = (br1.x.min(br2.x) - tl1.x.max(tl2.x)).max(0.0);
  let ih = (br1.y.min(br2.y) - tl1.y.max(tl2.y)).max(0.0);
  let intersection = iw * ih;
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 普通的轴对齐标签
#[derive(Debug, Clone, PartialEq)]
pub struct BoxLabel {
  pub class_id: u32,
  pub tl: Vector2<f32>,
  pub br: Vector2<f32>,
  pub prob: f32,
}

impl BoxLabel {
  pub fn new(class_id: u32, tl: [f32; 2], br: [f32; 2], prob: f32) -> Self {
    Self {
      class_id,
      tl: Vector2::from(tl),
      br: Vector2::from(br),
      prob,
    }
  }
}

impl Label for BoxLabel {
  fn class_id(&self) -> u32 {
    self.class_id
  }

  fn tl(&self) -> Vector2<f32> {
    self.tl
  }

  fn br(&self) -> Vector2<f32> {
    self.br
  }

  fn prob(&self) -> f32 {
    self.prob
  }
}

/// 车牌四边形检测结果。
///
/// `pts` 的四列依次为左上、右上、右下、左下，坐标归一化到 [0, 1]，
/// 乘以原图宽高即得到像素坐标。创建后不可修改。
#[derive(Debug, Clone, PartialEq)]
pub struct PlateLabel {
  class_id: u32,
  pts: Matrix2x4<f32>,
  prob: f32,
  tl: Vector2<f32>,
  br: Vector2<f32>,
}

impl PlateLabel {
  pub fn new(class_id: u32, pts: Matrix2x4<f32>, prob: f32) -> Self {
    let tl = Vector2::new(pts.row(0).min(), pts.row(1).min());
    let br = Vector2::new(pts.row(0).max(), pts.row(1).max());
    Self {
      class_id,
      pts,
      prob,
      tl,
      br,
    }
  }

  pub fn pts(&self) -> &Matrix2x4<f32> {
    &self.pts
  }

  pub fn corners(&self) -> [[f32; 2]; 4] {
    std::array::from_fn(|i| [self.pts[(0, i)], self.pts[(1, i)]])
  }

  /// 映射到 width x height 图像上的齐次像素坐标
  pub fn homogeneous_pixels(&self, width: u32, height: u32) -> Matrix3x4<f64> {
    let (w, h) = (width as f64, height as f64);
    Matrix3x4::from_fn(|r, c| match r {
      0 => self.pts[(0, c)] as f64 * w,
      1 => self.pts[(1, c)] as f64 * h,
      _ => 1.0,
    })
  }

  /// 四边形的有向面积（鞋带公式），顺时针图像坐标下为正
  pub fn signed_area(&self) -> f32 {
    let c = self.corners();
    let mut sum = 0.0;
    for i in 0..4 {
      let j = (i + 1) % 4;
      sum += c[i][0] * c[j][1] - c[j][0] * c[i][1];
    }
    sum * 0.5
  }
}

impl Label for PlateLabel {
  fn class_id(&self) -> u32 {
    self.class_id
  }

  fn tl(&self) -> Vector2<f32> {
    self.tl
  }

  fn br(&self) -> Vector2<f32> {
    self.br
  }

  fn prob(&self) -> f32 {
    self.prob
  }
}
