// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/rectify.rs - 车牌透视矫正
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
use imageproc::geometric_transformations::{Interpolation, warp_into_with};
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

use crate::{
  config::NMS_IOU_THRESHOLD,
  label::{Label, PlateLabel},
  nms::{nms, sort_by_prob},
  projection::{ProjectionError, find_transform, rect_pts},
};

/// 越界采样的填充值
const BORDER_VALUE: Rgb<u8> = Rgb([0, 0, 0]);
/// 映射到无穷远处的像素使用一个必然越界的坐标
const OUTSIDE: (f32, f32) = (-1.0, -1.0);
/// 最后一行/列向内收的距离，双线性插值需要右下相邻像素
const EDGE_INSET: f32 = 1e-3;

/// [size - 1, size) 内的坐标收到 size - 1 - EDGE_INSET，其余不变
fn inset_last_pixel(v: f32, size: f32) -> f32 {
  if v >= size - 1.0 && v < size {
    (size - 1.0 - EDGE_INSET).max(0.0)
  } else {
    v
  }
}

/// 按 h 将图像透视变换到 out_size 大小，越界处填黑
pub fn warp_perspective(
  image: &RgbImage,
  h: &Matrix3<f64>,
  out_size: (u32, u32),
) -> Result<RgbImage, ProjectionError> {
  // 输出像素反向映射回源图像
  let inv = h.try_inverse().ok_or(ProjectionError::Singular)?;
  let mut out = RgbImage::new(out_size.0, out_size.1);
  let (src_w, src_h) = (image.width() as f32, image.height() as f32);

  warp_into_with(
    image,
    move |x, y| {
      let v = inv * Vector3::new(x as f64, y as f64, 1.0);
      if v.z.abs() <= f64::EPSILON || !v.iter().all(|c| c.is_finite()) {
        return OUTSIDE;
      }
      (
        inset_last_pixel((v.x / v.z) as f32, src_w),
        inset_last_pixel((v.y / v.z) as f32, src_h),
      )
    },
    Interpolation::Bilinear,
    BORDER_VALUE,
    &mut out,
  );

  Ok(out)
}

/// 去重后的检测结果与矫正图像，两者按下标一一对应
#[derive(Debug, Clone, Default)]
pub struct Rectified {
  pub labels: Vec<PlateLabel>,
  pub crops: Vec<RgbImage>,
}

impl Rectified {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&PlateLabel, &RgbImage)> {
    self.labels.iter().zip(self.crops.iter())
  }
}

/// 去重、排序并逐个矫正候选车牌
#[derive(Debug, Clone, Copy)]
pub struct Rectifier {
  out_size: (u32, u32),
  iou_threshold: f32,
}

impl Rectifier {
  pub fn new(out_size: (u32, u32)) -> Self {
    Self {
      out_size,
      iou_threshold: NMS_IOU_THRESHOLD,
    }
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  pub fn out_size(&self) -> (u32, u32) {
    self.out_size
  }

  /// 原图像素坐标下的车牌四角到输出矩形的投影变换
  pub fn transform_for(
    &self,
    image_size: (u32, u32),
    label: &PlateLabel,
  ) -> Result<Matrix3<f64>, ProjectionError> {
    let src = label.homogeneous_pixels(image_size.0, image_size.1);
    let dst = rect_pts(0.0, 0.0, self.out_size.0 as f64, self.out_size.1 as f64);
    find_transform(&src, &dst)
  }

  pub fn rectify_one(
    &self,
    image: &RgbImage,
    label: &PlateLabel,
  ) -> Result<RgbImage, ProjectionError> {
    let h = self.transform_for(image.dimensions(), label)?;
    warp_perspective(image, &h, self.out_size)
  }

  /// 对候选执行去重与矫正。
  ///
  /// `image` 必须是未缩放的原图。几何退化的候选被跳过，其余候选的
  /// 顺序按置信度降序。
  pub fn rectify(&self, image: &RgbImage, candidates: Vec<PlateLabel>) -> Rectified {
    if candidates.is_empty() {
      return Rectified::default();
    }

    let mut survivors = nms(candidates, self.iou_threshold);
    sort_by_prob(&mut survivors);

    let crops = self.rectify_all(image, &survivors);

    let mut rectified = Rectified {
      labels: Vec::with_capacity(survivors.len()),
      crops: Vec::with_capacity(survivors.len()),
    };
    for (label, crop) in survivors.into_iter().zip(crops) {
      match crop {
        Ok(crop) => {
          rectified.labels.push(label);
          rectified.crops.push(crop);
        }
        Err(e) => {
          warn!(
            "跳过几何退化的车牌 (置信度 {:.3}, 包围框 {:?}-{:?}): {}",
            label.prob(),
            label.tl(),
            label.br(),
            e
          );
        }
      }
    }

    debug!("矫正完成: {} 个车牌", rectified.len());
    rectified
  }

  #[cfg(not(feature = "parallel"))]
  fn rectify_all(
    &self,
    image: &RgbImage,
    labels: &[PlateLabel],
  ) -> Vec<Result<RgbImage, ProjectionError>> {
    labels
      .iter()
      .map(|label| self.rectify_one(image, label))
      .collect()
  }

  #[cfg(feature = "parallel")]
  fn rectify_all(
    &self,
    image: &RgbImage,
    labels: &[PlateLabel],
  ) -> Vec<Result<RgbImage, ProjectionError>> {
    use rayon::prelude::*;

    labels
      .par_iter()
      .map(|label| self.rectify_one(image, label))
      .collect()
  }
}
