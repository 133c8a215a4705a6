// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/projection.rs - 投影变换求解
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

use nalgebra::{Matrix3, Matrix3x4, SMatrix, SymmetricEigen, Vector2, Vector3};
use thiserror::Error;

const EPS: f64 = 1e-9;
/// 次小特征值与最大特征值之比低于该值时认为解空间不唯一
const RANK_TOL: f64 = 1e-10;
/// 归一化（单位 Frobenius 范数）后行列式的下限
const DET_TOL: f64 = 1e-8;
/// 角点回投影允许的相对误差
const REPROJ_TOL: f64 = 1e-4;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ProjectionError {
  #[error("坐标包含非有限值")]
  NonFinite,
  #[error("点集退化，无法确定唯一的投影变换")]
  Degenerate,
  #[error("投影变换矩阵奇异")]
  Singular,
}

/// 矩形四角的齐次坐标，顺序为左上、右上、右下、左下
pub fn rect_pts(tlx: f64, tly: f64, brx: f64, bry: f64) -> Matrix3x4<f64> {
  #[rustfmt::skip]
  let pts = Matrix3x4::new(
    tlx, brx, brx, tlx,
    tly, tly, bry, bry,
    1.0, 1.0, 1.0, 1.0,
  );
  pts
}

/// 用 h 变换一个点；结果落在无穷远处时返回 None
pub fn project_point(h: &Matrix3<f64>, p: Vector2<f64>) -> Option<Vector2<f64>> {
  let v = h * Vector3::new(p.x, p.y, 1.0);
  if !v.iter().all(|c| c.is_finite()) || v.z.abs() <= EPS {
    return None;
  }
  Some(Vector2::new(v.x / v.z, v.y / v.z))
}

fn dehomogenize(pts: &Matrix3x4<f64>) -> Result<[Vector2<f64>; 4], ProjectionError> {
  let mut out = [Vector2::zeros(); 4];
  for (i, col) in pts.column_iter().enumerate() {
    if !col.iter().all(|c| c.is_finite()) {
      return Err(ProjectionError::NonFinite);
    }
    if col[2].abs() <= EPS {
      return Err(ProjectionError::Degenerate);
    }
    out[i] = Vector2::new(col[0] / col[2], col[1] / col[2]);
  }
  Ok(out)
}

/// 平移到质心并缩放使平均距离为 sqrt(2)
fn normalizing_transform(pts: &[Vector2<f64>; 4]) -> Result<Matrix3<f64>, ProjectionError> {
  let centroid = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p) / 4.0;
  let mean_dist = pts.iter().map(|p| (p - centroid).norm()).sum::<f64>() / 4.0;
  if mean_dist <= EPS {
    return Err(ProjectionError::Degenerate);
  }

  let s = std::f64::consts::SQRT_2 / mean_dist;
  #[rustfmt::skip]
  let t = Matrix3::new(
    s,   0.0, -s * centroid.x,
    0.0, s,   -s * centroid.y,
    0.0, 0.0, 1.0,
  );
  Ok(t)
}

/// 由四组对应点求解 3x3 投影变换（直接线性变换）。
///
/// `src` 与 `dst` 为 3x4 齐次坐标，列一一对应。点集退化（共点、共线、
/// 面积为零）时返回错误而不是一个不可用的矩阵。返回矩阵以 h22 归一化。
pub fn find_transform(
  src: &Matrix3x4<f64>,
  dst: &Matrix3x4<f64>,
) -> Result<Matrix3<f64>, ProjectionError> {
  let src_pts = dehomogenize(src)?;
  let dst_pts = dehomogenize(dst)?;
  let t_src = normalizing_transform(&src_pts)?;
  let t_dst = normalizing_transform(&dst_pts)?;

  // x' × Hx = 0 的两行约束
  let mut a = SMatrix::<f64, 8, 9>::zeros();
  for i in 0..4 {
    let x = t_src * Vector3::new(src_pts[i].x, src_pts[i].y, 1.0);
    let xp = t_dst * Vector3::new(dst_pts[i].x, dst_pts[i].y, 1.0);
    for k in 0..3 {
      a[(2 * i, 3 + k)] = -xp.z * x[k];
      a[(2 * i, 6 + k)] = xp.y * x[k];
      a[(2 * i + 1, k)] = xp.z * x[k];
      a[(2 * i + 1, 6 + k)] = -xp.x * x[k];
    }
  }

  // A 的零空间即 AᵀA 最小特征值对应的特征向量
  let eigen = SymmetricEigen::new(a.transpose() * a);
  let mut order: [usize; 9] = std::array::from_fn(|i| i);
  order.sort_by(|&i, &j| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[j]));
  let largest = eigen.eigenvalues[order[8]].max(EPS);
  if eigen.eigenvalues[order[1]] <= RANK_TOL * largest {
    return Err(ProjectionError::Degenerate);
  }

  let h = eigen.eigenvectors.column(order[0]);
  #[rustfmt::skip]
  let h_norm = Matrix3::new(
    h[0], h[1], h[2],
    h[3], h[4], h[5],
    h[6], h[7], h[8],
  );
  if h_norm.determinant().abs() <= DET_TOL {
    return Err(ProjectionError::Singular);
  }

  let t_dst_inv = t_dst.try_inverse().ok_or(ProjectionError::Singular)?;
  let mut h = t_dst_inv * h_norm * t_src;
  let scale = if h[(2, 2)].abs() > EPS {
    h[(2, 2)]
  } else {
    h.norm()
  };
  h /= scale;
  if !h.iter().all(|c| c.is_finite()) {
    return Err(ProjectionError::NonFinite);
  }

  for (s, d) in src_pts.iter().zip(dst_pts.iter()) {
    let p = project_point(&h, *s).ok_or(ProjectionError::Degenerate)?;
    if (p - d).norm() > REPROJ_TOL * (1.0 + d.norm()) {
      return Err(ProjectionError::Degenerate);
    }
  }

  Ok(h)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn quad(pts: [[f64; 2]; 4]) -> Matrix3x4<f64> {
    Matrix3x4::from_fn(|r, c| if r < 2 { pts[c][r] } else { 1.0 })
  }

  fn assert_maps(h: &Matrix3<f64>, src: [[f64; 2]; 4], dst: &Matrix3x4<f64>) {
    for (i, s) in src.iter().enumerate() {
      let p = project_point(h, Vector2::new(s[0], s[1])).unwrap();
      let d = Vector2::new(dst[(0, i)], dst[(1, i)]);
      assert!((p - d).norm() < 1e-6, "corner {i}: {p:?} != {d:?}");
    }
  }

  #[test]
  fn rect_pts_winding_is_clockwise_from_top_left() {
    let r = rect_pts(0.0, 0.0, 240.0, 80.0);
    assert_eq!(r.column(0).into_owned(), Vector3::new(0.0, 0.0, 1.0));
    assert_eq!(r.column(1).into_owned(), Vector3::new(240.0, 0.0, 1.0));
    assert_eq!(r.column(2).into_owned(), Vector3::new(240.0, 80.0, 1.0));
    assert_eq!(r.column(3).into_owned(), Vector3::new(0.0, 80.0, 1.0));
  }

  #[test]
  fn axis_aligned_rect_gives_affine_scaling() {
    let src = [[10.0, 20.0], [110.0, 20.0], [110.0, 70.0], [10.0, 70.0]];
    let dst = rect_pts(0.0, 0.0, 200.0, 100.0);
    let h = find_transform(&quad(src), &dst).unwrap();

    assert!((h[(0, 0)] - 2.0).abs() < 1e-6);
    assert!((h[(1, 1)] - 2.0).abs() < 1e-6);
    assert!((h[(0, 2)] + 20.0).abs() < 1e-6);
    assert!((h[(1, 2)] + 40.0).abs() < 1e-6);
    assert!(h[(2, 0)].abs() < 1e-9 && h[(2, 1)].abs() < 1e-9);
  }

  #[test]
  fn skewed_quad_maps_every_corner_in_order() {
    let src = [[52.0, 40.0], [290.0, 61.0], [301.0, 140.0], [40.0, 118.0]];
    let dst = rect_pts(0.0, 0.0, 240.0, 80.0);
    let h = find_transform(&quad(src), &dst).unwrap();
    assert_maps(&h, src, &dst);
  }

  #[test]
  fn homogeneous_scale_is_ignored() {
    let src = [[1.0, 1.0], [3.0, 1.0], [3.0, 2.0], [1.0, 2.0]];
    let scaled = quad(src) * 2.0;
    let dst = rect_pts(0.0, 0.0, 20.0, 10.0);
    let h = find_transform(&scaled, &dst).unwrap();
    assert_maps(&h, src, &dst);
  }

  #[test]
  fn collapsed_quad_is_degenerate() {
    // 左右两条边重合为一条竖线
    let src = [[50.0, 10.0], [50.0, 10.0], [50.0, 90.0], [50.0, 90.0]];
    let dst = rect_pts(0.0, 0.0, 240.0, 80.0);
    assert_eq!(
      find_transform(&quad(src), &dst),
      Err(ProjectionError::Degenerate)
    );
  }

  #[test]
  fn single_point_is_degenerate() {
    let src = [[5.0, 5.0]; 4];
    let dst = rect_pts(0.0, 0.0, 240.0, 80.0);
    assert_eq!(
      find_transform(&quad(src), &dst),
      Err(ProjectionError::Degenerate)
    );
  }

  #[test]
  fn collinear_points_fail() {
    let src = [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [0.0, 10.0]];
    let dst = rect_pts(0.0, 0.0, 240.0, 80.0);
    assert!(find_transform(&quad(src), &dst).is_err());
  }

  #[test]
  fn non_finite_input_is_rejected() {
    let src = [[f64::NAN, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
    let dst = rect_pts(0.0, 0.0, 240.0, 80.0);
    assert_eq!(
      find_transform(&quad(src), &dst),
      Err(ProjectionError::NonFinite)
    );
  }
}
