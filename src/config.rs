// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/config.rs - 重建与检测参数
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

/// 网络的四个 2x2 下采样层
pub const NET_STRIDE: u32 = 16;
/// 训练时车牌宽度的最小值与最大值（像素）
pub const PLATE_WIDTH_RANGE: (f32, f32) = (40.0, 208.0);
/// 仿射基准四边形的半宽
pub const ALPHA: f32 = 0.5;
/// 去重时允许的最大重叠比例
pub const NMS_IOU_THRESHOLD: f32 = 0.1;

const VEHICLE_BASE_DIM: f32 = 288.0;
const VEHICLE_MAX_DIM: u32 = 608;

/// 网格重建所需的几何常量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructConfig {
  /// 输入图像与网格之间的缩放倍数
  pub net_stride: u32,
  /// 以网格单元计的车牌半尺度
  pub side: f32,
  /// 基准四边形角点坐标 (±alpha, ±alpha)
  pub alpha: f32,
}

impl Default for ReconstructConfig {
  fn default() -> Self {
    Self::with_plate_width_range(PLATE_WIDTH_RANGE.0, PLATE_WIDTH_RANGE.1)
  }
}

impl ReconstructConfig {
  /// 由训练数据中车牌宽度范围推导 side：取范围中点再除以步长
  pub fn with_plate_width_range(min_width: f32, max_width: f32) -> Self {
    Self {
      net_stride: NET_STRIDE,
      side: ((max_width + min_width) / 2.0) / NET_STRIDE as f32,
      alpha: ALPHA,
    }
  }

  pub fn net_stride(mut self, net_stride: u32) -> Self {
    self.net_stride = net_stride;
    self
  }
}

/// 推理驱动参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectConfig {
  /// 缩放后图像短边长度
  pub max_dim: u32,
  /// 网络输入尺寸需对齐的步长
  pub net_step: u32,
  /// 矫正输出尺寸 (宽, 高)
  pub out_size: (u32, u32),
  /// 置信度阈值（严格大于）
  pub threshold: f32,
  /// 去重重叠阈值
  pub iou_threshold: f32,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      max_dim: VEHICLE_BASE_DIM as u32,
      net_step: NET_STRIDE,
      out_size: (240, 80),
      threshold: 0.5,
      iou_threshold: NMS_IOU_THRESHOLD,
    }
  }
}

impl DetectConfig {
  /// 针对车辆裁剪图计算短边尺寸，长宽比越大输入越大，上限 608
  pub fn bound_dim(width: u32, height: u32) -> u32 {
    let (long, short) = (width.max(height), width.min(height).max(1));
    let ratio = long as f32 / short as f32;
    let side = (ratio * VEHICLE_BASE_DIM) as u32;
    (side + side % NET_STRIDE).min(VEHICLE_MAX_DIM)
  }

  pub fn for_vehicle(width: u32, height: u32) -> Self {
    Self {
      max_dim: Self::bound_dim(width, height),
      ..Self::default()
    }
  }
}
