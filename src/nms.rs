// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::label::{Label, iou};

/// 按置信度降序排序（稳定排序，同分保持原顺序）
pub fn sort_by_prob<L: Label>(labels: &mut [L]) {
  labels.sort_by(|a, b| b.prob().total_cmp(&a.prob()));
}

/// 非极大值抑制
///
/// 依次保留置信度最高的标签，与任一已保留标签的交并比超过
/// `iou_threshold` 的标签被丢弃。返回结果按置信度降序排列。
pub fn nms<L: Label>(mut labels: Vec<L>, iou_threshold: f32) -> Vec<L> {
  let total = labels.len();
  sort_by_prob(&mut labels);

  let mut selected: Vec<L> = Vec::with_capacity(labels.len());
  for label in labels {
    if selected
      .iter()
      .all(|kept| iou(&label, kept) <= iou_threshold)
    {
      selected.push(label);
    }
  }

  debug!("NMS: {} 个候选保留 {} 个", total, selected.len());
  selected
}
