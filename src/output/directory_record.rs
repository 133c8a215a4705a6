// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  detect::PlateDetection,
  label::{Label, PlateLabel},
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 单个车牌的记录，角点为原图像素坐标
#[derive(Debug, Clone, Serialize)]
pub struct PlateRecord {
  pub prob: f32,
  pub corners: [[f32; 2]; 4],
  pub tl: [f32; 2],
  pub br: [f32; 2],
  pub crop: String,
}

/// 一帧的检测记录
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
  pub frame: String,
  pub width: u32,
  pub height: u32,
  pub input_size: (u32, u32),
  pub elapsed_ms: f64,
  pub plates: Vec<PlateRecord>,
}

impl PlateRecord {
  fn new(label: &PlateLabel, width: u32, height: u32, crop: String) -> Self {
    let (w, h) = (width as f32, height as f32);
    let (tl, br) = (label.tl(), label.br());
    Self {
      prob: label.prob(),
      corners: label.corners().map(|[x, y]| [x * w, y * h]),
      tl: [tl.x, tl.y],
      br: [br.x, br.y],
      crop,
    }
  }
}

/// 按日期分目录记录每一帧：原图（可选标注）、矫正图与 JSON 记录。
///
/// URL 形如 `folder:///path/to/dir?always&draw`，`always` 表示没有检测到
/// 车牌的帧也记录，`draw` 表示保存的原图上绘制车牌四边形。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Option<Draw>,
  frame_counters: Arc<Mutex<u16>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let draw = uri
      .query_pairs()
      .any(|(k, _)| k == "draw")
      .then(Draw::default);

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      frame_counters: Arc::new(Mutex::new(0)),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&self) -> u16 {
    // 计数器只做累加，锁中毒时沿用原值
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  /// 本帧文件名前缀（不含扩展名）
  fn frame_stem(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn file_name(path: &Path) -> String {
    path
      .file_name()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default()
  }
}

impl Render<RgbImage, PlateDetection> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &PlateDetection) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let stem = self.frame_stem()?;
    let frame_path = stem.with_extension("png");
    match self.draw {
      Some(ref draw) => draw.draw_detection(frame, result).save(&frame_path)?,
      None => frame.save(&frame_path)?,
    }

    let mut plates = Vec::with_capacity(result.len());
    for (index, (label, crop)) in result.labels.iter().zip(result.crops.iter()).enumerate() {
      let crop_path = PathBuf::from(format!("{}_plate{}.png", stem.display(), index));
      crop.save(&crop_path)?;
      plates.push(PlateRecord::new(
        label,
        frame.width(),
        frame.height(),
        Self::file_name(&crop_path),
      ));
    }

    let record = FrameRecord {
      frame: Self::file_name(&frame_path),
      width: frame.width(),
      height: frame.height(),
      input_size: result.input_size,
      elapsed_ms: result.elapsed.as_micros() as f64 / 1000.0,
      plates,
    };
    std::fs::write(
      stem.with_extension("json"),
      serde_json::to_vec_pretty(&record)?,
    )?;
    debug!("记录帧: {}", frame_path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::label::PLATE_CLASS_ID;
  use nalgebra::Matrix2x4;
  use std::time::Duration;

  fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("chepai-record-{}-{}", tag, std::process::id()))
  }

  fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
      let Ok(entries) = std::fs::read_dir(&d) else {
        continue;
      };
      for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  fn detection() -> PlateDetection {
    #[rustfmt::skip]
    let pts = Matrix2x4::new(
      0.25, 0.75, 0.75, 0.25,
      0.25, 0.25, 0.5, 0.5,
    );
    PlateDetection {
      labels: vec![PlateLabel::new(PLATE_CLASS_ID, pts, 0.9)],
      crops: vec![RgbImage::new(24, 8)],
      elapsed: Duration::from_millis(5),
      input_size: (16, 16),
    }
  }

  #[test]
  fn empty_frames_are_skipped_unless_always() {
    let dir = temp_dir("skip");
    let url = url::Url::parse(&format!("folder://{}", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let empty = PlateDetection {
      labels: Vec::new(),
      crops: Vec::new(),
      elapsed: Duration::ZERO,
      input_size: (16, 16),
    };
    output.render_result(&RgbImage::new(8, 8), &empty).unwrap();
    assert!(files_with_extension(&dir, "png").is_empty());

    let url = url::Url::parse(&format!("folder://{}?always", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&RgbImage::new(8, 8), &empty).unwrap();
    assert_eq!(files_with_extension(&dir, "png").len(), 1);
    assert_eq!(files_with_extension(&dir, "json").len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn record_has_pixel_corners_and_crop_names() {
    let dir = temp_dir("record");
    let url = url::Url::parse(&format!("folder://{}?draw", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output
      .render_result(&RgbImage::new(40, 20), &detection())
      .unwrap();

    assert_eq!(files_with_extension(&dir, "png").len(), 2);
    let json = files_with_extension(&dir, "json");
    assert_eq!(json.len(), 1);

    let value: serde_json::Value =
      serde_json::from_slice(&std::fs::read(&json[0]).unwrap()).unwrap();
    let plate = &value["plates"][0];
    assert_eq!(plate["corners"][0][0].as_f64(), Some(10.0));
    assert_eq!(plate["corners"][2][1].as_f64(), Some(10.0));
    assert!(plate["crop"].as_str().unwrap().ends_with("_plate0.png"));
    assert_eq!(value["elapsed_ms"].as_f64(), Some(5.0));

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn frame_ids_increase() {
    let url = url::Url::parse("folder:///tmp/unused").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.frame_id(), 1);
    assert_eq!(output.frame_id(), 2);
  }
}
