// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detect::PlateDetection,
  output::{Render, draw::Draw},
};

/// 标注图保存到指定路径，矫正图保存为同目录下的 `<stem>_plate<N>.png`
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
      draw: Draw::default(),
    })
  }
}

impl SaveImageFileOutput {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 第 index 个矫正图的保存路径，从 0 开始
  pub fn crop_path(&self, index: usize) -> PathBuf {
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    self.path.with_file_name(format!("{}_plate{}.png", stem, index))
  }

  fn save_image(&self, image: &RgbImage, path: &Path) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(path)?;
    info!("保存图像到文件: {}", path.display());

    Ok(())
  }
}

impl Render<RgbImage, PlateDetection> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbImage, result: &PlateDetection) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result);
    self.save_image(&image, &self.path)?;
    for (index, crop) in result.crops.iter().enumerate() {
      self.save_image(crop, &self.crop_path(index))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn crop_paths_follow_output_stem() {
    let url = Url::parse("image:///tmp/run/car.png").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.crop_path(0), PathBuf::from("/tmp/run/car_plate0.png"));
    assert_eq!(output.crop_path(3), PathBuf::from("/tmp/run/car_plate3.png"));
  }

  #[test]
  fn writes_annotated_image_and_crops() {
    let dir = std::env::temp_dir().join(format!("chepai-save-{}", std::process::id()));
    let url = Url::parse(&format!("image://{}/out.png", dir.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let result = PlateDetection {
      labels: Vec::new(),
      crops: vec![RgbImage::new(24, 8), RgbImage::new(24, 8)],
      elapsed: Duration::ZERO,
      input_size: (32, 32),
    };
    output.render_result(&RgbImage::new(32, 32), &result).unwrap();

    assert!(dir.join("out.png").exists());
    assert!(dir.join("out_plate0.png").exists());
    assert!(dir.join("out_plate1.png").exists());

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
