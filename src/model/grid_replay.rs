// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/model/grid_replay.rs - 网格回放模型
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

use std::convert::Infallible;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::NhwcTensor, grid::Grid, model::Model};

#[derive(Error, Debug)]
pub enum GridReplayError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("网格文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 返回固定网格的模型，用于离线处理在别处导出的网络输出
#[derive(Debug, Clone)]
pub struct GridReplay {
  grid: Grid,
}

impl FromUrlWithScheme for GridReplay {
  const SCHEME: &'static str = "grid";
}

impl FromUrl for GridReplay {
  type Error = GridReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GridReplayError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    info!("加载网格文件: {}", url.path());
    let data = std::fs::read(url.path())?;
    let grid: Grid = serde_json::from_slice(&data)?;
    debug!(
      "网格尺寸: {}x{}x{}",
      grid.rows(),
      grid.cols(),
      grid.channels()
    );

    Ok(Self { grid })
  }
}

impl GridReplay {
  pub fn from_grid(grid: Grid) -> Self {
    Self { grid }
  }

  pub fn grid(&self) -> &Grid {
    &self.grid
  }
}

impl Model for GridReplay {
  type Input = NhwcTensor;
  type Output = Grid;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("回放网格，输入张量形状 {:?}", input.shape());
    Ok(self.grid.clone())
  }
}
