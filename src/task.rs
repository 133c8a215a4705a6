// 该文件是 Chepai （车牌矫正） 项目的一部分。
// src/task.rs - 推理任务
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

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{model::Model, output::Render};

const DEFAULT_REPEAT_TIMES: usize = 1000;
const DEFAULT_WARMUP: usize = 2;

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 取第一帧推理并输出一次
pub struct OneShotTask;

impl<F, D, ME, RE, I, M, O> Task<I, M, O> for OneShotTask
where
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("输出完成，总耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复检测，统计去掉预热后的平均耗时
#[derive(Debug, Clone, Copy)]
pub struct RepeatShotTask {
  times: usize,
  warmup: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      times: DEFAULT_REPEAT_TIMES,
      warmup: DEFAULT_WARMUP,
    }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times.max(1);
    self
  }

  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }
}

/// 跳过前 warmup 次后的平均值；样本不足时退化为全部样本的平均
pub fn average_elapsed(times: &[Duration], warmup: usize) -> Option<Duration> {
  let samples = if times.len() > warmup {
    &times[warmup..]
  } else {
    times
  };
  if samples.is_empty() {
    return None;
  }
  Some(samples.iter().sum::<Duration>() / samples.len() as u32)
}

impl<F, D, ME, RE, I, M, O> Task<I, M, O> for RepeatShotTask
where
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务，重复 {} 次...", self.times);
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})检测完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    if let Some(average) = average_elapsed(&times, self.warmup) {
      warn!("平均检测时间: {:.2?}", average);
    }

    Ok(())
  }
}
