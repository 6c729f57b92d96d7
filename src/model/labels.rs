// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/model/labels.rs - 类别名称
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

use std::path::Path;

use tracing::info;

use crate::model::ModelLoadError;

/// 类别编号到名称的映射，文件格式为每行一个名称
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
  names: Vec<String>,
}

impl Labels {
  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 第 n 行对应类别 n，中间的空行保留为空名称，末尾的空行忽略
  pub fn parse(text: &str) -> Self {
    let mut names: Vec<String> = text.lines().map(|line| line.trim().to_string()).collect();
    while names.last().is_some_and(|name| name.is_empty()) {
      names.pop();
    }
    Self { names }
  }

  pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let labels = Self::parse(&text);
    info!("加载类别名称 {} 个: {}", labels.len(), path.display());
    Ok(labels)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: u32) -> String {
    self
      .names
      .get(class_id as usize)
      .filter(|name| !name.is_empty())
      .cloned()
      .unwrap_or_else(|| format!("class {}", class_id))
  }
}
