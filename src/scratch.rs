// 该文件是 Shaobing （哨兵） 项目的一部分。
// src/scratch.rs - 请求级临时文件
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

//! 请求级临时文件与目录
//!
//! 两种守卫都使用 uuid 生成唯一名称，在 `Drop` 时删除自身，
//! 因此无论正常返回、提前 `?` 返回还是 panic 展开，磁盘上都不会残留。

use std::{
  fs,
  io::{self, Write},
  path::{Path, PathBuf},
};

use tracing::{debug, warn};
use uuid::Uuid;

/// 生成形如 `<prefix>-<uuid>.<ext>` 的唯一文件名
pub fn unique_name(prefix: &str, extension: Option<&str>) -> String {
  match extension {
    Some(ext) if !ext.is_empty() => format!("{}-{}.{}", prefix, Uuid::new_v4(), ext),
    _ => format!("{}-{}", prefix, Uuid::new_v4()),
  }
}

/// 独占的临时文件，离开作用域时删除
#[derive(Debug)]
pub struct ScopedFile {
  path: PathBuf,
}

impl ScopedFile {
  /// 在 `dir` 下以唯一名称写入 `content`
  ///
  /// 写入中途失败时，已写入的部分会被立即删除。
  pub fn write(dir: &Path, name: &str, content: &[u8]) -> io::Result<Self> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);

    // 文件创建成功后才接管删除责任
    let mut file = fs::File::create_new(&path)?;
    let guard = ScopedFile { path };
    file.write_all(content)?;
    file.sync_all()?;

    debug!("写入临时文件 {} ({} 字节)", guard.path.display(), content.len());
    Ok(guard)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for ScopedFile {
  fn drop(&mut self) {
    match fs::remove_file(&self.path) {
      Ok(()) => debug!("删除临时文件 {}", self.path.display()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!("删除临时文件 {} 失败: {}", self.path.display(), e),
    }
  }
}

/// 独占的临时目录，离开作用域时递归删除
#[derive(Debug)]
pub struct ScopedDir {
  path: PathBuf,
}

impl ScopedDir {
  pub fn create(parent: &Path, prefix: &str) -> io::Result<Self> {
    let path = parent.join(unique_name(prefix, None));
    fs::create_dir_all(&path)?;
    debug!("创建临时目录 {}", path.display());
    Ok(ScopedDir { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for ScopedDir {
  fn drop(&mut self) {
    match fs::remove_dir_all(&self.path) {
      Ok(()) => debug!("删除临时目录 {}", self.path.display()),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => warn!("删除临时目录 {} 失败: {}", self.path.display(), e),
    }
  }
}
