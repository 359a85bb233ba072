//! 暂存文件 - 下载和上传之间的本地落盘

use std::path::{Path, PathBuf};
use tracing::warn;

/// 从对象键取文件名部分
pub(crate) fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// 单个对象传输期间独占的本地暂存文件。
/// 路径带 uuid 前缀，并发传输之间不会互相覆盖；
/// 离开作用域时无条件清理，下载失败提前返回也不例外。
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    pub fn new(staging_dir: &Path, key: &str) -> Self {
        let path = staging_dir.join(format!("{}-{}", uuid::Uuid::new_v4(), file_name(key)));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.path.exists() {
            // 清理失败只记日志，不影响对象的传输结果
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("清理暂存文件失败: {}: {}", self.path.display(), e);
            }
        }
    }
}
