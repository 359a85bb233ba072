pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::StoreConfig;

pub use s3::S3Storage;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 列举得到的对象描述，只读，不落盘
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// 单个对象传输失败的类别，区分下载侧和上传侧
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("下载失败: {0}")]
    Download(#[source] anyhow::Error),
    #[error("上传失败: {0}")]
    Upload(#[source] anyhow::Error),
}

/// 存储抽象接口
#[async_trait]
pub trait Storage: Send + Sync {
    /// 递归列出前缀下的所有对象。没有匹配的键返回空列表，
    /// 连接或鉴权失败才返回错误。
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// 下载对象字节到本地暂存路径
    async fn fetch(&self, key: &str, dest: &Path) -> Result<()>;

    /// 上传字节到目标键，附带 Content-Type 和 Content-Disposition
    async fn store(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        content_disposition: &str,
    ) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储实例。源和目标各建一个，整个运行期间复用。
pub fn create_storage(config: &StoreConfig) -> Result<Arc<dyn Storage>> {
    tracing::info!(
        "初始化S3存储: endpoint={}, bucket={}",
        config.endpoint,
        config.bucket
    );
    Ok(Arc::new(S3Storage::new(config)?) as Arc<dyn Storage>)
}
