use super::{ObjectInfo, Storage, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::config::StoreConfig;
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub struct S3Storage {
    operator: Operator,
    name: String,
}

impl S3Storage {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        use opendal::services::S3;

        let builder = S3::default()
            .bucket(&config.bucket)
            .region(&config.region)
            .endpoint(&config.endpoint)
            .access_key_id(&config.access_key)
            .secret_access_key(&config.secret_key);

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!("s3://{}", config.bucket);

        Ok(Self { operator, name })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let path = prefix.trim_start_matches('/');
        let mut objects = Vec::new();

        // 使用 lister_with 进行递归列表
        let mut lister = self
            .operator
            .lister_with(path)
            .recursive(true)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let meta = entry.metadata();

            // 跳过目录占位条目
            if meta.is_dir() {
                continue;
            }

            // 没有修改时间的条目无法和同步起点比较
            let Some(last_modified) = meta.last_modified() else {
                warn!("对象缺少修改时间，跳过: {}", entry.path());
                continue;
            };

            objects.push(ObjectInfo {
                key: entry.path().to_string(),
                last_modified,
                size: meta.content_length(),
            });
        }

        Ok(objects)
    }

    async fn fetch(&self, key: &str, dest: &Path) -> Result<()> {
        let data = self.operator.read(key).await?;
        tokio::fs::write(dest, data.to_vec()).await?;
        Ok(())
    }

    async fn store(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        content_disposition: &str,
    ) -> Result<()> {
        self.operator
            .write_with(key, data)
            .content_type(content_type)
            .content_disposition(content_disposition)
            .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
