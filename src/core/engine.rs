use crate::config::{Settings, TransferConfig};
use crate::core::staging::{file_name, StagingFile};
use crate::mime;
use crate::storage::{self, ObjectInfo, Storage, TransferError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info, warn};

/// 单个对象的传输结果，产生后立即计入统计，不保存
#[derive(Debug)]
pub enum TransferOutcome {
    Skipped { reason: String },
    Succeeded { bytes: u64, content_type: &'static str },
    DownloadFailed(anyhow::Error),
    UploadFailed(anyhow::Error),
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub started_at: i64,
    pub finished_at: i64,
    pub prefixes_scanned: u32,
    pub prefixes_failed: u32,
    pub objects_listed: u64,
    pub skipped: u64,
    pub succeeded: u64,
    pub download_failed: u64,
    pub upload_failed: u64,
    pub bytes_transferred: u64,
    pub errors: Vec<String>,
}

impl SyncReport {
    /// 对象级失败总数
    pub fn failed(&self) -> u64 {
        self.download_failed + self.upload_failed
    }
}

/// 传输统计
#[derive(Debug, Default)]
struct TransferStats {
    skipped: AtomicU64,
    succeeded: AtomicU64,
    download_failed: AtomicU64,
    upload_failed: AtomicU64,
    bytes_transferred: AtomicU64,
}

/// 同步引擎：按前缀列举源存储，过滤出同步起点之后修改的对象，
/// 经本地暂存转存到目标存储。单个对象失败不会中断整批。
pub struct SyncEngine {
    source: Arc<dyn Storage>,
    destination: Arc<dyn Storage>,
    cutoff: DateTime<Utc>,
    prefixes: Vec<String>,
    config: TransferConfig,
    staging_dir: PathBuf,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn Storage>,
        destination: Arc<dyn Storage>,
        cutoff: DateTime<Utc>,
        prefixes: Vec<String>,
        config: TransferConfig,
    ) -> Self {
        let staging_dir = config.staging_dir.clone().unwrap_or_else(std::env::temp_dir);
        Self {
            source,
            destination,
            cutoff,
            prefixes,
            config,
            staging_dir,
        }
    }

    /// 从运行配置构建引擎，源和目标各建一个客户端
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let source = storage::create_storage(&settings.source)?;
        let destination = storage::create_storage(&settings.destination)?;
        Ok(Self::new(
            source,
            destination,
            settings.cutoff,
            settings.prefixes.clone(),
            settings.transfer.clone(),
        ))
    }

    /// 运行一次同步。对象级失败只计入报告，整个运行不会因此中止。
    pub async fn run(&self) -> SyncReport {
        let started_at = Utc::now().timestamp();
        info!(
            "开始同步: {} -> {}, 同步起点: {}",
            self.source.name(),
            self.destination.name(),
            self.cutoff
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.staging_dir).await {
            warn!("无法创建暂存目录 {}: {}", self.staging_dir.display(), e);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers.max(1)));
        let stats = Arc::new(TransferStats::default());
        let errors = Arc::new(RwLock::new(Vec::<String>::new()));

        let mut prefixes_scanned = 0u32;
        let mut prefixes_failed = 0u32;
        let mut objects_listed = 0u64;
        let mut handles = Vec::new();

        for prefix in &self.prefixes {
            // 单个前缀列举失败不影响后续前缀
            let listing = match self.source.list_objects(prefix).await {
                Ok(l) => l,
                Err(e) => {
                    prefixes_failed += 1;
                    error!("[ERROR] 列举前缀失败 {}: {:#}", prefix, e);
                    errors
                        .write()
                        .await
                        .push(format!("{}: 列举失败: {:#}", prefix, e));
                    continue;
                }
            };
            prefixes_scanned += 1;

            if listing.is_empty() {
                info!("前缀下没有找到对象: {}", prefix);
                continue;
            }

            for object in listing {
                objects_listed += 1;

                // 比较的是绝对时刻，不是本地时间字符串
                if object.last_modified < self.cutoff {
                    Self::record_outcome(
                        &stats,
                        &errors,
                        &object.key,
                        TransferOutcome::Skipped {
                            reason: format!("早于同步起点 ({})", object.last_modified),
                        },
                    )
                    .await;
                    continue;
                }

                info!(
                    "[INFO] 待迁移对象: {} - LastModified: {}",
                    object.key, object.last_modified
                );

                let permit = semaphore.clone().acquire_owned().await.unwrap();
                let source = self.source.clone();
                let destination = self.destination.clone();
                let stats = stats.clone();
                let errors = errors.clone();
                let staging_dir = self.staging_dir.clone();
                let max_retries = self.config.max_retries;
                let base_delay = self.config.retry_base_delay_ms;

                handles.push(tokio::spawn(async move {
                    let outcome = Self::transfer_with_retry(
                        source.as_ref(),
                        destination.as_ref(),
                        &object,
                        &staging_dir,
                        max_retries,
                        base_delay,
                    )
                    .await;
                    Self::record_outcome(&stats, &errors, &object.key, outcome).await;
                    drop(permit);
                }));
            }
        }

        // 等待所有传输完成
        for handle in handles {
            let _ = handle.await;
        }

        let finished_at = Utc::now().timestamp();
        let report = SyncReport {
            started_at,
            finished_at,
            prefixes_scanned,
            prefixes_failed,
            objects_listed,
            skipped: stats.skipped.load(Ordering::Relaxed),
            succeeded: stats.succeeded.load(Ordering::Relaxed),
            download_failed: stats.download_failed.load(Ordering::Relaxed),
            upload_failed: stats.upload_failed.load(Ordering::Relaxed),
            bytes_transferred: stats.bytes_transferred.load(Ordering::Relaxed),
            errors: errors.read().await.clone(),
        };

        info!(
            "同步完成 ✅ 迁移对象总数: {} (跳过 {}, 失败 {})",
            report.succeeded,
            report.skipped,
            report.failed()
        );

        report
    }

    /// 带重试的传输。默认 max_retries 为 0，即失败不重试；
    /// 无论重试多少次，报告里每个对象只记一个结果。
    async fn transfer_with_retry(
        source: &dyn Storage,
        destination: &dyn Storage,
        object: &ObjectInfo,
        staging_dir: &Path,
        max_retries: u32,
        base_delay_ms: u64,
    ) -> TransferOutcome {
        let mut attempt = 0;
        loop {
            match Self::transfer_once(source, destination, object, staging_dir).await {
                Ok((bytes, content_type)) => {
                    return TransferOutcome::Succeeded {
                        bytes,
                        content_type,
                    }
                }
                Err(err) => {
                    if attempt < max_retries {
                        // 指数退避
                        let delay = base_delay_ms * 2_u64.pow(attempt);
                        warn!(
                            "传输失败，{}ms 后重试 ({}/{}): {}: {}",
                            delay,
                            attempt + 1,
                            max_retries,
                            object.key,
                            err
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                    } else {
                        return match err {
                            TransferError::Download(e) => TransferOutcome::DownloadFailed(e),
                            TransferError::Upload(e) => TransferOutcome::UploadFailed(e),
                        };
                    }
                }
            }
        }
    }

    /// 单次传输：暂存下载、推断类型、上传。
    /// 暂存文件离开本函数时自动清理，成功失败都一样。
    async fn transfer_once(
        source: &dyn Storage,
        destination: &dyn Storage,
        object: &ObjectInfo,
        staging_dir: &Path,
    ) -> Result<(u64, &'static str), TransferError> {
        let staging = StagingFile::new(staging_dir, &object.key);

        source
            .fetch(&object.key, staging.path())
            .await
            .map_err(TransferError::Download)?;

        let content_type = mime::resolve(file_name(&object.key));

        let data = tokio::fs::read(staging.path())
            .await
            .map_err(|e| TransferError::Download(e.into()))?;
        let bytes = data.len() as u64;

        destination
            .store(&object.key, data, content_type, "inline")
            .await
            .map_err(TransferError::Upload)?;

        Ok((bytes, content_type))
    }

    /// 结果计入统计并输出对应的日志行
    async fn record_outcome(
        stats: &TransferStats,
        errors: &RwLock<Vec<String>>,
        key: &str,
        outcome: TransferOutcome,
    ) {
        match outcome {
            TransferOutcome::Skipped { reason } => {
                stats.skipped.fetch_add(1, Ordering::Relaxed);
                info!("[SKIP] {} {}", key, reason);
            }
            TransferOutcome::Succeeded {
                bytes,
                content_type,
            } => {
                stats.succeeded.fetch_add(1, Ordering::Relaxed);
                stats.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
                info!(
                    "[OK] 已同步: {} ContentType={} ({} 字节)",
                    key, content_type, bytes
                );
            }
            TransferOutcome::DownloadFailed(e) => {
                stats.download_failed.fetch_add(1, Ordering::Relaxed);
                error!("[ERROR] 无法下载 {}: {:#}", key, e);
                errors
                    .write()
                    .await
                    .push(format!("{}: 下载失败: {:#}", key, e));
            }
            TransferOutcome::UploadFailed(e) => {
                stats.upload_failed.fetch_add(1, Ordering::Relaxed);
                error!("[ERROR] 无法上传 {}: {:#}", key, e);
                errors
                    .write()
                    .await
                    .push(format!("{}: 上传失败: {:#}", key, e));
            }
        }
    }
}
