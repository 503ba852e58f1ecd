//! 兑换台账（唯一性）
//!
//! 以 (规则, 规范化码哈希) 加锁，在锁内完成“查询 → 插入或递增”。
//! 锁获取失败按 ALREADY_REDEEMED 处理，宁可误拒也不重复发放。

use chrono::{DateTime, Utc};
use codeguard_shared::cache::CacheKey;
use codeguard_shared::observability::metrics::record_lock_failure;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::lock::{DistributedLock, LockGuard};
use crate::models::{CodeRule, NewRedemption, RedeemedCode};
use crate::repository::LedgerRepositoryTrait;

/// 兑换附带信息
#[derive(Debug, Clone, Default)]
pub struct RedemptionContext {
    pub ow_user_id: Option<String>,
    pub ow_transaction_id: Option<String>,
    pub ip_address: Option<String>,
    pub metadata: Option<Value>,
}

/// 台账操作结果
#[derive(Debug, Clone, PartialEq)]
pub enum RedeemOutcome {
    /// 新建或递增成功
    Redeemed(RedeemedCode),
    /// 已达兑换上限；redeemed_at 为首次兑换时间
    AlreadyRedeemed { redeemed_at: Option<DateTime<Utc>> },
    /// 未能获取锁
    LockUnavailable,
}

/// 规范化码的 SHA-256（十六进制小写）
pub fn code_hash(normalized: &str) -> String {
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

pub struct RedemptionLedger {
    repository: Arc<dyn LedgerRepositoryTrait>,
    locks: Arc<dyn DistributedLock>,
    lease: Duration,
    store_plain_codes: bool,
}

impl RedemptionLedger {
    pub fn new(
        repository: Arc<dyn LedgerRepositoryTrait>,
        locks: Arc<dyn DistributedLock>,
        lease: Duration,
    ) -> Self {
        Self {
            repository,
            locks,
            lease,
            store_plain_codes: false,
        }
    }

    /// 台账中同时保存明文码
    pub fn with_plain_codes(mut self, store: bool) -> Self {
        self.store_plain_codes = store;
        self
    }

    /// 兑换一次
    ///
    /// 锁在所有返回路径上释放，包括存储错误。
    #[instrument(skip(self, normalized, rule, context), fields(rule_id = %rule.id))]
    pub async fn redeem(
        &self,
        normalized: &str,
        rule: &CodeRule,
        context: &RedemptionContext,
    ) -> Result<RedeemOutcome> {
        let hash = code_hash(normalized);
        let key = CacheKey::redemption_lock(&rule.id.to_string(), &hash);

        let guard = match self.locks.acquire(&key, self.lease).await {
            Ok(guard) => guard,
            Err(e) => {
                record_lock_failure();
                warn!(rule_id = %rule.id, error = %e, "Redemption lock unavailable");
                return Ok(RedeemOutcome::LockUnavailable);
            }
        };

        let result = self.redeem_locked(normalized, &hash, rule, context).await;
        release(guard).await;
        result
    }

    async fn redeem_locked(
        &self,
        normalized: &str,
        hash: &str,
        rule: &CodeRule,
        context: &RedemptionContext,
    ) -> Result<RedeemOutcome> {
        let limit = rule.redemption_limit();

        if let Some(existing) = self.repository.fetch_entry(rule.id, hash).await? {
            if existing.redemption_count >= limit {
                debug!(
                    redemption_id = %existing.id,
                    count = existing.redemption_count,
                    limit = limit,
                    "Redemption limit reached"
                );
                return Ok(RedeemOutcome::AlreadyRedeemed {
                    redeemed_at: Some(existing.redeemed_at),
                });
            }

            return match self.repository.increment_entry(existing.id, limit).await? {
                Some(updated) => {
                    info!(
                        redemption_id = %updated.id,
                        count = updated.redemption_count,
                        "Code redeemed again"
                    );
                    Ok(RedeemOutcome::Redeemed(updated))
                }
                // 存储侧上限条件拒绝：租约过期期间被他人递增
                None => Ok(RedeemOutcome::AlreadyRedeemed {
                    redeemed_at: Some(existing.redeemed_at),
                }),
            };
        }

        let entry = NewRedemption {
            code_rule_id: rule.id,
            code_hash: hash.to_string(),
            code_plain: self.store_plain_codes.then(|| normalized.to_string()),
            ow_user_id: context.ow_user_id.clone(),
            ow_transaction_id: context.ow_transaction_id.clone(),
            ip_address: context.ip_address.clone(),
            metadata: context.metadata.clone(),
        };

        match self.repository.insert_entry(&entry).await? {
            Some(created) => {
                info!(redemption_id = %created.id, "Code redeemed");
                Ok(RedeemOutcome::Redeemed(created))
            }
            // 唯一约束冲突：租约过期期间被他人插入
            None => {
                let redeemed_at = self
                    .repository
                    .fetch_entry(rule.id, hash)
                    .await?
                    .map(|e| e.redeemed_at);
                Ok(RedeemOutcome::AlreadyRedeemed { redeemed_at })
            }
        }
    }
}

async fn release(guard: LockGuard) {
    let key = guard.key().to_string();
    if let Err(e) = guard.release().await {
        // 锁会随租约过期
        warn!(key = %key, error = %e, "Failed to release redemption lock");
    }
}
