//! 内存仓储
//!
//! 实现与 PostgreSQL 相同的约束：(规则, 哈希) 唯一，计数递增带上限条件。
//! 用于测试和不接数据库的本地运行。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::traits::{LedgerRepositoryTrait, ProjectRepositoryTrait};
use crate::error::Result;
use crate::models::{
    CodeRule, DailyRedemptionCount, NewRedemption, Project, ProjectStats, ProjectWithRules,
    RedeemedCode, RedemptionDetail, RedemptionFilter, RuleRedemptionCount,
};

#[derive(Default)]
pub struct InMemoryStore {
    projects: DashMap<Uuid, Project>,
    /// 插入顺序即规则顺序
    rules: RwLock<Vec<CodeRule>>,
    entries: DashMap<Uuid, RedeemedCode>,
    index: DashMap<(Uuid, String), Uuid>,
    project_fetches: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_project(&self, project: Project) {
        self.projects.insert(project.id, project);
    }

    pub fn insert_rule(&self, rule: CodeRule) {
        let mut rules = self.rules.write();
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
    }

    /// 修改规则（模拟管理端操作）
    pub fn update_rule(&self, rule_id: Uuid, f: impl FnOnce(&mut CodeRule)) -> bool {
        let mut rules = self.rules.write();
        match rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                f(rule);
                true
            }
            None => false,
        }
    }

    pub fn ledger_len(&self) -> usize {
        self.entries.len()
    }

    pub fn ledger_entries(&self) -> Vec<RedeemedCode> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// 项目查询次数，用于观察缓存命中
    pub fn project_fetches(&self) -> usize {
        self.project_fetches.load(Ordering::Relaxed)
    }

    fn detail(&self, entry: &RedeemedCode) -> Option<RedemptionDetail> {
        let rules = self.rules.read();
        let rule = rules.iter().find(|r| r.id == entry.code_rule_id)?;
        let project = self.projects.get(&rule.project_id)?;
        Some(RedemptionDetail {
            entry: entry.clone(),
            rule_name: rule.name.clone(),
            project_id: project.id,
            project_name: project.name.clone(),
        })
    }
}

#[async_trait]
impl ProjectRepositoryTrait for InMemoryStore {
    async fn fetch_active_project_with_rules(
        &self,
        project_id: Uuid,
    ) -> Result<Option<ProjectWithRules>> {
        self.project_fetches.fetch_add(1, Ordering::Relaxed);

        let Some(project) = self.projects.get(&project_id).map(|p| p.clone()) else {
            return Ok(None);
        };
        let mut rules: Vec<CodeRule> = self
            .rules
            .read()
            .iter()
            .filter(|r| r.project_id == project_id && r.is_active)
            .cloned()
            .collect();
        // 与 PostgreSQL 实现相同的求值顺序
        rules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(Some(ProjectWithRules { project, rules }))
    }
}

#[async_trait]
impl LedgerRepositoryTrait for InMemoryStore {
    async fn fetch_entry(&self, rule_id: Uuid, code_hash: &str) -> Result<Option<RedeemedCode>> {
        let entry = self
            .index
            .get(&(rule_id, code_hash.to_string()))
            .and_then(|id| self.entries.get(&*id).map(|e| e.clone()));
        Ok(entry)
    }

    async fn insert_entry(&self, entry: &NewRedemption) -> Result<Option<RedeemedCode>> {
        match self
            .index
            .entry((entry.code_rule_id, entry.code_hash.clone()))
        {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let record = RedeemedCode {
                    id: Uuid::now_v7(),
                    code_rule_id: entry.code_rule_id,
                    code_hash: entry.code_hash.clone(),
                    code_plain: entry.code_plain.clone(),
                    ow_user_id: entry.ow_user_id.clone(),
                    ow_transaction_id: entry.ow_transaction_id.clone(),
                    ip_address: entry.ip_address.clone(),
                    metadata: entry.metadata.clone(),
                    redemption_count: 1,
                    redeemed_at: Utc::now(),
                };
                self.entries.insert(record.id, record.clone());
                slot.insert(record.id);
                Ok(Some(record))
            }
        }
    }

    async fn increment_entry(
        &self,
        id: Uuid,
        max_redemptions: i32,
    ) -> Result<Option<RedeemedCode>> {
        let Some(mut entry) = self.entries.get_mut(&id) else {
            return Ok(None);
        };
        if entry.redemption_count >= max_redemptions {
            return Ok(None);
        }
        entry.redemption_count += 1;
        Ok(Some(entry.clone()))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RedemptionDetail>> {
        let entry = self.entries.get(&id).map(|e| e.clone());
        Ok(entry.and_then(|e| self.detail(&e)))
    }

    async fn list(&self, filter: &RedemptionFilter) -> Result<(Vec<RedemptionDetail>, i64)> {
        let mut matched: Vec<RedemptionDetail> = self
            .ledger_entries()
            .iter()
            .filter_map(|e| self.detail(e))
            .filter(|d| filter.project_id.is_none_or(|p| d.project_id == p))
            .filter(|d| filter.from.is_none_or(|from| d.entry.redeemed_at >= from))
            .filter(|d| filter.to.is_none_or(|to| d.entry.redeemed_at <= to))
            .collect();

        matched.sort_by(|a, b| {
            b.entry
                .redeemed_at
                .cmp(&a.entry.redeemed_at)
                .then_with(|| b.entry.id.cmp(&a.entry.id))
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn project_stats(&self, project_id: Uuid, since: DateTime<Utc>) -> Result<ProjectStats> {
        let details: Vec<RedemptionDetail> = self
            .ledger_entries()
            .iter()
            .filter_map(|e| self.detail(e))
            .filter(|d| d.project_id == project_id)
            .collect();

        let users: HashSet<&str> = details
            .iter()
            .filter_map(|d| d.entry.ow_user_id.as_deref())
            .collect();

        let mut rules: HashMap<(Uuid, &str), i64> = HashMap::new();
        let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for d in &details {
            *rules.entry((d.entry.code_rule_id, d.rule_name.as_str())).or_default() += 1;
            if d.entry.redeemed_at >= since {
                *days.entry(d.entry.redeemed_at.date_naive()).or_default() += 1;
            }
        }

        let mut by_rule: Vec<RuleRedemptionCount> = rules
            .into_iter()
            .map(|((rule_id, rule_name), count)| RuleRedemptionCount {
                rule_id,
                rule_name: rule_name.to_string(),
                count,
            })
            .collect();
        by_rule.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.rule_name.cmp(&b.rule_name))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        Ok(ProjectStats {
            project_id,
            total_redemptions: details.len() as i64,
            unique_users: users.len() as i64,
            by_rule,
            by_day: days
                .into_iter()
                .rev()
                .map(|(date, count)| DailyRedemptionCount { date, count })
                .collect(),
        })
    }
}
