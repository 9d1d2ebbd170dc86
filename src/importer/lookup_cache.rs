// ==========================================
// 仓库管理看板 - 会话级查找缓存
// ==========================================
// 职责: 辅助表 名称 → ID 缓存（如分类、仓库）
// 作用域: 单个导入会话；并发导入各自持有实例，不共享
// ==========================================

use crate::domain::record::{FieldSpec, RowError, RowErrorKind, TargetRecord};
use crate::domain::types::{CoercionRule, FieldValue};
use crate::importer::import_trait::LookupResolver;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SessionLookups {
    // (table, 规范化名称) → id
    cache: HashMap<(String, String), String>,
    hits: usize,
    misses: usize,
}

fn cache_key(table: &str, name: &str) -> (String, String) {
    (table.to_string(), name.trim().to_lowercase())
}

impl SessionLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// (命中, 未命中) 次数
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    /// 解析名称对应的 ID；缓存未命中时调用 resolver（查找或创建）
    pub async fn resolve<L: LookupResolver + ?Sized>(
        &mut self,
        resolver: &L,
        table: &str,
        name: &str,
    ) -> Result<String, String> {
        let key = cache_key(table, name);
        if let Some(id) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(id.clone());
        }

        self.misses += 1;
        let id = resolver
            .resolve_or_create(table, name.trim())
            .await
            .map_err(|e| e.message)?;
        debug!(table = %table, name = %name, id = %id, "查找表缓存写入");
        self.cache.insert(key, id.clone());
        Ok(id)
    }

    /// 将记录中所有 Lookup 字段从名称替换为 ID
    ///
    /// 名称为 NULL 的字段保持 NULL；解析失败返回 LookupFailed 行级错误
    pub async fn apply<L: LookupResolver + ?Sized>(
        &mut self,
        resolver: &L,
        fields: &[FieldSpec],
        record: &mut TargetRecord,
    ) -> Result<(), RowError> {
        for spec in fields {
            let table = match &spec.rule {
                CoercionRule::Lookup { table } => table,
                _ => continue,
            };
            let name = match record.get(&spec.name).and_then(|v| v.as_str()) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };

            match self.resolve(resolver, table, &name).await {
                Ok(id) => record.set(&spec.name, FieldValue::Text(id)),
                Err(message) => {
                    return Err(RowError::new(
                        record.row_number,
                        &spec.name,
                        RowErrorKind::LookupFailed,
                        format!("查找 {} 失败 ({}): {}", table, name, message),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::import_trait::WriteRejection;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LookupResolver for CountingResolver {
        async fn resolve_or_create(&self, table: &str, name: &str) -> Result<String, WriteRejection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "broken" {
                return Err(WriteRejection::new("constraint failed"));
            }
            Ok(format!("{}:{}", table, name.to_lowercase()))
        }
    }

    #[tokio::test]
    async fn test_resolve_is_cached_case_insensitive() {
        let resolver = CountingResolver { calls: AtomicUsize::new(0) };
        let mut lookups = SessionLookups::new();

        let a = lookups.resolve(&resolver, "categories", "Fasteners").await.unwrap();
        let b = lookups.resolve(&resolver, "categories", " fasteners ").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lookups.stats(), (1, 1));
    }

    #[tokio::test]
    async fn test_apply_replaces_names_and_reports_failures() {
        let resolver = CountingResolver { calls: AtomicUsize::new(0) };
        let mut lookups = SessionLookups::new();
        let fields = vec![FieldSpec::text("name"), FieldSpec::lookup("category_id", "categories")];

        let mut ok = TargetRecord::new(2)
            .with_field("name", "Bolt")
            .with_field("category_id", "Fasteners");
        lookups.apply(&resolver, &fields, &mut ok).await.unwrap();
        assert_eq!(ok.get("category_id"), Some(&FieldValue::from("categories:fasteners")));

        let mut empty = TargetRecord::new(3).with_field("category_id", FieldValue::Null);
        lookups.apply(&resolver, &fields, &mut empty).await.unwrap();
        assert_eq!(empty.get("category_id"), Some(&FieldValue::Null));

        let mut bad = TargetRecord::new(4).with_field("category_id", "broken");
        let err = lookups.apply(&resolver, &fields, &mut bad).await.unwrap_err();
        assert_eq!(err.kind, RowErrorKind::LookupFailed);
        assert_eq!(err.row_number, 4);
    }
}
