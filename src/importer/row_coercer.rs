// ==========================================
// 仓库管理看板 - 行转换器实现
// ==========================================
// 职责: RawRow + FieldSpec 集合 → TargetRecord
// 规则:
//   - 数值: 剔除 [0-9.-] 以外的字符后解析，非有限值 → 字段默认值
//   - 文本: TRIM；null_if_blank 时空串视为 NULL
//   - 标识缺失: Synthesize 生成占位标识，Mandatory 记 RowError 并剔除该行
//   - 已被其他字段别名精确命中的表头，不再作为本字段的子串匹配结果
// ==========================================

use crate::domain::record::{FieldSpec, RawRow, RowError, RowErrorKind, TargetRecord};
use crate::domain::types::{CellValue, CoercionRule, FieldValue, KeyPolicy};
use crate::importer::field_mapper::AliasFieldMapper;
use crate::importer::header_normalizer::normalize_header;
use crate::importer::import_trait::FieldMapper;
use chrono::Utc;
use uuid::Uuid;

/// 占位标识默认前缀
pub const DEFAULT_PLACEHOLDER_PREFIX: &str = "AUTO";

pub struct RowCoercer {
    mapper: Box<dyn FieldMapper>,
    placeholder_prefix: String,
}

impl Default for RowCoercer {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_PREFIX)
    }
}

impl RowCoercer {
    pub fn new(placeholder_prefix: &str) -> Self {
        Self::with_mapper(Box::new(AliasFieldMapper), placeholder_prefix)
    }

    pub fn with_mapper(mapper: Box<dyn FieldMapper>, placeholder_prefix: &str) -> Self {
        Self {
            mapper,
            placeholder_prefix: placeholder_prefix.to_string(),
        }
    }

    /// 转换一行
    ///
    /// # 返回
    /// - Ok(TargetRecord): 所有字段均已赋值（未映射的字段为 NULL）
    /// - Err(RowError): 必填字段缺失，该行应从批次中剔除
    pub fn coerce(&self, row: &RawRow, fields: &[FieldSpec]) -> Result<TargetRecord, RowError> {
        let headers: Vec<&str> = row.headers().collect();
        let claims = alias_claims(&headers, fields);
        let mut record = TargetRecord::new(row.row_number);

        for spec in fields {
            let cell = self
                .resolve_source(spec, &headers, &claims)
                .and_then(|header| row.get(header));

            let mut value = match cell {
                Some(cell) => coerce_cell(spec, cell),
                None => FieldValue::Null,
            };

            if value.is_null() {
                match spec.key_policy {
                    KeyPolicy::Optional => {}
                    KeyPolicy::Synthesize => {
                        value = FieldValue::Text(synthesize_placeholder(&self.placeholder_prefix));
                    }
                    KeyPolicy::Mandatory => {
                        return Err(RowError::new(
                            row.row_number,
                            &spec.name,
                            RowErrorKind::MissingMandatory,
                            format!("必填字段缺失: {}", spec.name),
                        ));
                    }
                }
            }

            record.set(&spec.name, value);
        }

        Ok(record)
    }

    fn resolve_source<'a>(
        &self,
        spec: &FieldSpec,
        headers: &[&'a str],
        claims: &[(&'a str, &str)],
    ) -> Option<&'a str> {
        let foreign = |header: &str| {
            claims.iter().any(|(h, _)| *h == header)
                && !claims.iter().any(|(h, owner)| *h == header && *owner == spec.name)
        };

        let hit = self.mapper.resolve(spec, headers)?;
        if !foreign(hit) {
            return Some(hit);
        }
        let free: Vec<&'a str> = headers.iter().copied().filter(|h| !foreign(*h)).collect();
        self.mapper.resolve(spec, &free)
    }
}

/// 表头 → 以别名精确命中它的字段名
fn alias_claims<'a, 'f>(headers: &[&'a str], fields: &'f [FieldSpec]) -> Vec<(&'a str, &'f str)> {
    let mut claims = Vec::new();
    for header in headers {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            continue;
        }
        for spec in fields.iter().filter(|s| s.aliases.contains(&normalized)) {
            claims.push((*header, spec.name.as_str()));
        }
    }
    claims
}

/// 按字段规则转换单元格（已映射的单元格）
pub fn coerce_cell(spec: &FieldSpec, cell: &CellValue) -> FieldValue {
    match &spec.rule {
        CoercionRule::Integer => match parse_numeric(cell) {
            Some(v) if v.abs() < i64::MAX as f64 => FieldValue::Integer(v.trunc() as i64),
            _ => spec.default.clone(),
        },
        CoercionRule::Decimal => match parse_numeric(cell) {
            Some(v) => FieldValue::Decimal(v),
            None => spec.default.clone(),
        },
        CoercionRule::Text | CoercionRule::Lookup { .. } => {
            let text = cell.as_text().unwrap_or_default();
            let trimmed = text.trim();
            if trimmed.is_empty() && spec.null_if_blank {
                FieldValue::Null
            } else {
                FieldValue::Text(trimmed.to_string())
            }
        }
        CoercionRule::PassThrough => match cell {
            CellValue::Empty => FieldValue::Null,
            CellValue::Number(n) => FieldValue::Decimal(*n),
            CellValue::Text(s) => FieldValue::Text(s.clone()),
        },
    }
}

/// 宽松数值解析
///
/// 剔除数字、'.'、'-' 以外的所有字符后解析；结果不是有限数则返回 None
pub fn parse_numeric(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Empty => None,
        CellValue::Number(n) => n.is_finite().then_some(*n),
        CellValue::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
    }
}

/// 生成占位标识: {prefix}-{毫秒时间戳}-{6 位随机十六进制}
pub fn synthesize_placeholder(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().timestamp_millis(),
        &suffix[..6]
    )
}
