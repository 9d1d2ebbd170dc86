// ==========================================
// 仓库管理看板 - 导入领域基础类型
// ==========================================
// 职责: 单元格值 / 字段值 / 类型转换规则 / 主键策略
// ==========================================

use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CellValue - 原始单元格值
// ==========================================
// 用途: 文件解析产物，尚未做任何类型转换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 由文本构造单元格（空白 → Empty）
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// 单元格的文本形式（数值去掉多余的 ".0"）
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format_number(*n)),
        }
    }
}

/// 数值格式化：整数值不带小数部分（Excel 中 12 读出来是 12.0）
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ==========================================
// FieldValue - 转换后的字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Decimal(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Decimal(v) => write!(f, "{}", format_number(*v)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Decimal(value)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            FieldValue::Decimal(v) => ToSqlOutput::Owned(Value::Real(*v)),
            FieldValue::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Integer(v) => FieldValue::Integer(v),
            Value::Real(v) => FieldValue::Decimal(v),
            Value::Text(s) => FieldValue::Text(s),
            Value::Blob(b) => FieldValue::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

// ==========================================
// CoercionRule - 类型转换规则
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum CoercionRule {
    /// 整数（剥离非数字字符后解析，小数部分截断）
    Integer,
    /// 小数
    Decimal,
    /// 去首尾空白的字符串
    Text,
    /// 原样透传（文本不做 trim）
    PassThrough,
    /// 名称 → ID 查找（按字符串清洗，导入时经会话缓存解析）
    Lookup { table: String },
}

// ==========================================
// KeyPolicy - 字段缺失时的处理策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyPolicy {
    /// 可缺失（保持 NULL）
    Optional,
    /// 缺失时生成占位标识（时间戳 + 随机后缀）
    Synthesize,
    /// 必填，缺失则整行记为 RowError 并剔除
    Mandatory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_drops_integral_fraction() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_cell_from_text_blank_is_empty() {
        assert_eq!(CellValue::from_text("   "), CellValue::Empty);
        assert_eq!(CellValue::from_text(" a "), CellValue::Text(" a ".to_string()));
        assert!(CellValue::Text("  ".to_string()).is_empty());
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::Integer(7).to_string(), "7");
        assert_eq!(FieldValue::Decimal(1.5).to_string(), "1.5");
        assert_eq!(FieldValue::from("x").to_string(), "x");
    }

    #[test]
    fn test_field_value_from_sqlite_value() {
        assert_eq!(FieldValue::from(Value::Null), FieldValue::Null);
        assert_eq!(FieldValue::from(Value::Integer(3)), FieldValue::Integer(3));
        assert_eq!(
            FieldValue::from(Value::Text("a".to_string())),
            FieldValue::Text("a".to_string())
        );
    }
}
