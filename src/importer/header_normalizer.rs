// ==========================================
// 仓库管理看板 - 表头规范化
// ==========================================
// 职责: 表头 → 规范化键（小写，仅保留 [a-z0-9]）
// 纯函数，空串映射为空串
// ==========================================

/// 规范化表头
///
/// # 示例
/// - "Stock On Hand" → "stockonhand"
/// - " Part #/No. " → "partno"
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}
