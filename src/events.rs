// ==========================================
// 仓库管理看板 - 数据变更通知
// ==========================================
// 职责: 定义变更通知 trait，导入核心在每个成功批次后发布
// 说明: 订阅方（列表刷新、其它会话）通过 broadcast 接收，
//       核心不感知订阅方
// ==========================================

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// 默认广播通道容量
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// 一个批次落库后的变更事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 目标表
    pub table: String,
    /// 导入会话 ID
    pub import_id: String,
    /// 批次序号（从 0 开始）
    pub batch_index: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// 变更通知 Trait
///
/// 发布失败不影响导入（通知是尽力而为的）
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, event: ChangeEvent);
}

/// 空操作通知者（单元测试、CLI 使用）
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify(&self, event: ChangeEvent) {
        debug!(
            table = %event.table,
            batch_index = event.batch_index,
            "NoopNotifier: 跳过变更通知"
        );
    }
}

// ==========================================
// BroadcastNotifier - 基于 tokio broadcast 的发布者
// ==========================================
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn notify(&self, event: ChangeEvent) {
        // 无订阅者时 send 返回 Err，属于正常情况
        if self.sender.send(event).is_err() {
            debug!("BroadcastNotifier: 当前无订阅者");
        }
    }
}
