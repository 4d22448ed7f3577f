use crate::ids::EntityId;

/// Side effects produced by a status transition.
///
/// Effects are ordered; the store executes them in the order returned.
///
/// 状态迁移产生的副作用（按顺序执行）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEffect {
    /// Fetch the entity's dependent data (artifact list).
    ///
    /// 拉取实体的附属数据（产物列表）。
    RefetchDependents { entity_id: EntityId },

    /// Tear down the entity's subscription.
    ///
    /// 取消实体的订阅。
    Unwatch { entity_id: EntityId },

    /// Navigate once to the entity's detail view.
    ///
    /// 单次跳转到实体详情页。
    Navigate { entity_id: EntityId },
}

impl JobEffect {
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::RefetchDependents { entity_id }
            | Self::Unwatch { entity_id }
            | Self::Navigate { entity_id } => entity_id,
        }
    }
}
