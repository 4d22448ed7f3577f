use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Dependent data produced for a finished entity (e.g. a translated chapter).
///
/// 实体处理完成后产生的附属数据（例如已翻译的章节）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub entity_id: EntityId,
    pub title: String,
    pub position: u32,
}
