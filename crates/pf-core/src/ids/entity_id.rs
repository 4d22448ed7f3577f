use super::id_macro::string_id;

/// Prefix marking a locally generated, non-authoritative id.
///
/// 本地生成（非权威）ID 的前缀。
pub const PLACEHOLDER_ID_PREFIX: &str = "temp_";

string_id! {
    /// Identifier of a tracked entity (a paper processing job).
    ///
    /// Backend-assigned ids are opaque. Placeholder ids are `temp_<n>`.
    pub struct EntityId;
}

impl EntityId {
    /// Build the placeholder id for sequence number `seq`.
    pub fn placeholder(seq: u64) -> Self {
        Self(format!("{PLACEHOLDER_ID_PREFIX}{seq}"))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_ID_PREFIX)
    }
}
