use super::id_macro::string_id;

string_id! {
    /// Logical slot a placeholder occupies (e.g. one in-flight upload).
    ///
    /// 占位实体所属的逻辑槽位（例如一次进行中的上传）。
    pub struct SlotKey;
}
