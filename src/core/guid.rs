use uuid::Uuid;

/// Length of a hyphenated GUID: 32 hex digits plus 4 hyphens.
pub const GUID_LENGTH: usize = 36;

/// Random RFC 4122 version-4 identifier in the 8-4-4-4-12 layout.
pub fn create_guid() -> String {
    Uuid::new_v4().hyphenated().to_string()
}
