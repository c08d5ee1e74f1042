/// Generate a fresh v4 uuid string, used for client identities when the
/// caller does not supply one.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
