//! Configuration access port trait.
//!
//! Section and key lookups are case-insensitive in the file adapter. The typed
//! getters fall back to `default` both when the key is absent and when its
//! value does not parse; validation that must tell those apart goes through
//! [`get_string`](ConfigPort::get_string).

pub trait ConfigPort {
    /// Raw value, untrimmed. `None` when the section or key is absent.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    /// Accepts `true/false`, `yes/no` and `1/0`.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
