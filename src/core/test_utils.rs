//! Test utilities for session-based testing.
//!
//! Every test gets its own session and therefore its own tape, so tests that
//! execute generated code in parallel never share memory.

#[cfg(test)]
pub mod test {
    use crate::compilation_session::JitSession;
    use crate::core::config::{JitConfig, UnknownCharPolicy};

    /// Configuration used by unit tests: strict about stray characters.
    pub fn strict_config() -> JitConfig {
        JitConfig::default().with_unknown_char_policy(UnknownCharPolicy::FailFast)
    }

    /// Run a test with a fresh session using [`strict_config`].
    pub fn with_session<F, R>(f: F) -> R
    where
        F: FnOnce(&mut JitSession) -> R,
    {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut session = JitSession::new(strict_config()).unwrap();
        f(&mut session)
    }

    /// Run a test with a fresh session over a tape of `tape_size` cells.
    pub fn with_tape_size<F, R>(tape_size: usize, f: F) -> R
    where
        F: FnOnce(&mut JitSession) -> R,
    {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut session = JitSession::new(strict_config().with_tape_size(tape_size)).unwrap();
        f(&mut session)
    }
}
