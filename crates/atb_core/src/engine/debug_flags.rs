//! Debug-build trace toggles read once from the environment.

use std::sync::OnceLock;

/// Set and not explicitly off (`0`, `false`, `off`, `no` or empty).
fn trace_flag(name: &str) -> bool {
    let Some(raw) = std::env::var_os(name) else {
        return false;
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    !matches!(value.as_str(), "" | "0" | "false" | "off" | "no")
}

/// Per-tick gauge values at `trace` level (debug builds only).
pub fn gauge_trace_enabled() -> bool {
    if !cfg!(debug_assertions) {
        return false;
    }
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| trace_flag("ATB_DEBUG_GAUGES"))
}

/// Ready-queue contents after every collect (debug builds only).
pub fn queue_trace_enabled() -> bool {
    if !cfg!(debug_assertions) {
        return false;
    }
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| trace_flag("ATB_DEBUG_QUEUE"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_flag_values() {
        std::env::set_var("ATB_TEST_TRACE_ON", "yes");
        std::env::set_var("ATB_TEST_TRACE_OFF", " Off ");
        assert!(trace_flag("ATB_TEST_TRACE_ON"));
        assert!(!trace_flag("ATB_TEST_TRACE_OFF"));
        assert!(!trace_flag("ATB_TEST_TRACE_UNSET"));
    }
}
