use std::env;

/// Boolean flags recognized from the environment (§4.1). All default to
/// `false`; a value of exactly `"1"` enables them, anything else (including
/// unset) leaves them disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub compile_hacks: bool,
    pub no_crew_cmd: bool,
    pub no_crew_glibc: bool,
    pub no_mold: bool,
    pub verbose: bool,
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|v| v == "1").unwrap_or(false)
}

impl Flags {
    pub fn from_env() -> Self {
        Flags {
            compile_hacks: env_flag("CREW_PRELOAD_ENABLE_COMPILE_HACKS"),
            no_crew_cmd: env_flag("CREW_PRELOAD_NO_CREW_CMD")
                || env_flag("CREW_PRELOAD_NO_CREW_SHELL"),
            no_crew_glibc: env_flag("CREW_PRELOAD_NO_CREW_GLIBC"),
            no_mold: env_flag("CREW_PRELOAD_NO_MOLD"),
            verbose: env_flag("CREW_PRELOAD_VERBOSE") || env_flag("CREW_AUDIT_VERBOSE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deprecated_alias_sets_no_crew_cmd() {
        env::remove_var("CREW_PRELOAD_NO_CREW_CMD");
        env::set_var("CREW_PRELOAD_NO_CREW_SHELL", "1");
        assert!(Flags::from_env().no_crew_cmd);
        env::remove_var("CREW_PRELOAD_NO_CREW_SHELL");
    }

    #[test]
    fn only_exact_value_one_enables() {
        env::set_var("CREW_PRELOAD_NO_MOLD", "true");
        assert!(!Flags::from_env().no_mold);
        env::set_var("CREW_PRELOAD_NO_MOLD", "1");
        assert!(Flags::from_env().no_mold);
        env::remove_var("CREW_PRELOAD_NO_MOLD");
    }
}
