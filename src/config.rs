use std::sync::LazyLock;

use derive_from_env::FromEnv;

#[derive(FromEnv)]
#[from_env(prefix = "LAZYLOG")]
#[allow(non_snake_case)]
pub struct LazylogConfig {
    #[from_env(default = "10")]
    pub LOCK_RETRY_BASE_MS: u64,
    #[from_env(default = "1000")]
    pub LOCK_RETRY_MAX_MS: u64,
    #[from_env(default = "10")]
    pub LOCK_MAX_RETRIES: u32,
}

pub static LAZYLOG_CONFIG: LazyLock<LazylogConfig> =
    LazyLock::new(|| LazylogConfig::from_env().unwrap());
