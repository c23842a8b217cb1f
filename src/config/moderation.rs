use anyhow::Result;
use std::env;

pub const DEFAULT_FLAG_THRESHOLD: u64 = 3;
pub const DEFAULT_DELETE_THRESHOLD: u64 = 10;

/// Unresolved-report volumes at which automated actions fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub flag: u64,
    pub delete: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            flag: DEFAULT_FLAG_THRESHOLD,
            delete: DEFAULT_DELETE_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(flag: u64, delete: u64) -> Result<Self> {
        if flag == 0 {
            return Err(anyhow::anyhow!("flag threshold must be > 0"));
        }
        if delete <= flag {
            return Err(anyhow::anyhow!(
                "delete threshold ({}) must be greater than flag threshold ({})",
                delete,
                flag
            ));
        }
        Ok(Self { flag, delete })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationConfig {
    pub thresholds: Thresholds,
    /// Identity stamped as resolver/actor on automated actions.
    pub system_user_id: i32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            system_user_id: 0,
        }
    }
}

impl ModerationConfig {
    pub fn from_env() -> Result<Self> {
        let flag = parse_env("MODERATION_FLAG_THRESHOLD", DEFAULT_FLAG_THRESHOLD)?;
        let delete = parse_env("MODERATION_DELETE_THRESHOLD", DEFAULT_DELETE_THRESHOLD)?;
        let system_user_id = parse_env("MODERATION_SYSTEM_USER_ID", 0)?;

        Ok(Self {
            thresholds: Thresholds::new(flag, delete)?,
            system_user_id,
        })
    }
}

fn parse_env<T: std::str::FromStr>(var_name: &str, default: T) -> Result<T> {
    match env::var(var_name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value '{}'", var_name, raw)),
        Err(_) => Ok(default),
    }
}
