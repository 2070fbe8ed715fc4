use std::time::Duration;

use crate::error::ConfigError;
use crate::hack_pool::Strength;

pub const ENV_QUEUE: &str = "NFQ_DECOY_QUEUE";
pub const ENV_MARK: &str = "NFQ_DECOY_MARK";
pub const ENV_STRENGTH: &str = "NFQ_DECOY_STRENGTH";
pub const ENV_ONLY_HACK: &str = "NFQ_DECOY_ONLY_HACK";
pub const ENV_MAX_SESSIONS: &str = "NFQ_DECOY_MAX_SESSIONS";

/// 运行参数，默认值照搬老配置
#[derive(Debug, Clone)]
pub struct Config {
    pub queue_num: u16,
    /// 注入的诱饵打上这个 mark，iptables 规则据此不再送回队列
    pub fwmark: u32,
    pub max_sessions: usize,
    pub max_packet_queue: usize,
    pub session_idle: Duration,
    pub report_interval: Duration,
    pub default_strength: Strength,
    /// (名字, 启动时是否启用)
    pub hacks: Vec<(String, bool)>,
    pub only_hack: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let hacks = [
            ("fake_close_rst", true),
            ("fake_close_fin", true),
            ("fake_data", true),
            ("fake_seq", true),
            ("valid_rst_fake_seq", true),
            ("zero_window", true),
            ("fake_syn", true),
            ("half_fake_syn", false),
            ("half_fake_ack", false),
            ("shift_ack", false),
            ("inject_ipopt", true),
            ("inject_tcpopt", true),
        ];
        Config {
            queue_num: 0,
            fwmark: 0x5a5a,
            max_sessions: 20,
            max_packet_queue: 60,
            session_idle: Duration::from_secs(120),
            report_interval: Duration::from_secs(10),
            default_strength: Strength::Normal,
            hacks: hacks.iter().map(|(n, e)| (n.to_string(), *e)).collect(),
            only_hack: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 按 key 取覆盖值，没有的保持默认
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let mut cfg = Config::default();

        if let Some(v) = lookup(ENV_QUEUE) {
            cfg.queue_num = v.trim().parse().map_err(|_| invalid(ENV_QUEUE, &v))?;
        }
        if let Some(v) = lookup(ENV_MARK) {
            cfg.fwmark = parse_mark(&v).ok_or_else(|| invalid(ENV_MARK, &v))?;
        }
        if let Some(v) = lookup(ENV_STRENGTH) {
            cfg.default_strength = v.trim().parse()?;
        }
        if let Some(v) = lookup(ENV_ONLY_HACK) {
            let v = v.trim();
            if !v.is_empty() {
                cfg.only_hack = Some(v.to_string());
            }
        }
        if let Some(v) = lookup(ENV_MAX_SESSIONS) {
            cfg.max_sessions = match v.trim().parse() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid(ENV_MAX_SESSIONS, &v)),
            };
        }

        Ok(cfg)
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

/// 十进制或 0x 开头的十六进制
fn parse_mark(v: &str) -> Option<u32> {
    let v = v.trim();
    match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => v.parse().ok(),
    }
}
