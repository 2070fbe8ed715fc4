use thiserror::Error;

/// 数据包引擎的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// 缓冲区连声明的头部都放不下
    #[error("truncated packet: {len} bytes, need at least {need}")]
    Truncated { len: usize, need: usize },

    /// 选项注入会让头部超过 60 字节上限，包保持原样
    #[error("header capacity exceeded: {proposed} bytes > {limit}")]
    HeaderCapacity { proposed: usize, limit: usize },

    #[error("operation requires a TCP segment")]
    NotTcp,

    /// hack 交回的包缺少必须的标记
    #[error("hack '{hack}' left mandatory field '{field}' unassigned")]
    Contract {
        hack: &'static str,
        field: &'static str,
    },
}

/// 运行时控制面的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("unknown hack '{0}'")]
    UnknownHack(String),

    #[error("invalid strength '{0}' (expected none|light|normal|heavy)")]
    InvalidStrength(String),

    #[error("invalid port range {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error(transparent)]
    Control(#[from] ControlError),
}
