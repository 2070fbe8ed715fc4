use std::fmt;

// ==========================================
// 数据包身上的各种“戳”
// 未赋值的状态用 Option::None 表示，读之前必须先处理 None
// ==========================================

/// 真包还是 hack 伪造的诱饵包
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Morality {
    Legitimate,
    Decoy,
}

/// 数据包从哪里进入系统
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    LocalApp,
    Tunnel,
    Network,
    TtlProbe,
}

impl Source {
    /// 往外发的包才会被 hack
    pub fn is_outbound(self) -> bool {
        matches!(self, Source::LocalApp | Source::Tunnel)
    }
}

/// 调度状态，只有调度器能改
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Young,
    Send,
    Held,
}

/// 诱饵“错”在哪里
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// 对端不会受影响的无害诱饵
    HarmlessDecoy,
    /// 内容被故意破坏
    DeliberatelyCorrupt,
    /// 看起来完全正常
    InnocuousLooking,
    /// 校验和故意写错
    ChecksumInvalid,
    /// 头部/选项畸形
    Malformed,
}

/// 相对原始包的发送时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseHint {
    BeforeOriginal,
    AfterOriginal,
}

/// 由 ip.protocol 推导出的分类，覆盖所有取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Tcp,
    Icmp,
    OtherIp,
}

impl Morality {
    pub fn as_str(self) -> &'static str {
        match self {
            Morality::Legitimate => "good",
            Morality::Decoy => "evil",
        }
    }
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::LocalApp => "local",
            Source::Tunnel => "tunnel",
            Source::Network => "network",
            Source::TtlProbe => "ttl force",
        }
    }
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Young => "young",
            Disposition::Send => "send",
            Disposition::Held => "keep",
        }
    }
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::HarmlessDecoy => "prescript",
            Intent::DeliberatelyCorrupt => "everybad",
            Intent::InnocuousLooking => "innocent",
            Intent::ChecksumInvalid => "badcksum",
            Intent::Malformed => "malformed",
        }
    }
}

impl ReleaseHint {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseHint::BeforeOriginal => "anticipation",
            ReleaseHint::AfterOriginal => "posticipation",
        }
    }
}

/// 日志里把 None 打成 unassigned
pub(crate) struct Tag<T>(pub Option<T>);

macro_rules! tag_display {
    ($($t:ty),*) => {$(
        impl fmt::Display for Tag<$t> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.0 {
                    Some(v) => f.write_str(v.as_str()),
                    None => f.write_str("unassigned"),
                }
            }
        }
    )*};
}

tag_display!(Morality, Source, Disposition, Intent, ReleaseHint);
