use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::Config;
use crate::error::ControlError;
use crate::hack::{self, Hack};

pub const PORTNUMBER: usize = 65536;

/// 端口强度档位，越往后允许的 hack 越激进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strength {
    None = 1,
    Light = 2,
    Normal = 3,
    Heavy = 4,
}

impl Strength {
    pub fn as_str(self) -> &'static str {
        match self {
            Strength::None => "none",
            Strength::Light => "light",
            Strength::Normal => "normal",
            Strength::Heavy => "heavy",
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strength {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Strength::None),
            "light" => Ok(Strength::Light),
            "normal" => Ok(Strength::Normal),
            "heavy" => Ok(Strength::Heavy),
            _ => Err(ControlError::InvalidStrength(s.to_string())),
        }
    }
}

/// 65536 项的 端口 -> 档位 表
#[derive(Debug, Clone)]
pub struct PortTable(Box<[Strength]>);

impl PortTable {
    pub fn new(default: Strength) -> Self {
        PortTable(vec![default; PORTNUMBER].into_boxed_slice())
    }

    pub fn get(&self, port: u16) -> Strength {
        self.0[port as usize]
    }

    pub fn set_range(&mut self, ports: RangeInclusive<u16>, strength: Strength) {
        let (start, end) = (*ports.start() as usize, *ports.end() as usize);
        self.0[start..=end].fill(strength);
    }

    /// 连续同档位的端口合并成区间
    pub fn ranges(&self) -> Vec<PortRange> {
        let mut out: Vec<PortRange> = Vec::new();
        for (port, &strength) in self.0.iter().enumerate() {
            match out.last_mut() {
                Some(last) if last.strength == strength => last.end = port as u16,
                _ => out.push(PortRange {
                    start: port as u16,
                    end: port as u16,
                    strength,
                }),
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
    pub strength: Strength,
}

/// 一次评估看到的完整配置，只读
#[derive(Debug, Clone)]
pub struct PoolConfig {
    enabled: Vec<bool>,
    ports: PortTable,
}

impl PoolConfig {
    pub fn is_enabled(&self, idx: usize) -> bool {
        self.enabled.get(idx).copied().unwrap_or(false)
    }

    pub fn port_strength(&self, port: u16) -> Strength {
        self.ports.get(port)
    }

    /// none 档位谁都不放；其余要求 hack 单独启用且所需档位不超过端口档位
    pub fn admits(&self, idx: usize, required: Strength, tier: Strength) -> bool {
        tier != Strength::None && required <= tier && self.is_enabled(idx)
    }
}

type SharedConfig = Arc<RwLock<Arc<PoolConfig>>>;

// ==========================================
// HackPool：每个 hack 一个实例 + 可被控制面修改的共享配置
// ==========================================
pub struct HackPool {
    hacks: Vec<Box<dyn Hack>>,
    shared: SharedConfig,
}

impl HackPool {
    /// 按名字从注册表加载
    pub fn new(config: &Config) -> Result<Self, ControlError> {
        let wanted: Vec<(String, bool)> = match &config.only_hack {
            Some(only) => {
                log::info!("single hack {only} overrides the hack list");
                vec![(only.clone(), true)]
            }
            None => config.hacks.clone(),
        };

        let mut loaded = Vec::with_capacity(wanted.len());
        for (name, enabled) in wanted {
            let hack = hack::create_hack_object(&name)
                .ok_or_else(|| ControlError::UnknownHack(name.clone()))?;
            log::info!(
                "loaded hack {} ({}, min strength {})",
                hack.name(),
                if enabled { "enabled" } else { "disabled" },
                hack.min_strength()
            );
            loaded.push((hack, enabled));
        }

        Ok(Self::from_hacks(loaded, config.default_strength))
    }

    pub fn from_hacks(hacks: Vec<(Box<dyn Hack>, bool)>, default: Strength) -> Self {
        let enabled = hacks.iter().map(|(_, e)| *e).collect();
        let hacks = hacks.into_iter().map(|(h, _)| h).collect();
        HackPool {
            hacks,
            shared: Arc::new(RwLock::new(Arc::new(PoolConfig {
                enabled,
                ports: PortTable::new(default),
            }))),
        }
    }

    pub fn len(&self) -> usize {
        self.hacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hacks.is_empty()
    }

    pub fn hacks(&self) -> impl Iterator<Item = &dyn Hack> {
        self.hacks.iter().map(|h| h.as_ref())
    }

    /// 取当前配置快照，一个包从头到尾只用这一份
    pub fn snapshot(&self) -> Arc<PoolConfig> {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 对这个目的端口可以评估的 hack
    pub fn eligible<'a>(
        &'a self,
        snapshot: &'a PoolConfig,
        dport: u16,
    ) -> impl Iterator<Item = (usize, &'a dyn Hack)> + 'a {
        let tier = snapshot.port_strength(dport);
        self.hacks
            .iter()
            .enumerate()
            .filter(move |(idx, h)| snapshot.admits(*idx, h.min_strength(), tier))
            .map(|(idx, h)| (idx, h.as_ref()))
    }

    pub fn control(&self) -> PoolControl {
        PoolControl {
            hacks: Arc::new(
                self.hacks
                    .iter()
                    .map(|h| (h.name(), h.min_strength()))
                    .collect(),
            ),
            shared: Arc::clone(&self.shared),
        }
    }
}

// ==========================================
// 控制面：启停 hack、改档位、查询状态，别的不管
// ==========================================
#[derive(Clone)]
pub struct PoolControl {
    hacks: Arc<Vec<(&'static str, Strength)>>,
    shared: SharedConfig,
}

impl PoolControl {
    /// 拷一份、改、整体换掉
    fn update(&self, f: impl FnOnce(&mut PoolConfig)) {
        let mut guard = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = PoolConfig::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    pub fn set_hack_enabled(&self, name: &str, enabled: bool) -> Result<(), ControlError> {
        let idx = self
            .hacks
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or_else(|| ControlError::UnknownHack(name.to_string()))?;
        self.update(|c| c.enabled[idx] = enabled);
        log::info!("hack {name} {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub fn set_port_strength(
        &self,
        ports: RangeInclusive<u16>,
        strength: Strength,
    ) -> Result<(), ControlError> {
        let (start, end) = (*ports.start(), *ports.end());
        if start > end {
            return Err(ControlError::InvalidPortRange { start, end });
        }
        self.update(|c| c.ports.set_range(ports, strength));
        log::info!("ports {start}-{end} set to {strength}");
        Ok(())
    }

    pub fn set_global_strength(&self, strength: Strength) {
        self.update(|c| c.ports = PortTable::new(strength));
        log::info!("all ports set to {strength}");
    }

    pub fn status(&self) -> PoolStatus {
        let snap = self
            .shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        PoolStatus {
            hacks: self
                .hacks
                .iter()
                .enumerate()
                .map(|(idx, (name, min_strength))| HackStatus {
                    name: *name,
                    enabled: snap.is_enabled(idx),
                    min_strength: *min_strength,
                })
                .collect(),
            ports: snap.ports.ranges(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HackStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub min_strength: Strength,
}

#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub hacks: Vec<HackStatus>,
    pub ports: Vec<PortRange>,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20} | {:<8} | {}", "hack", "enabled", "min strength")?;
        for h in &self.hacks {
            writeln!(f, "{:<20} | {:<8} | {}", h.name, h.enabled, h.min_strength)?;
        }
        for r in &self.ports {
            if r.start == r.end {
                writeln!(f, "port {}: {}", r.start, r.strength)?;
            } else {
                writeln!(f, "ports {}-{}: {}", r.start, r.end, r.strength)?;
            }
        }
        Ok(())
    }
}
