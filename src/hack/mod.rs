use std::collections::BTreeMap;
use std::time::Duration;

use lazy_static::lazy_static;
use rand::RngCore;

use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::Packet;

pub mod fake_close_fin;
pub mod fake_close_rst;
pub mod fake_data;
pub mod fake_seq;
pub mod fake_syn;
pub mod half_fake_ack;
pub mod half_fake_syn;
pub mod inject_ipopt;
pub mod inject_tcpopt;
pub mod shift_ack;
pub mod valid_rst_fake_seq;
pub mod zero_window;

/// 触发频率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// 条件满足就触发
    OnCondition,
    /// 每次评估按百分比概率触发
    Probability(u8),
    /// 会话里每 N 个包触发一次
    EveryNPackets(u32),
    /// 同一会话里每段时间最多一次
    TimeBased(Duration),
}

// ==========================================
// Hack：把一个真包变成一个或多个诱饵包
// hack 自己不许有可变状态，需要记忆的东西由 TCPTrack 按会话保存
// ==========================================
pub trait Hack: Send + Sync {
    fn name(&self) -> &'static str;

    fn frequency(&self) -> Frequency;

    /// 端口档位至少要到这一档才会评估
    fn min_strength(&self) -> Strength;

    /// 只读判断，不能改 orig
    fn condition(&self, orig: &Packet) -> bool;

    /// 只在 condition 为 true 时调用；先拷贝再改，orig 保持原样
    /// 返回 Err 表示这次不适用，诱饵全部丢弃
    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError>;
}

/// 对应插件的 create 入口，destroy 交给 Drop
pub type HackFactory = fn() -> Box<dyn Hack>;

lazy_static! {
    static ref HACK_REGISTRY: BTreeMap<&'static str, HackFactory> = {
        let mut m: BTreeMap<&'static str, HackFactory> = BTreeMap::new();
        m.insert(fake_close_fin::HACK_NAME, fake_close_fin::create_hack_object);
        m.insert(fake_close_rst::HACK_NAME, fake_close_rst::create_hack_object);
        m.insert(fake_data::HACK_NAME, fake_data::create_hack_object);
        m.insert(fake_seq::HACK_NAME, fake_seq::create_hack_object);
        m.insert(fake_syn::HACK_NAME, fake_syn::create_hack_object);
        m.insert(half_fake_ack::HACK_NAME, half_fake_ack::create_hack_object);
        m.insert(half_fake_syn::HACK_NAME, half_fake_syn::create_hack_object);
        m.insert(inject_ipopt::HACK_NAME, inject_ipopt::create_hack_object);
        m.insert(inject_tcpopt::HACK_NAME, inject_tcpopt::create_hack_object);
        m.insert(shift_ack::HACK_NAME, shift_ack::create_hack_object);
        m.insert(valid_rst_fake_seq::HACK_NAME, valid_rst_fake_seq::create_hack_object);
        m.insert(zero_window::HACK_NAME, zero_window::create_hack_object);
        m
    };
}

pub fn create_hack_object(name: &str) -> Option<Box<dyn Hack>> {
    HACK_REGISTRY.get(name).map(|create| create())
}

pub fn available_hacks() -> impl Iterator<Item = &'static str> {
    HACK_REGISTRY.keys().copied()
}

#[cfg(test)]
pub(crate) mod testing {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    /// 跑一次 hack 并检查通用约定：条件成立、输入不变、输出都过自检
    pub fn fire(hack: &dyn Hack, orig: &Packet) -> Vec<Packet> {
        assert!(hack.condition(orig), "{} should apply", hack.name());
        let before = orig.as_bytes().to_vec();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let out = hack.create_hack(orig, &mut rng).expect("hack fires");
        assert_eq!(orig.as_bytes(), &before[..], "{} mutated its input", hack.name());
        assert!(!out.is_empty());
        for d in &out {
            d.self_integrity_check(hack.name()).expect("tags set");
            assert_eq!(d.packet_id, orig.packet_id);
        }
        out
    }
}
