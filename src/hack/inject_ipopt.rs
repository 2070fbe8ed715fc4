// 坏 Record-Route 选项 + 随机负载
use rand::RngCore;

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "inject_ipopt";

pub struct InjectIpOpt;

impl Hack for InjectIpOpt {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(20)
    }

    fn min_strength(&self) -> Strength {
        Strength::Normal
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp().is_some() && !orig.check_uncommon_ipopt()
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        pkt.inject_bad_ipopt(rng)?;
        pkt.fill_random_payload(rng);
        // 选项坏了对端也可能照收，校验和一起弄坏才保证被丢
        pkt.corrupt_tcp_checksum()?;

        pkt.set_position(ReleaseHint::BeforeOriginal);
        pkt.set_intent(Intent::Malformed);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(InjectIpOpt)
}
