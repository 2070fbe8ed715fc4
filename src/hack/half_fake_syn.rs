// 校验和正确的 SYN，序列号随机；对端在已建立状态下只会回 challenge ACK
use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::{TCP_ACK, TCP_FIN, TCP_PSH, TCP_RST, TCP_SYN};
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "half_fake_syn";

pub struct HalfFakeSyn;

impl Hack for HalfFakeSyn {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(5)
    }

    fn min_strength(&self) -> Strength {
        Strength::Heavy
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp()
            .is_some_and(|t| t.ack() && !t.syn() && !t.rst() && !t.fin())
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        pkt.resize_payload(0)?;

        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        for flag in [TCP_ACK, TCP_PSH, TCP_FIN, TCP_RST] {
            tcp.set_flag(flag, false);
        }
        tcp.set_flag(TCP_SYN, true);
        tcp.set_seq(rng.gen_range(0..=u32::MAX));
        tcp.set_ack_seq(0);
        pkt.fix_ip_tcp_checksum()?;

        pkt.set_position(ReleaseHint::AfterOriginal);
        pkt.set_intent(Intent::InnocuousLooking);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(HalfFakeSyn)
}
