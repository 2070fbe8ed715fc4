// 序列号随机挪一段，再带一个坏 IP 选项，接收端会把它丢掉
use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::TCP_PSH;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "fake_seq";

pub struct FakeSeq;

impl Hack for FakeSeq {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::EveryNPackets(5)
    }

    fn min_strength(&self) -> Strength {
        Strength::Normal
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp().is_some() && orig.payload_len() > 0
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);

        let delta = rng.gen_range(1..=pkt.payload_len().max(1) as u32 * 4);
        let forward = rng.gen_bool(0.5);
        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        let seq = tcp.seq();
        tcp.set_seq(if forward {
            seq.wrapping_add(delta)
        } else {
            seq.wrapping_sub(delta)
        });
        tcp.set_flag(TCP_PSH, rng.gen_bool(0.5));

        pkt.fill_random_payload(rng);
        // 满 60 字节的 IP 头塞不下，这次就不发
        pkt.inject_bad_ipopt(rng)?;
        // 选项坏了对端也可能照收，校验和一起弄坏才保证被丢
        pkt.corrupt_tcp_checksum()?;

        pkt.set_position(ReleaseHint::BeforeOriginal);
        pkt.set_intent(Intent::Malformed);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(FakeSeq)
}
