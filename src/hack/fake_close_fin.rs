// 和 fake_close_rst 一样往回退序列号，只是用 FIN 且校验和是坏的
use std::time::Duration;

use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::{TCP_FIN, TCP_PSH};
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "fake_close_fin";

pub struct FakeCloseFin;

impl Hack for FakeCloseFin {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::TimeBased(Duration::from_secs(20))
    }

    fn min_strength(&self) -> Strength {
        Strength::Light
    }

    fn condition(&self, orig: &Packet) -> bool {
        orig.tcp().is_some_and(|t| t.ack())
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        let original_size = pkt.orig_payload_len() as u32;

        pkt.resize_payload(0)?;
        let id = pkt.ip().id();
        pkt.ip_mut().set_id(id.wrapping_add(rng.gen_range(0..10)));

        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        tcp.set_flag(TCP_PSH, false);
        tcp.set_flag(TCP_FIN, true);
        let seq = tcp.seq();
        tcp.set_seq(seq.wrapping_sub(original_size).wrapping_add(1));

        pkt.set_position(ReleaseHint::BeforeOriginal);
        pkt.set_intent(Intent::ChecksumInvalid);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(FakeCloseFin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::testing::ack_psh;

    #[test]
    fn empty_fin_tagged_for_bad_checksum() {
        let out = fire(&FakeCloseFin, &ack_psh(12));
        let tcp = out[0].tcp().unwrap();
        assert!(tcp.fin() && !tcp.psh() && !tcp.rst());
        assert_eq!(out[0].payload_len(), 0);
        assert_eq!(tcp.seq(), 0x1000_0000 - 11);
        assert_eq!(out[0].intent(), Some(Intent::ChecksumInvalid));
    }
}
