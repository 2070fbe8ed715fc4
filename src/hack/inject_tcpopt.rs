// 坏时间戳选项 + 随机负载，已经带少见选项的会话不碰
use rand::RngCore;

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "inject_tcpopt";

pub struct InjectTcpOpt;

impl Hack for InjectTcpOpt {
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
        orig.tcp().is_some() && !orig.check_uncommon_tcpopt()
    }

    fn create_hack(
        &self,
        orig: &Packet,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        pkt.inject_bad_tcpopt(rng)?;
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
    Box::new(InjectTcpOpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::testing::ack_psh;

    #[test]
    fn adds_four_option_bytes() {
        let orig = ack_psh(10);
        let out = fire(&InjectTcpOpt, &orig);
        assert_eq!(out[0].tcp().unwrap().header_len(), 24);
        assert_eq!(out[0].total_len(), orig.total_len() + 4);
        assert!(out[0].verify_ip_checksum());
        assert!(!out[0].verify_tcp_checksum());
        assert_eq!(out[0].payload_len(), 10);
    }
}
