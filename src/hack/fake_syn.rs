// 已建立的会话里插一个随机序列号的 SYN，校验和由 TCPTrack 弄坏
use rand::{Rng, RngCore};

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::{TCP_ACK, TCP_FIN, TCP_PSH, TCP_RST, TCP_SYN};
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "fake_syn";

pub struct FakeSyn;

impl Hack for FakeSyn {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(10)
    }

    fn min_strength(&self) -> Strength {
        Strength::Normal
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

        pkt.set_position(ReleaseHint::BeforeOriginal);
        pkt.set_intent(Intent::ChecksumInvalid);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(FakeSyn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::testing::{ack_psh, tcp_packet};

    #[test]
    fn bare_syn_inside_session() {
        let out = fire(&FakeSyn, &ack_psh(25));
        let d = &out[0];
        let tcp = d.tcp().unwrap();
        assert_eq!(tcp.flags(), TCP_SYN);
        assert_eq!(tcp.ack_seq(), 0);
        assert_eq!(d.payload_len(), 0);
        assert_eq!(d.intent(), Some(Intent::ChecksumInvalid));
    }

    #[test]
    fn ignores_handshake_segments() {
        assert!(!FakeSyn.condition(&tcp_packet(0, TCP_SYN | TCP_ACK, 1)));
        assert!(!FakeSyn.condition(&tcp_packet(0, TCP_SYN, 1)));
    }
}
