// 纯 ACK，窗口清零，校验和由 TCPTrack 弄坏
use rand::RngCore;

use super::{Frequency, Hack};
use crate::error::PacketError;
use crate::hack_pool::Strength;
use crate::packet::header::TCP_PSH;
use crate::packet::{Intent, Packet, ReleaseHint};

pub const HACK_NAME: &str = "zero_window";

pub struct ZeroWindow;

impl Hack for ZeroWindow {
    fn name(&self) -> &'static str {
        HACK_NAME
    }

    fn frequency(&self) -> Frequency {
        Frequency::Probability(10)
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
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<Packet>, PacketError> {
        let mut pkt = Packet::derive_from(orig);
        pkt.resize_payload(0)?;

        let mut tcp = pkt.tcp_mut().ok_or(PacketError::NotTcp)?;
        tcp.set_flag(TCP_PSH, false);
        tcp.set_window(0);

        pkt.set_position(ReleaseHint::AfterOriginal);
        pkt.set_intent(Intent::ChecksumInvalid);
        pkt.selflog(HACK_NAME, "Hacked packet");

        Ok(vec![pkt])
    }
}

pub fn create_hack_object() -> Box<dyn Hack> {
    Box::new(ZeroWindow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hack::testing::fire;
    use crate::packet::header::{TCP_ACK, TCP_FIN};
    use crate::packet::testing::{ack_psh, tcp_packet};

    #[test]
    fn pure_ack_with_closed_window() {
        let out = fire(&ZeroWindow, &ack_psh(30));
        let tcp = out[0].tcp().unwrap();
        assert_eq!(tcp.window(), 0);
        assert!(tcp.ack() && !tcp.psh());
        assert_eq!(out[0].payload_len(), 0);
        assert_eq!(out[0].position(), Some(ReleaseHint::AfterOriginal));
    }

    #[test]
    fn leaves_closing_segments_alone() {
        assert!(!ZeroWindow.condition(&tcp_packet(0, TCP_ACK | TCP_FIN, 9)));
    }
}
