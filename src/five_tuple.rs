// five_tuple.rs
use std::net::Ipv4Addr;

use crate::packet::Packet;
use crate::packet::header::{IPPROTO_TCP, IP_MIN_HLEN};

/// 流标识，TCPTrack 用它索引会话
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FiveTuple {
    /// 两个方向映射到同一个 key：小的端点放前面
    pub fn canonical(self) -> Self {
        if (self.src, self.src_port) <= (self.dst, self.dst_port) {
            self
        } else {
            FiveTuple {
                src: self.dst,
                dst: self.src,
                proto: self.proto,
                src_port: self.dst_port,
                dst_port: self.src_port,
            }
        }
    }
}

impl From<&Packet> for FiveTuple {
    fn from(pkt: &Packet) -> Self {
        pkt.wire_bytes().into()
    }
}

impl From<&[u8]> for FiveTuple {
    fn from(payload: &[u8]) -> Self {
        let mut t = FiveTuple {
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
            proto: 0,
            src_port: 0,
            dst_port: 0,
        };

        // 连 IPv4 头都不够，或者不是 v4
        if payload.len() < IP_MIN_HLEN || (payload[0] >> 4) != 4 {
            return t;
        }

        let ihl = (payload[0] & 0x0F) as usize * 4;
        if payload.len() < ihl {
            return t;
        }

        t.proto = payload[9];
        t.src = Ipv4Addr::new(payload[12], payload[13], payload[14], payload[15]);
        t.dst = Ipv4Addr::new(payload[16], payload[17], payload[18], payload[19]);

        // 只有 TCP 才关心端口，其它协议端口留 0
        if t.proto == IPPROTO_TCP && payload.len() >= ihl + 4 {
            t.src_port = u16::from_be_bytes([payload[ihl], payload[ihl + 1]]);
            t.dst_port = u16::from_be_bytes([payload[ihl + 2], payload[ihl + 3]]);
        }

        t
    }
}
