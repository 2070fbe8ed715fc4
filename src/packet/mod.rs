use std::fmt;
use std::ops::Range;

use rand::Rng;

use crate::error::PacketError;

pub mod checksum;
pub mod header;
mod options;
pub mod tags;

pub use header::{IcmpHeader, IpHeader, TcpHeader};
pub use tags::{Disposition, Intent, Morality, Proto, ReleaseHint, Source};

use header::{
    ICMP_HLEN, IP_MIN_HLEN, IPPROTO_ICMP, IPPROTO_TCP, TCP_ACK, TCP_FIN, TCP_MIN_HLEN, TCP_RST,
    TCP_SYN,
};
use tags::Tag;

// ==========================================
// Packet：一个 IPv4 数据报 + 一堆调度用的戳
// 头部位置永远从 pbuf 现算，不缓存任何偏移
// ==========================================
#[derive(Debug, Clone)]
pub struct Packet {
    /// 原始 TCP 序列号，诱饵沿用真包的值，非 TCP 为 0
    pub packet_id: u32,
    pbuf: Vec<u8>,
    proto: Proto,
    /// 构造时的 tot_len，截断负载之后还能算出原始负载长度
    orig_pktlen: u16,

    morality: Option<Morality>,
    source: Option<Source>,
    status: Option<Disposition>,
    wtf: Option<Intent>,
    position: Option<ReleaseHint>,
}

impl Packet {
    /// 从线上抓到的字节构造，只要求装得下最小 IP 头
    pub fn new(buff: &[u8]) -> Result<Self, PacketError> {
        if buff.len() < IP_MIN_HLEN {
            return Err(PacketError::Truncated {
                len: buff.len(),
                need: IP_MIN_HLEN,
            });
        }

        let mut pkt = Packet {
            packet_id: 0,
            pbuf: buff.to_vec(),
            proto: Proto::OtherIp,
            orig_pktlen: 0,
            morality: None,
            source: None,
            status: None,
            wtf: None,
            position: None,
        };
        pkt.update_layout();
        pkt.orig_pktlen = pkt.ip().total_len();
        pkt.packet_id = pkt.tcp().map(|t| t.seq()).unwrap_or(0);
        Ok(pkt)
    }

    /// hack 用的拷贝构造：字节、身份、原始长度照抄，所有戳清空
    pub fn derive_from(orig: &Packet) -> Self {
        Packet {
            packet_id: orig.packet_id,
            pbuf: orig.pbuf.clone(),
            proto: orig.proto,
            orig_pktlen: orig.orig_pktlen,
            morality: None,
            source: None,
            status: None,
            wtf: None,
            position: None,
        }
    }

    // ---------- 布局 ----------

    /// 每次缓冲区变动后重新分类协议
    /// 声明的头部超出实际字节时拒绝识别成 TCP/ICMP
    fn update_layout(&mut self) {
        let len = self.pbuf.len();
        let ihl = (self.pbuf[0] & 0x0F) as usize * 4;
        self.proto = if ihl < IP_MIN_HLEN || ihl > len {
            Proto::OtherIp
        } else {
            match self.pbuf[9] {
                IPPROTO_TCP if len >= ihl + TCP_MIN_HLEN => {
                    let doff = (self.pbuf[ihl + 12] >> 4) as usize * 4;
                    if doff >= TCP_MIN_HLEN && ihl + doff <= len {
                        Proto::Tcp
                    } else {
                        Proto::OtherIp
                    }
                }
                IPPROTO_ICMP if len >= ihl + ICMP_HLEN => Proto::Icmp,
                _ => Proto::OtherIp,
            }
        };
    }

    pub fn proto(&self) -> Proto {
        self.proto
    }

    pub fn ip(&self) -> IpHeader<&[u8]> {
        IpHeader::new_unchecked(&self.pbuf[..])
    }

    pub fn ip_mut(&mut self) -> IpHeader<&mut [u8]> {
        IpHeader::new_unchecked(&mut self.pbuf[..])
    }

    pub fn ip_header_len(&self) -> usize {
        self.ip().header_len()
    }

    /// TCP 头所在的字节区间
    pub fn tcp_range(&self) -> Option<Range<usize>> {
        if self.proto != Proto::Tcp {
            return None;
        }
        let ihl = self.ip_header_len();
        let doff = (self.pbuf[ihl + 12] >> 4) as usize * 4;
        Some(ihl..ihl + doff)
    }

    pub fn tcp(&self) -> Option<TcpHeader<&[u8]>> {
        let r = self.tcp_range()?;
        Some(TcpHeader::new_unchecked(&self.pbuf[r]))
    }

    pub fn tcp_mut(&mut self) -> Option<TcpHeader<&mut [u8]>> {
        let r = self.tcp_range()?;
        Some(TcpHeader::new_unchecked(&mut self.pbuf[r]))
    }

    pub fn icmp(&self) -> Option<IcmpHeader<&[u8]>> {
        if self.proto != Proto::Icmp {
            return None;
        }
        let ihl = self.ip_header_len();
        Some(IcmpHeader::new_unchecked(&self.pbuf[ihl..ihl + ICMP_HLEN]))
    }

    /// 传输层头长度：TCP 取 doff，ICMP 固定 8，其他为 0
    pub fn transport_header_len(&self) -> usize {
        match self.proto {
            Proto::Tcp => self.tcp_range().map(|r| r.len()).unwrap_or(0),
            Proto::Icmp => ICMP_HLEN,
            Proto::OtherIp => 0,
        }
    }

    pub fn headers_len(&self) -> usize {
        self.ip_header_len() + self.transport_header_len()
    }

    /// IP 头里声明的总长度
    pub fn total_len(&self) -> usize {
        self.ip().total_len() as usize
    }

    /// 负载区间；头部 + 选项已经占满总长度时为 None
    pub fn payload_range(&self) -> Option<Range<usize>> {
        if self.proto != Proto::Tcp {
            return None;
        }
        let start = self.headers_len();
        let end = self.total_len().min(self.pbuf.len());
        (end > start).then_some(start..end)
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload_range().map(|r| &self.pbuf[r])
    }

    pub fn payload_len(&self) -> usize {
        self.payload_range().map(|r| r.len()).unwrap_or(0)
    }

    pub fn orig_pktlen(&self) -> u16 {
        self.orig_pktlen
    }

    /// 构造时的负载长度
    pub fn orig_payload_len(&self) -> usize {
        (self.orig_pktlen as usize).saturating_sub(self.headers_len())
    }

    /// 整个缓冲区，可能带着尾部空闲字节
    pub fn as_bytes(&self) -> &[u8] {
        &self.pbuf
    }

    /// 真正要上线的字节：截到 tot_len
    pub fn wire_bytes(&self) -> &[u8] {
        let end = self.total_len().min(self.pbuf.len());
        &self.pbuf[..end.max(IP_MIN_HLEN.min(self.pbuf.len()))]
    }

    pub fn buffer_len(&self) -> usize {
        self.pbuf.len()
    }

    /// 尾部还空着的字节数
    pub fn free_space(&self) -> usize {
        self.pbuf.len().saturating_sub(self.total_len())
    }

    // ---------- 缓冲区操作 ----------

    /// 缓冲区只能从这里变大
    pub fn increase_pbuf(&mut self, morespace: usize) {
        self.pbuf.resize(self.pbuf.len() + morespace, 0);
        self.update_layout();
    }

    /// 负载可大可小：头部原样拷贝，负载能保留多少保留多少
    pub fn resize_payload(&mut self, newlen: usize) -> Result<(), PacketError> {
        let hdrlen = self.headers_len();
        if hdrlen > self.pbuf.len() {
            return Err(PacketError::Truncated {
                len: self.pbuf.len(),
                need: hdrlen,
            });
        }
        let old_total = self.total_len().min(self.pbuf.len()).max(hdrlen);
        let oldlen = old_total - hdrlen;
        let newtotal = hdrlen + newlen;
        if newtotal > u16::MAX as usize {
            return Err(PacketError::HeaderCapacity {
                proposed: newtotal,
                limit: u16::MAX as usize,
            });
        }

        let newsize = (self.pbuf.len() - oldlen + newlen).max(newtotal);
        let copysize = newtotal.min(old_total);

        let mut newpbuf = vec![0u8; newsize];
        newpbuf[..copysize].copy_from_slice(&self.pbuf[..copysize]);
        self.pbuf = newpbuf;

        self.ip_mut().set_total_len(newtotal as u16);
        self.update_layout();
        Ok(())
    }

    /// 负载填随机字节，看起来像加密流量
    pub fn fill_random_payload<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if let Some(r) = self.payload_range() {
            rng.fill(&mut self.pbuf[r]);
        }
    }

    // ---------- 校验和 ----------

    pub fn fix_ip_checksum(&mut self) {
        let ihl = self.ip_header_len().min(self.pbuf.len());
        self.ip_mut().set_checksum(0);
        let sum = checksum::ip_checksum(&self.pbuf[..ihl]);
        self.ip_mut().set_checksum(sum);
    }

    /// 重算 IP 头和 TCP 校验和
    pub fn fix_ip_tcp_checksum(&mut self) -> Result<(), PacketError> {
        let r = self.tcp_range().ok_or(PacketError::NotTcp)?;
        self.fix_ip_checksum();

        let (src, dst) = (self.ip().src(), self.ip().dst());
        let end = self.total_len().min(self.pbuf.len()).max(r.end);
        if let Some(mut tcp) = self.tcp_mut() {
            tcp.set_checksum(0);
        }
        let sum = checksum::tcp_checksum(src, dst, &self.pbuf[r.start..end]);
        if let Some(mut tcp) = self.tcp_mut() {
            tcp.set_checksum(sum);
        }
        Ok(())
    }

    pub fn fix_icmp_checksum(&mut self) {
        if self.proto != Proto::Icmp {
            return;
        }
        let ihl = self.ip_header_len();
        let end = self.total_len().min(self.pbuf.len()).max(ihl + ICMP_HLEN);
        IcmpHeader::new_unchecked(&mut self.pbuf[ihl..ihl + ICMP_HLEN]).set_checksum(0);
        let sum = checksum::ip_checksum(&self.pbuf[ihl..end]);
        IcmpHeader::new_unchecked(&mut self.pbuf[ihl..ihl + ICMP_HLEN]).set_checksum(sum);
    }

    /// 按协议修所有校验和
    pub fn fix_checksums(&mut self) {
        match self.proto {
            Proto::Tcp => {
                let _ = self.fix_ip_tcp_checksum();
            }
            Proto::Icmp => {
                self.fix_ip_checksum();
                self.fix_icmp_checksum();
            }
            Proto::OtherIp => self.fix_ip_checksum(),
        }
    }

    pub fn verify_ip_checksum(&self) -> bool {
        let ihl = self.ip_header_len().min(self.pbuf.len());
        checksum::verify(&self.pbuf[..ihl])
    }

    pub fn verify_tcp_checksum(&self) -> bool {
        let Some(r) = self.tcp_range() else {
            return false;
        };
        let end = self.total_len().min(self.pbuf.len()).max(r.end);
        checksum::verify_tcp(self.ip().src(), self.ip().dst(), &self.pbuf[r.start..end])
    }

    /// 把一个正确的 TCP 校验和改错
    pub fn corrupt_tcp_checksum(&mut self) -> Result<(), PacketError> {
        self.fix_ip_tcp_checksum()?;
        if let Some(mut tcp) = self.tcp_mut() {
            let sum = tcp.checksum();
            tcp.set_checksum(sum.wrapping_add(0xd34d));
        }
        Ok(())
    }

    // ---------- 戳 ----------

    pub fn morality(&self) -> Option<Morality> {
        self.morality
    }

    pub fn source(&self) -> Option<Source> {
        self.source
    }

    pub fn disposition(&self) -> Option<Disposition> {
        self.status
    }

    pub fn intent(&self) -> Option<Intent> {
        self.wtf
    }

    pub fn position(&self) -> Option<ReleaseHint> {
        self.position
    }

    pub fn set_intent(&mut self, wtf: Intent) {
        self.wtf = Some(wtf);
    }

    pub fn set_position(&mut self, position: ReleaseHint) {
        self.position = Some(position);
    }

    pub(crate) fn mark(&mut self, source: Source, status: Disposition, morality: Morality) {
        self.source = Some(source);
        self.status = Some(status);
        self.morality = Some(morality);
    }

    pub(crate) fn set_disposition(&mut self, status: Disposition) {
        self.status = Some(status);
    }

    /// hack 交回诱饵前的自检
    /// intent 和 position 必须有，source/status 不该由 hack 设置，只记日志
    pub fn self_integrity_check(&self, hack_name: &'static str) -> Result<(), PacketError> {
        if self.source.is_some() {
            log::warn!("in {hack_name} source must not be set: ignored value");
        }
        if self.status.is_some() {
            log::warn!("in {hack_name} status must not be set: ignored value");
        }
        if self.wtf.is_none() {
            return Err(PacketError::Contract {
                hack: hack_name,
                field: "intent",
            });
        }
        if self.position.is_none() {
            return Err(PacketError::Contract {
                hack: hack_name,
                field: "position",
            });
        }
        Ok(())
    }

    /// 单包诊断日志
    pub fn selflog(&self, context: &str, loginfo: &str) {
        log::debug!(
            target: "nfq_decoy::packets",
            "{} :{:x}: E|{} status {} WTF|{} src {}|{} ttl {} {}",
            context,
            self.packet_id,
            Tag(self.morality),
            Tag(self.status),
            Tag(self.wtf),
            Tag(self.source),
            self,
            self.ip().ttl(),
            loginfo
        );
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ip = self.ip();
        write!(f, "{}->{} ", ip.src(), ip.dst())?;
        let orig = self.orig_pktlen as usize;

        if let Some(tcp) = self.tcp() {
            let flag = |b| if tcp.has_flag(b) { 1 } else { 0 };
            write!(
                f,
                "[TCP sp {} dp {} SAFR{{{}{}{}{}}} len {}({}) seq {:x} ack_seq {:x}]",
                tcp.src_port(),
                tcp.dst_port(),
                flag(TCP_SYN),
                flag(TCP_ACK),
                flag(TCP_FIN),
                flag(TCP_RST),
                orig,
                orig as isize - self.headers_len() as isize,
                tcp.seq(),
                tcp.ack_seq()
            )
        } else if let Some(icmp) = self.icmp() {
            write!(
                f,
                "[ICMP type {} code {} len {}({})]",
                icmp.icmp_type(),
                icmp.code(),
                orig,
                orig as isize - self.headers_len() as isize
            )
        } else {
            write!(f, "[Other proto: {}]", ip.protocol())
        }
    }
}
