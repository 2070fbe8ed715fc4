use std::net::Ipv4Addr;

// ==========================================
// 头部视图：只持有切片，不持有地址
// 视图借用 Packet 的缓冲区，缓冲区一变借用就失效，编译器替我们盯着
// ==========================================

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;

pub const IP_MIN_HLEN: usize = 20;
pub const TCP_MIN_HLEN: usize = 20;
pub const ICMP_HLEN: usize = 8;
pub const MAX_HDR_LEN: usize = 60;

pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_RST: u8 = 0x04;
pub const TCP_PSH: u8 = 0x08;
pub const TCP_ACK: u8 = 0x10;
pub const TCP_URG: u8 = 0x20;

#[inline]
fn be16(b: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([b[at], b[at + 1]])
}

#[inline]
fn be32(b: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline]
fn put16(b: &mut [u8], at: usize, v: u16) {
    b[at..at + 2].copy_from_slice(&v.to_be_bytes());
}

#[inline]
fn put32(b: &mut [u8], at: usize, v: u32) {
    b[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

/// IPv4 头视图，切片从 IP 头第一个字节开始
#[derive(Debug)]
pub struct IpHeader<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> IpHeader<B> {
    /// 调用方保证切片至少有 20 字节
    pub(crate) fn new_unchecked(buf: B) -> Self {
        Self { buf }
    }

    pub fn version(&self) -> u8 {
        self.buf.as_ref()[0] >> 4
    }

    /// 头长度，单位字节
    pub fn header_len(&self) -> usize {
        (self.buf.as_ref()[0] & 0x0F) as usize * 4
    }

    pub fn total_len(&self) -> u16 {
        be16(self.buf.as_ref(), 2)
    }

    pub fn id(&self) -> u16 {
        be16(self.buf.as_ref(), 4)
    }

    pub fn ttl(&self) -> u8 {
        self.buf.as_ref()[8]
    }

    pub fn protocol(&self) -> u8 {
        self.buf.as_ref()[9]
    }

    pub fn checksum(&self) -> u16 {
        be16(self.buf.as_ref(), 10)
    }

    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::from(be32(self.buf.as_ref(), 12))
    }

    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::from(be32(self.buf.as_ref(), 16))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IpHeader<B> {
    pub fn set_header_len(&mut self, bytes: usize) {
        let b = self.buf.as_mut();
        b[0] = (b[0] & 0xF0) | ((bytes / 4) as u8 & 0x0F);
    }

    pub fn set_total_len(&mut self, len: u16) {
        put16(self.buf.as_mut(), 2, len);
    }

    pub fn set_id(&mut self, id: u16) {
        put16(self.buf.as_mut(), 4, id);
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.buf.as_mut()[8] = ttl;
    }

    pub fn set_checksum(&mut self, sum: u16) {
        put16(self.buf.as_mut(), 10, sum);
    }
}

/// TCP 头视图，切片从 TCP 头第一个字节开始
#[derive(Debug)]
pub struct TcpHeader<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> TcpHeader<B> {
    pub(crate) fn new_unchecked(buf: B) -> Self {
        Self { buf }
    }

    pub fn src_port(&self) -> u16 {
        be16(self.buf.as_ref(), 0)
    }

    pub fn dst_port(&self) -> u16 {
        be16(self.buf.as_ref(), 2)
    }

    pub fn seq(&self) -> u32 {
        be32(self.buf.as_ref(), 4)
    }

    pub fn ack_seq(&self) -> u32 {
        be32(self.buf.as_ref(), 8)
    }

    /// data offset，单位字节
    pub fn header_len(&self) -> usize {
        (self.buf.as_ref()[12] >> 4) as usize * 4
    }

    pub fn flags(&self) -> u8 {
        self.buf.as_ref()[13]
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags() & flag != 0
    }

    pub fn syn(&self) -> bool {
        self.has_flag(TCP_SYN)
    }

    pub fn ack(&self) -> bool {
        self.has_flag(TCP_ACK)
    }

    pub fn fin(&self) -> bool {
        self.has_flag(TCP_FIN)
    }

    pub fn rst(&self) -> bool {
        self.has_flag(TCP_RST)
    }

    pub fn psh(&self) -> bool {
        self.has_flag(TCP_PSH)
    }

    pub fn window(&self) -> u16 {
        be16(self.buf.as_ref(), 14)
    }

    pub fn checksum(&self) -> u16 {
        be16(self.buf.as_ref(), 16)
    }

    /// 20 字节固定头之后的选项区
    pub fn options(&self) -> &[u8] {
        let end = self.header_len().min(self.buf.as_ref().len());
        &self.buf.as_ref()[TCP_MIN_HLEN.min(end)..end]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TcpHeader<B> {
    pub fn set_seq(&mut self, seq: u32) {
        put32(self.buf.as_mut(), 4, seq);
    }

    pub fn set_ack_seq(&mut self, ack: u32) {
        put32(self.buf.as_mut(), 8, ack);
    }

    pub fn set_header_len(&mut self, bytes: usize) {
        let b = self.buf.as_mut();
        b[12] = (((bytes / 4) as u8) << 4) | (b[12] & 0x0F);
    }

    pub fn set_flag(&mut self, flag: u8, on: bool) {
        let b = self.buf.as_mut();
        if on {
            b[13] |= flag;
        } else {
            b[13] &= !flag;
        }
    }

    pub fn set_window(&mut self, window: u16) {
        put16(self.buf.as_mut(), 14, window);
    }

    pub fn set_checksum(&mut self, sum: u16) {
        put16(self.buf.as_mut(), 16, sum);
    }
}

/// ICMP 头视图
#[derive(Debug)]
pub struct IcmpHeader<B> {
    buf: B,
}

impl<B: AsRef<[u8]>> IcmpHeader<B> {
    pub(crate) fn new_unchecked(buf: B) -> Self {
        Self { buf }
    }

    pub fn icmp_type(&self) -> u8 {
        self.buf.as_ref()[0]
    }

    pub fn code(&self) -> u8 {
        self.buf.as_ref()[1]
    }

    pub fn checksum(&self) -> u16 {
        be16(self.buf.as_ref(), 2)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IcmpHeader<B> {
    pub fn set_checksum(&mut self, sum: u16) {
        put16(self.buf.as_mut(), 2, sum);
    }
}
