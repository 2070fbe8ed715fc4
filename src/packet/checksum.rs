use std::net::Ipv4Addr;

use super::header::IPPROTO_TCP;

/// 16 位大端字累加，不折叠也不取反，方便分段相加
pub fn half_cksum(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for w in &mut chunks {
        sum += u16::from_be_bytes([w[0], w[1]]) as u32;
        // 防止溢出，高位提前折回
        if sum & 0x8000_0000 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    sum
}

/// 折叠进位并取反
pub fn compute_sum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// 调用前校验和字段必须清零
pub fn ip_checksum(header: &[u8]) -> u16 {
    compute_sum(half_cksum(header))
}

/// TCP 校验和：伪首部 + TCP 头 + 负载，校验和字段必须清零
pub fn tcp_checksum(src: Ipv4Addr, dst: Ipv4Addr, segment: &[u8]) -> u16 {
    let mut sum = half_cksum(&src.octets());
    sum += half_cksum(&dst.octets());
    sum += IPPROTO_TCP as u32 + segment.len() as u32;
    sum += half_cksum(segment);
    compute_sum(sum)
}

/// 连同校验和字段一起求和，结果为 0 说明正确
pub fn verify(data: &[u8]) -> bool {
    compute_sum(half_cksum(data)) == 0
}

pub fn verify_tcp(src: Ipv4Addr, dst: Ipv4Addr, segment: &[u8]) -> bool {
    let mut sum = half_cksum(&src.octets());
    sum += half_cksum(&dst.octets());
    sum += IPPROTO_TCP as u32 + segment.len() as u32;
    sum += half_cksum(segment);
    compute_sum(sum) == 0
}
