// 模块与 companion 之间的帧编解码：定长 i32 + 带长度前缀的字节串
// 两端运行在同一台设备同一架构上，整数按本机字节序传输
use std::io::{self, Read, Write};

// 读取不足 4 字节时返回的哨兵值，协议内的有效载荷均为非负数
pub const EOF_SENTINEL: i32 = -1;
// 单个字节串帧的长度上限，超过时视为损坏的帧
pub const MAX_FRAME_LEN: usize = 1 << 20;

pub trait FramedStreamExt {
    fn read_i32(&mut self) -> i32;
    fn write_i32(&mut self, value: i32) -> io::Result<()>;
    fn read_string(&mut self) -> Option<Vec<u8>>;
    fn write_string(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Read + Write> FramedStreamExt for T {
    fn read_i32(&mut self) -> i32 {
        let mut buf = [0u8; 4];
        match self.read_exact(&mut buf) {
            Ok(()) => i32::from_ne_bytes(buf),
            Err(_) => EOF_SENTINEL,
        }
    }

    fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_all(&value.to_ne_bytes())
    }

    // 长度为负时不再消费后续字节
    fn read_string(&mut self) -> Option<Vec<u8>> {
        let len = self.read_i32();
        if len < 0 {
            return None;
        }
        let len = len as usize;
        if len > MAX_FRAME_LEN {
            return None;
        }
        let mut bytes = Vec::with_capacity(len);
        Read::take(&mut *self, len as u64)
            .read_to_end(&mut bytes)
            .ok()?;
        if bytes.len() != len {
            return None;
        }
        Some(bytes)
    }

    fn write_string(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame exceeds MAX_FRAME_LEN",
            ));
        }
        self.write_i32(bytes.len() as i32)?;
        self.write_all(bytes)
    }
}
