// 模块内部错误码，0 表示成功
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Errno {
    Ok = 0,              // 成功
    InvalidArg = 1,      // 参数无效
    NotFound = 2,        // 未找到目标
    Format = 3,          // 格式错误
    ShortRead = 4,       // 读取字节数不足
    ShortWrite = 5,      // 写入字节数不足
    UnknownRequest = 6,  // 未知的 companion 请求
    CommitFailed = 7,    // PLT hook 提交失败
    NoHostApi = 8,       // 宿主 api 表缺失或不完整
    Panic = 9,           // 回调中捕获到 panic
    Unknown = 1001,      // 未知错误
}

impl Errno {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<Errno> for i32 {
    fn from(value: Errno) -> Self {
        value as i32
    }
}

impl From<std::io::Error> for Errno {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::ShortRead,
            std::io::ErrorKind::WriteZero => Self::ShortWrite,
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::InvalidData => Self::Format,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::Errno;

    #[test]
    fn io_errors_map_to_short_read_and_write() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(Errno::from(eof), Errno::ShortRead);
        let zero = std::io::Error::from(std::io::ErrorKind::WriteZero);
        assert_eq!(Errno::from(zero), Errno::ShortWrite);
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(Errno::CommitFailed.to_string(), "CommitFailed(7)");
        assert!(Errno::Ok.is_ok());
        assert_eq!(i32::from(Errno::NotFound), 2);
    }
}
