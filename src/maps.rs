// /proc/self/maps 解析，把每一行映射为 MemoryMapping
//
// 行格式：start-end perms offset major:minor inode [path]
// path 为 inode 之后空白分隔的剩余部分：去掉前导填充空格，保留尾部原始字节（含 '\r'），只去掉 '\n'。
// 路径按字节保存，不要求是合法 UTF-8。
// 假设内核输出每行以 '\n' 结尾且路径内不含 '\n'，其他平台的 maps 格式需重新确认。
use crate::config::DEFAULT_MAPS_PATH;
use crate::log;
use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::path::Path;

pub const PROT_READ_FLAG: u32 = 0x1;
pub const PROT_WRITE_FLAG: u32 = 0x2;
pub const PROT_EXEC_FLAG: u32 = 0x4;

static MAPS_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^([0-9a-fA-F]+)-([0-9a-fA-F]+)\s+([-rwxsp]{4})\s+([0-9a-fA-F]+)\s+([0-9a-fA-F]+):([0-9a-fA-F]+)\s+([0-9]+)(?:\s+((?-u:.)*))?$",
    )
    .ok()
});

// maps 中的一条映射记录，为扫描时刻的只读快照
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryMapping {
    pub start: usize,
    pub end: usize,
    pub perms: u32,
    pub is_private: bool,
    pub offset: u64,
    pub dev: libc::dev_t,
    pub inode: libc::ino_t,
    pub path: OsString,
}

impl MemoryMapping {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn is_anonymous(&self) -> bool {
        self.inode == 0 && self.dev == 0
    }

    pub fn is_readable(&self) -> bool {
        self.perms & PROT_READ_FLAG != 0
    }

    pub fn is_executable(&self) -> bool {
        self.perms & PROT_EXEC_FLAG != 0
    }
}

// 扫描当前进程的映射表，打不开时返回空列表
pub fn scan_maps() -> Vec<MemoryMapping> {
    scan_maps_at(DEFAULT_MAPS_PATH)
}

pub fn scan_maps_at(path: impl AsRef<Path>) -> Vec<MemoryMapping> {
    let path = path.as_ref();
    // 按字节读取与解析，非 UTF-8 路径原样保留
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(err) => {
            log::debug(format_args!("read {} failed: {err}", path.display()));
            return Vec::new();
        }
    };
    parse_maps(content)
}

// 逐行解析，格式错误的行单独跳过
pub fn parse_maps(content: impl AsRef<[u8]>) -> Vec<MemoryMapping> {
    let mut mappings = Vec::new();
    let mut skipped = 0usize;
    for line in content.as_ref().split(|&byte| byte == b'\n') {
        if line.is_empty() {
            continue;
        }
        match parse_maps_line(line) {
            Some(mapping) => mappings.push(mapping),
            None => skipped += 1,
        }
    }
    if skipped != 0 {
        log::debug(format_args!("maps: skipped {skipped} malformed lines"));
    }
    mappings
}

pub fn parse_maps_line(line: impl AsRef<[u8]>) -> Option<MemoryMapping> {
    let captures = MAPS_LINE.as_ref()?.captures(line.as_ref())?;

    let start = usize::from_str_radix(text_field(&captures, 1)?, 16).ok()?;
    let end = usize::from_str_radix(text_field(&captures, 2)?, 16).ok()?;
    if start >= end {
        return None;
    }

    let (perms, is_private) = parse_perms(text_field(&captures, 3)?);

    let offset = u64::from_str_radix(text_field(&captures, 4)?, 16).ok()?;
    let major = u32::from_str_radix(text_field(&captures, 5)?, 16).ok()?;
    let minor = u32::from_str_radix(text_field(&captures, 6)?, 16).ok()?;
    let inode = text_field(&captures, 7)?.parse::<u64>().ok()?;
    let path = captures
        .get(8)
        .map(|value| OsString::from_vec(value.as_bytes().to_vec()))
        .unwrap_or_default();

    Some(MemoryMapping {
        start,
        end,
        perms,
        is_private,
        offset,
        dev: libc::makedev(major as libc::c_uint, minor as libc::c_uint),
        inode: inode as libc::ino_t,
        path,
    })
}

// 数值与权限字段由正则限定为 ASCII
fn text_field<'a>(captures: &Captures<'a>, index: usize) -> Option<&'a str> {
    std::str::from_utf8(captures.get(index)?.as_bytes()).ok()
}

// 各标志位与所在位置无关，只看是否出现
fn parse_perms(field: &str) -> (u32, bool) {
    let mut perms = 0;
    if field.contains('r') {
        perms |= PROT_READ_FLAG;
    }
    if field.contains('w') {
        perms |= PROT_WRITE_FLAG;
    }
    if field.contains('x') {
        perms |= PROT_EXEC_FLAG;
    }
    (perms, field.contains('p'))
}
