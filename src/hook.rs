// PLT hook 管理：定位目标库身份、批量注册提交、记录备份以便整体还原
use crate::host::Host;
use crate::log;
use crate::maps::{self, MemoryMapping};
use std::ffi::{CStr, CString, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

// 接收原函数地址的槽位，地址需在整个进程生命周期内稳定，因此只以 'static 形式使用
#[repr(transparent)]
pub struct HookSlot(AtomicPtr<c_void>);

impl HookSlot {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    pub fn get(&self) -> *mut c_void {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_set(&self) -> bool {
        !self.get().is_null()
    }

    pub(crate) fn clear(&self) {
        self.0.store(ptr::null_mut(), Ordering::Release);
    }

    // 交给宿主写入的 void** 指针
    pub(crate) fn as_out_ptr(&self) -> *mut *mut c_void {
        self.0.as_ptr()
    }
}

impl Default for HookSlot {
    fn default() -> Self {
        Self::new()
    }
}

// 已加载 ELF 文件的身份：同名库可能以不同路径/地址出现多份，用 dev + inode 精确区分
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LibraryId {
    pub dev: libc::dev_t,
    pub inode: libc::ino_t,
}

// 单个已注册 hook 的完整描述，还原时需要的全部信息
pub struct HookRecord {
    pub dev: libc::dev_t,
    pub inode: libc::ino_t,
    pub symbol: CString,
    pub replacement: *mut c_void,
    pub backup: &'static HookSlot,
}

impl HookRecord {
    pub fn library(&self) -> LibraryId {
        LibraryId {
            dev: self.dev,
            inode: self.inode,
        }
    }
}

// 按路径字节后缀查找第一个匹配映射，后缀匹配兼容 lib/lib64 等不同 ABI 目录
pub fn find_library(mappings: &[MemoryMapping], suffix: &str) -> Option<LibraryId> {
    if suffix.is_empty() {
        return None;
    }
    mappings
        .iter()
        .find(|mapping| mapping.path.as_bytes().ends_with(suffix.as_bytes()))
        .map(|mapping| LibraryId {
            dev: mapping.dev,
            inode: mapping.inode,
        })
}

pub fn locate_library(suffix: &str) -> Option<LibraryId> {
    find_library(&maps::scan_maps(), suffix)
}

pub fn locate_library_at(maps_path: impl AsRef<Path>, suffix: &str) -> Option<LibraryId> {
    find_library(&maps::scan_maps_at(maps_path), suffix)
}

// 记录集合为空且没有失败的还原，才等价于“未对宿主进程做任何修改”
#[derive(Default)]
pub struct HookManager {
    records: Vec<HookRecord>,
    tainted: bool,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[HookRecord] {
        &self.records
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub fn is_pristine(&self) -> bool {
        self.records.is_empty() && !self.tainted
    }

    // 注册后需统一 commit 才生效，多个符号可跨库批量提交
    pub fn register_hook<H: Host>(
        &mut self,
        host: &H,
        library: LibraryId,
        symbol: &CStr,
        replacement: *mut c_void,
        backup: &'static HookSlot,
    ) -> &'static HookSlot {
        unsafe {
            host.plt_hook_register(
                library.dev,
                library.inode,
                symbol,
                replacement,
                backup.as_out_ptr(),
            );
        }
        log::debug(format_args!(
            "register hook: device=[{}] inode=[{}] symbol=[{}] new=[{:p}] backup=[{:p}]",
            library.dev,
            library.inode,
            symbol.to_string_lossy(),
            replacement,
            backup.as_out_ptr()
        ));
        self.records.push(HookRecord {
            dev: library.dev,
            inode: library.inode,
            symbol: symbol.to_owned(),
            replacement,
            backup,
        });
        backup
    }

    pub fn commit<H: Host>(&mut self, host: &H) -> bool {
        let ok = host.plt_hook_commit();
        if ok {
            log::debug(format_args!("commit {} hooks success", self.records.len()));
        } else {
            log::warn(format_args!("commit {} hooks failed", self.records.len()));
        }
        ok
    }

    // 以备份的原函数地址重新注册并提交；槽位仍为空的记录从未生效，直接丢弃
    pub fn unhook_all<H: Host>(&mut self, host: &H) -> bool {
        if self.records.is_empty() {
            return true;
        }

        let mut restored = 0usize;
        for record in &self.records {
            let original = record.backup.get();
            if original.is_null() {
                log::debug(format_args!(
                    "skip unhook of never applied symbol=[{}]",
                    record.symbol.to_string_lossy()
                ));
                continue;
            }
            unsafe {
                host.plt_hook_register(
                    record.dev,
                    record.inode,
                    &record.symbol,
                    original,
                    ptr::null_mut(),
                );
            }
            log::debug(format_args!(
                "register unhook: device=[{}] inode=[{}] symbol=[{}] backup=[{:p}]",
                record.dev,
                record.inode,
                record.symbol.to_string_lossy(),
                original
            ));
            restored += 1;
        }

        if restored != 0 && !host.plt_hook_commit() {
            self.tainted = true;
            log::warn(format_args!(
                "unhook commit failed, {} hooks may still be live",
                restored
            ));
            return false;
        }

        for record in self.records.drain(..) {
            record.backup.clear();
        }
        self.tainted = false;
        log::debug(format_args!("unhook success"));
        true
    }
}
