// Zygisk 宿主绑定：api 表封装为 Host，并导出模块与 companion 入口
use crate::host::{Host, ModuleOption};
use crate::log;
use std::ffi::{CStr, c_void};
use std::os::fd::{FromRawFd, OwnedFd};

mod abi;
mod entry;

use abi::ApiTable;

// 宿主 api 表的只读句柄，表本身由宿主在模块生命周期内保持有效
pub struct ZygiskApi {
    table: *const ApiTable,
}

// 特化回调均在同一线程串行调用，句柄只在模块实例内部使用
unsafe impl Send for ZygiskApi {}

impl ZygiskApi {
    pub(crate) unsafe fn from_raw(table: *const ApiTable) -> Option<Self> {
        if table.is_null() {
            return None;
        }
        Some(Self { table })
    }

    fn table(&self) -> &ApiTable {
        unsafe { &*self.table }
    }
}

impl Host for ZygiskApi {
    unsafe fn plt_hook_register(
        &self,
        dev: libc::dev_t,
        inode: libc::ino_t,
        symbol: &CStr,
        new_func: *mut c_void,
        old_func: *mut *mut c_void,
    ) {
        let Some(register) = self.table().plt_hook_register else {
            log::error(format_args!("api table has no pltHookRegister"));
            return;
        };
        unsafe { register(dev, inode, symbol.as_ptr(), new_func, old_func) };
    }

    fn plt_hook_commit(&self) -> bool {
        match self.table().plt_hook_commit {
            Some(commit) => unsafe { commit() },
            None => false,
        }
    }

    fn connect_companion(&self) -> Option<OwnedFd> {
        let table = self.table();
        let connect = table.connect_companion?;
        let fd = unsafe { connect(table.impl_) };
        if fd < 0 {
            return None;
        }
        Some(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn set_option(&self, option: ModuleOption) {
        let table = self.table();
        if let Some(set_option) = table.set_option {
            unsafe { set_option(table.impl_, option as i32) };
        }
    }
}
