// 宿主注入框架提供给模块的能力集合
use std::ffi::{CStr, c_void};
use std::os::fd::OwnedFd;

// 模块可向宿主设置的选项，取值与 Zygisk 的 Option 枚举一致
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModuleOption {
    ForceDenylistUnmount = 0,
    // 回调结束后由宿主 dlclose 本模块，仅在没有留下任何修改时使用
    DlcloseModuleLibrary = 1,
}

pub trait Host {
    // 登记 dev/inode 所指 ELF 中 symbol 的 PLT hook，commit 成功前不生效；
    // old_func 非空时宿主在 commit 时写入原函数地址。
    // old_func 须为空或在下次 commit 返回前保持有效，new_func 须与符号签名一致
    unsafe fn plt_hook_register(
        &self,
        dev: libc::dev_t,
        inode: libc::ino_t,
        symbol: &CStr,
        new_func: *mut c_void,
        old_func: *mut *mut c_void,
    );

    // 应用全部已登记的 hook，任一失败返回 false
    fn plt_hook_commit(&self) -> bool;

    fn connect_companion(&self) -> Option<OwnedFd>;

    fn set_option(&self, option: ModuleOption);
}
