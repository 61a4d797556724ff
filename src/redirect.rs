// open() 的替换函数与路径重定向规则
//
// open 原型为 open(const char *path, int flags, ...)，可变参数只有 mode 一个。
// 在支持的 ABI 上可变整型参数与普通参数同寄存器传递，替换函数以定长 mode 形参接收，
// 再原样转发给声明为可变参数的原函数。
use crate::config::{DEFAULT_HOSTS_REPLACEMENT, DEFAULT_HOSTS_SOURCE};
use crate::hook::HookSlot;
use crate::log;
use once_cell::sync::OnceCell;
use std::ffi::{CStr, CString, c_char, c_int};

pub type OpenFn = unsafe extern "C" fn(path: *const c_char, flags: c_int, ...) -> c_int;

// commit 成功后宿主写入原 open 地址
pub static ORIG_OPEN: HookSlot = HookSlot::new();

static RULE: OnceCell<RedirectRule> = OnceCell::new();

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RedirectRule {
    pub source: CString,
    pub replacement: CString,
}

impl Default for RedirectRule {
    fn default() -> Self {
        Self {
            source: DEFAULT_HOSTS_SOURCE.to_owned(),
            replacement: DEFAULT_HOSTS_REPLACEMENT.to_owned(),
        }
    }
}

impl RedirectRule {
    // 只有请求路径与 source 完全相同且 replacement 存在时才改写
    pub fn resolve<'a>(&'a self, path: &'a CStr, exists: impl Fn(&CStr) -> bool) -> &'a CStr {
        if path == self.source.as_c_str() && exists(&self.replacement) {
            &self.replacement
        } else {
            path
        }
    }
}

// 进程内只设置一次，重复设置保留第一次的规则
pub fn install_rule(rule: RedirectRule) -> bool {
    RULE.set(rule).is_ok()
}

pub fn active_rule() -> Option<&'static RedirectRule> {
    RULE.get()
}

pub fn replacement_ptr() -> *mut libc::c_void {
    open_hook as OpenHookFn as *mut libc::c_void
}

type OpenHookFn = unsafe extern "C" fn(*const c_char, c_int, libc::c_uint) -> c_int;

fn path_exists(path: &CStr) -> bool {
    unsafe { libc::access(path.as_ptr(), libc::F_OK) == 0 }
}

pub unsafe extern "C" fn open_hook(path: *const c_char, flags: c_int, mode: libc::c_uint) -> c_int {
    if path.is_null() {
        return call_original(path, flags, mode);
    }
    let requested = unsafe { CStr::from_ptr(path) };
    let target = match RULE.get() {
        Some(rule) => rule.resolve(requested, path_exists),
        None => requested,
    };

    if log::debug_enabled() {
        log::debug(format_args!(
            "calling open({}, {flags}, ...)",
            requested.to_string_lossy()
        ));
    }
    let ret = call_original(target.as_ptr(), flags, mode);
    if target.as_ptr() != path {
        log::info(format_args!(
            "open({}, {flags}, ...) -> {} = {ret}",
            requested.to_string_lossy(),
            target.to_string_lossy()
        ));
    }
    ret
}

// 原函数尚未回填时退回 libc::open，避免空指针调用
fn call_original(path: *const c_char, flags: c_int, mode: libc::c_uint) -> c_int {
    let original = ORIG_OPEN.get();
    if original.is_null() {
        return unsafe { libc::open(path, flags, mode) };
    }
    let original: OpenFn = unsafe { std::mem::transmute::<*mut libc::c_void, OpenFn>(original) };
    unsafe { original(path, flags, mode) }
}
