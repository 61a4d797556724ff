// 导出给 Zygisk 的 C 入口与特化回调跳板
use super::ZygiskApi;
use super::abi::{
    ApiTable, AppSpecializeArgs, ModuleAbi, ServerSpecializeArgs, ZYGISK_API_VERSION,
};
use crate::companion::Companion;
use crate::config::ModuleConfig;
use crate::errno::Errno;
use crate::log;
use crate::module::{AppIdentity, HostsModule, ModuleLifecycle};
use jni::objects::JString;
use jni::sys::{JNIEnv, jstring};
use once_cell::sync::Lazy;
use std::ffi::{c_int, c_void};
use std::mem::ManuallyDrop;
use std::os::fd::FromRawFd;
use std::os::unix::net::UnixStream;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Mutex, MutexGuard};

// 当前进程唯一的模块实例；env 为宿主在特化线程上提供的 JNIEnv
struct Instance {
    module: HostsModule<ZygiskApi>,
    env: *mut JNIEnv,
}

// 回调均在 zygote 派生出的同一线程上串行执行
unsafe impl Send for Instance {}

static INSTANCE: Lazy<Mutex<Option<Instance>>> = Lazy::new(|| Mutex::new(None));
static COMPANION: Lazy<Companion> = Lazy::new(Companion::default);

// 持锁回调 panic 后继续使用内部数据，避免后续回调连锁 panic
trait MutexPoisonRecover<T> {
    fn lock_or_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexPoisonRecover<T> for Mutex<T> {
    fn lock_or_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// 任何失败或 panic 都只记录日志，绝不把异常带回宿主进程
fn guarded(what: &str, body: impl FnOnce() -> Result<(), Errno>) {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn(format_args!("{what}: {err}")),
        Err(_) => log::error(format_args!("{what}: {}", Errno::Panic)),
    }
}

fn with_module(body: impl FnOnce(&mut Instance) -> Result<(), Errno>) -> Result<(), Errno> {
    let mut guard = INSTANCE.lock_or_poison();
    let instance = guard.as_mut().ok_or(Errno::NoHostApi)?;
    body(instance)?;
    // 已请求卸载时实例随之丢弃，卸载后不再有回调进入
    if instance.module.unload_requested() {
        guard.take();
    }
    Ok(())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn zygisk_module_entry(table: *const c_void, env: *mut JNIEnv) {
    guarded("zygisk_module_entry", || unsafe {
        register(table as *const ApiTable, env)
    });
}

unsafe fn register(table: *const ApiTable, env: *mut JNIEnv) -> Result<(), Errno> {
    let api = unsafe { ZygiskApi::from_raw(table) }.ok_or(Errno::NoHostApi)?;
    let register_module = unsafe { (*table).register_module }.ok_or(Errno::NoHostApi)?;

    // 宿主在模块整个生命周期内引用此表
    let abi: &'static mut ModuleAbi = Box::leak(Box::new(ModuleAbi {
        api_version: ZYGISK_API_VERSION,
        impl_: ptr::null_mut(),
        pre_app_specialize,
        post_app_specialize,
        pre_server_specialize,
        post_server_specialize,
    }));
    if !unsafe { register_module(table, abi) } {
        return Err(Errno::NoHostApi);
    }

    let mut module = HostsModule::new(api, ModuleConfig::default());
    module.on_load();
    *INSTANCE.lock_or_poison() = Some(Instance { module, env });
    Ok(())
}

unsafe fn read_jstring(env: *mut JNIEnv, value: jstring) -> Option<String> {
    if env.is_null() || value.is_null() {
        return None;
    }
    let mut env = unsafe { jni::JNIEnv::from_raw(env) }.ok()?;
    let value = unsafe { JString::from_raw(value) };
    let text: String = env.get_string(&value).ok()?.into();
    Some(text)
}

// 在回调内同步读出 nice_name 与 uid 的拷贝
unsafe fn read_identity(
    env: *mut JNIEnv,
    args: *const AppSpecializeArgs,
) -> Result<AppIdentity, Errno> {
    let args = unsafe { args.as_ref() }.ok_or(Errno::InvalidArg)?;
    let uid = unsafe { args.uid.as_ref() }.copied().ok_or(Errno::InvalidArg)?;
    let nice_name = unsafe { args.nice_name.as_ref() }
        .and_then(|name| unsafe { read_jstring(env, *name) })
        .unwrap_or_default();
    Ok(AppIdentity { nice_name, uid })
}

unsafe extern "C" fn pre_app_specialize(_impl: *mut c_void, args: *mut AppSpecializeArgs) {
    guarded("preAppSpecialize", || {
        with_module(|instance| {
            let identity = unsafe { read_identity(instance.env, args) }?;
            instance.module.pre_app_specialize(&identity);
            Ok(())
        })
    });
}

unsafe extern "C" fn post_app_specialize(_impl: *mut c_void, _args: *const AppSpecializeArgs) {
    guarded("postAppSpecialize", || {
        with_module(|instance| {
            instance.module.post_app_specialize();
            Ok(())
        })
    });
}

unsafe extern "C" fn pre_server_specialize(_impl: *mut c_void, _args: *mut ServerSpecializeArgs) {
    guarded("preServerSpecialize", || {
        with_module(|instance| {
            instance.module.pre_server_specialize();
            Ok(())
        })
    });
}

unsafe extern "C" fn post_server_specialize(
    _impl: *mut c_void,
    _args: *const ServerSpecializeArgs,
) {
    guarded("postServerSpecialize", || {
        with_module(|instance| {
            instance.module.post_server_specialize();
            Ok(())
        })
    });
}

// companion 进程中每个连接调用一次；fd 归宿主所有，返回后由宿主关闭
#[unsafe(no_mangle)]
pub extern "C" fn zygisk_companion_entry(fd: c_int) {
    guarded("zygisk_companion_entry", || {
        if fd < 0 {
            return Err(Errno::InvalidArg);
        }
        let mut stream = ManuallyDrop::new(unsafe { UnixStream::from_raw_fd(fd) });
        COMPANION.handle(&mut *stream).map(|_| ())
    });
}
