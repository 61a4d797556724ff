// Zygisk v4 模块 ABI 的 C 布局，字段顺序必须与 zygisk.hpp 一致
use jni::sys::{JNIEnv, JNINativeMethod, jboolean, jint, jintArray, jlong, jobjectArray, jstring};
use std::ffi::{c_char, c_int, c_long, c_void};

pub(crate) const ZYGISK_API_VERSION: c_long = 4;

#[repr(C)]
pub(crate) struct ApiTable {
    pub(crate) impl_: *mut c_void,
    pub(crate) register_module:
        Option<unsafe extern "C" fn(table: *const ApiTable, abi: *mut ModuleAbi) -> bool>,
    pub(crate) hook_jni_native_methods: Option<
        unsafe extern "C" fn(
            env: *mut JNIEnv,
            class_name: *const c_char,
            methods: *mut JNINativeMethod,
            num_methods: c_int,
        ),
    >,
    pub(crate) plt_hook_register: Option<
        unsafe extern "C" fn(
            dev: libc::dev_t,
            inode: libc::ino_t,
            symbol: *const c_char,
            new_func: *mut c_void,
            old_func: *mut *mut c_void,
        ),
    >,
    pub(crate) exempt_fd: Option<unsafe extern "C" fn(fd: c_int) -> bool>,
    pub(crate) plt_hook_commit: Option<unsafe extern "C" fn() -> bool>,
    pub(crate) connect_companion: Option<unsafe extern "C" fn(impl_: *mut c_void) -> c_int>,
    pub(crate) set_option: Option<unsafe extern "C" fn(impl_: *mut c_void, option: c_int)>,
    pub(crate) get_module_dir: Option<unsafe extern "C" fn(impl_: *mut c_void) -> c_int>,
    pub(crate) get_flags: Option<unsafe extern "C" fn(impl_: *mut c_void) -> u32>,
}

// 模块向宿主注册的回调表，impl_ 原样回传给各回调
#[repr(C)]
pub(crate) struct ModuleAbi {
    pub(crate) api_version: c_long,
    pub(crate) impl_: *mut c_void,
    pub(crate) pre_app_specialize: unsafe extern "C" fn(*mut c_void, *mut AppSpecializeArgs),
    pub(crate) post_app_specialize: unsafe extern "C" fn(*mut c_void, *const AppSpecializeArgs),
    pub(crate) pre_server_specialize: unsafe extern "C" fn(*mut c_void, *mut ServerSpecializeArgs),
    pub(crate) post_server_specialize:
        unsafe extern "C" fn(*mut c_void, *const ServerSpecializeArgs),
}

// C++ 侧为引用成员，ABI 上即指针；可选参数可能为空
#[repr(C)]
pub(crate) struct AppSpecializeArgs {
    pub(crate) uid: *mut jint,
    pub(crate) gid: *mut jint,
    pub(crate) gids: *mut jintArray,
    pub(crate) runtime_flags: *mut jint,
    pub(crate) rlimits: *mut jobjectArray,
    pub(crate) mount_external: *mut jint,
    pub(crate) se_info: *mut jstring,
    pub(crate) nice_name: *mut jstring,
    pub(crate) instruction_set: *mut jstring,
    pub(crate) app_data_dir: *mut jstring,

    pub(crate) fds_to_ignore: *mut jintArray,
    pub(crate) is_child_zygote: *mut jboolean,
    pub(crate) is_top_app: *mut jboolean,
    pub(crate) pkg_data_info_list: *mut jobjectArray,
    pub(crate) whitelisted_data_info_list: *mut jobjectArray,
    pub(crate) mount_data_dirs: *mut jboolean,
    pub(crate) mount_storage_dirs: *mut jboolean,
}

#[repr(C)]
pub(crate) struct ServerSpecializeArgs {
    pub(crate) uid: *mut jint,
    pub(crate) gid: *mut jint,
    pub(crate) gids: *mut jintArray,
    pub(crate) runtime_flags: *mut jint,
    pub(crate) permitted_capabilities: *mut jlong,
    pub(crate) effective_capabilities: *mut jlong,
}
