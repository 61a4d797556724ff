#![allow(clippy::missing_safety_doc)]

// 公共配置与默认值
pub mod config;
// 错误码定义
pub mod errno;
// 日志输出，Android 上走 logcat
mod log;
// 版本信息
pub mod version;
// /proc/self/maps 解析
pub mod maps;
// companion 通道的定长帧编解码
pub mod ipc;
// 宿主框架提供的能力抽象
pub mod host;
// PLT hook 注册、提交与还原
pub mod hook;
// companion 请求与服务端
pub mod companion;
// 目标进程判定
pub mod policy;
// open 替换函数与 hosts 重定向
pub mod redirect;
// 特化生命周期
pub mod module;
// Zygisk ABI 绑定与导出入口
#[cfg(target_os = "android")]
pub mod zygisk;

pub use companion::{Companion, CompanionRequest, FsOwnerLookup, OwnerLookup};
pub use config::{CompanionConfig, ModuleConfig};
pub use errno::Errno as HostsErrno;
pub use hook::{HookManager, HookRecord, HookSlot, LibraryId};
pub use host::{Host, ModuleOption};
pub use log::{debug_enabled, set_debug_enabled as set_debug};
pub use maps::MemoryMapping;
pub use module::{AppIdentity, HostsModule, ModuleLifecycle, SpecializeOutcome};
