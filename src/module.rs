// 每次特化创建一个模块实例，持有宿主句柄与全部 hook 备份
use crate::companion;
use crate::config::{ModuleConfig, SYSTEM_SERVER_NAME, SYSTEM_SERVER_UID};
use crate::errno::Errno;
use crate::hook::{self, HookManager};
use crate::host::{Host, ModuleOption};
use crate::log;
use crate::policy;
use crate::redirect::{self, RedirectRule};
use crate::version;

// 运行时桥接读出的进程身份，只保存拷贝，不持有任何 JNI 对象
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppIdentity {
    pub nice_name: String,
    pub uid: i32,
}

// 宿主框架回调的四个特化时机
pub trait ModuleLifecycle {
    fn pre_app_specialize(&mut self, identity: &AppIdentity);
    fn post_app_specialize(&mut self);
    fn pre_server_specialize(&mut self);
    fn post_server_specialize(&mut self);
}

// pre_app_specialize 的决策结果，便于日志与测试观察
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpecializeOutcome {
    Pending,
    NotTarget,
    LibraryNotFound,
    Hooked,
    CommitFailed,
}

pub struct HostsModule<H: Host> {
    host: H,
    config: ModuleConfig,
    hooks: HookManager,
    outcome: SpecializeOutcome,
    unload_requested: bool,
}

impl<H: Host> HostsModule<H> {
    pub fn new(host: H, config: ModuleConfig) -> Self {
        Self {
            host,
            config,
            hooks: HookManager::new(),
            outcome: SpecializeOutcome::Pending,
            unload_requested: false,
        }
    }

    pub fn on_load(&mut self) {
        log::set_debug_enabled(self.config.debug);
        log::info(format_args!("{}", version::version_str_full()));
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    pub fn outcome(&self) -> SpecializeOutcome {
        self.outcome
    }

    pub fn unload_requested(&self) -> bool {
        self.unload_requested
    }

    pub fn restore(&mut self) -> bool {
        self.hooks.unhook_all(&self.host)
    }

    fn log_specialize(&self, process: &str, uid: i32) {
        log::debug(format_args!("process=[{process}], uid=[{uid}]"));
    }

    fn install_open_hook(&mut self) -> SpecializeOutcome {
        let Some(library) = hook::locate_library_at(&self.config.maps_path, &self.config.libc_suffix)
        else {
            log::debug(format_args!(
                "{} not mapped, skip hook: {}",
                self.config.libc_suffix,
                Errno::NotFound
            ));
            return SpecializeOutcome::LibraryNotFound;
        };

        redirect::install_rule(RedirectRule {
            source: self.config.hosts_source.clone(),
            replacement: self.config.hosts_replacement.clone(),
        });
        let symbol = self.config.hook_symbol.clone();
        self.hooks.register_hook(
            &self.host,
            library,
            &symbol,
            redirect::replacement_ptr(),
            &redirect::ORIG_OPEN,
        );

        if self.hooks.commit(&self.host) {
            log::debug(format_args!("hook success!"));
            return SpecializeOutcome::Hooked;
        }

        log::warn(format_args!("hook commit: {}", Errno::CommitFailed));
        // 提交失败后整体还原，不保留部分生效的 hook
        if !self.hooks.unhook_all(&self.host) {
            log::error(format_args!("rollback after failed commit also failed"));
        }
        SpecializeOutcome::CommitFailed
    }

    fn request_unload(&mut self) {
        self.host.set_option(ModuleOption::DlcloseModuleLibrary);
        self.unload_requested = true;
        log::debug(format_args!("unload requested"));
    }
}

impl<H: Host> ModuleLifecycle for HostsModule<H> {
    fn pre_app_specialize(&mut self, identity: &AppIdentity) {
        self.log_specialize(&identity.nice_name, identity.uid);

        let target_uid = companion::query_chrome_uid(&self.host);
        let is_target =
            policy::is_target_process(&self.config, &identity.nice_name, identity.uid, target_uid);
        if !is_target {
            self.outcome = SpecializeOutcome::NotTarget;
            return;
        }

        self.outcome = self.install_open_hook();
    }

    fn post_app_specialize(&mut self) {
        if self.hooks.is_pristine() {
            self.request_unload();
        }
    }

    fn pre_server_specialize(&mut self) {
        self.log_specialize(SYSTEM_SERVER_NAME, SYSTEM_SERVER_UID);
    }

    fn post_server_specialize(&mut self) {
        if self.hooks.is_pristine() {
            self.request_unload();
        }
    }
}

#[cfg(test)]
mod tests;
