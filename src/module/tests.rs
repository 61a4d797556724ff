use super::{AppIdentity, HostsModule, ModuleLifecycle, SpecializeOutcome};
use crate::companion::{Companion, OwnerLookup};
use crate::config::{CompanionConfig, ModuleConfig};
use crate::host::{Host, ModuleOption};
use crate::redirect::ORIG_OPEN;
use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString, c_void};
use std::fs;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

// ORIG_OPEN 为进程级静态槽位，涉及 hook 的用例串行执行
static SERIAL: Mutex<()> = Mutex::new(());

const LISTING: &str = "\
7000000000-7000001000 r--p 00000000 fd:00 111 /system/lib64/libfoo.so
7000100000-7000101000 r--p 00000000 103:06 12345 /system/lib64/libc.so
7000101000-7000140000 r-xp 00001000 103:06 12345 /system/lib64/libc.so
";

struct FixedLookup(Option<u32>);

impl OwnerLookup for FixedLookup {
    fn owner_uid(&self, _path: &Path) -> Option<u32> {
        self.0
    }
}

#[derive(Debug)]
struct Registration {
    dev: libc::dev_t,
    inode: libc::ino_t,
    symbol: CString,
    old_func: usize,
}

// 模拟宿主：companion 通过 socket pair 在独立线程应答，commit 回填真实的 libc open
struct FakeHost {
    companion_uid: Option<Option<u32>>,
    companion_threads: RefCell<Vec<thread::JoinHandle<()>>>,
    registrations: RefCell<Vec<Registration>>,
    options: RefCell<Vec<ModuleOption>>,
    fail_commit: Cell<bool>,
}

impl FakeHost {
    fn new(companion_uid: Option<Option<u32>>) -> Self {
        Self {
            companion_uid,
            companion_threads: RefCell::new(Vec::new()),
            registrations: RefCell::new(Vec::new()),
            options: RefCell::new(Vec::new()),
            fail_commit: Cell::new(false),
        }
    }
}

impl Drop for FakeHost {
    fn drop(&mut self) {
        for handle in self.companion_threads.borrow_mut().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Host for FakeHost {
    unsafe fn plt_hook_register(
        &self,
        dev: libc::dev_t,
        inode: libc::ino_t,
        symbol: &CStr,
        _new_func: *mut c_void,
        old_func: *mut *mut c_void,
    ) {
        self.registrations.borrow_mut().push(Registration {
            dev,
            inode,
            symbol: symbol.to_owned(),
            old_func: old_func as usize,
        });
    }

    fn plt_hook_commit(&self) -> bool {
        if self.fail_commit.get() {
            return false;
        }
        for registration in self.registrations.borrow().iter() {
            let slot = registration.old_func as *mut *mut c_void;
            if !slot.is_null() {
                unsafe { *slot = libc::open as *const () as *mut c_void };
            }
        }
        true
    }

    fn connect_companion(&self) -> Option<OwnedFd> {
        let uid = self.companion_uid?;
        let (module_end, mut companion_end) = UnixStream::pair().ok()?;
        let handle = thread::spawn(move || {
            let companion = Companion::with_lookup(CompanionConfig::default(), FixedLookup(uid));
            let _ = companion.handle(&mut companion_end);
        });
        self.companion_threads.borrow_mut().push(handle);
        Some(OwnedFd::from(module_end))
    }

    fn set_option(&self, option: ModuleOption) {
        self.options.borrow_mut().push(option);
    }
}

fn listing_path(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "zygisk_hosts_module_{}_{}",
        std::process::id(),
        name
    ));
    let _ = fs::write(&path, content);
    path
}

fn module(name: &str, host: FakeHost) -> (HostsModule<FakeHost>, PathBuf) {
    let path = listing_path(name, LISTING);
    let config = ModuleConfig {
        maps_path: path.clone(),
        ..ModuleConfig::default()
    };
    let mut module = HostsModule::new(host, config);
    module.on_load();
    (module, path)
}

fn identity(nice_name: &str, uid: i32) -> AppIdentity {
    AppIdentity {
        nice_name: nice_name.to_string(),
        uid,
    }
}

#[test]
fn chrome_uid_installs_one_open_hook_in_libc() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (mut module, path) = module("chrome", FakeHost::new(Some(Some(10042))));

    module.pre_app_specialize(&identity("com.android.chrome", 1_010_042));
    assert_eq!(module.outcome(), SpecializeOutcome::Hooked);
    {
        let registrations = module.host().registrations.borrow();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].symbol.as_c_str(), c"open");
        assert_eq!(registrations[0].dev, libc::makedev(0x103, 0x06));
        assert_eq!(registrations[0].inode, 12345);
    }
    assert_eq!(module.hooks().records().len(), 1);
    assert!(ORIG_OPEN.is_set());

    module.post_app_specialize();
    assert!(!module.unload_requested());
    assert!(module.host().options.borrow().is_empty());

    assert!(module.restore());
    assert!(module.hooks().is_pristine());
    assert!(!ORIG_OPEN.is_set());
    let _ = fs::remove_file(&path);
}

#[test]
fn other_uid_registers_nothing_and_unloads() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (mut module, path) = module("other", FakeHost::new(Some(Some(10042))));

    module.pre_app_specialize(&identity("org.example.app", 10077));
    assert_eq!(module.outcome(), SpecializeOutcome::NotTarget);
    assert!(module.host().registrations.borrow().is_empty());

    module.post_app_specialize();
    assert!(module.unload_requested());
    assert_eq!(
        module.host().options.borrow().as_slice(),
        &[ModuleOption::DlcloseModuleLibrary]
    );
    let _ = fs::remove_file(&path);
}

#[test]
fn companion_unknown_uid_skips_regular_process() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (mut module, path) = module("unknown", FakeHost::new(Some(None)));

    module.pre_app_specialize(&identity("com.android.chrome", 10042));
    assert_eq!(module.outcome(), SpecializeOutcome::NotTarget);
    module.post_app_specialize();
    assert!(module.unload_requested());
    let _ = fs::remove_file(&path);
}

#[test]
fn missing_companion_still_hooks_isolated_chrome_process() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let (mut module, path) = module("isolated", FakeHost::new(None));

    module.pre_app_specialize(&identity("com.android.chrome:sandboxed_process0", 99_001));
    assert_eq!(module.outcome(), SpecializeOutcome::Hooked);
    module.post_app_specialize();
    assert!(!module.unload_requested());
    assert!(module.restore());
    let _ = fs::remove_file(&path);
}

#[test]
fn libc_not_mapped_leaves_module_unloadable() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let host = FakeHost::new(Some(Some(10042)));
    let path = listing_path("no_libc", "7000-8000 r--p 00000000 fd:00 111 /system/lib64/libm.so\n");
    let config = ModuleConfig {
        maps_path: path.clone(),
        ..ModuleConfig::default()
    };
    let mut module = HostsModule::new(host, config);

    module.pre_app_specialize(&identity("com.android.chrome", 10042));
    assert_eq!(module.outcome(), SpecializeOutcome::LibraryNotFound);
    assert!(module.host().registrations.borrow().is_empty());
    module.post_app_specialize();
    assert!(module.unload_requested());
    let _ = fs::remove_file(&path);
}

#[test]
fn failed_commit_rolls_back_and_unloads() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let host = FakeHost::new(Some(Some(10042)));
    host.fail_commit.set(true);
    let (mut module, path) = module("commit_fail", host);

    module.pre_app_specialize(&identity("com.android.chrome", 10042));
    assert_eq!(module.outcome(), SpecializeOutcome::CommitFailed);
    assert!(module.hooks().is_pristine());
    assert!(!ORIG_OPEN.is_set());
    module.post_app_specialize();
    assert!(module.unload_requested());
    let _ = fs::remove_file(&path);
}

#[test]
fn system_server_always_unloads() {
    let (mut module, path) = module("server", FakeHost::new(Some(Some(10042))));
    module.pre_server_specialize();
    module.post_server_specialize();
    assert!(module.unload_requested());
    assert!(module.host().registrations.borrow().is_empty());
    let _ = fs::remove_file(&path);
}
