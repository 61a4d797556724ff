use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString, c_void};
use std::fs::{self, File};
use std::io::Read;
use std::os::fd::{FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use zygisk_hosts::redirect;
use zygisk_hosts::{Companion, Host, ModuleOption, OwnerLookup};

pub const TARGET_PACKAGE: &str = "org.zygisk_hosts.module_test";

// bionic 为 libc.so，glibc 宿主机上为 libc.so.6
#[cfg(target_os = "android")]
pub const LIBC_SUFFIX: &str = zygisk_hosts::config::DEFAULT_LIBC_SUFFIX;
#[cfg(not(target_os = "android"))]
pub const LIBC_SUFFIX: &str = "/libc.so.6";

pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

pub fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

// 每次运行独立的工作目录，可用 MODULE_TEST_WORK_DIR 指定
pub fn work_dir() -> PathBuf {
    let dir = match std::env::var_os("MODULE_TEST_WORK_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::temp_dir().join(format!("module_test_{}", std::process::id())),
    };
    fs::create_dir_all(&dir).expect("create work dir failed");
    dir
}

pub fn cstring(path: &Path) -> CString {
    CString::new(path.as_os_str().as_bytes()).expect("path contains nul")
}

// 固定属主，绕开 companion 需要的特权
pub struct FixedOwner(pub u32);

impl OwnerLookup for FixedOwner {
    fn owner_uid(&self, _path: &Path) -> Option<u32> {
        Some(self.0)
    }
}

// 在工作目录下起一个 companion 服务，返回其 socket 路径
pub fn spawn_companion<L>(name: &str, companion: Companion<L>) -> PathBuf
where
    L: OwnerLookup + Send + Sync + 'static,
{
    let socket = work_dir().join(format!("{name}.sock"));
    let _ = fs::remove_file(&socket);
    let listener = UnixListener::bind(&socket).expect("bind companion socket failed");
    let companion = Arc::new(companion);
    thread::spawn(move || companion.serve(listener));
    socket
}

#[derive(Debug)]
pub struct Registration {
    pub dev: libc::dev_t,
    pub inode: libc::ino_t,
    pub symbol: CString,
    pub new_func: usize,
    pub old_func: usize,
}

// 记录全部调用的宿主；commit 时把真实 libc open 写入备份槽位，模拟宿主回填原函数
pub struct RecordingHost {
    companion_socket: Option<PathBuf>,
    pub registrations: RefCell<Vec<Registration>>,
    pub options: RefCell<Vec<ModuleOption>>,
    pub commits: Cell<usize>,
}

impl RecordingHost {
    pub fn new(companion_socket: Option<PathBuf>) -> Self {
        Self {
            companion_socket,
            registrations: RefCell::new(Vec::new()),
            options: RefCell::new(Vec::new()),
            commits: Cell::new(0),
        }
    }
}

impl Host for RecordingHost {
    unsafe fn plt_hook_register(
        &self,
        dev: libc::dev_t,
        inode: libc::ino_t,
        symbol: &CStr,
        new_func: *mut c_void,
        old_func: *mut *mut c_void,
    ) {
        self.registrations.borrow_mut().push(Registration {
            dev,
            inode,
            symbol: symbol.to_owned(),
            new_func: new_func as usize,
            old_func: old_func as usize,
        });
    }

    fn plt_hook_commit(&self) -> bool {
        self.commits.set(self.commits.get() + 1);
        for registration in self.registrations.borrow().iter() {
            let slot = registration.old_func as *mut *mut c_void;
            if !slot.is_null() {
                unsafe { *slot = libc::open as *const () as *mut c_void };
            }
        }
        true
    }

    fn connect_companion(&self) -> Option<OwnedFd> {
        let socket = self.companion_socket.as_ref()?;
        UnixStream::connect(socket).ok().map(OwnedFd::from)
    }

    fn set_option(&self, option: ModuleOption) {
        self.options.borrow_mut().push(option);
    }
}

// 经由替换函数打开并读出整个文件
pub fn read_via_open_hook(path: &Path) -> String {
    let path = cstring(path);
    let fd = unsafe {
        redirect::open_hook(path.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC, 0)
    };
    assert!(fd >= 0, "open_hook {:?} failed", path);
    let mut file = unsafe { File::from_raw_fd(fd) };
    let mut text = String::new();
    file.read_to_string(&mut text).expect("read through hook failed");
    text
}
