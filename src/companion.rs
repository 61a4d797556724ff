// companion 协议：每个连接只处理一次请求与一次响应
//
// 模块侧在沙箱内无法看到其他包的数据目录，通过宿主转接到特权 companion 查询。
// companion 收到未知请求或读不到请求时直接关闭连接，不写任何数据。
use crate::config::CompanionConfig;
use crate::errno::Errno;
use crate::host::Host;
use crate::ipc::FramedStreamExt;
use crate::log;
use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;

#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompanionRequest {
    GetChromeUid = 0,
}

impl TryFrom<i32> for CompanionRequest {
    type Error = Errno;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::GetChromeUid),
            _ => Err(Errno::UnknownRequest),
        }
    }
}

// 打开到 companion 的连接并发送请求码，连接交给调用方读取响应
pub fn request<H: Host>(host: &H, request: CompanionRequest) -> Option<UnixStream> {
    let Some(fd) = host.connect_companion() else {
        log::debug(format_args!("connect companion failed for {request:?}"));
        return None;
    };
    let mut stream = UnixStream::from(fd);
    if let Err(err) = stream.write_i32(request as i32) {
        log::debug(format_args!("send {request:?} failed: {err}"));
        return None;
    }
    Some(stream)
}

// 返回目标包的 uid；连接失败、连接被关闭或 companion 报告 0 时均视为无法确定
pub fn query_chrome_uid<H: Host>(host: &H) -> Option<u32> {
    let mut stream = request(host, CompanionRequest::GetChromeUid)?;
    let uid = stream.read_i32();
    drop(stream);
    if uid <= 0 {
        log::debug(format_args!("companion reported no uid ({uid})"));
        return None;
    }
    Some(uid as u32)
}

// 查询路径属主的抽象，便于在无特权环境下测试
pub trait OwnerLookup {
    fn owner_uid(&self, path: &Path) -> Option<u32>;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct FsOwnerLookup;

impl OwnerLookup for FsOwnerLookup {
    fn owner_uid(&self, path: &Path) -> Option<u32> {
        match fs::metadata(path) {
            Ok(metadata) => Some(metadata.uid()),
            Err(err) => {
                log::debug(format_args!("stat {} failed: {err}", path.display()));
                None
            }
        }
    }
}

pub struct Companion<L: OwnerLookup = FsOwnerLookup> {
    config: CompanionConfig,
    lookup: L,
}

impl Companion<FsOwnerLookup> {
    pub fn new(config: CompanionConfig) -> Self {
        Self::with_lookup(config, FsOwnerLookup)
    }
}

impl Default for Companion<FsOwnerLookup> {
    fn default() -> Self {
        Self::new(CompanionConfig::default())
    }
}

impl<L: OwnerLookup> Companion<L> {
    pub fn with_lookup(config: CompanionConfig, lookup: L) -> Self {
        Self { config, lookup }
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    // 读取一个请求码并写回一个响应；未知请求不写任何数据
    pub fn handle<S: Read + Write>(&self, stream: &mut S) -> Result<CompanionRequest, Errno> {
        let code = stream.read_i32();
        let request = match CompanionRequest::try_from(code) {
            Ok(request) => request,
            Err(err) => {
                log::debug(format_args!("drop companion request code={code}"));
                return Err(err);
            }
        };

        match request {
            CompanionRequest::GetChromeUid => {
                let target = self.config.target_dir();
                let uid = self.lookup.owner_uid(&target).unwrap_or(0);
                log::debug(format_args!("{} UID=[{uid}]", self.config.target_package));
                stream.write_i32(uid as i32)?;
            }
        }
        Ok(request)
    }
}

impl<L: OwnerLookup + Send + Sync + 'static> Companion<L> {
    // 每个连接独立线程处理，线程之间只共享只读配置
    pub fn serve(self: Arc<Self>, listener: UnixListener) {
        for stream in listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn(format_args!("companion accept failed: {err}"));
                    continue;
                }
            };
            let companion = Arc::clone(&self);
            thread::spawn(move || {
                let _ = companion.handle(&mut stream);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Companion, CompanionRequest, OwnerLookup, query_chrome_uid};
    use crate::config::CompanionConfig;
    use crate::errno::Errno;
    use crate::host::{Host, ModuleOption};
    use crate::ipc::{EOF_SENTINEL, FramedStreamExt};
    use std::ffi::{CStr, c_void};
    use std::fs;
    use std::io::Read;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::thread;

    struct FixedLookup(Option<u32>);

    impl OwnerLookup for FixedLookup {
        fn owner_uid(&self, _path: &Path) -> Option<u32> {
            self.0
        }
    }

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "zygisk_hosts_companion_{}_{}",
            std::process::id(),
            name
        ))
    }

    fn exchange<L: OwnerLookup>(companion: &Companion<L>, code: i32) -> (Vec<u8>, Result<CompanionRequest, Errno>) {
        let (mut client, mut server) = UnixStream::pair().expect("socket pair");
        client.write_i32(code).expect("send request");
        let result = companion.handle(&mut server);
        drop(server);
        let mut response = Vec::new();
        client.read_to_end(&mut response).expect("read response");
        (response, result)
    }

    #[test]
    fn get_chrome_uid_reports_owner() {
        let companion = Companion::with_lookup(CompanionConfig::default(), FixedLookup(Some(10042)));
        let (response, result) = exchange(&companion, CompanionRequest::GetChromeUid as i32);
        assert_eq!(result, Ok(CompanionRequest::GetChromeUid));
        assert_eq!(response, 10042i32.to_ne_bytes());
    }

    #[test]
    fn missing_directory_reports_zero() {
        let config = CompanionConfig {
            data_root: temp_root("absent"),
            target_package: "com.android.chrome".to_string(),
        };
        let companion = Companion::new(config);
        let (response, _) = exchange(&companion, CompanionRequest::GetChromeUid as i32);
        assert_eq!(response, 0i32.to_ne_bytes());
    }

    #[test]
    fn existing_directory_reports_filesystem_owner() {
        let root = temp_root("present");
        fs::create_dir_all(root.join("com.android.chrome")).expect("create data dir");
        let companion = Companion::new(CompanionConfig {
            data_root: root.clone(),
            target_package: "com.android.chrome".to_string(),
        });
        let (response, _) = exchange(&companion, CompanionRequest::GetChromeUid as i32);
        let _ = fs::remove_dir_all(&root);
        let euid = unsafe { libc::geteuid() } as i32;
        assert_eq!(response, euid.to_ne_bytes());
    }

    #[test]
    fn unknown_request_closes_without_writing() {
        let companion = Companion::with_lookup(CompanionConfig::default(), FixedLookup(Some(10042)));
        let (response, result) = exchange(&companion, 7);
        assert!(response.is_empty());
        assert_eq!(result, Err(Errno::UnknownRequest));
    }

    #[test]
    fn closed_connection_without_request_writes_nothing() {
        let companion = Companion::with_lookup(CompanionConfig::default(), FixedLookup(Some(10042)));
        let (client, mut server) = UnixStream::pair().expect("socket pair");
        drop(client);
        assert_eq!(companion.handle(&mut server), Err(Errno::UnknownRequest));
    }

    // 宿主侧只负责把连接交给模块
    struct PairHost {
        companion_end: Mutex<Option<UnixStream>>,
    }

    impl Host for PairHost {
        unsafe fn plt_hook_register(
            &self,
            _dev: libc::dev_t,
            _inode: libc::ino_t,
            _symbol: &CStr,
            _new_func: *mut c_void,
            _old_func: *mut *mut c_void,
        ) {
        }

        fn plt_hook_commit(&self) -> bool {
            false
        }

        fn connect_companion(&self) -> Option<OwnedFd> {
            self.companion_end.lock().ok()?.take().map(OwnedFd::from)
        }

        fn set_option(&self, _option: ModuleOption) {}
    }

    fn host_with_companion(uid: Option<u32>) -> (PairHost, thread::JoinHandle<()>) {
        let (module_end, companion_end) = UnixStream::pair().expect("socket pair");
        let handle = thread::spawn(move || {
            let mut companion_end = companion_end;
            let companion = Companion::with_lookup(CompanionConfig::default(), FixedLookup(uid));
            let _ = companion.handle(&mut companion_end);
        });
        let host = PairHost {
            companion_end: Mutex::new(Some(module_end)),
        };
        (host, handle)
    }

    #[test]
    fn module_side_query_reads_uid() {
        let (host, handle) = host_with_companion(Some(10042));
        assert_eq!(query_chrome_uid(&host), Some(10042));
        handle.join().expect("companion thread");
    }

    #[test]
    fn module_side_query_treats_zero_as_unknown() {
        let (host, handle) = host_with_companion(None);
        assert_eq!(query_chrome_uid(&host), None);
        handle.join().expect("companion thread");
    }

    #[test]
    fn module_side_query_without_connection() {
        let host = PairHost {
            companion_end: Mutex::new(None),
        };
        assert_eq!(query_chrome_uid(&host), None);
    }

    #[test]
    fn serve_answers_each_connection_once() {
        let path = temp_root("listener.sock");
        let _ = fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind listener");
        let companion = Arc::new(Companion::with_lookup(
            CompanionConfig::default(),
            FixedLookup(Some(10042)),
        ));
        thread::spawn(move || companion.serve(listener));

        for _ in 0..3 {
            let mut client = UnixStream::connect(&path).expect("connect");
            client.write_i32(CompanionRequest::GetChromeUid as i32).expect("send");
            assert_eq!(client.read_i32(), 10042);
            assert_eq!(client.read_i32(), EOF_SENTINEL);
        }
        let _ = fs::remove_file(&path);
    }
}
