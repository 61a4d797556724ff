// 模块与 companion 的运行参数，全部为编译期默认值，无配置文件和环境变量
use std::ffi::{CStr, CString};
use std::ops::RangeInclusive;
use std::path::PathBuf;

pub const DEFAULT_TARGET_PACKAGE: &str = "com.android.chrome";
pub const DEFAULT_DATA_ROOT: &str = "/data/data";
pub const DEFAULT_MAPS_PATH: &str = "/proc/self/maps";
// 后缀匹配，兼容 /system/lib 与 /system/lib64、apex 路径
pub const DEFAULT_LIBC_SUFFIX: &str = "/libc.so";
pub const DEFAULT_HOOK_SYMBOL: &CStr = c"open";
pub const DEFAULT_HOSTS_SOURCE: &CStr = c"/system/etc/hosts";
pub const DEFAULT_HOSTS_REPLACEMENT: &CStr = c"/data/hosts";

// uid = user_id * PER_USER_RANGE + app_id
pub const PER_USER_RANGE: i32 = 100_000;
// isolated 进程（如 Chrome 渲染进程）的 app_id 区间
pub const ISOLATED_APP_ID_RANGE: RangeInclusive<i32> = 90_000..=99_999;

pub const SYSTEM_SERVER_NAME: &str = "system_server";
pub const SYSTEM_SERVER_UID: i32 = 1000;

// 模块侧配置，每次特化时随模块实例创建
#[derive(Clone, Debug)]
pub struct ModuleConfig {
    pub target_package: String,
    pub libc_suffix: String,
    pub hook_symbol: CString,
    pub hosts_source: CString,
    pub hosts_replacement: CString,
    pub maps_path: PathBuf,
    pub per_user_range: i32,
    pub isolated_app_ids: RangeInclusive<i32>,
    pub debug: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            target_package: DEFAULT_TARGET_PACKAGE.to_string(),
            libc_suffix: DEFAULT_LIBC_SUFFIX.to_string(),
            hook_symbol: DEFAULT_HOOK_SYMBOL.to_owned(),
            hosts_source: DEFAULT_HOSTS_SOURCE.to_owned(),
            hosts_replacement: DEFAULT_HOSTS_REPLACEMENT.to_owned(),
            maps_path: PathBuf::from(DEFAULT_MAPS_PATH),
            per_user_range: PER_USER_RANGE,
            isolated_app_ids: ISOLATED_APP_ID_RANGE,
            debug: cfg!(debug_assertions),
        }
    }
}

// companion 侧配置：被查询包的数据目录位置
#[derive(Clone, Debug)]
pub struct CompanionConfig {
    pub data_root: PathBuf,
    pub target_package: String,
}

impl CompanionConfig {
    pub fn target_dir(&self) -> PathBuf {
        self.data_root.join(&self.target_package)
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            target_package: DEFAULT_TARGET_PACKAGE.to_string(),
        }
    }
}
