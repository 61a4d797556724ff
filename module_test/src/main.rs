mod scenarios;
mod test_ctx;

use zygisk_hosts::set_debug;

fn main() {
    set_debug(true);
    scenarios::run_all();
    println!("module_test all scenarios passed");
}
