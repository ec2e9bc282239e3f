// build.rs

//! Stamps the driver with its release version and the target it was built
//! for. `VOLTWIRE_VERSION` overrides the package version for packaged builds.

use std::env;

fn main() {
    let version = env::var("VOLTWIRE_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "dev".to_string()));
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=VOLTWIRE_BUILD_VERSION={version}");
    println!("cargo:rustc-env=VOLTWIRE_BUILD_TARGET={target}");
    println!("cargo:rerun-if-env-changed=VOLTWIRE_VERSION");
}
