//! Build script for detecting system dependencies and providing installation guidance.
//!
//! The default build needs no system libraries. With the `opencv` feature the
//! script checks that OpenCV and pkg-config can be found and prints hints if not.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_OPENCV");

    if env::var_os("CARGO_FEATURE_OPENCV").is_some() {
        check_opencv();
    }
}

/// Trimmed stdout of a successful `pkg-config` invocation
fn pkg_config(args: &[&str]) -> Option<String> {
    let output = Command::new("pkg-config").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn check_opencv() {
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_PATHS");
    println!("cargo:rerun-if-env-changed=OPENCV_INCLUDE_PATHS");

    if pkg_config(&["--version"]).is_none() {
        println!("cargo:warning=pkg-config not found; it is used to locate OpenCV for frame extraction.");
        println!("cargo:warning=On Ubuntu: sudo apt-get install pkg-config");
        println!("cargo:warning=On macOS: brew install pkg-config");
        return;
    }

    match pkg_config(&["--modversion", "opencv4"]).or_else(|| pkg_config(&["--modversion", "opencv"])) {
        Some(version) => println!("cargo:warning=Found OpenCV version: {version}"),
        None => {
            println!("cargo:warning=OpenCV not found via pkg-config. The `opencv` feature needs it for frame extraction.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
            println!("cargo:warning=On macOS: brew install opencv");
            println!("cargo:warning=Or build without the feature: cargo build --no-default-features");
        }
    }
}
