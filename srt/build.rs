//! Links against a system-installed libsrt. Building libsrt itself is an
//! external collaborator's job, not this crate's - callers are expected
//! to have it available to pkg-config (or pass `SRT_LIB_DIR`/`SRT_LIB`
//! directly) before building.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=SRT_LIB_DIR");
    println!("cargo:rerun-if-env-changed=SRT_LIB");

    if let Ok(dir) = env::var("SRT_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
        let lib = env::var("SRT_LIB").unwrap_or_else(|_| "srt".to_string());
        println!("cargo:rustc-link-lib={lib}");
        return;
    }

    match pkg_config::Config::new().atleast_version("1.4").probe("srt") {
        Ok(_) => {}
        Err(e) => {
            println!("cargo:warning=pkg-config could not find libsrt ({e}); falling back to -lsrt");
            println!("cargo:rustc-link-lib=srt");
        }
    }
}
