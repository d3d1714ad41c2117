//! # Base Architecture
//!
//! Build directories are keyed by the RPM base architecture (`x86_64`,
//! `aarch64`, `ppc64le`, `s390x`), which does not always match Rust's
//! `target_arch` naming.

/// Return the base architecture of the host this binary was built for.
pub fn host_basearch() -> &'static str {
    basearch_for(std::env::consts::ARCH, cfg!(target_endian = "little"))
}

/// Map a Rust `target_arch` name to its RPM base architecture.
pub fn basearch_for(target_arch: &'static str, little_endian: bool) -> &'static str {
    match target_arch {
        "x86" => "i386",
        "arm" => "armhfp",
        "powerpc64" if little_endian => "ppc64le",
        "powerpc64" => "ppc64",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
}
