//! Build information.

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit hash, when supplied at build time through `LDAPMERGE_COMMIT`.
pub const COMMIT: &str = match option_env!("LDAPMERGE_COMMIT") {
    Some(c) => c,
    None => "unknown",
};

/// Multi-line version report.
pub fn full() -> String {
    format!(
        "ldapmerge {VERSION}\n  Commit:   {COMMIT}\n  OS/Arch:  {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
