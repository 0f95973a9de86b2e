use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;

/// Generates a run identifier such as `20240501T120000Z-9f86d081`.
///
/// The suffix is four bytes from the operating system's RNG. There is no
/// fallback generator: if the OS RNG fails this panics.
pub fn new_run_id() -> String {
    let mut suffix = [0u8; 4];
    OsRng.fill_bytes(&mut suffix);
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%dT%H%M%SZ"),
        hex::encode(suffix)
    )
}
