use rand::Rng;

pub const CODE_LEN: usize = 6;

const CODE_SPACE: u32 = 1_000_000;

/// Draws a uniform six-digit code, zero-padded so `000000` through
/// `999999` are all equally likely and equally shaped.
pub(crate) fn generate_code() -> String {
    let n = rand::thread_rng().gen_range(0..CODE_SPACE);
    format!("{n:06}")
}
