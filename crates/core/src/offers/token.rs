use rand::Rng;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 43 characters over a 62-symbol alphabet, roughly 256 bits.
pub const TRACKING_TOKEN_LEN: usize = 43;

/// Generates the public lookup key for an offer. URL-safe without encoding.
pub fn generate_tracking_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TRACKING_TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
