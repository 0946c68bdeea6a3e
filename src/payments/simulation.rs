//! Artifacts for gateways running in simulated mode
//!
//! Simulated responses carry the same fields a live gateway would return, so
//! the checkout flow can be exercised end to end without credentials.

use rand::Rng;
use std::time::Duration;

const PIX_PREFIX: &str = "00020126580014br.gov.bcb.pix0136";
const PIX_SUFFIX: &str = "520400005303986";
const PIX_KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 1x1 PNG standing in for a rendered QR code
pub const PLACEHOLDER_QR_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

pub const BOLETO_BARCODE_LEN: usize = 47;

/// Wait the configured artificial gateway latency
pub async fn latency(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Synthetic transaction id: prefix, nine random base36 chars, base36 timestamp
pub fn transaction_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;

    format!("{}{}{}", prefix, random, to_base36(millis))
}

/// Pix EMV payload with a random 36 character key
pub fn pix_code() -> String {
    let mut rng = rand::thread_rng();
    let key: String = (0..36)
        .map(|_| PIX_KEY_CHARSET[rng.gen_range(0..PIX_KEY_CHARSET.len())] as char)
        .collect();

    format!("{}{}{}", PIX_PREFIX, key, PIX_SUFFIX)
}

/// Pix EMV payload with a fixed, recognisable key
pub fn fixed_pix_code(key: &str) -> String {
    format!("{}{}{}", PIX_PREFIX, key, PIX_SUFFIX)
}

/// Digitable line of a boleto, 47 random digits
pub fn boleto_barcode() -> String {
    let mut rng = rand::thread_rng();
    (0..BOLETO_BARCODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
