use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `order_id|payment_id`, the checkout signature scheme
/// used by Razorpay and mirrored by the sandbox gateway.
pub fn sign_order_payment(secret: &str, order_id: &str, payment_id: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_order_payment(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = sign_order_payment(secret, order_id, payment_id);
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(signature.trim().to_ascii_lowercase().as_bytes()).into()
}
