//! VNPay gateway plumbing: signed redirect construction and callback
//! checksum verification.
//!
//! The gateway signs an ordered `key=value` parameter string with
//! HMAC-SHA512. Hash input encodes values only; the redirect query string
//! encodes both keys and values. Encoding matches `java.net.URLEncoder`
//! (space becomes `+`, unreserved set `[A-Za-z0-9.*_-]`), which is what
//! the gateway verifies against.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

// Gateway response codes for the IPN reply contract
pub const RSP_SUCCESS: &str = "00";
pub const RSP_ORDER_NOT_FOUND: &str = "01";
pub const RSP_ALREADY_CONFIRMED: &str = "02";
pub const RSP_INVALID_AMOUNT: &str = "04";
pub const RSP_INVALID_CHECKSUM: &str = "97";
pub const RSP_UNKNOWN_ERROR: &str = "99";

/// Gateway merchant configuration
#[derive(Debug, Clone)]
pub struct VnPayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub api_version: String,
    pub curr_code: String,
    pub expire_minutes: i64,
}

impl Default for VnPayConfig {
    fn default() -> Self {
        Self {
            tmn_code: "DEMO0001".to_string(),
            hash_secret: "SANDBOXSECRET".to_string(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:8080/api/v1/payments/vnpay/return".to_string(),
            api_version: "2.1.0".to_string(),
            curr_code: "VND".to_string(),
            expire_minutes: 15,
        }
    }
}

/// Reply body for the gateway's IPN endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpnReply {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnReply {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            rsp_code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Percent-encode like `java.net.URLEncoder.encode` with US-ASCII.
fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Hex-encoded HMAC-SHA512 of `data` under `secret`.
pub fn hmac_sha512(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Canonical hash input: parameters sorted by name, empty values skipped,
/// `name=encoded_value` joined with `&`.
fn canonical_hash_data(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, url_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a parameter set, returning the hex checksum.
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> String {
    hmac_sha512(secret, &canonical_hash_data(params))
}

/// Build the full redirect URL: encoded query string plus
/// `vnp_SecureHash` computed over the canonical form.
pub fn build_payment_url(pay_url: &str, params: &BTreeMap<String, String>, secret: &str) -> String {
    let query = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let secure_hash = sign_params(params, secret);
    format!("{}?{}&vnp_SecureHash={}", pay_url, query, secure_hash)
}

/// Verify a callback's checksum. The signature fields themselves are
/// excluded from the hash input; comparison is case-insensitive.
pub fn verify_checksum(params: &HashMap<String, String>, secret: &str) -> bool {
    let Some(received) = params.get("vnp_SecureHash") else {
        return false;
    };
    let fields: BTreeMap<String, String> = params
        .iter()
        .filter(|(k, _)| k.as_str() != "vnp_SecureHash" && k.as_str() != "vnp_SecureHashType")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    sign_params(&fields, secret).eq_ignore_ascii_case(received)
}

/// Gateway timestamps are expressed in the fixed +07:00 offset.
pub fn gateway_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(7 * 3600).expect("+07:00 is a valid offset");
    Utc::now().with_timezone(&offset)
}

/// `yyyyMMddHHmmss`, the gateway's timestamp format.
pub fn format_gateway_time(dt: DateTime<FixedOffset>) -> String {
    dt.format("%Y%m%d%H%M%S").to_string()
}

/// Human-readable text for the gateway's transaction response codes.
pub fn response_message(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "07" => "Money deducted, transaction suspected of fraud",
        "09" => "Card not registered for internet banking",
        "10" => "Card authentication failed more than 3 times",
        "11" => "Payment window expired",
        "12" => "Card or account is locked",
        "13" => "Wrong OTP entered",
        "24" => "Customer cancelled the transaction",
        "51" => "Insufficient funds",
        "65" => "Daily transaction limit exceeded",
        "75" => "Issuing bank under maintenance",
        "79" => "Wrong payment password entered too many times",
        _ => "Unknown error",
    }
}

// ── Tests ──────────────────────────────────────────────────────
