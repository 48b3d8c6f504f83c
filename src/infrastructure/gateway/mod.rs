pub mod vnpay;

pub use vnpay::{
    build_payment_url, format_gateway_time, gateway_now, hmac_sha512, response_message,
    sign_params, verify_checksum, IpnReply, VnPayConfig, RSP_ALREADY_CONFIRMED,
    RSP_INVALID_AMOUNT, RSP_INVALID_CHECKSUM, RSP_ORDER_NOT_FOUND, RSP_SUCCESS,
    RSP_UNKNOWN_ERROR,
};
