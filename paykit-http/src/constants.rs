//! Header names and status codes of the x402 HTTP transport.

/// Current-format payment payload (client to server).
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";

/// Current-format payment requirements (server to client).
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

/// Current-format settlement confirmation (server to client).
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";

/// Legacy payment payload (client to server).
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Legacy settlement confirmation (server to client).
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Signed sign-in-with-x bundle (client to server).
pub const SIGN_IN_WITH_X_HEADER: &str = "SIGN-IN-WITH-X";

/// HTTP 402 Payment Required status code.
pub const HTTP_STATUS_PAYMENT_REQUIRED: u16 = 402;
